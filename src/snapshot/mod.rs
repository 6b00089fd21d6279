//! Engine Snapshot Persistence
//!
//! Serializes the full engine state (all tables with their complete
//! version chains, the oracle position, and index definitions) to a
//! single file, and reconstructs it.
//!
//! ## File Format
//!
//! ```text
//! ┌──────────┬─────────┬──────────┬────────────────┬─────────┐
//! │ magic 8B │ ver u32 │ len u64  │ bincode body   │ crc u32 │
//! └──────────┴─────────┴──────────┴────────────────┴─────────┘
//! ```
//!
//! All integers little-endian. The CRC32 covers the body only.
//!
//! ## Atomicity
//!
//! The snapshot is written to a `.tmp` sibling, fsynced, then renamed
//! over the target path. A crash mid-save leaves the previous valid file
//! untouched; the caller never observes a half-written snapshot.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, StrataError};
use crate::version::VersionEntry;

/// File magic
const MAGIC: &[u8; 8] = b"STRATADB";

/// Current snapshot format version
pub const FORMAT_VERSION: u32 = 1;

/// Fixed header size: magic + version + body length
const HEADER_SIZE: usize = 8 + 4 + 8;

/// Complete engine state for serialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Last allocated commit timestamp (oracle position)
    pub last_commit_ts: u64,

    /// Every table's chains: table -> [(key, ascending version entries)]
    pub tables: Vec<(String, Vec<(Vec<u8>, Vec<VersionEntry>)>)>,

    /// Index definitions as (table, column); contents are rebuilt on load
    pub indexes: Vec<(String, String)>,
}

/// Write a snapshot atomically to `path`
pub fn save_to_file(snapshot: &EngineSnapshot, path: &Path) -> Result<()> {
    let body = bincode::serialize(snapshot)
        .map_err(|e| StrataError::Serialization(format!("snapshot encode failed: {}", e)))?;

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&body);
    let crc = hasher.finalize();

    // Step 1: Write everything to a temporary sibling
    let tmp_path = path.with_extension("tmp");
    {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
        writer.write_all(&(body.len() as u64).to_le_bytes())?;
        writer.write_all(&body)?;
        writer.write_all(&crc.to_le_bytes())?;
        writer.flush()?;

        // Step 2: Sync before rename so the rename publishes complete data
        writer
            .into_inner()
            .map_err(|e| StrataError::Serialization(format!("snapshot flush failed: {}", e)))?
            .sync_all()?;
    }

    // Step 3: Atomic publish
    std::fs::rename(&tmp_path, path)?;

    info!(path = %path.display(), bytes = body.len(), "snapshot saved");
    Ok(())
}

/// Read and verify a snapshot from `path`
pub fn load_from_file(path: &Path) -> Result<EngineSnapshot> {
    let mut file = File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;

    if data.len() < HEADER_SIZE + 4 {
        return Err(StrataError::Corruption("snapshot file truncated".into()));
    }
    if &data[..8] != MAGIC {
        return Err(StrataError::Corruption("bad snapshot magic".into()));
    }

    let version = u32::from_le_bytes(data[8..12].try_into().unwrap());
    if version != FORMAT_VERSION {
        return Err(StrataError::Corruption(format!(
            "unsupported snapshot format version {}",
            version
        )));
    }

    let body_len = u64::from_le_bytes(data[12..20].try_into().unwrap()) as usize;
    if data.len() != HEADER_SIZE + body_len + 4 {
        return Err(StrataError::Corruption(format!(
            "snapshot length mismatch: expected {} bytes, found {}",
            HEADER_SIZE + body_len + 4,
            data.len()
        )));
    }

    let body = &data[HEADER_SIZE..HEADER_SIZE + body_len];
    let stored_crc = u32::from_le_bytes(data[HEADER_SIZE + body_len..].try_into().unwrap());

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(body);
    if hasher.finalize() != stored_crc {
        return Err(StrataError::Corruption("snapshot checksum mismatch".into()));
    }

    let snapshot: EngineSnapshot = bincode::deserialize(body)
        .map_err(|e| StrataError::Serialization(format!("snapshot decode failed: {}", e)))?;

    debug!(path = %path.display(), tables = snapshot.tables.len(), "snapshot loaded");
    Ok(snapshot)
}
