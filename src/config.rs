//! Configuration for StrataDB
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Main configuration for a StrataDB engine instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Persistence Configuration
    // -------------------------------------------------------------------------
    /// Snapshot file path. `None` means a purely in-memory engine:
    /// `flush()` becomes a successful no-op and state is lost on close.
    pub path: Option<PathBuf>,

    /// Save a snapshot automatically when the engine is closed gracefully
    /// (file-backed engines only).
    pub save_on_close: bool,

    // -------------------------------------------------------------------------
    // Garbage Collection Configuration
    // -------------------------------------------------------------------------
    /// Minimum number of versions retained per key during a GC pass.
    /// The latest committed version is always kept.
    pub gc_keep_versions: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: None,
            save_on_close: true,
            gc_keep_versions: 1,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the snapshot file path (file-backed engine)
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = Some(path.into());
        self
    }

    /// Enable or disable saving a snapshot on graceful close
    pub fn save_on_close(mut self, enabled: bool) -> Self {
        self.config.save_on_close = enabled;
        self
    }

    /// Set the minimum number of versions retained per key during GC
    pub fn gc_keep_versions(mut self, count: usize) -> Self {
        self.config.gc_keep_versions = count.max(1);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_in_memory() {
        let config = Config::default();
        assert!(config.path.is_none());
        assert!(config.save_on_close);
        assert_eq!(config.gc_keep_versions, 1);
    }

    #[test]
    fn test_builder() {
        let config = Config::builder()
            .path("/tmp/db.strata")
            .save_on_close(false)
            .gc_keep_versions(3)
            .build();

        assert_eq!(config.path, Some(PathBuf::from("/tmp/db.strata")));
        assert!(!config.save_on_close);
        assert_eq!(config.gc_keep_versions, 3);
    }

    #[test]
    fn test_gc_keep_versions_floor_is_one() {
        let config = Config::builder().gc_keep_versions(0).build();
        assert_eq!(config.gc_keep_versions, 1);
    }
}
