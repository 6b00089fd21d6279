//! StrataDB CLI
//!
//! Command-line interface for inspecting and mutating a StrataDB
//! snapshot file. Each invocation opens the database, runs one command,
//! and saves on close.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stratadb::{Engine, SqlOutcome};

/// StrataDB CLI
#[derive(Parser, Debug)]
#[command(name = "stratadb-cli")]
#[command(about = "CLI for the StrataDB embedded storage engine")]
#[command(version)]
struct Args {
    /// Path to the database file (created on first write)
    #[arg(short, long, default_value = "strata.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// Table name
        table: String,

        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// Table name
        table: String,

        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// Table name
        table: String,

        /// The key to delete
        key: String,
    },

    /// Scan all live entries of a table, or a key range
    Scan {
        /// Table name
        table: String,

        /// Inclusive range start
        #[arg(long)]
        start: Option<String>,

        /// Exclusive range end
        #[arg(long)]
        end: Option<String>,
    },

    /// Count live keys in a table
    Count {
        /// Table name
        table: String,
    },

    /// List all tables
    Tables,

    /// Execute a SQL statement
    Sql {
        /// The statement to execute
        statement: String,
    },

    /// Run a garbage collection pass
    Gc,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> stratadb::Result<()> {
    let engine = Engine::open(&args.db)?;

    match args.command {
        Commands::Get { table, key } => match engine.get(&table, key.as_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(not found)"),
        },
        Commands::Set { table, key, value } => {
            engine.insert(&table, key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Del { table, key } => {
            let existed = engine.delete(&table, key.as_bytes())?;
            println!("{}", if existed { "OK" } else { "(not found)" });
        }
        Commands::Scan { table, start, end } => {
            let result = match (start, end) {
                (Some(start), Some(end)) => {
                    engine.range(&table, start.as_bytes(), end.as_bytes())?
                }
                (None, None) => engine.scan(&table)?,
                _ => {
                    return Err(stratadb::StrataError::InvalidArgument(
                        "--start and --end must be given together".into(),
                    ))
                }
            };
            for (key, value) in result.iter() {
                println!(
                    "{} = {}",
                    String::from_utf8_lossy(key),
                    String::from_utf8_lossy(value)
                );
            }
        }
        Commands::Count { table } => println!("{}", engine.count(&table)?),
        Commands::Tables => {
            for name in engine.table_names()? {
                println!("{}", name);
            }
        }
        Commands::Sql { statement } => match engine.execute_sql(&statement)? {
            SqlOutcome::Rows(rows) => {
                for (key, row) in &rows {
                    let columns: Vec<String> = row
                        .iter()
                        .map(|(c, v)| format!("{}={}", c, v))
                        .collect();
                    println!("{}: {}", String::from_utf8_lossy(key), columns.join(", "));
                }
                println!("({} rows)", rows.len());
            }
            SqlOutcome::Affected(n) => println!("({} rows affected)", n),
        },
        Commands::Gc => println!("removed {} versions", engine.gc()?),
    }

    engine.close()
}
