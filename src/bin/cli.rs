//! DeltaFetch CLI
//!
//! Inspect and maintain DeltaFetch store files.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use deltafetch::store::StoreRecovery;
use deltafetch::{KeyStore, Result, SyncStrategy};
use tracing_subscriber::{fmt, EnvFilter};

/// DeltaFetch CLI
#[derive(Parser, Debug)]
#[command(name = "deltafetch-cli")]
#[command(about = "Inspect and maintain DeltaFetch stores")]
#[command(version)]
struct Args {
    /// Store directory
    #[arg(short, long, env = "DELTAFETCH_DIR", default_value = ".deltafetch")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the keys stored for a crawl
    Keys {
        /// Crawl name
        crawl: String,
    },

    /// Show the value stored for a key
    Get {
        /// Crawl name
        crawl: String,

        /// The key to look up
        key: String,
    },

    /// Store a key-value pair
    Put {
        /// Crawl name
        crawl: String,

        /// The key to store
        key: String,

        /// The value to store
        value: String,
    },

    /// Empty a crawl's store
    Reset {
        /// Crawl name
        crawl: String,
    },

    /// Rewrite a crawl's store without superseded entries
    Compact {
        /// Crawl name
        crawl: String,
    },

    /// Verify a crawl's store file without modifying it
    Check {
        /// Crawl name
        crawl: String,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,deltafetch=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Commands::Keys { crawl } => {
            let mut store = open(&args.dir, &crawl, false)?;
            for key in store.keys()? {
                println!("{}", String::from_utf8_lossy(&key));
            }
            store.close()
        }
        Commands::Get { crawl, key } => {
            let mut store = open(&args.dir, &crawl, false)?;
            match store.get(key.as_bytes())? {
                Some(value) => println!("{}", String::from_utf8_lossy(&value)),
                None => println!("(not found)"),
            }
            store.close()
        }
        Commands::Put { crawl, key, value } => {
            let mut store = open(&args.dir, &crawl, false)?;
            store.put(key.as_bytes(), value.as_bytes())?;
            store.close()
        }
        Commands::Reset { crawl } => {
            let mut store = open(&args.dir, &crawl, true)?;
            tracing::info!("Reset {}", store.path().display());
            store.close()
        }
        Commands::Compact { crawl } => {
            let mut store = open(&args.dir, &crawl, false)?;
            store.compact()?;
            store.close()
        }
        Commands::Check { crawl } => {
            let path = KeyStore::db_path(&args.dir, &crawl);
            let result = StoreRecovery::verify(&path)?;
            println!("path:              {}", path.display());
            println!("entries recovered: {}", result.entries_recovered);
            println!("stale entries:     {}", result.stale_entries);
            println!("live keys:         {}", result.entries_recovered - result.stale_entries);
            println!("valid length:      {}", result.valid_len);
            println!("torn tail:         {}", result.torn_tail);
            Ok(())
        }
    }
}

fn open(dir: &Path, crawl: &str, reset: bool) -> Result<KeyStore> {
    KeyStore::open_with(dir, crawl, reset, SyncStrategy::EveryWrite)
}
