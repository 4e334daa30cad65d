//! msg-dedup - CLI entry point.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use msg_dedup::{
    cli::{into_metadata, Args, Command},
    config::{validate_config, Config, StoreBackend, StoreConfig},
    dedup::{ClaimOutcome, DedupTracker},
    error::{exit_codes, Error, Result},
    output::{
        print_check_results, print_error, print_info, print_record, print_success,
        print_tracker_stats, print_warning,
    },
    store::{FileStore, KeyValueStore, MemoryStore},
};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            print_error(&format!("{}", e));
            match e {
                Error::Config(_) | Error::ConfigValidation { .. } | Error::TomlParse(_) => {
                    ExitCode::from(exit_codes::CONFIG_ERROR as u8)
                }
                Error::Store(_) | Error::Io(_) => ExitCode::from(exit_codes::STORE_ERROR as u8),
                Error::EmptyMessageId | Error::InvalidArgument(_) => {
                    ExitCode::from(exit_codes::INPUT_ERROR as u8)
                }
                _ => ExitCode::from(exit_codes::UNEXPECTED_ERROR as u8),
            }
        }
    }
}

async fn run() -> Result<i32> {
    // Parse CLI arguments
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let mut config = if args.config.exists() {
        Config::load(&args.config)?
    } else {
        tracing::debug!(
            "Configuration file not found: {}, using defaults",
            args.config.display()
        );
        Config::default()
    };

    // Merge CLI arguments into config
    args.merge_into_config(&mut config);

    // Validate configuration
    validate_config(&config)?;

    let store = open_store(&config.store).await?;
    let tracker = DedupTracker::new(store, config.tracker.clone());

    execute(&tracker, &config.store, args.command).await
}

/// Open the configured backing store.
async fn open_store(config: &StoreConfig) -> Result<Arc<dyn KeyValueStore>> {
    match config.backend {
        StoreBackend::Memory => {
            print_warning("Using in-memory store; records will not persist");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::File => {
            let store = FileStore::open(config.directory()).await?;
            tracing::debug!("Using file store at {}", store.root().display());
            Ok(Arc::new(store))
        }
    }
}

/// Sweep expired envelopes out of the file store.
async fn purge(config: &StoreConfig) -> Result<i32> {
    match config.backend {
        StoreBackend::Memory => {
            print_info("In-memory store holds nothing between runs; nothing to purge");
        }
        StoreBackend::File => {
            let store = FileStore::open(config.directory()).await?;
            let removed = store.purge_expired().await?;
            print_success(&format!(
                "Purged {} expired records from {}",
                removed,
                store.root().display()
            ));
        }
    }
    Ok(exit_codes::SUCCESS)
}

/// Run a single command, returning the exit code.
async fn execute(tracker: &DedupTracker, store: &StoreConfig, command: Command) -> Result<i32> {
    match command {
        Command::Check { ids } => {
            let results = tracker.check_multiple(&ids).await;
            print_check_results(&ids, &results);

            if ids.iter().all(|id| results.get(id).copied().unwrap_or(false)) {
                Ok(exit_codes::SUCCESS)
            } else {
                Ok(exit_codes::NOT_PROCESSED)
            }
        }
        Command::Mark { id, meta } => {
            require_id(&id)?;
            if tracker.mark_processed(&id, into_metadata(meta)).await {
                print_success(&format!("Marked {} as processed", id));
                Ok(exit_codes::SUCCESS)
            } else {
                print_warning(&format!(
                    "Could not record {}; deduplication is not guaranteed",
                    id
                ));
                Ok(exit_codes::STORE_ERROR)
            }
        }
        Command::Claim { id, meta } => match tracker.claim(&id, into_metadata(meta)).await? {
            ClaimOutcome::Claimed => {
                print_success(&format!("Claimed {}", id));
                Ok(exit_codes::SUCCESS)
            }
            ClaimOutcome::AlreadyProcessed => {
                print_info(&format!("{} was already processed", id));
                Ok(exit_codes::NOT_PROCESSED)
            }
        },
        Command::Info { id } => {
            require_id(&id)?;
            match tracker.get_process_info(&id).await {
                Some(record) => {
                    print_record(&record);
                    Ok(exit_codes::SUCCESS)
                }
                None => {
                    print_info(&format!("No record for {}", id));
                    Ok(exit_codes::NOT_PROCESSED)
                }
            }
        }
        Command::Remove { id } => {
            tracker.remove(&id).await?;
            print_success(&format!("Removed {}", id));
            Ok(exit_codes::SUCCESS)
        }
        Command::Clear { id } => {
            require_id(&id)?;
            if tracker.clear(&id).await {
                print_success(&format!("Cleared {}", id));
                Ok(exit_codes::SUCCESS)
            } else {
                print_warning(&format!("Could not clear {}", id));
                Ok(exit_codes::STORE_ERROR)
            }
        }
        Command::Stats => {
            print_tracker_stats(&tracker.stats());
            Ok(exit_codes::SUCCESS)
        }
        Command::Purge => purge(store).await,
    }
}

/// Reject empty IDs on commands whose tracker call would only return a flag.
fn require_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidArgument("message ID must not be empty".into()));
    }
    Ok(())
}
