use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use lessonbook::compactor::{compact_if_due, run_compactor};
use lessonbook::config::Config;
use lessonbook::facade::QueryFacade;
use lessonbook::store::WalStore;

#[derive(Parser)]
#[command(name = "lessonbook")]
#[command(about = "Admin tool for the lessonbook booking store")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Data directory (overrides LESSONBOOK_DATA_DIR)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Print instructor, window and booking counts as JSON (default)
    Stats,
    /// Rewrite the log with only the live records
    Compact,
    /// Serve metrics and compact in the background until Ctrl-C
    Run,
    /// Print one instructor's windows, bookings and open time for a UTC date
    Day {
        instructor: String,
        /// Calendar date, e.g. 2025-05-06
        date: NaiveDate,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    std::fs::create_dir_all(&config.data_dir)?;
    let store = Arc::new(WalStore::open(&config.wal_path())?);

    match cli.command.unwrap_or(Command::Stats) {
        Command::Stats => {
            println!("{}", serde_json::to_string_pretty(&store.stats())?);
        }
        Command::Compact => {
            let before = std::fs::metadata(store.path())?.len();
            store.compact().await?;
            let after = std::fs::metadata(store.path())?.len();
            info!("compacted {}: {before} -> {after} bytes", store.path().display());
        }
        Command::Run => {
            lessonbook::observability::init(config.metrics_port)?;
            info!(
                "serving {} (compact threshold {}, store timeout {:?})",
                store.path().display(),
                config.compact_threshold,
                config.store_timeout
            );
            compact_if_due(&store, config.compact_threshold).await;

            let shutdown = CancellationToken::new();
            let compactor = tokio::spawn(run_compactor(
                store.clone(),
                config.compact_threshold,
                shutdown.clone(),
            ));

            tokio::signal::ctrl_c().await?;
            info!("shutting down");
            shutdown.cancel();
            compactor.await?;
        }
        Command::Day { instructor, date } => {
            let facade = QueryFacade::with_store(store, config.store_timeout);
            let view = facade.instructor_day(&instructor, date).await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_stats() {
        let cli = Cli::try_parse_from(["lessonbook"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.data_dir.is_none());
    }

    #[test]
    fn day_takes_instructor_and_date() {
        let cli = Cli::try_parse_from(["lessonbook", "-d", "/tmp/lb", "day", "a@example.com", "2025-05-06"]).unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/lb")));
        match cli.command {
            Some(Command::Day { instructor, date }) => {
                assert_eq!(instructor, "a@example.com");
                assert_eq!(date, NaiveDate::from_ymd_opt(2025, 5, 6).unwrap());
            }
            _ => panic!("expected day"),
        }
        assert!(Cli::try_parse_from(["lessonbook", "day", "a@example.com", "May 6"]).is_err());
        assert!(Cli::try_parse_from(["lessonbook", "book"]).is_err());
    }
}
