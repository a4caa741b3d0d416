//! # Folio CLI (`folio`)
//!
//! ## Usage
//!
//! ```bash
//! folio --config ./config/folio.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `folio init` | Create the SQLite database and run schema migrations |
//! | `folio serve` | Start the HTTP API server |
//! | `folio bin list` | List recycle-bin entries |
//! | `folio bin restore <id>` | Restore an entry under a fresh id |
//! | `folio bin purge <id>` | Permanently delete an entry and its images |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use folio::{config, logging, migrate, recycle_cmd, server};

/// Folio CLI: a portfolio content API with a recycle bin.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/folio.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "folio",
    about = "Folio: a portfolio content API with a recycle bin",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/folio.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file, one table per collection, and the
    /// recycle bin. Running it again is safe.
    Init,

    /// Start the HTTP API server on `[server].bind`.
    Serve,

    /// Inspect and manage the recycle bin.
    Bin {
        #[command(subcommand)]
        action: BinAction,
    },
}

#[derive(Subcommand)]
enum BinAction {
    /// List entries, most recently deleted first.
    List,

    /// Restore an entry into its original collection under a new id.
    Restore {
        /// Recycle-bin entry id.
        id: String,
    },

    /// Permanently delete an entry and its hosted images.
    Purge {
        /// Recycle-bin entry id.
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging.level)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Bin { action } => match action {
            BinAction::List => {
                recycle_cmd::run_list(&cfg).await?;
            }
            BinAction::Restore { id } => {
                recycle_cmd::run_restore(&cfg, &id).await?;
            }
            BinAction::Purge { id } => {
                recycle_cmd::run_purge(&cfg, &id).await?;
            }
        },
    }

    Ok(())
}
