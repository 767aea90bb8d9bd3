//! # Map Manager CLI (`mapctl`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mapctl init` | Create the map database schema |
//! | `mapctl upload <dir>` | Upload one map directory |
//! | `mapctl serve` | Run the map service |
//! | `mapctl list` | List stored maps |
//! | `mapctl export <name> <dir>` | Write a stored map back to a directory |
//!
//! Logs go to stderr and are filtered with `RUST_LOG`; command summaries go
//! to stdout.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use map_manager::upload::UploadOptions;
use map_manager::{config, export, list, migrate, server, upload};

/// Map Manager CLI: upload robot map directories to a map service or
/// straight into the map database.
#[derive(Parser)]
#[command(name = "mapctl", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// If the file does not exist, built-in defaults are used: direct
    /// uploads into `./data/maps.sqlite`.
    #[arg(long, global = true, default_value = "./config/mapctl.toml")]
    config: PathBuf,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the map database schema. Idempotent.
    Init,

    /// Upload a map directory.
    ///
    /// Reads `map_info.json` (required) plus any of `occupancy_grid.png`,
    /// `cartographer_map.pbstream`, `node_graph.json`, `area_tree.json` and
    /// `zones.json`. With a service name and `[service].endpoint`
    /// configured, the map is sent to the map service; otherwise it is
    /// written directly to the database.
    Upload {
        /// Map directory.
        dir: PathBuf,

        /// Map service name; overrides `[service].name`.
        #[arg(long)]
        service_name: Option<String>,

        /// Write to the database even if a service is configured.
        #[arg(long)]
        direct: bool,

        /// Validate the directory without uploading anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the map service, accepting uploads from remote `mapctl upload`.
    Serve,

    /// List stored maps.
    List,

    /// Write a stored map back out as a map directory.
    Export {
        /// Map name.
        name: String,
        /// Output directory.
        dir: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "map_manager=debug,mapctl=debug"
    } else {
        "map_manager=info,mapctl=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_or_minimal(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Upload {
            dir,
            service_name,
            direct,
            dry_run,
        } => {
            let opts = UploadOptions {
                dir,
                service_name,
                direct,
                dry_run,
            };
            upload::run_upload(&cfg, &opts).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::List => {
            list::run_list(&cfg).await?;
        }
        Commands::Export { name, dir } => {
            export::run_export(&cfg, &name, &dir).await?;
        }
    }

    Ok(())
}
