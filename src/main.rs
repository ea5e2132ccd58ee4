//! deeptube CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use deeptube::{
    commands::{
        build_pipeline, cmd_hide, cmd_init, cmd_list, cmd_prefetch, cmd_refresh, cmd_status,
        cmd_watch, ctrl_c, print_feed, print_init, print_prefetch_stats, print_refresh_stats,
        print_status, print_watch_summary, ListOptions,
    },
    config::Config,
    error::Result,
    progress::LogWriterFactory,
    store::LocalStore,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "deeptube")]
#[command(version, about = "Subscription feed backed by a local video cache", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "DEEPTUBE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config and create the video database
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Fetch subscribed playlists and update the cache
    Refresh,

    /// Refresh on a schedule until interrupted
    Watch {
        /// Minutes between refreshes (defaults to refresh.interval_minutes)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Show the cached feed, newest first
    List {
        /// Maximum number of videos (defaults to feed.limit)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Include hidden videos
        #[arg(long)]
        all: bool,

        /// Download missing thumbnails while listing
        #[arg(long)]
        thumbnails: bool,
    },

    /// Hide videos from the feed
    Hide {
        /// Video IDs to hide
        #[arg(required = true)]
        video_ids: Vec<String>,
    },

    /// Download thumbnails for the feed ahead of time
    Prefetch {
        /// Number of videos (defaults to feed.limit)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show configuration and cache status
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let (plain, structured) = if cli.log_json {
        let layer = fmt::layer().json().with_writer(LogWriterFactory::default());
        (None, Some(layer))
    } else {
        (Some(fmt::layer().with_writer(LogWriterFactory::default())), None)
    };

    tracing_subscriber::registry()
        .with(plain)
        .with(structured)
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { force } => {
            let (base_dir, config_path) = init_paths(cli.config.as_deref());
            let info = cmd_init(base_dir, config_path, force).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print_init(&info, &Config::default().remote.api_key_env);
            }
            return Ok(());
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "deeptube", &mut std::io::stdout());
            return Ok(());
        }
        _ => {}
    }

    let config = load_config(cli.config.as_deref())?;
    let store = LocalStore::connect(&config).await?;

    let result = run_command(cli.command, cli.json, &config, &store).await;
    store.close().await;
    result
}

async fn run_command(
    command: Commands,
    json: bool,
    config: &Config,
    store: &LocalStore,
) -> Result<()> {
    match command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Refresh => {
            let pipeline = build_pipeline(config, store.clone())?;
            let stats = cmd_refresh(&pipeline, !json).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_refresh_stats(&stats);
            }
        }

        Commands::Watch { interval } => {
            let minutes = interval.unwrap_or(config.refresh.interval_minutes).max(1);
            let pipeline = build_pipeline(config, store.clone())?;
            let summary = cmd_watch(&pipeline, Duration::from_secs(minutes * 60), ctrl_c()).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_watch_summary(&summary);
            }
        }

        Commands::List {
            limit,
            all,
            thumbnails,
        } => {
            let options = ListOptions {
                limit,
                include_hidden: all,
                thumbnails,
            };
            let views = cmd_list(config, store, options).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&views)?);
            } else {
                print_feed(&views);
            }
        }

        Commands::Hide { video_ids } => {
            let hidden = cmd_hide(store, &video_ids).await?;

            if json {
                println!("{}", serde_json::json!({ "hidden": video_ids }));
            } else {
                println!("✓ Hid {} video(s)", hidden);
            }
        }

        Commands::Prefetch { limit } => {
            let stats = cmd_prefetch(config, store, limit, !json).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_prefetch_stats(&stats);
            }
        }

        Commands::Status => {
            let status = cmd_status(config, store).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
    }

    Ok(())
}

/// Base directory and config file for `init`. A `.toml` path names the file;
/// any other path names the directory.
fn init_paths(config: Option<&Path>) -> (PathBuf, PathBuf) {
    match config {
        Some(path) if path.extension().is_some_and(|e| e == "toml") => {
            let base = path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(Config::default_base_dir);
            (base, path.to_path_buf())
        }
        Some(dir) => (dir.to_path_buf(), dir.join("config.toml")),
        None => {
            let base = Config::default_base_dir();
            let config_path = base.join("config.toml");
            (base, config_path)
        }
    }
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(path),
        None => {
            let path = Config::default_config_path();
            if path.exists() {
                Config::load(&path)
            } else {
                Err(deeptube::Error::Config(format!(
                    "No config at {}. Run 'deeptube init' first.",
                    path.display()
                )))
            }
        }
    }
}
