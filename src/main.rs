//! Binary entrypoint for the Hearth admin CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml`
//! - `list <owner> [--json]` - print one player's homes
//! - `public` - print every owner with at least one public home
//! - `delete <owner> <name>` - remove a home from durable storage
//! - `status` - print record and owner counts
//!
//! The game server embeds the library instead; see `hearth::service`.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;
use uuid::Uuid;

use hearth::config::Config;
use hearth::storage::{HomeStore, SledHomeStore};

#[derive(Parser)]
#[command(name = "hearth")]
#[command(about = "Administer player homes stored by Hearth")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// List a player's homes
    List {
        /// Owner id (UUID)
        owner: Uuid,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List owners with public homes
    Public,
    /// Delete one home
    Delete {
        /// Owner id (UUID)
        owner: Uuid,
        /// Home name (case-sensitive)
        name: String,
    },
    /// Show storage statistics
    Status,
}

#[derive(Serialize)]
struct HomeRow {
    name: String,
    world: String,
    x: f64,
    y: f64,
    z: f64,
    yaw: f32,
    pitch: f32,
    public: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        init_logging(&None, cli.verbose);
        Config::create_default(&cli.config).await?;
        info!("Configuration file created at {}", cli.config);
        return Ok(());
    }

    let config = Config::load(&cli.config).await?;
    init_logging(&Some(config.clone()), cli.verbose);
    let store = SledHomeStore::open(&config.storage.data_dir)
        .with_context(|| format!("opening home store at {}", config.storage.data_dir))?;

    match cli.command {
        Commands::Init => {}
        Commands::List { owner, json } => {
            let homes = store.get_homes(owner)?;
            let visibility = store.get_visibility(owner)?;
            let mut rows: Vec<HomeRow> = homes
                .into_iter()
                .map(|(name, loc)| HomeRow {
                    public: visibility.get(&name).copied().unwrap_or(false),
                    name,
                    world: loc.world,
                    x: loc.x,
                    y: loc.y,
                    z: loc.z,
                    yaw: loc.yaw,
                    pitch: loc.pitch,
                })
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if rows.is_empty() {
                println!("{} has no homes", owner);
            } else {
                for row in &rows {
                    println!(
                        "{:<20} {:<8} {}: {:.1}, {:.1}, {:.1}",
                        row.name,
                        if row.public { "public" } else { "private" },
                        row.world,
                        row.x,
                        row.y,
                        row.z
                    );
                }
            }
        }
        Commands::Public => {
            let owners = store.list_players_with_public_homes()?;
            if owners.is_empty() {
                println!("No public homes");
            }
            for owner in owners {
                println!("{}", owner);
            }
        }
        Commands::Delete { owner, name } => {
            if store.delete_home(owner, &name)? {
                info!("Deleted home {} of {}", hearth::logutil::escape_log(&name), owner);
                println!("Deleted");
            } else {
                println!("No such home");
            }
        }
        Commands::Status => {
            println!("Hearth v{}", env!("CARGO_PKG_VERSION"));
            println!("Data directory: {}", config.storage.data_dir);
            println!("Homes: {}", store.count_homes());
            println!("Owners: {}", store.list_owners()?.len());
            println!(
                "Teleport delay: {}s, request expiry: {}s, request cooldown: {}s",
                config.teleport.delay_seconds,
                config.tpa.request_ttl_seconds,
                config.tpa.cooldown_seconds
            );
        }
    }

    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity wins over the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });

    match log_file {
        Some(f) => {
            let file = std::sync::Mutex::new(f);
            // Echo to the console only in the foreground
            let is_tty = atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = file.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(|fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
            });
        }
    }
    let _ = builder.try_init();
}
