//! # Kanso - Wayland presentation layer
//!
//! Opens a single toplevel window and presents an animated gradient through
//! rotating shared-memory buffers, one frame per compositor frame callback.
//! Holding the left or right pointer button changes the animation speed.

use anyhow::{Context, Result};
use clap::Parser;
use kanso::config::{KansoConfig, DEFAULT_CONFIG_PATH};
use kanso::logging::{self, Verbosity};
use kanso::{fatal, wayland};
use log::{error, info};

#[derive(Parser, Debug)]
#[command(name = "kanso")]
#[command(about = "Presents CPU-rendered frames on a Wayland shared-memory surface")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace logging (every protocol event)
    #[arg(long)]
    trace: bool,

    /// Window title (overrides window.title)
    #[arg(long)]
    title: Option<String>,

    /// Number of rotating pixel buffers (overrides buffers.count)
    #[arg(long)]
    buffers: Option<usize>,
}

impl Cli {
    /// Applies the command line overrides on top of the loaded configuration.
    fn apply(&self, config: &mut KansoConfig) {
        if let Some(title) = &self.title {
            config.window.title = title.clone();
            info!("🏷️ Window title set via CLI flag: {}", title);
        }
        if let Some(count) = self.buffers {
            config.buffers.count = count;
            info!("🖼️ Buffer count set via CLI flag: {}", count);
        }
    }
}

fn load_config(path: &str) -> KansoConfig {
    match KansoConfig::load(path) {
        Ok(config) => {
            info!("✅ Configuration loaded from: {}", path);
            config
        }
        Err(e) => {
            error!("❌ Failed to load configuration: {:#}", e);
            info!("📝 Using default configuration");
            KansoConfig::default()
        }
    }
}

/// Loads the configuration file, applies the CLI overrides, then validates
/// the result. An invalid file is an error, not a reason to use defaults.
fn resolve_config(cli: &Cli) -> Result<KansoConfig> {
    let mut config = load_config(&cli.config);
    cli.apply(&mut config);
    if let Err(e) = config.validate() {
        fatal!("{:#}", e);
        return Err(e.context("Invalid configuration"));
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(Verbosity::from_flags(cli.debug, cli.trace));

    info!("🚀 Starting Kanso");
    info!("📄 Version: {}", env!("CARGO_PKG_VERSION"));

    let config = resolve_config(&cli)?;

    wayland::run(&config).context("Presentation loop failed")?;

    info!("👋 Kanso shutting down");
    Ok(())
}
