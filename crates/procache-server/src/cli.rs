//! Exposes the command line application.
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::logging;
use crate::server;
use crate::service::ContentService;

/// procache commands.
#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Run the web server.
    Run,

    /// Load a single document through the cache and print it as JSON.
    Render {
        /// The document path, relative to the content directory.
        path: String,
    },
}

/// Serves markdown content from disk, parsed once per process.
#[derive(Clone, Debug, Parser)]
#[command(name = "procache", version, about)]
struct Cli {
    /// Path to your configuration file.
    #[arg(long = "config", short = 'c', global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    /// Returns the path to the configuration file.
    fn config(&self) -> Option<&Path> {
        self.config.as_deref()
    }
}

/// Runs the main application.
pub fn execute() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::get(cli.config()).context("failed loading config")?;

    // SAFETY: No other threads have been spawned at this point.
    unsafe { logging::init_logging(&config) };

    match cli.command {
        Command::Run => server::run(config).context("failed to start the server")?,
        Command::Render { path } => render(config, &path).context("failed to render document")?,
    }

    Ok(())
}

fn render(config: Config, path: &str) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let document = runtime.block_on(async {
        // a single render never sees changes, so never watch
        let service = ContentService::create(Config {
            development: false,
            ..config
        })?;
        service.loader().load(path).await.map_err(anyhow::Error::from)
    })?;

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &*document)?;
    writeln!(stdout)?;
    Ok(())
}
