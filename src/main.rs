#![warn(missing_docs)]

//! Keeps a brightness slider in sync with brightnessctl

mod armaf;
mod config;
mod control;
mod external;
mod level;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use control::{
    brightness_controller::{BrightnessController, ControllerOptions},
    indicator_adapter::Indicator,
    session::BrightnessSession,
};
use external::backlight::brightnessctl::BrightnessCtl;
use flexi_logger::Logger;
use level::BrightnessLevel;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::{wrappers::LinesStream, StreamExt};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Path to the configuration file
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Backlight device to control, overrides the configuration
    #[clap(short, long)]
    device: Option<String>,

    /// Log more, can be repeated
    #[clap(short, long, parse(from_occurrences))]
    verbose: usize,

    #[clap(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Print the current brightness
    Get,
    /// Print the device's maximum in raw units
    Max,
    /// Set the brightness, as a fraction (0.4) or percentage (40%)
    Set { level: BrightnessLevel },
    /// Print brightness changes as they happen, reading new levels from stdin
    Watch,
}

/// The actions answered by a single controller request.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Query {
    Get,
    Max,
    Set(BrightnessLevel),
}

/// Shows the level on stdout, one line per change.
struct TerminalIndicator;

impl Indicator for TerminalIndicator {
    fn show_level(&mut self, level: BrightnessLevel) {
        println!("{}", level);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_spec = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let _logger = Logger::try_with_env_or_str(log_spec)?.start()?;
    log_panics::init();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(device) = args.device {
        config.tool.device = Some(device);
    }
    let tool = BrightnessCtl::from_config(&config.tool);

    let query = match args.action {
        Action::Watch => return watch(tool, &config).await,
        Action::Get => Query::Get,
        Action::Max => Query::Max,
        Action::Set { level } => Query::Set(level),
    };
    run_once(tool, &config, query).await
}

async fn run_once(tool: BrightnessCtl, config: &Config, query: Query) -> Result<()> {
    let port = BrightnessController::new(tool, ControllerOptions::from(config))
        .spawn()
        .await;
    let result = match query {
        Query::Get => port.current_level().await.map(|level| println!("{}", level)),
        Query::Max => port.max_level().await.map(|max| println!("{}", max.value)),
        Query::Set(level) => port
            .set_level(level)
            .await
            .map(|value| log::info!("Sent {} to the backlight", value)),
    };
    // Waits for a requested level to be written out
    port.await_shutdown().await;
    result
}

async fn watch(tool: BrightnessCtl, config: &Config) -> Result<()> {
    let session = BrightnessSession::enable(tool, config, TerminalIndicator).await;
    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    let result = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                break signal.context("Couldn't listen for Ctrl-C");
            }
            line = lines.next() => match line {
                None => break Ok(()),
                Some(Err(e)) => break Err(e).context("Couldn't read from stdin"),
                Some(Ok(line)) => handle_input(&session, line.trim()).await,
            }
        }
    };
    session.disable().await;
    result
}

async fn handle_input(session: &BrightnessSession, input: &str) {
    let port = session.port();
    let result = match input {
        "" => return,
        "poll" => port.poll().await.map(|outcome| log::debug!("{:?}", outcome)),
        "state" => port.state().await.map(|state| println!("{:?}", state)),
        _ => match input.parse::<BrightnessLevel>() {
            Ok(level) => port.set_level(level).await.map(|_| ()),
            Err(e) => {
                log::warn!("{}", e);
                return;
            }
        },
    };
    if let Err(e) = result {
        log::error!("Brightness controller failed: {}", e);
    }
}
