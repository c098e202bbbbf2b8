use anyhow::{bail, Context as _, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dnp3dissect::config::Config;
use dnp3dissect::dissect::Dissector;
use dnp3dissect::output::Printer;

/// Streaming DNP3 (IEEE 1815) wire dissector
#[derive(Parser)]
#[command(name = "dnp3dissect", version, about = "streaming DNP3 wire dissector")]
struct Cli {
    /// Replay a pcap file and dissect every DNP3 conversation in it
    #[arg(short, long, value_name = "FILE", conflicts_with = "raw")]
    pcap: Option<PathBuf>,

    /// Dissect a file containing a raw byte stream with embedded link frames
    #[arg(short, long, value_name = "FILE")]
    raw: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// DNP3 port to follow in pcap mode (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Emit events as JSON lines
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(port) = cli.port {
        config.capture.port = port;
    }

    match (&cli.raw, &cli.pcap) {
        (Some(path), _) => run_raw(path, &config, cli.json),
        (None, Some(path)) => run_pcap(path, &config, cli.json),
        (None, None) => bail!("either --raw or --pcap is required"),
    }
}

fn run_raw(path: &Path, config: &Config, json: bool) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mut dissector = Dissector::new(&config.dissector, Printer::stdout(json));
    dissector.feed(&bytes);
    let stats = dissector.stats().clone();
    dissector.finish();
    info!(
        "{} bytes: {} frames ({} with bad CRC), {} segments, {} fragments, {} app errors, {} rejects",
        stats.bytes_fed,
        stats.frames,
        stats.crc_dropped,
        stats.segments,
        stats.fragments,
        stats.app_errors,
        stats.app_rejects + stats.transport_rejects,
    );
    Ok(())
}

#[cfg(feature = "capture")]
fn run_pcap(path: &Path, config: &Config, json: bool) -> Result<()> {
    let streams = dnp3dissect::capture::replay_file(path, config, |key| {
        Printer::stdout(json).with_label(key.to_string())
    })?;
    if streams.is_empty() {
        info!("no DNP3 traffic on port {}", config.capture.port);
    }
    for (key, stats, _) in streams {
        info!(
            "{}: {} frames, {} segments, {} fragments",
            key, stats.frames, stats.segments, stats.fragments
        );
    }
    Ok(())
}

#[cfg(not(feature = "capture"))]
fn run_pcap(_path: &Path, _config: &Config, _json: bool) -> Result<()> {
    bail!("built without capture support; use --raw or rebuild with the capture feature")
}
