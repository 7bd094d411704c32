//! Callout Viewer - Main entry point
//!
//! Opens a window with a procedural demo model and keeps callouts, leader
//! lines and gestures running through the overlay engine.

mod app;
mod input;
mod models;
mod scene;
mod ui;

use anyhow::Result;
use callout_core::{config, OverlayView};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "callout-viewer")]
#[command(about = "Annotated 3D model viewer with floating callouts")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "callout.toml")]
    config: PathBuf,

    /// Model to load, overriding the configuration (ess-cabinet, turbofan, car)
    #[arg(short, long)]
    model: Option<String>,

    /// Use plain text labels instead of callout bubbles
    #[arg(long)]
    plain_labels: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Write a sample configuration to the config path and exit
    #[arg(long)]
    write_default_config: bool,
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&args.log_level))
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Callout Viewer v{}", env!("CARGO_PKG_VERSION"));

    if args.write_default_config {
        config::save_default_config(&args.config)?;
        info!(path = %args.config.display(), "Wrote sample configuration");
        return Ok(());
    }

    let mut config = config::load_config(&args.config)?;
    if let Some(model) = args.model {
        config.model.id = model;
    }

    info!(
        model = %config.model.id,
        parts = config.parts.len(),
        "Configuration loaded"
    );

    let view = OverlayView::new(config)?;
    app::run(view, app::ViewerOptions {
        plain_labels: args.plain_labels,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level_falls_back_to_info() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("verbose"), Level::INFO);
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["callout-viewer"]);
        assert_eq!(args.config, PathBuf::from("callout.toml"));
        assert!(args.model.is_none());
        assert!(!args.plain_labels);

        let args = Args::parse_from(["callout-viewer", "--model", "turbofan", "--plain-labels"]);
        assert_eq!(args.model.as_deref(), Some("turbofan"));
        assert!(args.plain_labels);
    }
}
