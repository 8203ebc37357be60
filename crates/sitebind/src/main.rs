//! sitebind CLI - merges page fragments into shared templates.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod build;

#[derive(Parser)]
#[command(name = "sitebind")]
#[command(about = "Assemble a static site from page fragments, templates and a language menu")]
#[command(version)]
pub struct Cli {
    /// Absolute URL written into every page's <base href>
    base_href: Option<String>,

    /// Source tree (defaults to config or "www")
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Output directory (defaults to config or "target")
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to sitebind.toml config file
    #[arg(short, long, default_value = "sitebind.toml")]
    config: PathBuf,

    /// Treat any recovered HTML parse error as fatal
    #[arg(long)]
    strict: bool,

    /// Merge pages on a single thread
    #[arg(long)]
    serial: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    build::run(build::Overrides {
        config_path: cli.config,
        base_href: cli.base_href,
        source: cli.source,
        output: cli.output,
        strict: cli.strict,
        serial: cli.serial,
    })
}
