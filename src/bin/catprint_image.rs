use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use catprint::{run_job, Algorithm, BleTransport, Energy, JobInput, JobOptions, JobOutcome};

/// Print an image on a cat thermal printer.
#[derive(Parser)]
#[command(name = "catprint-image", version)]
struct Args {
    /// Image file to print
    filename: PathBuf,

    #[arg(short = 'l', long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Which image binarization algorithm to use
    #[arg(short = 'b', long, value_enum, default_value_t = Algorithm::FloydSteinberg)]
    img_binarization_algo: Algorithm,

    /// Display a preview and ask for confirmation before printing
    #[arg(short, long)]
    show_preview: bool,

    /// Printer device id, address or name (default: autodiscover)
    #[arg(short, long)]
    device: Option<String>,

    /// Thermal energy between 0x0000 (light) and 0xffff (darker, default)
    #[arg(short, long, default_value = "0xffff", value_parser = parse_energy)]
    energy: Energy,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

fn parse_energy(s: &str) -> Result<Energy, String> {
    s.parse().map_err(|e: catprint::PrintError| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.log_level.as_filter())),
        )
        .init();

    let mut options = JobOptions::new(JobInput::Image(args.filename));
    options.algorithm = args.img_binarization_algo;
    options.preview = args.show_preview;
    options.energy = args.energy;

    let mut transport = BleTransport::new(args.device);
    match run_job(&options, &mut transport).await? {
        JobOutcome::Printed { bytes_sent, .. } => {
            println!("✅ Print job completed ({} bytes sent)", bytes_sent);
        }
        JobOutcome::Cancelled => {
            println!("Print cancelled");
        }
    }
    Ok(())
}
