use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use catprint::{run_job, BleTransport, Energy, JobInput, JobOptions, JobOutcome};

/// Convert a text file to an image and print it on a cat thermal printer.
#[derive(Parser)]
#[command(name = "catprint-text", version)]
struct Args {
    /// Text file to print
    text_file: PathBuf,

    /// Font size in pixels
    #[arg(short = 's', long, default_value_t = 16)]
    font_size: u32,

    /// Show a preview and ask for confirmation before printing
    #[arg(short, long)]
    preview: bool,

    /// Keep the generated image file
    #[arg(short, long)]
    keep_image: bool,

    /// Output image path (default: a temporary file, removed afterwards)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Printer device id, address or name (default: autodiscover)
    #[arg(short, long)]
    device: Option<String>,

    /// Thermal energy between 0x0000 (light) and 0xffff (darker, default)
    #[arg(short, long, default_value = "0xffff", value_parser = parse_energy)]
    energy: Energy,
}

fn parse_energy(s: &str) -> Result<Energy, String> {
    s.parse().map_err(|e: catprint::PrintError| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut options = JobOptions::new(JobInput::Text(args.text_file));
    options.font_size = args.font_size;
    options.preview = args.preview;
    options.keep_image = args.keep_image;
    options.output = args.output;
    options.energy = args.energy;

    let mut transport = BleTransport::new(args.device);
    match run_job(&options, &mut transport).await? {
        JobOutcome::Printed { bytes_sent, image } => {
            println!("✅ Print job completed ({} bytes sent)", bytes_sent);
            if let Some(path) = image {
                println!("Image saved: {}", path.display());
            }
        }
        JobOutcome::Cancelled => {
            println!("Print cancelled");
        }
    }
    Ok(())
}
