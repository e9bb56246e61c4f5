//! `jksn` CLI: convert between JSON and JKSN from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # Encode JSON to JKSN (stdin → stdout)
//! echo '{"name":"Alice","age":30}' | jksn encode > data.jksn
//!
//! # Encode from file to file, without the jk! header and checksum
//! jksn encode --no-header -i data.json -o data.jksn
//!
//! # Decode JKSN back to pretty-printed JSON
//! jksn decode -i data.jksn
//!
//! # Decode to single-line JSON
//! jksn decode --compact -i data.jksn
//!
//! # Show size statistics
//! jksn stats -i data.json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Read, Write};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "jksn",
    version,
    about = "JKSN binary JSON encoder/decoder",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode JSON to JKSN
    Encode {
        /// Input JSON file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Omit the jk! header and checksum trailer
        #[arg(long)]
        no_header: bool,
    },
    /// Decode JKSN back to JSON
    Decode {
        /// Input JKSN file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Input has no jk! header and checksum trailer
        #[arg(long)]
        no_header: bool,
        /// Print single-line JSON instead of pretty-printed
        #[arg(long)]
        compact: bool,
    },
    /// Show encoding statistics (JSON vs JKSN size)
    Stats {
        /// Input JSON file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Measure without the jk! header and checksum trailer
        #[arg(long)]
        no_header: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Encode {
            input,
            output,
            no_header,
        } => {
            let json = read_text(input.as_deref())?;
            let bytes = jksn_core::encode_json(&json, !no_header)
                .context("Failed to encode JSON to JKSN")?;
            info!(json_bytes = json.len(), jksn_bytes = bytes.len(), "encoded");
            write_output(output.as_deref(), &bytes)?;
        }
        Commands::Decode {
            input,
            output,
            no_header,
            compact,
        } => {
            let bytes = read_bytes(input.as_deref())?;
            let value = jksn_core::parse(&bytes, !no_header).context("Failed to decode JKSN")?;
            debug!(kind = %value.kind(), "decoded root value");
            let mut json = if compact {
                jksn_core::to_json(&value)?
            } else {
                jksn_core::to_json_pretty(&value)?
            };
            json.push('\n');
            write_output(output.as_deref(), json.as_bytes())?;
        }
        Commands::Stats { input, no_header } => {
            let json = read_text(input.as_deref())?;
            let value = jksn_core::from_json(&json).context("Failed to parse JSON")?;
            let bytes = jksn_core::dump(&value, !no_header).context("Failed to encode JKSN")?;
            let compact = jksn_core::to_json(&value)?;
            let json_bytes = json.len();
            let jksn_bytes = bytes.len();
            let ratio = if json_bytes > 0 {
                (1.0 - (jksn_bytes as f64 / json_bytes as f64)) * 100.0
            } else {
                0.0
            };
            println!("JSON size:     {} bytes", json_bytes);
            println!("Compact JSON:  {} bytes", compact.len());
            println!("JKSN size:     {} bytes", jksn_bytes);
            println!("Reduction:     {:.1}%", ratio);
        }
    }

    Ok(())
}

fn read_bytes(path: Option<&str>) -> Result<Vec<u8>> {
    match path {
        Some(path) => std::fs::read(path).with_context(|| format!("Failed to read file: {}", path)),
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn read_text(path: Option<&str>) -> Result<String> {
    let bytes = read_bytes(path)?;
    String::from_utf8(bytes).context("Input is not valid UTF-8")
}

fn write_output(path: Option<&str>, content: &[u8]) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(content)
                .and_then(|()| stdout.flush())
                .context("Failed to write to stdout")?;
        }
    }
    Ok(())
}
