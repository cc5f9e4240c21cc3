//! File-replay host wrapper.
//!
//! Maps the state image at the configured virtual base, then feeds recorded
//! inputs and queries through the dispatcher, writing every notice, voucher,
//! and report next to them. The kernel is oblivious to all of these flags.

use std::num::ParseIntError;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lambadex_core::rollup::replay::{self, ReplayConfig};

/// Replay recorded rollup inputs against a LambadeX state image
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// State image file, mapped read-write at the virtual start
    #[arg(long)]
    image_filename: PathBuf,

    /// Virtual base address of the state mapping (decimal or 0x-hex)
    #[arg(long, default_value = "0x1000000000", value_parser = parse_virtual_start)]
    lambda_virtual_start: u64,

    /// Zero the image and place a fresh genesis state before replaying
    #[arg(long)]
    initialize_lambda: bool,

    /// First input index to process
    #[arg(long, default_value = "0")]
    rollup_input_begin: u32,

    /// One past the last input index to process
    #[arg(long, default_value = "0")]
    rollup_input_end: u32,

    /// First query index to process
    #[arg(long, default_value = "0")]
    rollup_query_begin: u32,

    /// One past the last query index to process
    #[arg(long, default_value = "0")]
    rollup_query_end: u32,

    /// Input filename format, %d substituted by the index
    #[arg(long, default_value = "input-%d.bin")]
    rollup_input_format: String,

    /// Input metadata filename format
    #[arg(long, default_value = "input-%d-metadata.bin")]
    rollup_input_metadata_format: String,

    /// Query filename format
    #[arg(long, default_value = "query-%d.bin")]
    rollup_query_format: String,

    /// Directory holding the input, query, and output files
    #[arg(long, default_value = ".")]
    work_dir: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn parse_virtual_start(value: &str) -> Result<u64, ParseIntError> {
    match value.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse(),
    }
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.json_logs);

    let mut config = ReplayConfig::new(args.image_filename);
    config.virtual_start = args.lambda_virtual_start;
    config.initialize = args.initialize_lambda;
    config.input_begin = args.rollup_input_begin;
    config.input_end = args.rollup_input_end;
    config.query_begin = args.rollup_query_begin;
    config.query_end = args.rollup_query_end;
    config.input_format = args.rollup_input_format;
    config.input_metadata_format = args.rollup_input_metadata_format;
    config.query_format = args.rollup_query_format;
    config.work_dir = args.work_dir;

    let stats = replay::run(&config)?;
    tracing::info!(
        inputs_accepted = stats.inputs_accepted,
        inputs_rejected = stats.inputs_rejected,
        queries_accepted = stats.queries_accepted,
        queries_rejected = stats.queries_rejected,
        "replay finished"
    );
    Ok(())
}
