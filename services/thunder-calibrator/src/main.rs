//! Thunder calibrator entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use calib_common::Cycle;
use clap::Parser;
use grib2_codec::Grib2Codec;
use thunder_calibrator::{ThunderConfig, ThunderPipeline};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "thunder-calibrator")]
#[command(about = "Calibrated HREF thunder probabilities")]
struct Args {
    /// Cycle date (YYYYMMDD)
    #[arg(short, long, env = "PDY")]
    date: String,

    /// Cycle hour: 00 or 12
    #[arg(short, long, env = "cyc")]
    run: String,

    /// Job number: 1-48 for a forecast hour, 49-51 for full-period blocks
    job: u32,

    /// Configuration file path
    #[arg(long, env = "THUNDER_CALIBRATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log format: json or text
    #[arg(long, default_value = "json")]
    log_format: String,
}

fn init_tracing(log_level: &str, log_format: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true);

    if log_format.eq_ignore_ascii_case("text") {
        tracing::subscriber::set_global_default(builder.finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ThunderConfig::from_yaml(path)?,
        None => ThunderConfig::default(),
    };
    config.apply_env()?;

    let cycle = Cycle::parse(args.date.trim(), args.run.trim()).context("Invalid cycle")?;
    info!(
        cycle = %cycle,
        job = args.job,
        hiresw_core = %config.hiresw_core,
        output = %config.product_dir().display(),
        "Loaded configuration"
    );

    let pipeline = ThunderPipeline::new(config, cycle, args.job, Grib2Codec::new())?;
    let summary = pipeline.run().await?;
    info!(
        written = summary.written.len(),
        skipped = ?summary.skipped,
        "Job finished"
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    if let Err(e) = init_tracing(&args.log_level, &args.log_format) {
        eprintln!("Failed to initialise logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Thunder calibration failed");
            ExitCode::FAILURE
        }
    }
}
