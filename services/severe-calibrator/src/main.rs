//! Severe calibrator entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use aggregation::SevereJob;
use anyhow::{Context, Result};
use calib_common::Cycle;
use clap::Parser;
use grib2_codec::Grib2Codec;
use severe_calibrator::{SevereConfig, SeverePipeline};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "severe-calibrator")]
#[command(about = "Calibrated HREF/SREF tornado, hail and wind probabilities")]
struct Args {
    /// Cycle date (YYYYMMDD)
    #[arg(short, long, env = "PDY")]
    date: String,

    /// Cycle hour: 00, 03, 12 or 15
    #[arg(short, long, env = "cyc")]
    run: String,

    /// HREF forecast hour ending the 4-hour window, or "full"
    job: SevereJob,

    /// Cap calibrated probabilities (60% tornado and hail, 75% wind)
    #[arg(short, long)]
    cap: bool,

    /// Configuration file path
    #[arg(long, env = "SEVERE_CALIBRATOR_CONFIG")]
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
        Some(path) => SevereConfig::from_yaml(path)?,
        None => SevereConfig::default(),
    };
    config.apply_env()?;
    if args.cap {
        config.capped = true;
    }

    let cycle = Cycle::parse(args.date.trim(), args.run.trim()).context("Invalid cycle")?;
    info!(
        cycle = %cycle,
        job = %args.job,
        capped = config.capped,
        hiresw_core = %config.hiresw_core,
        "Loaded configuration"
    );

    let pipeline = SeverePipeline::new(config, cycle, args.job, Grib2Codec::new())?;
    let summary = pipeline.run().await?;
    info!(
        products = summary.products.len(),
        from_cache = summary.from_cache,
        hours = summary.hours,
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
            error!(error = %format!("{e:#}"), "Severe calibration failed");
            ExitCode::FAILURE
        }
    }
}
