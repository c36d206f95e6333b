//! Batch entry point.
//!
//! # Responsibility
//! - Load one JSON configuration and run the reconstruction it describes.
//! - Report the outcome on stdout/stderr with a meaningful exit code.

use clap::error::ErrorKind;
use clap::{Parser, ValueHint};
use hourgrid_core::{
    init_logging, load_config, run_from_config, PipelineError, RunReport, ServiceError,
};
use std::path::PathBuf;
use std::process::ExitCode;

const EXIT_USAGE: u8 = 64;
const EXIT_CONFIG: u8 = 78;
const EXIT_UNRESOLVED: u8 = 2;

#[derive(Parser, Debug)]
#[command(author, version, about = "Rebuild a gapless hourly grid from an irregular log", long_about = None)]
struct Args {
    /// JSON pipeline configuration
    #[arg(value_hint = ValueHint::FilePath)]
    config: PathBuf,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_USAGE),
            };
        }
    };

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("hourgrid: {err}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    if let Some(logging) = &config.logging {
        if let Err(err) = init_logging(&logging.level, &logging.dir) {
            eprintln!("hourgrid: {err}");
            return ExitCode::from(EXIT_CONFIG);
        }
    }

    match run_from_config(&config) {
        Ok(report) => {
            print_report(&report);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("hourgrid: {err}");
            exit_code_for(&err)
        }
    }
}

fn print_report(report: &RunReport) {
    println!("hourgrid version={}", hourgrid_core::core_version());
    println!(
        "slots={} raw_records={} exact_duplicates={} conflicting_records={} off_grid={}",
        report.slots,
        report.stats.raw_records,
        report.stats.exact_duplicates,
        report.stats.conflicting_records,
        report.stats.off_grid
    );
    println!(
        "observed={} short_horizon={} historical_year={} leap_day_fallback={}",
        report.summary.observed,
        report.summary.short_horizon,
        report.summary.historical_year,
        report.summary.leap_day_fallback
    );
    if let Some(run_id) = report.archived_run {
        println!("archived_run={run_id}");
    }
}

fn exit_code_for(err: &ServiceError) -> ExitCode {
    match err {
        ServiceError::Config(_) => ExitCode::from(EXIT_CONFIG),
        ServiceError::Pipeline(PipelineError::UnresolvableGaps(report)) => {
            for (field, count) in report.by_field() {
                eprintln!("  {field}: {count} unresolved");
            }
            ExitCode::from(EXIT_UNRESOLVED)
        }
        _ => ExitCode::FAILURE,
    }
}
