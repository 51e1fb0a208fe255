use anyhow::Result;
use env_logger::Env;
use std::env;
use std::path::PathBuf;

use orderbatch::jobs::augmenter::Augmenter;
use orderbatch::jobs::converter::Converter;
use orderbatch::jobs::{self, display_name, BatchReport, FileJob, Job};

const EXPORT_DIR: &str = "Orders General Export";
const CSV_DIR: &str = "Orders General Export/CSV_Files";
const ENHANCED_DIR: &str = "Orders General Export/Enhanced_CSV_Files";

const USAGE: &str = "Usage: orderbatch <convert|augment> [source_dir] [output_dir]";

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args.len() > 4 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let source = args.get(2).map(PathBuf::from);
    let output = args.get(3).map(PathBuf::from);

    let job: Job = match args[1].as_str() {
        "convert" => Converter::new(
            source.unwrap_or_else(|| PathBuf::from(EXPORT_DIR)),
            Some(output.unwrap_or_else(|| PathBuf::from(CSV_DIR))),
        )
        .into(),
        "augment" => Augmenter::new(
            source.unwrap_or_else(|| PathBuf::from(CSV_DIR)),
            output.unwrap_or_else(|| PathBuf::from(ENHANCED_DIR)),
        )
        .into(),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(1);
        },
    };

    println!("Source directory: {}", job.source_dir().display());
    println!("Output directory: {}", job.output_dir().display());

    let report = jobs::run_batch(&job)?;
    print_summary(&job, &report);

    Ok(())
}

fn print_summary(job: &Job, report: &BatchReport) {
    println!("{}", "-".repeat(60));
    println!("{} complete", job.name());
    println!("Succeeded: {} files", report.success_count());
    println!("Failed: {} files", report.failure_count());

    for path in report.failed() {
        println!("  - {}", display_name(path));
    }

    if report.success_count() > 0 {
        println!("Output saved to: {}", job.output_dir().display());
    }
}
