use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use dicom_smooth::module::{self, ModuleError};
use dicom_smooth::settings::Settings;
use dicom_smooth::uid::RandomUid;

/// Demo processing module: Gaussian-smooths every DICOM series in the
/// input directory and attaches a summary SR document per series.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Directory holding the incoming slices and the task.json descriptor
    input_dir: PathBuf,

    /// Directory that receives the smoothed slices and the reports
    output_dir: PathBuf,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    // The host scrapes the module's stdout into its job log.
    println!(
        "Hello, I am the {} module v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), ModuleError> {
    module::check_directories(&args.input_dir, &args.output_dir)?;

    let settings = Settings::load(&args.input_dir)?;
    println!("Filter strength: {}", settings.sigma);

    let summary = module::run(&args.input_dir, &args.output_dir, &settings, &RandomUid)?;
    log::info!(
        "processed {} series ({} slices, {} reports)",
        summary.series,
        summary.slices,
        summary.reports
    );
    Ok(())
}
