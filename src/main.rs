use std::process::ExitCode;

use clap::Parser;

use pixelreel::cli::{self, CliArgs};
use pixelreel::logger;
use pixelreel::settings::EngineSettings;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    logger::init(None, args.verbose);

    let settings_path = args.config.clone().unwrap_or_else(EngineSettings::default_path);
    let settings = EngineSettings::load(&settings_path);

    cli::run(&args, &settings)
}
