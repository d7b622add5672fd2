use clap::Parser;
use std::process::ExitCode;
use tvsort::cli::{Cli, run_cli};
use tvsort::output::OutputFormatter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = tvsort::logging::init(cli.verbose) {
        eprintln!("Warning: {e}");
    }

    match run_cli(&cli) {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            OutputFormatter::error(&format!("Error: {e:#}"));
            ExitCode::FAILURE
        }
    }
}
