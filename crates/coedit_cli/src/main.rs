//! Coedit CLI entry point.
//!
//! Parses arguments, runs one command, and maps failures to exit codes.

mod cli;
mod commands;
mod exit_codes;

use cli::Cli;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    match commands::dispatch(cli) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(exit_codes::for_error(&err))
        }
    }
}
