use std::process::ExitCode;

use clap::Parser;
use log::error;
use metal_depend::config::{Args, Config};
use metal_depend::{generate, logging};

fn main() -> ExitCode {
    let config = Config::from(Args::parse());
    if let Err(err) = logging::init(config.log_level) {
        eprintln!("could not start logging: {err}");
        return ExitCode::FAILURE;
    }
    match generate::run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
