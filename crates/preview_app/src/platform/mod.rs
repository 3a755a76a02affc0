mod app;
mod args;
mod config;
mod effects;
mod report;

use std::process::ExitCode;

use anyhow::Context;
use log::LevelFilter;
use preview_logging::{preview_error, preview_info};

use app::Session;
use args::{parse_args, CliArgs, Command, USAGE};
use effects::EffectRunner;

const EXIT_FAILURE: u8 = 1;
const EXIT_USAGE: u8 = 2;

pub fn run_app() -> ExitCode {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("Error: {err}\n");
            eprintln!("{USAGE}");
            return ExitCode::from(EXIT_USAGE);
        }
    };
    if args.command == Command::Help {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    match run_command(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_FAILURE),
        Err(err) => {
            preview_error!("{:#}", err);
            eprintln!("Failed: {err:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// Runs one command and prints its report. Returns whether it succeeded.
fn run_command(args: &CliArgs) -> anyhow::Result<bool> {
    let config = config::load_config(args.config.as_deref())?;
    preview_logging::initialize(config.log_destination()?, LevelFilter::Info);
    preview_info!("label-preview {} starting", args.command.name());

    let runner =
        EffectRunner::new(config.engine_config()).context("failed to start preview engine")?;
    let mut session = Session::new(runner, config.sample_url.clone(), config.session_timeout());
    let outcome = session.run(&args.command);
    session.close();
    let report = outcome?;

    if args.json {
        println!("{}", report.to_json().context("failed to encode report")?);
    } else {
        print!("{}", report.to_text());
    }
    Ok(report.is_success())
}
