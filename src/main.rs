use clap::Parser;
use std::process::ExitCode;
use xlsx_enrich::{cli::Cli, logging, pipeline};

fn main() -> ExitCode {
    // a missing .env is fine
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.into_config().and_then(|config| pipeline::run(&config)) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
