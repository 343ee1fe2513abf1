use std::process::ExitCode;

use clap::Parser;
use repbatch_cli::{init_tracing, run, Cli};
use repbatch_configuration::environment::ProcessEnvironment;

#[tokio::main]
pub async fn main() -> ExitCode {
    init_tracing();
    let result = run(Cli::parse(), ProcessEnvironment, &mut std::io::stdout()).await;
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error:#}");
            ExitCode::FAILURE
        }
    }
}
