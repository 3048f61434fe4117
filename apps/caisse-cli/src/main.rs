//! # caisse
//!
//! Entry point. The actual work lives in the library half for testability.

use std::process::ExitCode;

use clap::Parser;

use caisse_cli::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    caisse_cli::init_tracing();

    match caisse_cli::run(cli).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                println!("{}", text);
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("{}", caisse_cli::error::CliError::from(err).to_json());
                ExitCode::from(10)
            }
        },
        Err(err) => {
            eprintln!("{}", err.to_json());
            ExitCode::from(err.exit_code())
        }
    }
}
