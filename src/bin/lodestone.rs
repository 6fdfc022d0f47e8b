//! Lodestone CLI Binary
//!
//! Command-line interface for the lodestone directory client.

use clap::Parser;
use lodestone::cli::{Cli, CliContext};
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let context = match CliContext::new(&cli).await {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error initializing client: {:#}", e);
            process::exit(1);
        }
    };

    match context.execute(&cli.command).await {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
