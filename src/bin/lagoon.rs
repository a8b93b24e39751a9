//! Lagoon CLI Binary

use clap::Parser;
use lagoon::logging::init_logging;
use lagoon::tooling::cli::{Cli, CliContext};
use owo_colors::OwoColorize;
use std::process;

fn main() {
    let cli = Cli::parse();

    let context = match CliContext::new(
        cli.dir.clone(),
        cli.config.clone(),
        cli.datasource.clone(),
        cli.api_root.clone(),
    ) {
        Ok(ctx) => ctx,
        Err(e) => fail("Error loading configuration", &e),
    };

    let logging = cli.logging_overrides(&context.config().logging);
    if let Err(e) = init_logging(Some(&logging)) {
        fail("Error initializing logging", &e);
    }

    match context.execute(&cli.command) {
        Ok(output) => println!("{}", output),
        Err(e) => fail("Error", &e),
    }
}

fn fail(label: &str, err: &dyn std::fmt::Display) -> ! {
    eprintln!("{} {}", format!("{}:", label).red().bold(), err);
    process::exit(1);
}
