//! Grabador CLI: recorded browser sessions into maintainable tests
//!
//! ## Usage
//!
//! ```bash
//! grabador generate session.json --name "Create Customer"
//! grabador params tests/generated/create_customer.rs --apply
//! grabador run create_customer
//! grabador library --compact
//! ```

use clap::Parser;
use grabador::{
    handlers::{run_clean, run_generate, run_library, run_params, run_run},
    Cli, CliConfig, CliResult, ColorArg, ColorChoice, Commands, Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    grabador::init_tracing(config.verbosity);

    match &cli.command {
        Commands::Clean(args) => run_clean(&config, args),
        Commands::Generate(args) => run_generate(&config, args),
        Commands::Params(args) => run_params(&config, args),
        Commands::Run(args) => run_run(&config, args),
        Commands::Library(args) => run_library(&config, args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else {
        match cli.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    };
    let color = match cli.color {
        ColorArg::Auto => ColorChoice::Auto,
        ColorArg::Always => ColorChoice::Always,
        ColorArg::Never => ColorChoice::Never,
    };
    CliConfig { verbosity, color }
}
