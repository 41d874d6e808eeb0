mod cli;
mod commands;
mod config;
mod paths;
mod progress;
mod ui;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use colored::Colorize;
use std::io;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context { quiet: cli.quiet };

    match run(&ctx, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn run(ctx: &Context, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Apply(args) => commands::apply::apply(ctx, args),
        Command::Test(args) => commands::apply::test(ctx, args),
        Command::Get(args) => commands::apply::get(ctx, args),
        Command::Validate(args) => commands::validate::run(ctx, args),
        Command::Doctor => commands::doctor::run(ctx),
        Command::Config { command } => commands::config::run(ctx, command),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "dscrun", &mut io::stdout());
            Ok(())
        }
    }
}

fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<dsckit::Error>() {
        Some(dsc) => {
            let category = dsc.category();
            ui::error(&format!("{}: {err:#}", category.description()));
            eprintln!("  {}", category.advice().dimmed());
        }
        None => ui::error(&format!("{err:#}")),
    }
}

/// Process exit code for an error, by library error category.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<dsckit::Error>()
        .map_or(1, dsckit::Error::exit_code)
}
