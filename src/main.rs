mod cli;
mod commands;
mod engine;
mod paths;
mod progress;
mod provider;
mod schema;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, StateCommand};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: Option<PathBuf>,
}

impl Context {
    /// Config file from `--config`, or the default location
    pub fn config_file(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => paths::config_file(),
        }
    }
}

fn main() -> Result<()> {
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

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
    };

    match cli.command {
        Command::Plan(args) => commands::plan::run(&ctx, args.target.as_deref()),
        Command::Apply(args) => commands::apply::run(
            &ctx,
            args.target.as_deref(),
            args.dry_run,
            args.yes,
            args.jobs as usize,
        ),
        Command::State(cmd) => match cmd {
            StateCommand::List => commands::state::list(&ctx),
            StateCommand::Show { name } => commands::state::show(&ctx, &name),
            StateCommand::Rm { name } => commands::state::rm(&ctx, &name),
        },
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "attune", &mut io::stdout());
            Ok(())
        }
    }
}
