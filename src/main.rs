mod catalog_store;
mod cli;
mod commands;
mod handlers;
mod manifest;
mod paths;
mod progress;
mod runner;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use converge::Direction;
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub manifest: Option<PathBuf>,
    pub catalog: Option<PathBuf>,
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
        manifest: cli.manifest,
        catalog: cli.catalog,
    };

    match cli.command {
        Command::Apply => commands::run::run(&ctx, Direction::Forward, true),
        Command::Destroy(args) => commands::run::run(&ctx, Direction::Reverse, args.yes),
        Command::Plan(args) => commands::plan::run(&ctx, args.json),
        Command::Check => commands::check::run(&ctx),
        Command::Catalog(args) => commands::catalog::run(&ctx, args.bucket.as_deref(), args.json),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "keel", &mut io::stdout());
            Ok(())
        }
    }
}
