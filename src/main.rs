use std::{io, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::debug;

mod api;
mod config;
mod console;
mod datetime;
mod day_command;
mod db_command;
mod db_items;
mod draft;
mod editor;
mod field;
mod logger;
mod notice;
mod preset;
mod session;
mod suggestion;
mod time_entry;
mod time_slot;

use api::HttpRepository;
use config::Config;
use console::ConsoleMarkdownList;
use day_command::{DayArgs, DayCommand};
use db_command::{DbArgs, DbCommand};
use draft::DraftStore;

/// 30分単位のタイムスライスを記録するためのCLIアプリケーション。
///
/// # Examples
/// ```
/// $ cargo run -- day show
/// $ cargo run -- day -d 2025-04-08 edit 1 content 会議
/// $ cargo run -- db list
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(
        short = 'v',
        long = "verbose",
        parse(from_occurrences),
        help = "Increases log verbosity (-v info, -vv debug, -vvv trace)"
    )]
    verbose: u64,

    #[clap(long = "config", help = "Reads the config from the given JSON file")]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    subcommand: SubCommands,
}

/// サブコマンドを表す列挙型。
#[derive(Debug, Subcommand)]
enum SubCommands {
    Day(DayArgs),
    Db(DbArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logger::init(args.verbose)?;

    let config = Config::load(args.config.as_deref()).context("Failed to load config")?;
    debug!("Config: {:?}", config);
    let repository = HttpRepository::new(&config.api_url, config.request_timeout_secs)?;

    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut presenter = ConsoleMarkdownList::new(&mut writer);

    match args.subcommand {
        SubCommands::Day(day) => {
            let drafts = DraftStore::new(DraftStore::default_dir()?);
            debug!("Drafts: {}", drafts.dir().display());
            let command = DayCommand::new(&repository, &drafts, &config);
            command.run(day, &mut presenter).await?;
        }
        SubCommands::Db(db) => {
            let command = DbCommand::new(&repository, &config);
            command.run(db, &mut presenter).await?;
        }
    }

    Ok(())
}
