// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use finbot::bot::Bot;
use finbot::config::Settings;
use finbot::db::{self, Storage};
use finbot::{cli, commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,finbot=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::build_cli();
    let matches = cli.get_matches();

    let settings = Settings::from_env()?;
    let path = match matches
        .get_one::<PathBuf>("db")
        .cloned()
        .or_else(|| settings.database_path.clone())
    {
        Some(p) => p,
        None => db::default_db_path()?,
    };
    let storage = Storage::open(&path, settings.retry)?;

    match matches.subcommand() {
        Some(("init", _)) => {
            println!("Database initialized at {}", path.display());
        }
        Some(("chat", sub)) => commands::chat::handle(&Bot::new(storage, settings), sub)?,
        Some(("telegram", _)) => commands::telegram::handle(&Bot::new(storage, settings))?,
        Some(("report", sub)) => commands::reports::handle(&storage, &settings, sub)?,
        Some(("export", sub)) => commands::exporter::handle(&storage, &settings, sub)?,
        Some(("alerts", sub)) => commands::alerts::handle(&storage, sub)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
