// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;

use crate::config::Settings;
use crate::db::Storage;
use crate::services::export::{self, ExportFormat};
use crate::services::users;
use crate::utils::require_user;

pub fn handle(storage: &Storage, settings: &Settings, sub: &clap::ArgMatches) -> Result<()> {
    let external_id = *sub.get_one::<i64>("user").context("--user is required")?;
    let format: ExportFormat = sub
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("csv")
        .parse()?;
    let user = require_user(storage, external_id)?;
    let today = Utc::now()
        .with_timezone(&users::timezone_of(&user, settings))
        .date_naive();

    let file = export::export_user_data(storage, user.id, format, today)?;
    let out = match sub.get_one::<PathBuf>("out") {
        Some(p) if p.is_dir() => p.join(&file.filename),
        Some(p) => p.clone(),
        None => PathBuf::from(&file.filename),
    };
    std::fs::write(&out, &file.bytes).with_context(|| format!("Write {}", out.display()))?;
    println!("Exported {} records to {}", file.rows, out.display());
    Ok(())
}
