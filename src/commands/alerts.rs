// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use chrono::Utc;

use crate::db::Storage;
use crate::models::AlertType;
use crate::services::alerts::{self, DEFAULT_BATCH, NewAlert};
use crate::utils::{maybe_print_json, parse_timestamp, pretty_table, require_user};

pub fn handle(storage: &Storage, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("pending", sub)) => pending(storage, sub),
        Some(("add", sub)) => add(storage, sub),
        _ => Ok(()),
    }
}

fn pending(storage: &Storage, sub: &clap::ArgMatches) -> Result<()> {
    let due = alerts::pending_alerts(storage, Utc::now(), DEFAULT_BATCH)?;
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &due)? {
        return Ok(());
    }
    if due.is_empty() {
        println!("No pending alerts");
        return Ok(());
    }
    let rows = due
        .iter()
        .map(|p| {
            vec![
                p.alert.id.to_string(),
                p.recipient.to_string(),
                p.alert.kind.to_string(),
                p.alert.priority.to_string(),
                p.alert.scheduled_for.to_rfc3339(),
                p.alert.title.clone(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["ID", "Chat", "Type", "Priority", "Scheduled", "Title"], rows)
    );
    Ok(())
}

fn add(storage: &Storage, sub: &clap::ArgMatches) -> Result<()> {
    let external_id = *sub.get_one::<i64>("user").context("--user is required")?;
    let user = require_user(storage, external_id)?;
    let now = Utc::now();
    let kind: AlertType = sub
        .get_one::<String>("type")
        .map(String::as_str)
        .unwrap_or("reminder")
        .parse()?;
    let scheduled_for = match sub.get_one::<String>("at") {
        Some(at) => parse_timestamp(at)?,
        None => now,
    };
    let new = NewAlert {
        kind,
        title: sub.get_one::<String>("title").cloned().unwrap_or_default(),
        message: sub.get_one::<String>("message").cloned().unwrap_or_default(),
        scheduled_for,
        priority: sub.get_one::<u8>("priority").copied().unwrap_or(0),
        metadata: None,
    };
    let alert = alerts::create_alert(storage, user.id, &new, now)?;
    println!(
        "Alert {} scheduled for {}",
        alert.id,
        alert.scheduled_for.to_rfc3339()
    );
    Ok(())
}
