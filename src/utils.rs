// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use comfy_table::{Cell, Table, presets::UTF8_FULL};

use crate::db::Storage;
use crate::models::User;
use crate::services::users;

/// `YYYY-MM` into year and month.
pub fn parse_month(s: &str) -> Result<(i32, u32)> {
    let d = NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d")
        .with_context(|| format!("Invalid month '{}', expected YYYY-MM", s))?;
    Ok((d.year(), d.month()))
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|d| d.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp '{}', expected RFC 3339", s))
}

pub fn require_user(storage: &Storage, external_id: i64) -> Result<User> {
    users::find_by_external_id(storage, external_id)?
        .ok_or_else(|| anyhow!("User {} not found; start a chat with the bot first", external_id))
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn months_and_timestamps() {
        assert_eq!(parse_month("2025-06").unwrap(), (2025, 6));
        assert!(parse_month("2025-13").is_err());
        assert!(parse_month("junho").is_err());
        let ts = parse_timestamp("2025-06-15T09:00:00-03:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-06-15T12:00:00+00:00");
    }

    #[test]
    fn unknown_user_is_an_error() {
        let storage = Storage::open_in_memory().unwrap();
        let err = require_user(&storage, 42).unwrap_err();
        assert!(err.to_string().contains("User 42 not found"));
    }
}
