// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDateTime;
use chrono_tz::Tz;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::config::Settings;
use crate::db::Storage;
use crate::error::{Result, ServiceError};
use crate::models::{InvestorProfile, User};
use crate::services::categories;

/// Who is talking, as reported by the chat platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub external_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl Identity {
    pub fn new(external_id: i64) -> Self {
        Self {
            external_id,
            ..Self::default()
        }
    }
}

/// Fields left `None` are not touched. For income and goal, `Some(None)` clears.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub investor_profile: Option<InvestorProfile>,
    pub monthly_income: Option<Option<Decimal>>,
    pub savings_goal: Option<Option<Decimal>>,
    pub timezone: Option<String>,
    pub notifications_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub transactions: i64,
    pub active_investments: i64,
    pub custom_categories: i64,
    pub pending_alerts: i64,
    pub member_since: NaiveDateTime,
}

fn by_external_id(conn: &Connection, external_id: i64) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM users WHERE external_id=?1", User::COLUMNS),
            params![external_id],
            User::from_row,
        )
        .optional()?)
}

fn by_id(conn: &Connection, id: i64) -> Result<User> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id=?1", User::COLUMNS),
        params![id],
        User::from_row,
    )
    .optional()?
    .ok_or(ServiceError::NotFound("user"))
}

/// Look the user up by chat identity, creating it (with the default
/// categories) on first contact. Changed chat names are refreshed.
pub fn get_or_create_user(storage: &Storage, settings: &Settings, who: &Identity) -> Result<User> {
    let (user, created) = storage.write(|tx| {
        if let Some(existing) = by_external_id(tx, who.external_id)? {
            let stale = existing.username != who.username
                || existing.first_name != who.first_name
                || existing.last_name != who.last_name;
            if !stale {
                return Ok((existing, false));
            }
            tx.execute(
                "UPDATE users SET username=?1, first_name=?2, last_name=?3,
                 updated_at=datetime('now') WHERE id=?4",
                params![who.username, who.first_name, who.last_name, existing.id],
            )?;
            return Ok((by_id(tx, existing.id)?, false));
        }

        tx.execute(
            "INSERT INTO users(external_id, username, first_name, last_name, timezone)
             VALUES (?1,?2,?3,?4,?5)",
            params![
                who.external_id,
                who.username,
                who.first_name,
                who.last_name,
                settings.default_timezone.name()
            ],
        )?;
        let id = tx.last_insert_rowid();
        categories::seed_defaults(tx, id)?;
        Ok((by_id(tx, id)?, true))
    })?;
    if created {
        info!(user_id = user.id, external_id = user.external_id, "user created");
    }
    Ok(user)
}

/// Lookup without side effects, for tooling outside a conversation.
pub fn find_by_external_id(storage: &Storage, external_id: i64) -> Result<Option<User>> {
    storage.read(|conn| by_external_id(conn, external_id))
}

pub fn get_user(storage: &Storage, user_id: i64) -> Result<User> {
    storage.read(|conn| by_id(conn, user_id))
}

pub fn update_profile(storage: &Storage, user_id: i64, update: &ProfileUpdate) -> Result<User> {
    for amount in [&update.monthly_income, &update.savings_goal]
        .into_iter()
        .flatten()
        .flatten()
    {
        if amount.is_sign_negative() {
            return Err(ServiceError::validation("O valor não pode ser negativo"));
        }
    }
    if let Some(tz) = &update.timezone {
        tz.parse::<Tz>()
            .map_err(|_| ServiceError::validation(format!("Fuso horário desconhecido: {}", tz)))?;
    }

    let user = storage.write(|tx| {
        let mut user = by_id(tx, user_id)?;
        if let Some(p) = update.investor_profile {
            user.investor_profile = p;
        }
        if let Some(income) = update.monthly_income {
            user.monthly_income = income;
        }
        if let Some(goal) = update.savings_goal {
            user.savings_goal = goal;
        }
        if let Some(tz) = &update.timezone {
            user.timezone = tz.clone();
        }
        if let Some(on) = update.notifications_enabled {
            user.notifications_enabled = on;
        }
        tx.execute(
            "UPDATE users SET investor_profile=?1, monthly_income=?2, savings_goal=?3,
             timezone=?4, notifications_enabled=?5, updated_at=datetime('now') WHERE id=?6",
            params![
                user.investor_profile,
                user.monthly_income.map(|d| d.to_string()),
                user.savings_goal.map(|d| d.to_string()),
                user.timezone,
                user.notifications_enabled,
                user_id
            ],
        )?;
        by_id(tx, user_id)
    })?;
    info!(user_id, "profile updated");
    Ok(user)
}

pub fn user_stats(storage: &Storage, user_id: i64) -> Result<UserStats> {
    storage.read(|conn| {
        let user = by_id(conn, user_id)?;
        let count = |sql: &str| -> rusqlite::Result<i64> {
            conn.query_row(sql, params![user_id], |r| r.get(0))
        };
        Ok(UserStats {
            transactions: count("SELECT COUNT(*) FROM transactions WHERE user_id=?1")?,
            active_investments: count(
                "SELECT COUNT(*) FROM investments WHERE user_id=?1 AND is_active=1",
            )?,
            custom_categories: count(
                "SELECT COUNT(*) FROM categories WHERE user_id=?1 AND is_system=0 AND is_active=1",
            )?,
            pending_alerts: count("SELECT COUNT(*) FROM alerts WHERE user_id=?1 AND is_sent=0")?,
            member_since: user.created_at,
        })
    })
}

/// The user's own timezone, falling back to the configured default.
pub fn timezone_of(user: &User, settings: &Settings) -> Tz {
    user.timezone.parse().unwrap_or(settings.default_timezone)
}
