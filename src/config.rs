// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Runtime settings loaded from environment variables.
//!
//! Every value has a default so the bot starts with nothing but a token.
//! Values are checked once in [`Settings::from_env`]; all problems are
//! reported together and the settings are immutable afterwards.

use anyhow::{Result, anyhow};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::validation::AmountLimits;

/// Backoff schedule for busy/locked database errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based), doubling each time.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }
}

/// Points awarded by the health score.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthWeights {
    pub base: i32,
    /// (minimum savings rate in percent, points), highest tier first.
    pub savings_tiers: Vec<(Decimal, i32)>,
    pub negative_savings_penalty: i32,
    pub consistency_points: i32,
    pub stability_points: i32,
    /// Calendar months looked at, counting the current one.
    pub months: u32,
}

impl Default for HealthWeights {
    fn default() -> Self {
        Self {
            base: 50,
            savings_tiers: vec![
                (Decimal::from(30), 40),
                (Decimal::from(20), 30),
                (Decimal::from(10), 20),
                (Decimal::from(5), 10),
            ],
            negative_savings_penalty: 20,
            consistency_points: 20,
            stability_points: 10,
            months: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Env: `BOT_TOKEN`. Only the Telegram transport needs it.
    pub bot_token: Option<String>,
    /// Env: `FINBOT_DB`. `None` means the platform data dir.
    pub database_path: Option<PathBuf>,
    /// Env: `MIN_TRANSACTION_AMOUNT` / `MAX_TRANSACTION_AMOUNT`
    pub min_transaction_amount: Decimal,
    pub max_transaction_amount: Decimal,
    /// Env: `MAX_DESCRIPTION_LENGTH`
    pub max_description_length: usize,
    /// Env: `MAX_CATEGORIES_PER_USER`. Counts custom categories only.
    pub max_categories_per_user: usize,
    /// Env: `MAX_INVESTMENTS_PER_USER`. Counts active positions.
    pub max_investments_per_user: usize,
    /// Env: `MAX_TRANSACTIONS_PER_PAGE`, 1..=100
    pub transactions_per_page: usize,
    /// Env: `TIMEZONE`. Default for new users.
    pub default_timezone: Tz,
    /// Env: `SESSION_TIMEOUT_MINUTES`
    pub session_timeout: Duration,
    /// Env: `ALLOWED_USERS`, comma separated ids. Empty lets everyone in.
    pub allowed_users: Vec<i64>,
    /// Env: `POLL_TIMEOUT_SECS`
    pub poll_timeout: Duration,
    /// Env: `DB_MAX_RETRIES` / `DB_RETRY_DELAY_MS`
    pub retry: RetryPolicy,
    /// Env: `HEALTH_MONTHS`
    pub health: HealthWeights,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bot_token: None,
            database_path: None,
            min_transaction_amount: Decimal::new(1, 2),
            max_transaction_amount: Decimal::new(100_000_000, 2),
            max_description_length: 255,
            max_categories_per_user: 50,
            max_investments_per_user: 100,
            transactions_per_page: 20,
            default_timezone: chrono_tz::America::Sao_Paulo,
            session_timeout: Duration::from_secs(30 * 60),
            allowed_users: Vec::new(),
            poll_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            health: HealthWeights::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; used by tests with a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut s = Self::default();
        let mut problems: Vec<String> = Vec::new();

        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("BOT_TOKEN") {
            s.bot_token = Some(v);
        }
        if let Some(v) = get("FINBOT_DB") {
            s.database_path = Some(PathBuf::from(v));
        }

        parse_into(&get, "MIN_TRANSACTION_AMOUNT", &mut s.min_transaction_amount, &mut problems);
        parse_into(&get, "MAX_TRANSACTION_AMOUNT", &mut s.max_transaction_amount, &mut problems);
        parse_into(&get, "MAX_DESCRIPTION_LENGTH", &mut s.max_description_length, &mut problems);
        parse_into(&get, "MAX_CATEGORIES_PER_USER", &mut s.max_categories_per_user, &mut problems);
        parse_into(&get, "MAX_INVESTMENTS_PER_USER", &mut s.max_investments_per_user, &mut problems);
        parse_into(&get, "MAX_TRANSACTIONS_PER_PAGE", &mut s.transactions_per_page, &mut problems);
        parse_into(&get, "TIMEZONE", &mut s.default_timezone, &mut problems);
        parse_into(&get, "DB_MAX_RETRIES", &mut s.retry.max_attempts, &mut problems);
        parse_into(&get, "HEALTH_MONTHS", &mut s.health.months, &mut problems);

        let mut minutes = s.session_timeout.as_secs() / 60;
        parse_into(&get, "SESSION_TIMEOUT_MINUTES", &mut minutes, &mut problems);
        s.session_timeout = Duration::from_secs(minutes * 60);

        let mut poll = s.poll_timeout.as_secs();
        parse_into(&get, "POLL_TIMEOUT_SECS", &mut poll, &mut problems);
        s.poll_timeout = Duration::from_secs(poll);

        let mut delay_ms = s.retry.initial_delay.as_millis() as u64;
        parse_into(&get, "DB_RETRY_DELAY_MS", &mut delay_ms, &mut problems);
        s.retry.initial_delay = Duration::from_millis(delay_ms);

        if let Some(raw) = get("ALLOWED_USERS") {
            for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                match part.parse::<i64>() {
                    Ok(id) => s.allowed_users.push(id),
                    Err(_) => problems.push(format!("ALLOWED_USERS: '{}' is not a user id", part)),
                }
            }
        }

        problems.extend(s.validate());
        if problems.is_empty() {
            Ok(s)
        } else {
            Err(anyhow!("invalid configuration:\n  - {}", problems.join("\n  - ")))
        }
    }

    /// Every rule broken by the current values.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.min_transaction_amount <= Decimal::ZERO {
            errors.push("MIN_TRANSACTION_AMOUNT must be positive".to_string());
        }
        if self.max_transaction_amount <= self.min_transaction_amount {
            errors.push(
                "MAX_TRANSACTION_AMOUNT must be greater than MIN_TRANSACTION_AMOUNT".to_string(),
            );
        }
        if self.max_description_length == 0 {
            errors.push("MAX_DESCRIPTION_LENGTH must be positive".to_string());
        }
        if self.max_categories_per_user == 0 {
            errors.push("MAX_CATEGORIES_PER_USER must be positive".to_string());
        }
        if self.max_investments_per_user == 0 {
            errors.push("MAX_INVESTMENTS_PER_USER must be positive".to_string());
        }
        if !(1..=100).contains(&self.transactions_per_page) {
            errors.push("MAX_TRANSACTIONS_PER_PAGE must be between 1 and 100".to_string());
        }
        if self.session_timeout.is_zero() {
            errors.push("SESSION_TIMEOUT_MINUTES must be positive".to_string());
        }
        if self.retry.max_attempts == 0 {
            errors.push("DB_MAX_RETRIES must be at least 1".to_string());
        }
        if self.health.months == 0 || self.health.months > 24 {
            errors.push("HEALTH_MONTHS must be between 1 and 24".to_string());
        }
        errors
    }

    pub fn amount_limits(&self) -> AmountLimits {
        AmountLimits {
            min: self.min_transaction_amount,
            max: self.max_transaction_amount,
        }
    }

    pub fn is_allowed(&self, user_id: i64) -> bool {
        self.allowed_users.is_empty() || self.allowed_users.contains(&user_id)
    }
}

fn parse_into<T, G>(get: &G, key: &str, slot: &mut T, problems: &mut Vec<String>)
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(key) {
        match raw.parse::<T>() {
            Ok(v) => *slot = v,
            Err(_) => problems.push(format!("{}: cannot parse '{}'", key, raw)),
        }
    }
}
