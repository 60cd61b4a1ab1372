// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result as AnyResult};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::error::Result;

static APP: Lazy<(&str, &str, &str)> = Lazy::new(|| ("com.alphavelocity", "Finbot", "finbot"));

pub fn default_db_path() -> AnyResult<PathBuf> {
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("finbot.sqlite"))
}

/// Shared handle to the database. One connection, serialized behind a mutex;
/// every call through [`Storage::write`] or [`Storage::read`] is one unit of
/// work that commits on success and rolls back on any error.
pub struct Storage {
    conn: Mutex<Connection>,
    retry: RetryPolicy,
}

impl Storage {
    pub fn open(path: &Path, retry: RetryPolicy) -> AnyResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Create data dir {}", parent.display()))?;
        }
        let conn =
            Connection::open(path).with_context(|| format!("Open DB at {}", path.display()))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::from_connection(conn, retry)
    }

    pub fn open_in_memory() -> AnyResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, RetryPolicy::default())
    }

    fn from_connection(mut conn: Connection, retry: RetryPolicy) -> AnyResult<Self> {
        init_schema(&mut conn).context("Initialize schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
            retry,
        })
    }

    /// Run `op` inside a transaction. Busy/locked failures restart the whole
    /// unit of work after a backoff.
    pub fn write<T, F>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(&rusqlite::Transaction<'_>) -> Result<T>,
    {
        self.with_retry(|| {
            let mut conn = self.lock();
            let tx = conn.transaction()?;
            let out = op(&tx)?;
            tx.commit()?;
            Ok(out)
        })
    }

    pub fn read<T, F>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(&Connection) -> Result<T>,
    {
        self.with_retry(|| {
            let conn = self.lock();
            op(&conn)
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A unit of work that panicked dropped its transaction, which rolled back.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_retry<T>(&self, mut attempt_once: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempt = 0;
        loop {
            match attempt_once() {
                Err(e) if e.is_transient() && attempt + 1 < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "database busy, retrying"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    debug!(attempts = attempt + 1, "giving up on busy database");
                    return Err(e);
                }
                other => return other,
            }
        }
    }
}

fn init_schema(conn: &mut Connection) -> AnyResult<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS users(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        external_id INTEGER NOT NULL UNIQUE,
        username TEXT,
        first_name TEXT,
        last_name TEXT,
        investor_profile TEXT NOT NULL DEFAULT 'moderate',
        monthly_income TEXT,
        savings_goal TEXT,
        timezone TEXT NOT NULL,
        notifications_enabled INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS categories(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        name_key TEXT NOT NULL,
        type TEXT NOT NULL CHECK(type IN ('income','expense')),
        icon TEXT,
        description TEXT,
        is_active INTEGER NOT NULL DEFAULT 1,
        is_system INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_categories_user_type_name
        ON categories(user_id, type, name_key);

    CREATE TABLE IF NOT EXISTS transactions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        category_id INTEGER NOT NULL,
        amount TEXT NOT NULL,
        type TEXT NOT NULL CHECK(type IN ('income','expense')),
        description TEXT NOT NULL,
        payment_method TEXT NOT NULL,
        date TEXT NOT NULL,
        notes TEXT,
        tags TEXT,
        is_recurring INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
        FOREIGN KEY(category_id) REFERENCES categories(id)
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions(user_id, date);
    CREATE INDEX IF NOT EXISTS idx_transactions_user_type ON transactions(user_id, type);

    CREATE TABLE IF NOT EXISTS investments(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        ticker TEXT NOT NULL,
        type TEXT NOT NULL,
        quantity TEXT NOT NULL, -- cumulative bought
        avg_price TEXT NOT NULL,
        purchase_date TEXT NOT NULL,
        broker TEXT,
        notes TEXT,
        is_active INTEGER NOT NULL DEFAULT 1,
        sale_quantity TEXT, -- cumulative sold
        sale_price TEXT,
        sale_date TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_investments_user_active ON investments(user_id, is_active);
    CREATE INDEX IF NOT EXISTS idx_investments_user_ticker ON investments(user_id, ticker);

    CREATE TABLE IF NOT EXISTS alerts(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        type TEXT NOT NULL,
        title TEXT NOT NULL,
        message TEXT NOT NULL,
        scheduled_for TEXT NOT NULL,
        is_sent INTEGER NOT NULL DEFAULT 0,
        sent_at TEXT,
        priority INTEGER NOT NULL DEFAULT 0 CHECK(priority BETWEEN 0 AND 10),
        metadata TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_alerts_user_schedule
        ON alerts(user_id, scheduled_for, is_sent);
    "#,
    )?;
    Ok(())
}

/// Decimal columns are TEXT so no precision is lost.
pub(crate) fn decimal_at(r: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = r.get(idx)?;
    Decimal::from_str_exact(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn opt_decimal_at(r: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = r.get(idx)?;
    raw.map(|s| {
        Decimal::from_str_exact(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use std::cell::Cell;

    fn busy() -> ServiceError {
        ServiceError::from(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        ))
    }

    fn fast_storage(max_attempts: u32) -> Storage {
        let conn = Connection::open_in_memory().unwrap();
        Storage::from_connection(
            conn,
            RetryPolicy {
                max_attempts,
                initial_delay: Duration::from_millis(1),
            },
        )
        .unwrap()
    }

    #[test]
    fn transient_errors_are_retried() {
        let storage = fast_storage(5);
        let calls = Cell::new(0);
        let out = storage
            .read(|_| {
                calls.set(calls.get() + 1);
                if calls.get() < 3 { Err(busy()) } else { Ok(7) }
            })
            .unwrap();
        assert_eq!(out, 7);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn retries_stop_at_the_limit() {
        let storage = fast_storage(2);
        let calls = Cell::new(0);
        let err = storage
            .read(|_| -> Result<()> {
                calls.set(calls.get() + 1);
                Err(busy())
            })
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn failed_write_rolls_back() {
        let storage = fast_storage(1);
        let err = storage.write(|tx| -> Result<()> {
            tx.execute(
                "INSERT INTO users(external_id, timezone) VALUES (1, 'America/Sao_Paulo')",
                [],
            )?;
            Err(ServiceError::invariant("boom"))
        });
        assert!(err.is_err());
        let n: i64 = storage
            .read(|c| Ok(c.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn file_database_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bot.sqlite");
        Storage::open(&path, RetryPolicy::default()).unwrap();
        assert!(path.exists());
    }
}
