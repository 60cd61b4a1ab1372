// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::config::Settings;
use crate::db::Storage;
use crate::error::{Result, ServiceError};
use crate::format::brl;
use crate::models::{Category, PaymentMethod, Transaction, TransactionType};
use crate::services::categories::{self, NewCategory};
use crate::validation::{InputError, sanitize};

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub category_id: i64,
    pub amount: Decimal,
    pub kind: TransactionType,
    pub description: String,
    pub payment_method: PaymentMethod,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub tags: Option<String>,
    pub is_recurring: bool,
}

/// A transaction plus the label of its category, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionEntry {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub category: String,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub start: Option<NaiveDate>,
    /// Exclusive.
    pub end: Option<NaiveDate>,
    pub kind: Option<TransactionType>,
    pub category_id: Option<i64>,
    pub limit: Option<usize>,
    pub offset: usize,
}

pub fn create_transaction(
    storage: &Storage,
    settings: &Settings,
    user_id: i64,
    new: &NewTransaction,
    today: NaiveDate,
) -> Result<Transaction> {
    let created = storage.write(|tx| insert_transaction(tx, settings, user_id, new, today))?;
    info!(
        user_id,
        transaction_id = created.id,
        kind = %created.kind,
        amount = %created.amount,
        "transaction created"
    );
    Ok(created)
}

/// Create a category and a transaction against it as one unit of work, so a
/// rejected transaction never leaves an orphan category behind.
pub fn create_with_new_category(
    storage: &Storage,
    settings: &Settings,
    user_id: i64,
    category: &NewCategory,
    new: &NewTransaction,
    today: NaiveDate,
) -> Result<(Category, Transaction)> {
    let (category, created) = storage.write(|tx| {
        let category = categories::insert_category(tx, settings, user_id, category)?;
        let with_category = NewTransaction {
            category_id: category.id,
            ..new.clone()
        };
        let created = insert_transaction(tx, settings, user_id, &with_category, today)?;
        Ok((category, created))
    })?;
    info!(
        user_id,
        category_id = category.id,
        transaction_id = created.id,
        "transaction created with new category"
    );
    Ok((category, created))
}

fn insert_transaction(
    conn: &Connection,
    settings: &Settings,
    user_id: i64,
    new: &NewTransaction,
    today: NaiveDate,
) -> Result<Transaction> {
    let category = categories::owned(conn, user_id, new.category_id)?;
    if category.kind != new.kind {
        return Err(ServiceError::validation(format!(
            "A categoria '{}' é de {}, não de {}",
            category.name,
            kind_word(category.kind),
            kind_word(new.kind)
        )));
    }
    if !category.is_active {
        return Err(ServiceError::validation(format!(
            "A categoria '{}' está desativada",
            category.name
        )));
    }
    if new.amount < settings.min_transaction_amount {
        return Err(InputError::BelowMinimum(settings.min_transaction_amount).into());
    }
    if new.amount > settings.max_transaction_amount {
        return Err(InputError::AboveMaximum(settings.max_transaction_amount).into());
    }
    if !new.payment_method.allowed_for(new.kind) {
        return Err(ServiceError::validation(format!(
            "{} não é uma forma válida para {}",
            new.payment_method.label(),
            kind_word(new.kind)
        )));
    }
    if new.date > today {
        return Err(InputError::FutureDate.into());
    }

    let description: String = sanitize(&new.description)
        .chars()
        .take(settings.max_description_length)
        .collect();
    if description.is_empty() {
        return Err(ServiceError::validation("A descrição não pode estar vazia"));
    }
    let notes = new.notes.as_deref().map(sanitize).filter(|n| !n.is_empty());
    let tags = new.tags.as_deref().map(sanitize).filter(|t| !t.is_empty());

    conn.execute(
        "INSERT INTO transactions(user_id, category_id, amount, type, description,
                                  payment_method, date, notes, tags, is_recurring)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
        params![
            user_id,
            category.id,
            new.amount.to_string(),
            new.kind,
            description,
            new.payment_method,
            new.date,
            notes,
            tags,
            new.is_recurring
        ],
    )?;
    load(conn, conn.last_insert_rowid()).map(|entry| entry.transaction)
}

fn kind_word(kind: TransactionType) -> &'static str {
    match kind {
        TransactionType::Income => "receita",
        TransactionType::Expense => "despesa",
    }
}

fn select_entries() -> String {
    format!(
        "SELECT {}, c.name, c.icon FROM transactions t
         JOIN categories c ON c.id = t.category_id",
        Transaction::COLUMNS
    )
}

fn entry_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<TransactionEntry> {
    let transaction = Transaction::from_row(r)?;
    let name: String = r.get(11)?;
    let icon: Option<String> = r.get(12)?;
    Ok(TransactionEntry {
        transaction,
        category: match icon {
            Some(icon) => format!("{} {}", icon, name),
            None => name,
        },
    })
}

fn load(conn: &Connection, id: i64) -> Result<TransactionEntry> {
    conn.query_row(
        &format!("{} WHERE t.id=?1", select_entries()),
        params![id],
        entry_from_row,
    )
    .optional()?
    .ok_or(ServiceError::NotFound("transaction"))
}

fn owned(conn: &Connection, user_id: i64, id: i64) -> Result<TransactionEntry> {
    let entry = load(conn, id)?;
    if entry.transaction.user_id != user_id {
        return Err(ServiceError::Permission);
    }
    Ok(entry)
}

pub fn get_transaction(storage: &Storage, user_id: i64, id: i64) -> Result<TransactionEntry> {
    storage.read(|conn| owned(conn, user_id, id))
}

/// Newest first. The page size is clamped to the configured maximum.
pub fn list_transactions(
    storage: &Storage,
    settings: &Settings,
    user_id: i64,
    filter: &TransactionFilter,
) -> Result<Vec<TransactionEntry>> {
    let limit = filter
        .limit
        .unwrap_or(settings.transactions_per_page)
        .clamp(1, settings.transactions_per_page);
    storage.read(|conn| {
        let mut stmt = conn.prepare_cached(&format!(
            "{} WHERE t.user_id=?1
               AND (?2 IS NULL OR t.date >= ?2)
               AND (?3 IS NULL OR t.date < ?3)
               AND (?4 IS NULL OR t.type = ?4)
               AND (?5 IS NULL OR t.category_id = ?5)
             ORDER BY t.date DESC, t.id DESC
             LIMIT ?6 OFFSET ?7",
            select_entries()
        ))?;
        let rows = stmt.query_map(
            params![
                user_id,
                filter.start,
                filter.end,
                filter.kind,
                filter.category_id,
                limit as i64,
                filter.offset as i64
            ],
            entry_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    })
}

pub fn count_transactions(storage: &Storage, user_id: i64, filter: &TransactionFilter) -> Result<usize> {
    storage.read(|conn| {
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions
             WHERE user_id=?1
               AND (?2 IS NULL OR date >= ?2)
               AND (?3 IS NULL OR date < ?3)
               AND (?4 IS NULL OR type = ?4)
               AND (?5 IS NULL OR category_id = ?5)",
            params![user_id, filter.start, filter.end, filter.kind, filter.category_id],
            |r| r.get(0),
        )?;
        Ok(n as usize)
    })
}

pub fn delete_transaction(storage: &Storage, user_id: i64, id: i64) -> Result<Transaction> {
    let removed = storage.write(|tx| {
        let entry = owned(tx, user_id, id)?;
        tx.execute("DELETE FROM transactions WHERE id=?1", params![id])?;
        Ok(entry.transaction)
    })?;
    info!(user_id, transaction_id = id, amount = %brl(&removed.amount), "transaction deleted");
    Ok(removed)
}

/// Every transaction of the user, oldest first; used by exports.
pub fn all_transactions(storage: &Storage, user_id: i64) -> Result<Vec<TransactionEntry>> {
    storage.read(|conn| {
        let mut stmt = conn.prepare_cached(&format!(
            "{} WHERE t.user_id=?1 ORDER BY t.date ASC, t.id ASC",
            select_entries()
        ))?;
        let rows = stmt.query_map(params![user_id], entry_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    })
}
