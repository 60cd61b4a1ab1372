// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use tracing::{info, warn};

use crate::db::Storage;
use crate::error::{Result, ServiceError};
use crate::models::{Alert, AlertType};
use crate::validation::validate_text;

pub const MAX_PRIORITY: u8 = 10;
pub const DEFAULT_BATCH: usize = 100;

#[derive(Debug, Clone)]
pub struct NewAlert {
    pub kind: AlertType,
    pub title: String,
    pub message: String,
    pub scheduled_for: DateTime<Utc>,
    pub priority: u8,
    pub metadata: Option<serde_json::Value>,
}

/// A due alert together with the chat id it goes to.
#[derive(Debug, Clone, Serialize)]
pub struct PendingAlert {
    pub recipient: i64,
    #[serde(flatten)]
    pub alert: Alert,
}

/// Anything that can put an alert in front of a user.
pub trait AlertSink {
    fn deliver(&self, recipient: i64, alert: &Alert) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

pub fn create_alert(storage: &Storage, user_id: i64, new: &NewAlert, now: DateTime<Utc>) -> Result<Alert> {
    let title = validate_text(&new.title, 1, 100)?;
    let message = validate_text(&new.message, 1, 1000)?;
    if new.scheduled_for < now - Duration::hours(1) {
        return Err(ServiceError::validation(
            "O alerta não pode ser agendado mais de 1 hora no passado",
        ));
    }
    if new.priority > MAX_PRIORITY {
        return Err(ServiceError::validation(format!(
            "A prioridade deve estar entre 0 e {}",
            MAX_PRIORITY
        )));
    }
    let metadata = new
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| ServiceError::invariant(format!("alert metadata: {}", e)))?;

    let alert = storage.write(|tx| {
        let exists: Option<i64> = tx
            .query_row("SELECT id FROM users WHERE id=?1", params![user_id], |r| r.get(0))
            .optional()?;
        if exists.is_none() {
            return Err(ServiceError::NotFound("user"));
        }
        tx.execute(
            "INSERT INTO alerts(user_id, type, title, message, scheduled_for, priority, metadata)
             VALUES (?1,?2,?3,?4,?5,?6,?7)",
            params![
                user_id,
                new.kind,
                title,
                message,
                new.scheduled_for.trunc_subsecs(0),
                new.priority,
                metadata
            ],
        )?;
        let id = tx.last_insert_rowid();
        Ok(tx.query_row(
            &format!("SELECT {} FROM alerts WHERE id=?1", Alert::COLUMNS),
            params![id],
            Alert::from_row,
        )?)
    })?;
    info!(user_id, alert_id = alert.id, kind = %alert.kind, "alert scheduled");
    Ok(alert)
}

/// Unsent alerts that are due, highest priority first, then oldest schedule.
/// Users who turned notifications off are left out; their alerts wait.
pub fn pending_alerts(storage: &Storage, now: DateTime<Utc>, limit: usize) -> Result<Vec<PendingAlert>> {
    let columns = Alert::COLUMNS
        .split(", ")
        .map(|c| format!("a.{}", c))
        .collect::<Vec<_>>()
        .join(", ");
    storage.read(|conn| {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {}, u.external_id FROM alerts a
             JOIN users u ON u.id = a.user_id
             WHERE a.is_sent=0 AND a.scheduled_for <= ?1 AND u.notifications_enabled=1
             ORDER BY a.priority DESC, a.scheduled_for ASC, a.id ASC
             LIMIT ?2",
            columns
        ))?;
        let rows = stmt.query_map(params![now.trunc_subsecs(0), limit as i64], |r| {
            Ok(PendingAlert {
                alert: Alert::from_row(r)?,
                recipient: r.get(10)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    })
}

pub fn mark_sent(storage: &Storage, alert_id: i64, now: DateTime<Utc>) -> Result<()> {
    let changed = storage.write(|tx| {
        Ok(tx.execute(
            "UPDATE alerts SET is_sent=1, sent_at=?1 WHERE id=?2 AND is_sent=0",
            params![now.trunc_subsecs(0), alert_id],
        )?)
    })?;
    if changed == 0 {
        return Err(ServiceError::NotFound("alert"));
    }
    Ok(())
}

pub fn user_alerts(storage: &Storage, user_id: i64, include_sent: bool, limit: usize) -> Result<Vec<Alert>> {
    storage.read(|conn| {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM alerts WHERE user_id=?1 AND (?2=1 OR is_sent=0)
             ORDER BY scheduled_for DESC, id DESC LIMIT ?3",
            Alert::COLUMNS
        ))?;
        let rows = stmt.query_map(params![user_id, include_sent, limit as i64], Alert::from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    })
}

/// Push every due alert through `sink`. An alert is marked sent only after
/// the sink accepted it; failures are retried on the next run.
pub fn deliver_due(storage: &Storage, sink: &dyn AlertSink, now: DateTime<Utc>) -> Result<DeliveryReport> {
    let mut report = DeliveryReport::default();
    for pending in pending_alerts(storage, now, DEFAULT_BATCH)? {
        match sink.deliver(pending.recipient, &pending.alert) {
            Ok(()) => {
                mark_sent(storage, pending.alert.id, now)?;
                report.delivered += 1;
            }
            Err(e) => {
                warn!(alert_id = pending.alert.id, error = %e, "alert delivery failed");
                report.failed += 1;
            }
        }
    }
    if report.delivered + report.failed > 0 {
        info!(delivered = report.delivered, failed = report.failed, "alert run finished");
    }
    Ok(report)
}

/// Text shown to the user for an alert.
pub fn render(alert: &Alert) -> String {
    format!("{} {}\n\n{}", alert.kind.icon(), alert.title, alert.message)
}
