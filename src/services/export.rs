// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use serde_json::json;
use std::str::FromStr;
use tracing::info;

use crate::db::Storage;
use crate::error::{Result, ServiceError};
use crate::models::UnknownVariant;
use crate::services::categories::{self, CategoryFilter};
use crate::services::{investments, transactions, users};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(UnknownVariant {
                kind: "export format",
                value: other.to_string(),
            }),
        }
    }
}

/// A rendered export, ready to be written or sent as a document.
#[derive(Debug, Clone)]
pub struct Export {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub rows: usize,
}

/// CSV carries the transactions; JSON carries the whole account.
pub fn export_user_data(
    storage: &Storage,
    user_id: i64,
    format: ExportFormat,
    today: NaiveDate,
) -> Result<Export> {
    let entries = transactions::all_transactions(storage, user_id)?;
    let filename = format!("finbot_{}_{}.{}", user_id, today.format("%Y%m%d"), format.as_str());

    let (bytes, rows) = match format {
        ExportFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(Vec::new());
            let csv_err = |e: csv::Error| ServiceError::invariant(format!("csv export: {}", e));
            wtr.write_record([
                "date",
                "type",
                "category",
                "description",
                "amount",
                "payment_method",
                "notes",
            ])
            .map_err(csv_err)?;
            for entry in &entries {
                let t = &entry.transaction;
                wtr.write_record([
                    t.date.to_string(),
                    t.kind.to_string(),
                    entry.category.clone(),
                    t.description.clone(),
                    t.amount.to_string(),
                    t.payment_method.to_string(),
                    t.notes.clone().unwrap_or_default(),
                ])
                .map_err(csv_err)?;
            }
            let bytes = wtr
                .into_inner()
                .map_err(|e| ServiceError::invariant(format!("csv export: {}", e)))?;
            (bytes, entries.len())
        }
        ExportFormat::Json => {
            let user = users::get_user(storage, user_id)?;
            let positions = investments::list_investments(storage, user_id, false)?;
            let cats = categories::list_categories(
                storage,
                user_id,
                CategoryFilter {
                    active_only: false,
                    ..CategoryFilter::default()
                },
            )?;
            let doc = json!({
                "exported_at": today,
                "user": user,
                "categories": cats,
                "transactions": entries,
                "investments": positions,
            });
            let bytes = serde_json::to_vec_pretty(&doc)
                .map_err(|e| ServiceError::invariant(format!("json export: {}", e)))?;
            (bytes, entries.len() + positions.len())
        }
    };

    info!(user_id, format = format.as_str(), rows, "data exported");
    Ok(Export {
        filename,
        bytes,
        rows,
    })
}
