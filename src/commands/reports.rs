// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use serde_json::json;

use crate::config::Settings;
use crate::db::Storage;
use crate::format::{brl, month_name, percent, quantity};
use crate::services::{investments, summary, users};
use crate::utils::{maybe_print_json, parse_month, pretty_table, require_user};

pub fn handle(storage: &Storage, settings: &Settings, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let external_id = *sub.get_one::<i64>("user").context("--user is required")?;
    let user = require_user(storage, external_id)?;
    let today = Utc::now()
        .with_timezone(&users::timezone_of(&user, settings))
        .date_naive();
    let (year, month) = match sub.get_one::<String>("month") {
        Some(m) => parse_month(m)?,
        None => (today.year(), today.month()),
    };

    let month_summary = summary::monthly_summary(storage, user.id, year, month, today)?;
    let health = summary::health_score(storage, &settings.health, user.id, today)?;
    let portfolio = investments::portfolio_summary(storage, user.id, None)?;
    let positions = investments::list_investments(storage, user.id, true)?;

    let report = json!({
        "user": user.external_id,
        "summary": month_summary,
        "health": health,
        "portfolio": portfolio,
    });
    if maybe_print_json(json_flag, jsonl_flag, &report)? {
        return Ok(());
    }

    println!("{} {} - {}", month_name(month), year, user.display_name());
    let mut rows = vec![
        vec!["Income".to_string(), brl(&month_summary.total_income)],
        vec!["Expenses".to_string(), brl(&month_summary.total_expenses)],
        vec!["Balance".to_string(), brl(&month_summary.balance)],
        vec!["Savings rate".to_string(), percent(&month_summary.savings_rate)],
        vec!["Daily average expense".to_string(), brl(&month_summary.daily_average_expense)],
        vec!["Transactions".to_string(), month_summary.transaction_count.to_string()],
    ];
    rows.push(vec![
        "Health score".to_string(),
        format!("{}/100 ({})", health.score, health.label.text()),
    ]);
    println!("{}", pretty_table(&["Metric", "Value"], rows));

    if !month_summary.expenses_by_category.is_empty() {
        let rows = month_summary
            .expenses_by_category
            .iter()
            .map(|c| vec![c.category.clone(), brl(&c.total), c.count.to_string(), percent(&c.share)])
            .collect();
        println!("{}", pretty_table(&["Category", "Spent", "Count", "Share"], rows));
    }

    if !positions.is_empty() {
        let rows = positions
            .iter()
            .map(|i| {
                vec![
                    i.ticker.clone(),
                    i.kind.label().to_string(),
                    quantity(&i.current_quantity()),
                    brl(&i.avg_price),
                    brl(&i.open_cost()),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Ticker", "Type", "Quantity", "Avg price", "Invested"], rows)
        );
        println!(
            "Invested {} across {} assets, diversification {}/100",
            brl(&portfolio.total_invested),
            portfolio.asset_count,
            portfolio.diversification_score
        );
    }
    Ok(())
}
