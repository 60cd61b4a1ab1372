// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

use crate::config::Settings;
use crate::db::Storage;
use crate::error::{Result, ServiceError};
use crate::format::{brl, quantity as fmt_qty};
use crate::models::{Investment, InvestmentType};
use crate::validation::{InputError, validate_ticker};

/// Single-trade sanity ceiling, catches a misplaced separator.
pub const MAX_TRADE_VALUE: Decimal = Decimal::from_parts(10_000_000, 0, 0, false, 0);
const AVG_PRICE_DP: u32 = 8;

/// Current unit price for a ticker. Nothing in the core fetches prices;
/// without a source, current value is reported as the invested value.
pub trait PriceSource: Send + Sync {
    fn price(&self, ticker: &str) -> Option<Decimal>;
}

/// Fixed quotes, e.g. loaded from a file or supplied by tests.
#[derive(Debug, Clone, Default)]
pub struct StaticPrices(HashMap<String, Decimal>);

impl StaticPrices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, ticker: &str, price: Decimal) -> Self {
        self.0.insert(ticker.to_uppercase(), price);
        self
    }
}

impl PriceSource for StaticPrices {
    fn price(&self, ticker: &str) -> Option<Decimal> {
        self.0.get(&ticker.to_uppercase()).copied()
    }
}

#[derive(Debug, Clone)]
pub struct Buy {
    pub ticker: String,
    pub kind: InvestmentType,
    pub quantity: Decimal,
    pub price: Decimal,
    pub date: NaiveDate,
    pub broker: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BuyOutcome {
    pub investment: Investment,
    /// Folded into an existing active position.
    pub merged: bool,
}

#[derive(Debug, Clone)]
pub struct Sell {
    pub investment_id: i64,
    pub quantity: Decimal,
    pub price: Decimal,
    pub date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct SellOutcome {
    pub investment: Investment,
    /// The position was fully liquidated and is now inactive.
    pub closed: bool,
    pub proceeds: Decimal,
    /// Proceeds minus the average cost of the units sold.
    pub realized: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeAllocation {
    pub kind: InvestmentType,
    pub count: usize,
    pub invested: Decimal,
    pub percentage: Decimal,
    pub tickers: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSummary {
    pub total_invested: Decimal,
    pub current_value: Decimal,
    pub profit_loss: Decimal,
    pub profit_loss_pct: Decimal,
    pub asset_count: usize,
    pub type_count: usize,
    pub by_type: Vec<TypeAllocation>,
    pub diversification_score: u8,
    /// At least one position was valued with a live quote.
    pub priced: bool,
}

fn validate_trade(quantity: Decimal, price: Decimal, date: NaiveDate, today: NaiveDate) -> Result<Decimal> {
    if quantity <= Decimal::ZERO {
        return Err(ServiceError::validation("A quantidade deve ser maior que zero"));
    }
    if price <= Decimal::ZERO {
        return Err(ServiceError::validation("O preço deve ser maior que zero"));
    }
    if date > today {
        return Err(InputError::FutureDate.into());
    }
    trade_value(quantity, price)
}

/// `quantity * price`, rejected above [`MAX_TRADE_VALUE`].
pub fn trade_value(quantity: Decimal, price: Decimal) -> Result<Decimal> {
    let value = quantity
        .checked_mul(price)
        .ok_or_else(|| ServiceError::validation("Valor da operação muito alto"))?;
    if value > MAX_TRADE_VALUE {
        return Err(ServiceError::validation(format!(
            "Valor da operação acima do limite de {}",
            brl(&MAX_TRADE_VALUE)
        )));
    }
    Ok(value)
}

fn load(conn: &Connection, id: i64) -> Result<Investment> {
    conn.query_row(
        &format!("SELECT {} FROM investments WHERE id=?1", Investment::COLUMNS),
        params![id],
        Investment::from_row,
    )
    .optional()?
    .ok_or(ServiceError::NotFound("investment"))
}

fn owned(conn: &Connection, user_id: i64, id: i64) -> Result<Investment> {
    let inv = load(conn, id)?;
    if inv.user_id != user_id {
        return Err(ServiceError::Permission);
    }
    Ok(inv)
}

fn active_by_ticker(conn: &Connection, user_id: i64, ticker: &str) -> Result<Option<Investment>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {} FROM investments WHERE user_id=?1 AND ticker=?2 AND is_active=1",
                Investment::COLUMNS
            ),
            params![user_id, ticker],
            Investment::from_row,
        )
        .optional()?)
}

/// Record a purchase. An active position in the same ticker absorbs it with
/// a volume-weighted average price; otherwise a new position is opened.
pub fn buy(
    storage: &Storage,
    settings: &Settings,
    user_id: i64,
    order: &Buy,
    today: NaiveDate,
) -> Result<BuyOutcome> {
    let ticker = validate_ticker(&order.ticker, Some(order.kind))?;
    let cost = validate_trade(order.quantity, order.price, order.date, today)?;
    let broker = order
        .broker
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string);

    let outcome = storage.write(|tx| {
        if let Some(existing) = active_by_ticker(tx, user_id, &ticker)? {
            if existing.kind != order.kind {
                return Err(ServiceError::validation(format!(
                    "{} já está na carteira como {}",
                    ticker,
                    existing.kind.label()
                )));
            }
            // Sold units keep their place in `quantity`; only held units weigh in.
            let held = existing.current_quantity();
            let quantity = existing.quantity + order.quantity;
            let avg_price = ((existing.open_cost() + cost) / (held + order.quantity))
                .round_dp_with_strategy(AVG_PRICE_DP, RoundingStrategy::MidpointAwayFromZero);
            tx.execute(
                "UPDATE investments SET quantity=?1, avg_price=?2, broker=COALESCE(?3, broker),
                 updated_at=datetime('now') WHERE id=?4",
                params![quantity.to_string(), avg_price.to_string(), broker, existing.id],
            )?;
            return Ok(BuyOutcome {
                investment: load(tx, existing.id)?,
                merged: true,
            });
        }

        let open: i64 = tx.query_row(
            "SELECT COUNT(*) FROM investments WHERE user_id=?1 AND is_active=1",
            params![user_id],
            |r| r.get(0),
        )?;
        if open as usize >= settings.max_investments_per_user {
            return Err(ServiceError::validation(format!(
                "Limite de {} ativos na carteira atingido",
                settings.max_investments_per_user
            )));
        }
        tx.execute(
            "INSERT INTO investments(user_id, ticker, type, quantity, avg_price, purchase_date, broker)
             VALUES (?1,?2,?3,?4,?5,?6,?7)",
            params![
                user_id,
                ticker,
                order.kind,
                order.quantity.to_string(),
                order.price.to_string(),
                order.date,
                broker
            ],
        )?;
        Ok(BuyOutcome {
            investment: load(tx, tx.last_insert_rowid())?,
            merged: false,
        })
    })?;

    info!(
        user_id,
        investment_id = outcome.investment.id,
        ticker = %outcome.investment.ticker,
        quantity = %order.quantity,
        merged = outcome.merged,
        "investment bought"
    );
    Ok(outcome)
}

/// Sell part or all of an active position. History stays in the row.
pub fn sell(storage: &Storage, user_id: i64, order: &Sell, today: NaiveDate) -> Result<SellOutcome> {
    let proceeds = validate_trade(order.quantity, order.price, order.date, today)?;

    let outcome = storage.write(|tx| {
        let inv = owned(tx, user_id, order.investment_id)?;
        if !inv.is_active {
            return Err(ServiceError::validation(format!(
                "A posição em {} já foi encerrada",
                inv.ticker
            )));
        }
        let held = inv.current_quantity();
        if order.quantity > held {
            return Err(ServiceError::validation(format!(
                "Quantidade maior que a disponível ({})",
                fmt_qty(&held)
            )));
        }
        let sold = inv.sale_quantity.unwrap_or(Decimal::ZERO) + order.quantity;
        let closed = sold == inv.quantity;
        if closed {
            tx.execute(
                "UPDATE investments SET sale_quantity=?1, sale_price=?2, sale_date=?3,
                 is_active=0, updated_at=datetime('now') WHERE id=?4",
                params![sold.to_string(), order.price.to_string(), order.date, inv.id],
            )?;
        } else {
            tx.execute(
                "UPDATE investments SET sale_quantity=?1, updated_at=datetime('now') WHERE id=?2",
                params![sold.to_string(), inv.id],
            )?;
        }
        let investment = load(tx, inv.id)?;
        if investment.current_quantity().is_sign_negative() {
            return Err(ServiceError::invariant(format!(
                "investment {} sold below zero",
                inv.id
            )));
        }
        Ok(SellOutcome {
            realized: proceeds - order.quantity * inv.avg_price,
            investment,
            closed,
            proceeds,
        })
    })?;

    info!(
        user_id,
        investment_id = order.investment_id,
        quantity = %order.quantity,
        closed = outcome.closed,
        "investment sold"
    );
    Ok(outcome)
}

pub fn get_investment(storage: &Storage, user_id: i64, id: i64) -> Result<Investment> {
    storage.read(|conn| owned(conn, user_id, id))
}

pub fn find_active_by_ticker(storage: &Storage, user_id: i64, ticker: &str) -> Result<Option<Investment>> {
    let ticker = ticker.trim().to_uppercase();
    storage.read(|conn| active_by_ticker(conn, user_id, &ticker))
}

pub fn list_investments(storage: &Storage, user_id: i64, active_only: bool) -> Result<Vec<Investment>> {
    storage.read(|conn| {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM investments WHERE user_id=?1 AND (?2=0 OR is_active=1)
             ORDER BY is_active DESC, ticker ASC, id ASC",
            Investment::COLUMNS
        ))?;
        let rows = stmt.query_map(params![user_id, active_only], Investment::from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    })
}

pub fn portfolio_summary(
    storage: &Storage,
    user_id: i64,
    prices: Option<&dyn PriceSource>,
) -> Result<PortfolioSummary> {
    let positions = list_investments(storage, user_id, true)?;
    Ok(summarize(&positions, prices))
}

fn summarize(positions: &[Investment], prices: Option<&dyn PriceSource>) -> PortfolioSummary {
    let mut groups: BTreeMap<&'static str, TypeAllocation> = BTreeMap::new();
    let mut total_invested = Decimal::ZERO;
    let mut current_value = Decimal::ZERO;
    let mut priced = false;

    for inv in positions {
        let invested = inv.open_cost();
        total_invested += invested;
        match prices.and_then(|p| p.price(&inv.ticker)) {
            Some(quote) => {
                priced = true;
                current_value += inv.current_quantity() * quote;
            }
            None => current_value += invested,
        }
        let group = groups.entry(inv.kind.as_str()).or_insert_with(|| TypeAllocation {
            kind: inv.kind,
            count: 0,
            invested: Decimal::ZERO,
            percentage: Decimal::ZERO,
            tickers: Vec::new(),
        });
        group.count += 1;
        group.invested += invested;
        group.tickers.push(inv.ticker.clone());
    }

    let mut by_type: Vec<TypeAllocation> = groups.into_values().collect();
    for group in &mut by_type {
        if !total_invested.is_zero() {
            group.percentage = (group.invested / total_invested * Decimal::ONE_HUNDRED)
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        }
    }
    by_type.sort_by(|a, b| b.invested.cmp(&a.invested));

    let asset_count = positions.len();
    let type_count = by_type.len();
    let diversification = (asset_count * 5 + type_count * 15).min(100) as u8;
    let profit_loss = current_value - total_invested;
    let profit_loss_pct = if total_invested.is_zero() {
        Decimal::ZERO
    } else {
        (profit_loss / total_invested * Decimal::ONE_HUNDRED).round_dp(2)
    };

    PortfolioSummary {
        total_invested: total_invested.round_dp(2),
        current_value: current_value.round_dp(2),
        profit_loss: profit_loss.round_dp(2),
        profit_loss_pct,
        asset_count,
        type_count,
        by_type,
        diversification_score: diversification,
        priced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(ticker: &str, kind: InvestmentType, qty: i64, avg: Decimal) -> Investment {
        Investment {
            id: 0,
            user_id: 1,
            ticker: ticker.to_string(),
            kind,
            quantity: Decimal::from(qty),
            avg_price: avg,
            purchase_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            broker: None,
            notes: None,
            is_active: true,
            sale_quantity: None,
            sale_price: None,
            sale_date: None,
        }
    }

    #[test]
    fn unpriced_portfolio_is_valued_at_cost() {
        let positions = [
            position("PETR4", InvestmentType::Stock, 100, Decimal::from(30)),
            position("MXRF11", InvestmentType::Fii, 100, Decimal::from(10)),
        ];
        let s = summarize(&positions, None);
        assert_eq!(s.total_invested, Decimal::from(4000));
        assert_eq!(s.current_value, s.total_invested);
        assert!(s.profit_loss.is_zero());
        assert_eq!(s.by_type[0].kind, InvestmentType::Stock);
        assert_eq!(s.by_type[0].percentage, Decimal::from(75));
        assert_eq!(s.diversification_score, 40);
        assert!(!s.priced);
    }

    #[test]
    fn quotes_drive_current_value() {
        let positions = [position("BTC", InvestmentType::Crypto, 2, Decimal::from(100))];
        let prices = StaticPrices::new().with("btc", Decimal::from(150));
        let s = summarize(&positions, Some(&prices as &dyn PriceSource));
        assert_eq!(s.current_value, Decimal::from(300));
        assert_eq!(s.profit_loss, Decimal::from(100));
        assert_eq!(s.profit_loss_pct, Decimal::from(50));
    }

    #[test]
    fn sold_units_leave_the_cost_basis() {
        let mut half_sold = position("PETR4", InvestmentType::Stock, 100, Decimal::from(10));
        half_sold.sale_quantity = Some(Decimal::from(50));

        let at_cost = summarize(std::slice::from_ref(&half_sold), None);
        assert_eq!(at_cost.total_invested, Decimal::from(500));
        assert_eq!(at_cost.current_value, Decimal::from(500));
        assert_eq!(at_cost.by_type[0].invested, Decimal::from(500));

        let prices = StaticPrices::new().with("PETR4", Decimal::from(10));
        let quoted = summarize(&[half_sold], Some(&prices as &dyn PriceSource));
        assert_eq!(quoted.current_value, Decimal::from(500));
        assert!(quoted.profit_loss.is_zero());
        assert!(quoted.profit_loss_pct.is_zero());
    }

    #[test]
    fn diversification_is_capped() {
        let positions: Vec<Investment> = (0..30)
            .map(|i| position(&format!("AB{:02}", i), InvestmentType::Other, 1, Decimal::ONE))
            .collect();
        assert_eq!(summarize(&positions, None).diversification_score, 100);
    }
}
