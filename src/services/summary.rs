// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Monthly aggregates, the financial health score, spending trend and
//! the advice list shown in reports.

use chrono::{Datelike, Months, NaiveDate};
use rusqlite::params;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::HealthWeights;
use crate::db::{Storage, decimal_at};
use crate::error::{Result, ServiceError};
use crate::models::TransactionType;
use crate::services::investments::PortfolioSummary;

#[derive(Debug, Clone, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: Decimal,
    pub count: usize,
    /// Share of the income or expense total, in percent.
    pub share: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlySummary {
    pub year: i32,
    pub month: u32,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub balance: Decimal,
    pub savings_rate: Decimal,
    pub income_by_category: Vec<CategoryTotal>,
    pub expenses_by_category: Vec<CategoryTotal>,
    pub transaction_count: usize,
    pub days_in_month: u32,
    pub daily_average_expense: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthLabel {
    Excellent,
    Good,
    Regular,
    NeedsImprovement,
    InsufficientData,
}

impl HealthLabel {
    fn for_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => Self::Excellent,
            60..=79 => Self::Good,
            40..=59 => Self::Regular,
            _ => Self::NeedsImprovement,
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            Self::Excellent => "Excelente",
            Self::Good => "Bom",
            Self::Regular => "Regular",
            Self::NeedsImprovement => "Precisa melhorar",
            Self::InsufficientData => "Sem dados suficientes",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Excellent => "🟢",
            Self::Good => "🔵",
            Self::Regular => "🟡",
            Self::NeedsImprovement => "🔴",
            Self::InsufficientData => "⚪",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthScore {
    pub score: u8,
    pub label: HealthLabel,
    pub months_analyzed: usize,
    pub average_savings_rate: Decimal,
    pub positive_months: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

impl Trend {
    pub fn text(&self) -> &'static str {
        match self {
            Self::Increasing => "📈 Gastos em alta",
            Self::Decreasing => "📉 Gastos em queda",
            Self::Stable => "➡️ Gastos estáveis",
            Self::InsufficientData => "Sem dados suficientes",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SpendingTrend {
    pub trend: Trend,
    /// Percent change of the recent half against the older half.
    pub change: Decimal,
    pub monthly_expenses: Vec<(String, Decimal)>,
}

pub fn month_start(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| ServiceError::validation(format!("Mês inválido: {}/{}", month, year)))
}

fn next_month(start: NaiveDate) -> Result<NaiveDate> {
    start
        .checked_add_months(Months::new(1))
        .ok_or_else(|| ServiceError::invariant("date overflow computing next month"))
}

fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    (part / whole * Decimal::ONE_HUNDRED).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Totals for `[first of month, first of next month)`.
pub fn monthly_summary(
    storage: &Storage,
    user_id: i64,
    year: i32,
    month: u32,
    today: NaiveDate,
) -> Result<MonthlySummary> {
    if !(1..=12).contains(&month) {
        return Err(ServiceError::validation("O mês deve estar entre 1 e 12"));
    }
    if year < 2000 || year > today.year() + 1 {
        return Err(ServiceError::validation(format!(
            "O ano deve estar entre 2000 e {}",
            today.year() + 1
        )));
    }
    let start = month_start(year, month)?;
    let end = next_month(start)?;
    let days_in_month = (end - start).num_days() as u32;

    let rows = storage.read(|conn| {
        let mut stmt = conn.prepare_cached(
            "SELECT t.amount, t.type, c.name, c.icon FROM transactions t
             JOIN categories c ON c.id = t.category_id
             WHERE t.user_id=?1 AND t.date >= ?2 AND t.date < ?3",
        )?;
        let rows = stmt.query_map(params![user_id, start, end], |r| {
            let icon: Option<String> = r.get(3)?;
            let name: String = r.get(2)?;
            Ok((
                decimal_at(r, 0)?,
                r.get::<_, TransactionType>(1)?,
                match icon {
                    Some(icon) => format!("{} {}", icon, name),
                    None => name,
                },
            ))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    })?;

    let mut income: BTreeMap<String, (Decimal, usize)> = BTreeMap::new();
    let mut expenses: BTreeMap<String, (Decimal, usize)> = BTreeMap::new();
    for (amount, kind, category) in &rows {
        let bucket = match kind {
            TransactionType::Income => &mut income,
            TransactionType::Expense => &mut expenses,
        };
        let slot = bucket.entry(category.clone()).or_insert((Decimal::ZERO, 0));
        slot.0 += *amount;
        slot.1 += 1;
    }

    let total_income: Decimal = income.values().map(|(t, _)| *t).sum();
    let total_expenses: Decimal = expenses.values().map(|(t, _)| *t).sum();
    let balance = total_income - total_expenses;

    Ok(MonthlySummary {
        year,
        month,
        total_income,
        total_expenses,
        balance,
        savings_rate: percent_of(balance, total_income),
        income_by_category: breakdown(income, total_income),
        expenses_by_category: breakdown(expenses, total_expenses),
        transaction_count: rows.len(),
        days_in_month,
        daily_average_expense: (total_expenses / Decimal::from(days_in_month))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
    })
}

fn breakdown(buckets: BTreeMap<String, (Decimal, usize)>, whole: Decimal) -> Vec<CategoryTotal> {
    let mut out: Vec<CategoryTotal> = buckets
        .into_iter()
        .map(|(category, (total, count))| CategoryTotal {
            share: percent_of(total, whole),
            category,
            total,
            count,
        })
        .collect();
    out.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category)));
    out
}

#[derive(Debug, Clone, Copy, Default)]
struct MonthTotals {
    income: Decimal,
    expenses: Decimal,
}

/// Income/expense per calendar month for the `months` months ending with
/// the one containing `today`, oldest first.
fn recent_months(
    storage: &Storage,
    user_id: i64,
    months: u32,
    today: NaiveDate,
) -> Result<Vec<(NaiveDate, MonthTotals)>> {
    let current = month_start(today.year(), today.month())?;
    let first = current
        .checked_sub_months(Months::new(months.saturating_sub(1)))
        .ok_or_else(|| ServiceError::invariant("date underflow computing month window"))?;
    let end = next_month(current)?;

    let rows = storage.read(|conn| {
        let mut stmt = conn.prepare_cached(
            "SELECT amount, type, date FROM transactions
             WHERE user_id=?1 AND date >= ?2 AND date < ?3",
        )?;
        let rows = stmt.query_map(params![user_id, first, end], |r| {
            Ok((
                decimal_at(r, 0)?,
                r.get::<_, TransactionType>(1)?,
                r.get::<_, NaiveDate>(2)?,
            ))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    })?;

    let mut by_month: BTreeMap<NaiveDate, MonthTotals> = BTreeMap::new();
    let mut cursor = first;
    while cursor <= current {
        by_month.insert(cursor, MonthTotals::default());
        cursor = next_month(cursor)?;
    }
    for (amount, kind, date) in rows {
        let key = month_start(date.year(), date.month())?;
        if let Some(slot) = by_month.get_mut(&key) {
            match kind {
                TransactionType::Income => slot.income += amount,
                TransactionType::Expense => slot.expenses += amount,
            }
        }
    }
    Ok(by_month.into_iter().collect())
}

pub fn health_score(
    storage: &Storage,
    weights: &HealthWeights,
    user_id: i64,
    today: NaiveDate,
) -> Result<HealthScore> {
    let months: Vec<MonthTotals> = recent_months(storage, user_id, weights.months, today)?
        .into_iter()
        .map(|(_, totals)| totals)
        .filter(|t| !t.income.is_zero())
        .collect();
    Ok(score_months(weights, &months))
}

fn score_months(weights: &HealthWeights, months: &[MonthTotals]) -> HealthScore {
    if months.is_empty() {
        return HealthScore {
            score: 50,
            label: HealthLabel::InsufficientData,
            months_analyzed: 0,
            average_savings_rate: Decimal::ZERO,
            positive_months: 0,
        };
    }

    let n = Decimal::from(months.len());
    let rates: Decimal = months
        .iter()
        .map(|m| percent_of(m.income - m.expenses, m.income))
        .sum();
    let average_rate = (rates / n).round_dp(2);

    let mut score = weights.base;
    if average_rate.is_sign_negative() && !average_rate.is_zero() {
        score -= weights.negative_savings_penalty;
    } else if let Some((_, points)) = weights
        .savings_tiers
        .iter()
        .find(|(threshold, _)| average_rate >= *threshold)
    {
        score += points;
    }

    let positive = months.iter().filter(|m| m.income > m.expenses).count();
    let consistency = Decimal::from(positive) / n * Decimal::from(weights.consistency_points);
    score += consistency.floor().to_i32().unwrap_or(0);

    if months.len() > 1 {
        let incomes = months.iter().map(|m| m.income);
        let max = incomes.clone().max().unwrap_or(Decimal::ZERO);
        let min = incomes.clone().min().unwrap_or(Decimal::ZERO);
        let avg = incomes.sum::<Decimal>() / n;
        if !avg.is_zero() {
            let steadiness = (Decimal::ONE - (max - min) / avg).max(Decimal::ZERO);
            let points = steadiness * Decimal::from(weights.stability_points);
            score += points.floor().to_i32().unwrap_or(0);
        }
    }

    let score = score.clamp(0, 100) as u8;
    HealthScore {
        score,
        label: HealthLabel::for_score(score),
        months_analyzed: months.len(),
        average_savings_rate: average_rate,
        positive_months: positive,
    }
}

/// Compares the average expense of the recent half of the window with the
/// older half; a move of more than 10% either way is a trend.
pub fn spending_trend(
    storage: &Storage,
    user_id: i64,
    months: u32,
    today: NaiveDate,
) -> Result<SpendingTrend> {
    let window = recent_months(storage, user_id, months.max(2), today)?;
    let monthly_expenses: Vec<(String, Decimal)> = window
        .iter()
        .map(|(start, t)| (start.format("%Y-%m").to_string(), t.expenses))
        .collect();

    let half = window.len() / 2;
    let average = |slice: &[(NaiveDate, MonthTotals)]| -> Decimal {
        if slice.is_empty() {
            return Decimal::ZERO;
        }
        slice.iter().map(|(_, t)| t.expenses).sum::<Decimal>() / Decimal::from(slice.len())
    };
    let older = average(&window[..half]);
    let recent = average(&window[window.len() - half..]);

    let (trend, change) = if older.is_zero() {
        (Trend::InsufficientData, Decimal::ZERO)
    } else {
        let change = percent_of(recent - older, older);
        let band = Decimal::TEN;
        let trend = if change > band {
            Trend::Increasing
        } else if change < -band {
            Trend::Decreasing
        } else {
            Trend::Stable
        };
        (trend, change)
    };
    Ok(SpendingTrend {
        trend,
        change,
        monthly_expenses,
    })
}

/// At most five short pieces of advice.
pub fn recommendations(
    health: &HealthScore,
    month: &MonthlySummary,
    portfolio: Option<&PortfolioSummary>,
) -> Vec<String> {
    let mut out = Vec::new();

    if health.label == HealthLabel::InsufficientData {
        out.push("📝 Registre suas receitas e despesas para receber uma análise completa.".to_string());
    } else if health.score < 40 {
        out.push("🚨 Sua saúde financeira precisa de atenção: revise seus gastos fixos.".to_string());
    }

    if month.total_income > Decimal::ZERO {
        if month.savings_rate < Decimal::ZERO {
            out.push("💸 Você gastou mais do que ganhou este mês. Corte despesas não essenciais.".to_string());
        } else if month.savings_rate < Decimal::TEN {
            out.push("💰 Tente poupar pelo menos 10% da sua renda mensal.".to_string());
        } else if month.savings_rate >= Decimal::from(30) {
            out.push("🌟 Ótima taxa de poupança! Considere investir o excedente.".to_string());
        }
    }

    if let Some(top) = month.expenses_by_category.first() {
        if top.share > Decimal::from(40) {
            out.push(format!(
                "📊 {} concentra {}% das suas despesas. Vale revisar essa categoria.",
                top.category,
                top.share.round_dp(0)
            ));
        }
    }

    match portfolio {
        Some(p) if p.asset_count == 0 => {
            out.push("📈 Você ainda não tem investimentos. Comece com renda fixa.".to_string());
        }
        Some(p) if p.diversification_score < 50 => {
            out.push("🧺 Diversifique sua carteira com outros tipos de ativos.".to_string());
        }
        _ => {}
    }

    if health.score >= 80 && out.len() < 5 {
        out.push("✅ Continue assim! Mantenha uma reserva de emergência de 6 meses.".to_string());
    }

    out.truncate(5);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(income: i64, expenses: i64) -> MonthTotals {
        MonthTotals {
            income: Decimal::from(income),
            expenses: Decimal::from(expenses),
        }
    }

    #[test]
    fn no_income_is_neutral() {
        let h = score_months(&HealthWeights::default(), &[]);
        assert_eq!(h.score, 50);
        assert_eq!(h.label, HealthLabel::InsufficientData);
    }

    #[test]
    fn steady_saver_scores_high() {
        let months = [month(4000, 3000), month(4000, 3000), month(4000, 3000)];
        let h = score_months(&HealthWeights::default(), &months);
        // 50 + 30 (25%) + 20 + 10, clamped
        assert_eq!(h.score, 100);
        assert_eq!(h.label, HealthLabel::Excellent);
        assert_eq!(h.average_savings_rate, Decimal::from(25));
    }

    #[test]
    fn overspending_is_penalized() {
        let months = [month(1000, 3000)];
        let h = score_months(&HealthWeights::default(), &months);
        // 50 - 20, no positive months, no stability with one month
        assert_eq!(h.score, 30);
        assert_eq!(h.label, HealthLabel::NeedsImprovement);
    }

    #[test]
    fn volatile_income_gets_no_stability_points() {
        let months = [month(1000, 950), month(9000, 8550)];
        let h = score_months(&HealthWeights::default(), &months);
        // 5% savings -> +10, both positive -> +20, (9000-1000)/5000 > 1 -> 0
        assert_eq!(h.score, 80);
    }

    #[test]
    fn score_always_in_bounds() {
        let w = HealthWeights::default();
        for income in [1, 100, 5000] {
            for expenses in [0, 1, 100, 5000, 100_000] {
                let h = score_months(&w, &[month(income, expenses), month(income * 3, expenses)]);
                assert!(h.score <= 100);
            }
        }
    }
}
