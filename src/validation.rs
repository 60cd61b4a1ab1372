// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Parsing of free-form user input, Brazilian conventions first.
//!
//! Everything here is pure: no storage, no clock. Callers pass `today`.

use chrono::{Datelike, Months, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use thiserror::Error;

use crate::format::brl;
use crate::models::InvestmentType;

/// Hard ceiling for any parsed amount, independent of configuration.
pub const AMOUNT_CEILING: Decimal = Decimal::from_parts(1_215_752_191, 23, 0, false, 2);
const MAX_TEXT_CHARS: usize = 1000;
const MAX_DATE_AGE_YEARS: u32 = 10;

static TICKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9-]{2,10}$").unwrap());
static STOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{4}[0-9]{1,2}$").unwrap());
static FUND_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{4}[0-9]{2}$").unwrap());
static CRYPTO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2,10}$").unwrap());
static FIXED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2,10}(-[A-Z])?$").unwrap());
static OTHER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9]{2,10}$").unwrap());
static CATEGORY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L}0-9\s\-_.()]+$").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("O valor não pode estar vazio")]
    Empty,
    #[error("Valor inválido. Use o formato 1.234,56")]
    InvalidNumber,
    #[error("Formato inválido: múltiplos pontos decimais")]
    MultipleDecimalPoints,
    #[error("O valor deve ser maior que zero")]
    NotPositive,
    #[error("Valor muito alto")]
    TooLarge,
    #[error("Valor mínimo: {}", brl(.0))]
    BelowMinimum(Decimal),
    #[error("Valor máximo: {}", brl(.0))]
    AboveMaximum(Decimal),
    #[error("Data inválida. Use DD/MM/AAAA, DD/MM ou 'hoje'")]
    InvalidDate,
    #[error("A data não pode ser no futuro")]
    FutureDate,
    #[error("Data muito antiga (máximo de {MAX_DATE_AGE_YEARS} anos)")]
    DateTooOld,
    #[error("O ticker deve ter 2-10 caracteres (letras, números e hífen)")]
    InvalidTicker,
    #[error("Formato inválido para {}. Exemplos: {}", .0.label(), .0.ticker_examples())]
    TickerFormat(InvestmentType),
    #[error("Texto muito curto (mínimo {0} caracteres)")]
    TooShort(usize),
    #[error("Texto muito longo (máximo {0} caracteres)")]
    TooLong(usize),
    #[error("O texto contém caracteres não permitidos")]
    ForbiddenCharacters,
    #[error("Nome de categoria inválido. Use letras, números, espaços e - _ . ( )")]
    InvalidCategoryName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountLimits {
    pub min: Decimal,
    pub max: Decimal,
}

/// Parse a monetary amount such as `R$ 1.234,56`, `1234.56` or `50`.
pub fn parse_amount(text: &str, limits: &AmountLimits) -> Result<Decimal, InputError> {
    let value = normalize_number(text, SeparatorRule::Currency)?
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    check_positive(value)?;
    if value < limits.min {
        return Err(InputError::BelowMinimum(limits.min));
    }
    if value > limits.max {
        return Err(InputError::AboveMaximum(limits.max));
    }
    Ok(value)
}

/// Share or unit count; fractions down to 8 places for crypto.
pub fn parse_quantity(text: &str) -> Result<Decimal, InputError> {
    let value = normalize_number(text, SeparatorRule::Fractional)?
        .round_dp_with_strategy(8, RoundingStrategy::MidpointAwayFromZero);
    check_positive(value)?;
    Ok(value)
}

pub fn parse_price(text: &str) -> Result<Decimal, InputError> {
    let value = normalize_number(text, SeparatorRule::Fractional)?
        .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero);
    check_positive(value)?;
    Ok(value)
}

fn check_positive(value: Decimal) -> Result<(), InputError> {
    if value <= Decimal::ZERO {
        return Err(InputError::NotPositive);
    }
    if value > AMOUNT_CEILING {
        return Err(InputError::TooLarge);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeparatorRule {
    /// `1.234` is one thousand two hundred thirty-four.
    Currency,
    /// `0,125` is one eighth.
    Fractional,
}

fn normalize_number(text: &str, rule: SeparatorRule) -> Result<Decimal, InputError> {
    let cleaned: String = text
        .trim()
        .replace("R$", "")
        .replace("r$", "")
        .replace('$', "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return Err(InputError::Empty);
    }

    let (negative, body) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.as_str()),
    };
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.') {
        return Err(InputError::InvalidNumber);
    }

    let last_comma = body.rfind(',');
    let last_dot = body.rfind('.');
    let plain = match (last_comma, last_dot) {
        (Some(c), Some(d)) => {
            let (decimal, thousands) = if c > d { (',', '.') } else { ('.', ',') };
            let without_groups = body.replace(thousands, "");
            if without_groups.matches(decimal).count() > 1 {
                return Err(InputError::MultipleDecimalPoints);
            }
            without_groups.replace(decimal, ".")
        }
        (Some(_), None) => single_separator(body, ',', rule)?,
        (None, Some(_)) => single_separator(body, '.', rule)?,
        (None, None) => body.to_string(),
    };

    let value = Decimal::from_str(&plain).map_err(|_| InputError::InvalidNumber)?;
    Ok(if negative { -value } else { value })
}

fn single_separator(body: &str, sep: char, rule: SeparatorRule) -> Result<String, InputError> {
    let groups: Vec<&str> = body.split(sep).collect();
    let head = groups[0];
    let tail = &groups[1..];
    let looks_grouped = !head.is_empty()
        && head.len() <= 3
        && tail.iter().all(|g| g.len() == 3);

    if tail.len() == 1 {
        let frac = tail[0];
        if frac.is_empty() || head.is_empty() {
            return Err(InputError::InvalidNumber);
        }
        let as_decimal = format!("{}.{}", head, frac);
        return match rule {
            SeparatorRule::Fractional => Ok(as_decimal),
            SeparatorRule::Currency if frac.len() <= 2 => Ok(as_decimal),
            SeparatorRule::Currency if looks_grouped => Ok(format!("{}{}", head, frac)),
            SeparatorRule::Currency => Err(InputError::InvalidNumber),
        };
    }

    if looks_grouped {
        Ok(groups.concat())
    } else {
        Err(InputError::MultipleDecimalPoints)
    }
}

/// Parse `hoje`, `ontem`, `DD/MM/AAAA`, `DD/MM/AA`, `AAAA-MM-DD`, `DD/MM`
/// or, when the day/month reading is impossible, `MM/DD/AAAA`.
pub fn parse_date(text: &str, today: NaiveDate, allow_future: bool) -> Result<NaiveDate, InputError> {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return Err(InputError::Empty);
    }

    let date = match lowered.as_str() {
        "hoje" | "today" => today,
        "ontem" | "yesterday" => today.pred_opt().ok_or(InputError::InvalidDate)?,
        "anteontem" | "day before yesterday" => today
            .pred_opt()
            .and_then(|d| d.pred_opt())
            .ok_or(InputError::InvalidDate)?,
        _ => parse_numeric_date(&lowered, today.year())?,
    };

    if date > today && !allow_future {
        return Err(InputError::FutureDate);
    }
    let oldest = today
        .checked_sub_months(Months::new(12 * MAX_DATE_AGE_YEARS))
        .ok_or(InputError::InvalidDate)?;
    if date < oldest {
        return Err(InputError::DateTooOld);
    }
    Ok(date)
}

fn parse_numeric_date(text: &str, current_year: i32) -> Result<NaiveDate, InputError> {
    let normalized = text.replace(['-', '.'], "/");
    let parts: Vec<&str> = normalized.split('/').collect();
    if parts.iter().any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit())) {
        return Err(InputError::InvalidDate);
    }
    fn num(s: &str) -> Result<u32, InputError> {
        s.parse::<u32>().map_err(|_| InputError::InvalidDate)
    }

    let date = match parts.as_slice() {
        [y, m, d] if y.len() == 4 => ymd(num(y)? as i32, num(m)?, num(d)?),
        [d, m, y] if y.len() == 4 => {
            let (d, m, y) = (num(d)?, num(m)?, num(y)? as i32);
            ymd(y, m, d).or_else(|| ymd(y, d, m))
        }
        [d, m, y] if y.len() == 2 => ymd(2000 + num(y)? as i32, num(m)?, num(d)?),
        [d, m] => ymd(current_year, num(m)?, num(d)?),
        _ => None,
    };
    date.ok_or(InputError::InvalidDate)
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Uppercased ticker, checked against the generic shape and, when the type
/// is known, against that market's convention.
pub fn validate_ticker(text: &str, kind: Option<InvestmentType>) -> Result<String, InputError> {
    let ticker = text.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(InputError::Empty);
    }
    if !TICKER_RE.is_match(&ticker) {
        return Err(InputError::InvalidTicker);
    }
    if let Some(kind) = kind {
        let re: &Regex = match kind {
            InvestmentType::Stock => &STOCK_RE,
            InvestmentType::Fii | InvestmentType::Etf => &FUND_RE,
            InvestmentType::Crypto => &CRYPTO_RE,
            InvestmentType::FixedIncome => &FIXED_RE,
            InvestmentType::Other => &OTHER_RE,
        };
        if !re.is_match(&ticker) {
            return Err(InputError::TickerFormat(kind));
        }
    }
    Ok(ticker)
}

/// Drop control characters, collapse runs of whitespace, cap the length.
pub fn sanitize(text: &str) -> String {
    let visible: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\t' { ' ' } else { c })
        .filter(|c| !c.is_control())
        .take(MAX_TEXT_CHARS)
        .collect();
    WHITESPACE_RE.replace_all(visible.trim(), " ").into_owned()
}

pub fn validate_text(text: &str, min: usize, max: usize) -> Result<String, InputError> {
    let clean = sanitize(text);
    let len = clean.chars().count();
    if len == 0 && min > 0 {
        return Err(InputError::Empty);
    }
    if len < min {
        return Err(InputError::TooShort(min));
    }
    if len > max {
        return Err(InputError::TooLong(max));
    }
    if clean.contains(['<', '>', '{', '}']) {
        return Err(InputError::ForbiddenCharacters);
    }
    Ok(clean)
}

pub fn validate_category_name(text: &str) -> Result<String, InputError> {
    let name = validate_text(text, 2, 50)?;
    if !CATEGORY_RE.is_match(&name) {
        return Err(InputError::InvalidCategoryName);
    }
    Ok(name)
}
