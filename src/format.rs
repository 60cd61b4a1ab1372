// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

/// `R$ 1.234,56`, with a leading minus for negatives.
pub fn brl(value: &Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{}R$ {}", sign, group_br(&rounded.abs(), 2))
}

/// `12,5%` from a value already expressed in percent.
pub fn percent(value: &Decimal) -> String {
    let rounded = value.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
    format!("{}%", rounded.to_string().replace('.', ","))
}

/// Quantities keep their precision but drop trailing zeros: `0,5`, `100`.
pub fn quantity(value: &Decimal) -> String {
    value.normalize().to_string().replace('.', ",")
}

pub fn date_br(date: &NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

const MONTHS: [&str; 12] = [
    "Janeiro", "Fevereiro", "Março", "Abril", "Maio", "Junho", "Julho", "Agosto", "Setembro",
    "Outubro", "Novembro", "Dezembro",
];

pub fn month_name(month: u32) -> &'static str {
    MONTHS
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("?")
}

fn group_br(value: &Decimal, dp: u32) -> String {
    let fixed = format!("{:.*}", dp as usize, value);
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (fixed.clone(), None),
    };
    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(*c);
    }
    match frac_part {
        Some(f) => format!("{},{}", grouped, f),
        None => grouped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_uses_brazilian_separators() {
        assert_eq!(brl(&Decimal::new(123456, 2)), "R$ 1.234,56");
        assert_eq!(brl(&Decimal::new(5, 0)), "R$ 5,00");
        assert_eq!(brl(&Decimal::new(-100000050, 2)), "-R$ 1.000.000,50");
        assert_eq!(brl(&Decimal::ZERO), "R$ 0,00");
    }

    #[test]
    fn percent_and_quantity() {
        assert_eq!(percent(&Decimal::new(125, 1)), "12,5%");
        assert_eq!(quantity(&Decimal::new(50000000, 8)), "0,5");
        assert_eq!(quantity(&Decimal::from(100)), "100");
    }

    #[test]
    fn dates() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(date_br(&d), "05/03/2024");
        assert_eq!(month_name(3), "Março");
    }
}
