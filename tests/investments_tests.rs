// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use finbot::config::Settings;
use finbot::db::Storage;
use finbot::error::ServiceError;
use finbot::models::{InvestmentType, User};
use finbot::services::investments::{self, Buy, PriceSource, Sell, StaticPrices};
use finbot::services::users::{self, Identity};
use rust_decimal::Decimal;
use std::str::FromStr;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
}

fn setup() -> (Storage, Settings, User) {
    let storage = Storage::open_in_memory().unwrap();
    let settings = Settings::default();
    let user = users::get_or_create_user(&storage, &settings, &Identity::new(100)).unwrap();
    (storage, settings, user)
}

fn order(ticker: &str, kind: InvestmentType, quantity: &str, price: &str) -> Buy {
    Buy {
        ticker: ticker.into(),
        kind,
        quantity: dec(quantity),
        price: dec(price),
        date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
        broker: None,
    }
}

#[test]
fn repeated_buys_average_the_price() {
    let (storage, settings, user) = setup();
    let first = investments::buy(&storage, &settings, user.id, &order("petr4", InvestmentType::Stock, "100", "25"), today())
        .unwrap();
    assert!(!first.merged);
    assert_eq!(first.investment.ticker, "PETR4");

    let second = investments::buy(&storage, &settings, user.id, &order("PETR4", InvestmentType::Stock, "50", "22"), today())
        .unwrap();
    assert!(second.merged);
    assert_eq!(second.investment.id, first.investment.id);
    assert_eq!(second.investment.quantity, dec("150"));
    assert_eq!(second.investment.avg_price, dec("24"));
    assert_eq!(investments::list_investments(&storage, user.id, true).unwrap().len(), 1);
}

#[test]
fn partial_then_full_sale() {
    let (storage, settings, user) = setup();
    let bought = investments::buy(&storage, &settings, user.id, &order("VALE3", InvestmentType::Stock, "100", "24"), today())
        .unwrap()
        .investment;
    let sell = |quantity: &str, price: &str| Sell {
        investment_id: bought.id,
        quantity: dec(quantity),
        price: dec(price),
        date: today(),
    };

    let partial = investments::sell(&storage, user.id, &sell("40", "30"), today()).unwrap();
    assert!(!partial.closed);
    assert_eq!(partial.proceeds, dec("1200"));
    assert_eq!(partial.realized, dec("240"));
    assert_eq!(partial.investment.current_quantity(), dec("60"));
    assert!(partial.investment.sale_price.is_none());

    let too_many = investments::sell(&storage, user.id, &sell("61", "30"), today());
    assert!(matches!(too_many, Err(ServiceError::Validation(_))));

    let rest = investments::sell(&storage, user.id, &sell("60", "20"), today()).unwrap();
    assert!(rest.closed);
    assert_eq!(rest.realized, dec("-240"));
    assert!(!rest.investment.is_active);
    assert_eq!(rest.investment.sale_price, Some(dec("20")));
    assert_eq!(rest.investment.sale_date, Some(today()));

    let closed = investments::sell(&storage, user.id, &sell("1", "20"), today());
    assert!(matches!(closed, Err(ServiceError::Validation(_))));
    assert!(investments::find_active_by_ticker(&storage, user.id, "vale3").unwrap().is_none());

    let reopened = investments::buy(&storage, &settings, user.id, &order("VALE3", InvestmentType::Stock, "10", "25"), today())
        .unwrap();
    assert!(!reopened.merged);
    assert_ne!(reopened.investment.id, bought.id);
    assert_eq!(investments::list_investments(&storage, user.id, false).unwrap().len(), 2);
}

#[test]
fn trades_are_validated() {
    let (storage, settings, user) = setup();
    investments::buy(&storage, &settings, user.id, &order("BOVA11", InvestmentType::Etf, "10", "100"), today())
        .unwrap();
    let other_type = investments::buy(&storage, &settings, user.id, &order("BOVA11", InvestmentType::Fii, "1", "100"), today());
    assert!(matches!(other_type, Err(ServiceError::Validation(_))));

    let bad_ticker = investments::buy(&storage, &settings, user.id, &order("BTC", InvestmentType::Stock, "1", "1"), today());
    assert!(matches!(bad_ticker, Err(ServiceError::Validation(_))));

    let future = Buy {
        date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
        ..order("ITUB4", InvestmentType::Stock, "1", "30")
    };
    assert!(investments::buy(&storage, &settings, user.id, &future, today()).is_err());

    let zero = order("ITUB4", InvestmentType::Stock, "0", "30");
    assert!(investments::buy(&storage, &settings, user.id, &zero, today()).is_err());
}

#[test]
fn positions_are_capped_per_user() {
    let storage = Storage::open_in_memory().unwrap();
    let settings = Settings {
        max_investments_per_user: 1,
        ..Settings::default()
    };
    let user = users::get_or_create_user(&storage, &settings, &Identity::new(5)).unwrap();
    investments::buy(&storage, &settings, user.id, &order("PETR4", InvestmentType::Stock, "1", "30"), today())
        .unwrap();
    investments::buy(&storage, &settings, user.id, &order("PETR4", InvestmentType::Stock, "1", "30"), today())
        .unwrap();
    let second = investments::buy(&storage, &settings, user.id, &order("ITUB4", InvestmentType::Stock, "1", "30"), today());
    assert!(matches!(second, Err(ServiceError::Validation(_))));
}

#[test]
fn positions_belong_to_their_owner() {
    let (storage, settings, user) = setup();
    let other = users::get_or_create_user(&storage, &settings, &Identity::new(200)).unwrap();
    let inv = investments::buy(&storage, &settings, user.id, &order("PETR4", InvestmentType::Stock, "10", "30"), today())
        .unwrap()
        .investment;

    assert!(matches!(
        investments::get_investment(&storage, other.id, inv.id),
        Err(ServiceError::Permission)
    ));
    let steal = Sell {
        investment_id: inv.id,
        quantity: dec("10"),
        price: dec("30"),
        date: today(),
    };
    assert!(matches!(
        investments::sell(&storage, other.id, &steal, today()),
        Err(ServiceError::Permission)
    ));
}

#[test]
fn portfolio_summary_groups_by_type() {
    let (storage, settings, user) = setup();
    for (ticker, kind, qty, price) in [
        ("PETR4", InvestmentType::Stock, "100", "30"),
        ("ITUB4", InvestmentType::Stock, "100", "30"),
        ("MXRF11", InvestmentType::Fii, "400", "10"),
    ] {
        investments::buy(&storage, &settings, user.id, &order(ticker, kind, qty, price), today()).unwrap();
    }

    let at_cost = investments::portfolio_summary(&storage, user.id, None).unwrap();
    assert_eq!(at_cost.total_invested, dec("10000"));
    assert_eq!(at_cost.current_value, dec("10000"));
    assert!(!at_cost.priced);
    assert_eq!(at_cost.asset_count, 3);
    assert_eq!(at_cost.type_count, 2);
    assert_eq!(at_cost.diversification_score, 45);
    assert_eq!(at_cost.by_type[0].kind, InvestmentType::Stock);
    assert_eq!(at_cost.by_type[0].percentage, dec("60"));
    assert_eq!(at_cost.by_type[1].tickers, vec!["MXRF11".to_string()]);

    let prices = StaticPrices::new().with("PETR4", dec("33"));
    let priced = investments::portfolio_summary(&storage, user.id, Some(&prices as &dyn PriceSource))
        .unwrap();
    assert!(priced.priced);
    assert_eq!(priced.current_value, dec("10300"));
    assert_eq!(priced.profit_loss, dec("300"));
    assert_eq!(priced.profit_loss_pct, dec("3"));
}

#[test]
fn buying_after_a_partial_sale_weights_only_held_units() {
    let (storage, settings, user) = setup();
    let bought = investments::buy(&storage, &settings, user.id, &order("PETR4", InvestmentType::Stock, "100", "10"), today())
        .unwrap()
        .investment;
    let half = Sell {
        investment_id: bought.id,
        quantity: dec("50"),
        price: dec("12"),
        date: today(),
    };
    investments::sell(&storage, user.id, &half, today()).unwrap();

    let rebuy = investments::buy(&storage, &settings, user.id, &order("PETR4", InvestmentType::Stock, "50", "20"), today())
        .unwrap();
    assert!(rebuy.merged);
    let inv = rebuy.investment;
    assert_eq!(inv.current_quantity(), dec("100"));
    assert_eq!(inv.avg_price, dec("15"));
    assert_eq!(inv.open_cost(), dec("1500"));
}

#[test]
fn partial_sale_keeps_the_portfolio_on_one_quantity_basis() {
    let (storage, settings, user) = setup();
    let bought = investments::buy(&storage, &settings, user.id, &order("PETR4", InvestmentType::Stock, "100", "10"), today())
        .unwrap()
        .investment;
    let half = Sell {
        investment_id: bought.id,
        quantity: dec("50"),
        price: dec("10"),
        date: today(),
    };
    investments::sell(&storage, user.id, &half, today()).unwrap();

    let at_cost = investments::portfolio_summary(&storage, user.id, None).unwrap();
    assert_eq!(at_cost.total_invested, dec("500"));
    assert_eq!(at_cost.current_value, dec("500"));
    assert!(at_cost.profit_loss.is_zero());

    let prices = StaticPrices::new().with("PETR4", dec("10"));
    let quoted = investments::portfolio_summary(&storage, user.id, Some(&prices as &dyn PriceSource))
        .unwrap();
    assert_eq!(quoted.total_invested, dec("500"));
    assert_eq!(quoted.current_value, dec("500"));
    assert!(quoted.profit_loss.is_zero());
}
