// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use finbot::config::Settings;
use finbot::db::Storage;
use finbot::error::ServiceError;
use finbot::models::{Category, PaymentMethod, TransactionType, User};
use finbot::services::categories::{
    self, CategoryFilter, CategoryRemoval, CategoryUpdate, NewCategory,
};
use finbot::services::transactions::{self, NewTransaction, TransactionFilter};
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

fn category(storage: &Storage, user: &User, kind: TransactionType, name: &str) -> Category {
    categories::find_by_name(storage, user.id, kind, name)
        .unwrap()
        .unwrap()
}

fn expense(category_id: i64, amount: &str, day: u32) -> NewTransaction {
    NewTransaction {
        category_id,
        amount: dec(amount),
        kind: TransactionType::Expense,
        description: "Mercado".into(),
        payment_method: PaymentMethod::Pix,
        date: NaiveDate::from_ymd_opt(2025, 6, day).unwrap(),
        notes: None,
        tags: None,
        is_recurring: false,
    }
}

#[test]
fn new_users_get_the_default_categories() {
    let (storage, _, user) = setup();
    let all = categories::list_categories(&storage, user.id, CategoryFilter::default()).unwrap();
    assert_eq!(all.len(), categories::DEFAULT_CATEGORIES.len());
    assert!(all.iter().all(|c| c.is_system));

    let food = category(&storage, &user, TransactionType::Expense, "alimentação");
    assert_eq!(food.name, "Alimentação");
    let by_label = category(&storage, &user, TransactionType::Expense, &food.display());
    assert_eq!(by_label.id, food.id);
}

#[test]
fn category_kind_must_match_transaction_kind() {
    let (storage, settings, user) = setup();
    let food = categories::create_category(
        &storage,
        &settings,
        user.id,
        &NewCategory {
            name: "Food".into(),
            kind: TransactionType::Expense,
            icon: None,
            description: None,
        },
    )
    .unwrap();

    let income = NewTransaction {
        kind: TransactionType::Income,
        payment_method: PaymentMethod::Salary,
        ..expense(food.id, "100", 10)
    };
    let err = transactions::create_transaction(&storage, &settings, user.id, &income, today())
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let filter = TransactionFilter::default();
    assert_eq!(transactions::count_transactions(&storage, user.id, &filter).unwrap(), 0);
}

#[test]
fn transactions_are_validated_before_insert() {
    let (storage, settings, user) = setup();
    let food = category(&storage, &user, TransactionType::Expense, "Alimentação");

    let future = expense(food.id, "10", 20);
    assert!(matches!(
        transactions::create_transaction(&storage, &settings, user.id, &future, today()),
        Err(ServiceError::Validation(_))
    ));

    let salary_payment = NewTransaction {
        payment_method: PaymentMethod::Salary,
        ..expense(food.id, "10", 1)
    };
    assert!(transactions::create_transaction(&storage, &settings, user.id, &salary_payment, today()).is_err());

    let too_big = expense(food.id, "2000000", 1);
    assert!(transactions::create_transaction(&storage, &settings, user.id, &too_big, today()).is_err());

    let blank = NewTransaction {
        description: "   ".into(),
        ..expense(food.id, "10", 1)
    };
    assert!(transactions::create_transaction(&storage, &settings, user.id, &blank, today()).is_err());
}

#[test]
fn list_is_newest_first_and_paginated() {
    let (storage, settings, user) = setup();
    let food = category(&storage, &user, TransactionType::Expense, "Alimentação");
    for day in 1..=7 {
        transactions::create_transaction(&storage, &settings, user.id, &expense(food.id, "10", day), today())
            .unwrap();
    }

    let first = TransactionFilter {
        limit: Some(5),
        ..TransactionFilter::default()
    };
    let page = transactions::list_transactions(&storage, &settings, user.id, &first).unwrap();
    assert_eq!(page.len(), 5);
    assert_eq!(page[0].transaction.date, NaiveDate::from_ymd_opt(2025, 6, 7).unwrap());
    assert_eq!(page[0].category, "🍽️ Alimentação");

    let second = TransactionFilter {
        offset: 5,
        ..first.clone()
    };
    let rest = transactions::list_transactions(&storage, &settings, user.id, &second).unwrap();
    assert_eq!(rest.len(), 2);
    assert_eq!(rest[1].transaction.date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());

    let window = TransactionFilter {
        start: NaiveDate::from_ymd_opt(2025, 6, 3),
        end: NaiveDate::from_ymd_opt(2025, 6, 5),
        ..TransactionFilter::default()
    };
    assert_eq!(transactions::count_transactions(&storage, user.id, &window).unwrap(), 2);
}

#[test]
fn other_users_cannot_see_or_delete() {
    let (storage, settings, user) = setup();
    let intruder = users::get_or_create_user(&storage, &settings, &Identity::new(200)).unwrap();
    let food = category(&storage, &user, TransactionType::Expense, "Alimentação");
    let t = transactions::create_transaction(&storage, &settings, user.id, &expense(food.id, "42", 2), today())
        .unwrap();

    assert!(matches!(
        transactions::get_transaction(&storage, intruder.id, t.id),
        Err(ServiceError::Permission)
    ));
    assert!(matches!(
        transactions::delete_transaction(&storage, intruder.id, t.id),
        Err(ServiceError::Permission)
    ));
    let foreign = expense(food.id, "1", 2);
    assert!(matches!(
        transactions::create_transaction(&storage, &settings, intruder.id, &foreign, today()),
        Err(ServiceError::Permission)
    ));

    let removed = transactions::delete_transaction(&storage, user.id, t.id).unwrap();
    assert_eq!(removed.amount, dec("42"));
    assert!(matches!(
        transactions::get_transaction(&storage, user.id, t.id),
        Err(ServiceError::NotFound(_))
    ));
}

#[test]
fn new_category_and_transaction_commit_together() {
    let (storage, settings, user) = setup();
    let new_category = NewCategory {
        name: "Academia".into(),
        kind: TransactionType::Expense,
        icon: None,
        description: None,
    };

    let rejected = expense(0, "10", 30);
    assert!(
        transactions::create_with_new_category(&storage, &settings, user.id, &new_category, &rejected, today())
            .is_err()
    );
    assert!(
        categories::find_by_name(&storage, user.id, TransactionType::Expense, "Academia")
            .unwrap()
            .is_none()
    );

    let (cat, t) = transactions::create_with_new_category(
        &storage,
        &settings,
        user.id,
        &new_category,
        &expense(0, "99.90", 5),
        today(),
    )
    .unwrap();
    assert_eq!(t.category_id, cat.id);
    assert!(!cat.is_system);
}

#[test]
fn custom_categories_are_capped_and_unique() {
    let storage = Storage::open_in_memory().unwrap();
    let settings = Settings {
        max_categories_per_user: 2,
        ..Settings::default()
    };
    let user = users::get_or_create_user(&storage, &settings, &Identity::new(1)).unwrap();
    let new = |name: &str| NewCategory {
        name: name.into(),
        kind: TransactionType::Expense,
        icon: None,
        description: None,
    };

    categories::create_category(&storage, &settings, user.id, &new("Uber")).unwrap();
    let dup = categories::create_category(&storage, &settings, user.id, &new("uber"));
    assert!(matches!(dup, Err(ServiceError::Validation(_))));
    categories::create_category(&storage, &settings, user.id, &new("Café")).unwrap();
    let over = categories::create_category(&storage, &settings, user.id, &new("Bar"));
    assert!(matches!(over, Err(ServiceError::Validation(_))));
}

#[test]
fn used_categories_are_deactivated_not_deleted() {
    let (storage, settings, user) = setup();
    let new = |name: &str| NewCategory {
        name: name.into(),
        kind: TransactionType::Expense,
        icon: Some("🏋️".into()),
        description: None,
    };
    let gym = categories::create_category(&storage, &settings, user.id, &new("Academia")).unwrap();
    let unused = categories::create_category(&storage, &settings, user.id, &new("Cinema")).unwrap();
    transactions::create_transaction(&storage, &settings, user.id, &expense(gym.id, "120", 3), today())
        .unwrap();

    assert_eq!(
        categories::delete_category(&storage, user.id, gym.id).unwrap(),
        CategoryRemoval::Deactivated
    );
    assert!(!categories::get_category(&storage, user.id, gym.id).unwrap().is_active);
    assert_eq!(
        categories::delete_category(&storage, user.id, unused.id).unwrap(),
        CategoryRemoval::Deleted
    );

    let again = transactions::create_transaction(&storage, &settings, user.id, &expense(gym.id, "1", 4), today());
    assert!(matches!(again, Err(ServiceError::Validation(_))));

    let system = category(&storage, &user, TransactionType::Expense, "Lazer");
    assert!(categories::delete_category(&storage, user.id, system.id).is_err());
    let rename = CategoryUpdate {
        name: Some("Diversão".into()),
        ..CategoryUpdate::default()
    };
    assert!(categories::update_category(&storage, user.id, system.id, &rename).is_err());
}

#[test]
fn accented_names_are_unique_regardless_of_case() {
    let (storage, settings, user) = setup();
    let new = |name: &str| NewCategory {
        name: name.into(),
        kind: TransactionType::Expense,
        icon: None,
        description: None,
    };

    let dup = categories::create_category(&storage, &settings, user.id, &new("SAÚDE"));
    assert!(matches!(dup, Err(ServiceError::Validation(_))));

    let pharmacy = categories::create_category(&storage, &settings, user.id, &new("Farmácia")).unwrap();
    let dup = categories::create_category(&storage, &settings, user.id, &new("FARMÁCIA"));
    assert!(matches!(dup, Err(ServiceError::Validation(_))));

    let rename = CategoryUpdate {
        name: Some("EDUCAÇÃO".into()),
        ..CategoryUpdate::default()
    };
    let clash = categories::update_category(&storage, user.id, pharmacy.id, &rename);
    assert!(matches!(clash, Err(ServiceError::Validation(_))));
}

#[test]
fn recreating_a_deactivated_category_brings_it_back() {
    let (storage, settings, user) = setup();
    let new = |name: &str| NewCategory {
        name: name.into(),
        kind: TransactionType::Expense,
        icon: Some("🛒".into()),
        description: None,
    };
    let market = categories::create_category(&storage, &settings, user.id, &new("Mercado")).unwrap();
    transactions::create_transaction(&storage, &settings, user.id, &expense(market.id, "80", 5), today())
        .unwrap();
    assert_eq!(
        categories::delete_category(&storage, user.id, market.id).unwrap(),
        CategoryRemoval::Deactivated
    );

    let back = categories::create_category(&storage, &settings, user.id, &new("mercado")).unwrap();
    assert_eq!(back.id, market.id);
    assert!(back.is_active);
    assert_eq!(back.name, "mercado");

    transactions::create_transaction(&storage, &settings, user.id, &expense(back.id, "20", 6), today())
        .unwrap();
    let filter = TransactionFilter::default();
    assert_eq!(transactions::count_transactions(&storage, user.id, &filter).unwrap(), 2);
}

#[test]
fn expense_cannot_use_an_income_category() {
    let (storage, settings, user) = setup();
    let salary = category(&storage, &user, TransactionType::Income, "Salário");

    let err = transactions::create_transaction(&storage, &settings, user.id, &expense(salary.id, "50", 10), today())
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let filter = TransactionFilter::default();
    assert_eq!(transactions::count_transactions(&storage, user.id, &filter).unwrap(), 0);
}
