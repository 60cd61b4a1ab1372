// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, Duration, TimeZone, Utc};
use finbot::bot::keyboard::Keyboard;
use finbot::bot::messages as msg;
use finbot::bot::state::State;
use finbot::bot::{Bot, Inbound, Reply};
use finbot::config::Settings;
use finbot::db::Storage;
use finbot::models::{TransactionType, User};
use finbot::services::investments;
use finbot::services::transactions::{self, TransactionFilter};
use finbot::services::users::{self, Identity};
use finbot::transport::console;
use rust_decimal::Decimal;
use std::io::Cursor;
use std::str::FromStr;

const CHAT: i64 = 500;
const USER: i64 = 42;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// 12:00 in São Paulo.
fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, 15, 0, 0).unwrap()
}

fn ana() -> Identity {
    Identity {
        external_id: USER,
        first_name: Some("Ana".into()),
        ..Identity::default()
    }
}

struct Chat {
    bot: Bot,
    now: DateTime<Utc>,
}

impl Chat {
    fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    fn with_settings(settings: Settings) -> Self {
        let bot = Bot::new(Storage::open_in_memory().unwrap(), settings);
        Self { bot, now: noon() }
    }

    fn say(&self, text: &str) -> Vec<Reply> {
        self.bot.handle_at(&Inbound::text(CHAT, ana(), text), self.now)
    }

    fn press(&self, data: &str) -> Vec<Reply> {
        self.bot.handle_at(&Inbound::callback(CHAT, ana(), data), self.now)
    }

    /// Text of the only reply.
    fn say_one(&self, text: &str) -> String {
        let replies = self.say(text);
        assert_eq!(replies.len(), 1, "{:?}", replies);
        replies[0].text.clone()
    }

    fn state(&self) -> State {
        self.bot.sessions().get((CHAT, USER)).unwrap().state
    }

    fn user(&self) -> User {
        users::find_by_external_id(self.bot.storage(), USER)
            .unwrap()
            .unwrap()
    }
}

fn reply_labels(reply: &Reply) -> Vec<String> {
    match &reply.keyboard {
        Some(Keyboard::Reply(rows)) => rows.iter().flatten().cloned().collect(),
        _ => Vec::new(),
    }
}

#[test]
fn start_greets_by_name_with_the_main_menu() {
    let chat = Chat::new();
    let replies = chat.say("/start");
    assert_eq!(replies.len(), 1);
    assert!(replies[0].text.starts_with("👋 Olá, Ana!"), "{}", replies[0].text);
    let labels = reply_labels(&replies[0]);
    for button in [msg::BTN_FINANCE, msg::BTN_INVESTMENTS, msg::BTN_REPORTS, msg::BTN_SETTINGS] {
        assert!(labels.iter().any(|l| l == button), "{} missing", button);
    }
    assert_eq!(chat.state(), State::MainMenu);
}

#[test]
fn expense_wizard_records_a_transaction() {
    let chat = Chat::new();
    chat.say("/start");
    assert_eq!(chat.say_one(msg::BTN_FINANCE), msg::FINANCE_MENU);
    assert_eq!(chat.say_one(msg::BTN_NEW_TRANSACTION), msg::ASK_TRANSACTION_TYPE);

    assert!(chat.say_one("💸 Despesa").ends_with(msg::ASK_AMOUNT));
    assert_eq!(chat.state(), State::TransactionAmount);

    let rejected = chat.say_one("abc");
    assert!(rejected.starts_with("❌ "), "{}", rejected);
    assert_eq!(chat.state(), State::TransactionAmount);

    assert_eq!(chat.say_one("1.234,56"), msg::ASK_DESCRIPTION);
    assert_eq!(chat.say_one("Supermercado"), msg::ASK_PAYMENT_METHOD);
    assert_eq!(chat.say_one("📱 PIX"), msg::ASK_DATE);

    let future = chat.say_one("31/12/2030");
    assert!(future.starts_with("❌ "), "{}", future);
    assert_eq!(chat.state(), State::TransactionDate);

    let ask = chat.say(msg::BTN_TODAY);
    assert_eq!(ask[0].text, msg::ASK_CATEGORY);
    let labels = reply_labels(&ask[0]);
    assert!(labels.iter().any(|l| l == "🍽️ Alimentação"));
    assert!(labels.iter().any(|l| l == msg::BTN_NEW_CATEGORY));

    let done = chat.say_one("🍽️ Alimentação");
    assert!(done.starts_with("✅ Lançamento registrado!"), "{}", done);
    assert!(done.contains("R$ 1.234,56"), "{}", done);
    assert_eq!(chat.state(), State::FinanceMenu);

    let user = chat.user();
    let listed = transactions::list_transactions(
        chat.bot.storage(),
        chat.bot.settings(),
        user.id,
        &TransactionFilter::default(),
    )
    .unwrap();
    assert_eq!(listed.len(), 1);
    let t = &listed[0].transaction;
    assert_eq!(t.amount, dec("1234.56"));
    assert_eq!(t.kind, TransactionType::Expense);
    assert_eq!(t.description, "Supermercado");
    assert_eq!(t.date, noon().date_naive());
    assert_eq!(listed[0].category, "Alimentação");
}

#[test]
fn income_wizard_can_create_its_category() {
    let chat = Chat::new();
    chat.say("/start");
    chat.say(msg::BTN_FINANCE);
    assert!(chat.press("tx:type:income")[0].text.ends_with(msg::ASK_AMOUNT));
    chat.say("5000");
    chat.say("Projeto");
    chat.say("💻 Freelance");
    chat.say("ontem");
    assert_eq!(chat.say_one(msg::BTN_NEW_CATEGORY), msg::ASK_CATEGORY_NAME);

    let done = chat.say_one("Consultoria");
    assert!(done.contains("Consultoria"), "{}", done);
    let user = chat.user();
    let listed = transactions::list_transactions(
        chat.bot.storage(),
        chat.bot.settings(),
        user.id,
        &TransactionFilter::default(),
    )
    .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].transaction.kind, TransactionType::Income);
    assert_eq!(listed[0].transaction.date.to_string(), "2025-06-14");
}

#[test]
fn cancel_drops_the_draft_and_returns_to_the_menu() {
    let chat = Chat::new();
    chat.say("/start");
    chat.say(msg::BTN_FINANCE);
    chat.say(msg::BTN_NEW_TRANSACTION);
    chat.say("despesa");
    chat.say("10");

    let text = chat.say_one(msg::BTN_CANCEL);
    assert!(text.starts_with(msg::CANCELLED));
    assert_eq!(chat.state(), State::FinanceMenu);
    let session = chat.bot.sessions().get((CHAT, USER)).unwrap();
    assert_eq!(session.draft.transaction.amount, None);

    chat.say(msg::BTN_NEW_TRANSACTION);
    chat.say("despesa");
    assert!(chat.say_one("/cancel").starts_with(msg::CANCELLED));
    let user = chat.user();
    let count =
        transactions::count_transactions(chat.bot.storage(), user.id, &TransactionFilter::default())
            .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn buying_twice_averages_and_selling_everything_closes() {
    let chat = Chat::new();
    chat.say("/start");
    assert_eq!(chat.say_one(msg::BTN_INVESTMENTS), msg::INVESTMENT_MENU);

    chat.say(msg::BTN_BUY);
    chat.say("📊 Ações");
    chat.say("petr4");
    chat.say("100");
    let confirm = chat.say("25");
    assert!(confirm[0].text.starts_with("Confirmar compra?"));
    assert!(confirm[0].text.contains("PETR4"));
    assert_eq!(chat.state(), State::BuyConfirm);
    let bought = chat.press("yes");
    assert!(bought[0].text.starts_with("✅ Compra registrada!"), "{}", bought[0].text);
    assert_eq!(chat.state(), State::InvestmentMenu);

    chat.say(msg::BTN_BUY);
    chat.say("stock");
    let held = chat.say_one("PETR4");
    assert!(held.contains("A compra será somada"), "{}", held);
    chat.say("50");
    chat.say("22");
    let merged = chat.say_one("sim");
    assert!(merged.contains("Posição somada"), "{}", merged);

    let user = chat.user();
    let position = investments::find_active_by_ticker(chat.bot.storage(), user.id, "PETR4")
        .unwrap()
        .unwrap();
    assert_eq!(position.current_quantity(), dec("150"));
    assert_eq!(position.avg_price, dec("24"));

    let portfolio = chat.say(msg::BTN_PORTFOLIO);
    assert!(portfolio[0].text.contains("PETR4"));
    let sell_button = portfolio[0]
        .keyboard
        .as_ref()
        .unwrap()
        .callbacks()
        .into_iter()
        .find(|b| b.text.starts_with('➖'))
        .unwrap()
        .data
        .clone();
    assert_eq!(sell_button, format!("inv:sell:{}", position.id));

    chat.press(&sell_button);
    assert_eq!(chat.state(), State::SellQuantity);
    let too_many = chat.say_one("151");
    assert!(too_many.starts_with("❌ "));
    assert_eq!(chat.state(), State::SellQuantity);
    assert_eq!(chat.say_one("tudo"), msg::ASK_PRICE);
    chat.say("30");
    assert_eq!(chat.state(), State::SellConfirm);
    let sold = chat.press("yes");
    let text = &sold[0].text;
    assert!(text.starts_with("✅ Venda registrada!"), "{}", text);
    assert!(text.contains("R$ 4.500,00"), "{}", text);
    assert!(text.contains("📈 Lucro: R$ 900,00"), "{}", text);
    assert!(text.contains("encerrada"), "{}", text);

    assert!(investments::find_active_by_ticker(chat.bot.storage(), user.id, "PETR4")
        .unwrap()
        .is_none());
    assert_eq!(chat.say_one(msg::BTN_SELL), msg::NO_POSITIONS);
}

#[test]
fn portfolio_uses_the_configured_quotes() {
    let bot = Bot::new(Storage::open_in_memory().unwrap(), Settings::default())
        .with_prices(investments::StaticPrices::new().with("ITSA4", dec("12")));
    let chat = Chat { bot, now: noon() };
    chat.say("/start");
    chat.say(msg::BTN_INVESTMENTS);
    chat.say(msg::BTN_BUY);
    chat.say("stock");
    chat.say("ITSA4");
    chat.say("100");
    chat.say("10");
    chat.say("sim");

    let text = chat.say(msg::BTN_PORTFOLIO)[0].text.clone();
    assert!(text.contains("Investido: R$ 1.000,00"), "{}", text);
    assert!(text.contains("Valor atual: R$ 1.200,00"), "{}", text);
    assert!(text.contains("Resultado: R$ 200,00"), "{}", text);
}

#[test]
fn oversized_trade_is_caught_at_the_price_step() {
    let chat = Chat::new();
    chat.say("/start");
    chat.say(msg::BTN_INVESTMENTS);
    chat.say(msg::BTN_BUY);
    chat.say("stock");
    chat.say("VALE3");
    chat.say("1000000");

    let refused = chat.say_one("20");
    assert!(refused.starts_with("❌ "), "{}", refused);
    assert!(refused.contains("R$ 10.000.000,00"), "{}", refused);
    assert_eq!(chat.state(), State::BuyPrice);

    let confirm = chat.say("5");
    assert!(confirm[0].text.starts_with("Confirmar compra?"));
    assert_eq!(chat.state(), State::BuyConfirm);
}

#[test]
fn stale_and_unknown_callbacks_are_harmless() {
    let chat = Chat::new();
    chat.say("/start");

    let stale = chat.press("yes");
    assert_eq!(stale[0].text, msg::ACTION_EXPIRED);
    assert_eq!(chat.state(), State::MainMenu);

    chat.say(msg::BTN_FINANCE);
    let unknown = chat.press("edit_transaction_5");
    assert_eq!(unknown[0].text, msg::MAIN_MENU);
    assert_eq!(chat.state(), State::MainMenu);

    let missing = chat.press("tx:del_ok:999");
    assert_eq!(missing[0].text, msg::NOT_FOUND);
}

#[test]
fn transactions_of_other_users_stay_hidden() {
    let chat = Chat::new();
    chat.say("/start");
    let storage = chat.bot.storage();
    let settings = chat.bot.settings();
    let owner = users::get_or_create_user(storage, settings, &Identity::new(7)).unwrap();
    let food = finbot::services::categories::find_by_name(
        storage,
        owner.id,
        TransactionType::Expense,
        "Alimentação",
    )
    .unwrap()
    .unwrap();
    let theirs = transactions::create_transaction(
        storage,
        settings,
        owner.id,
        &transactions::NewTransaction {
            category_id: food.id,
            amount: dec("80"),
            kind: TransactionType::Expense,
            description: "Feira".into(),
            payment_method: finbot::models::PaymentMethod::Cash,
            date: noon().date_naive(),
            notes: None,
            tags: None,
            is_recurring: false,
        },
        noon().date_naive(),
    )
    .unwrap();

    let replies = chat.press(&format!("tx:del_ok:{}", theirs.id));
    assert_eq!(replies[0].text, msg::NOT_FOUND);
    assert!(transactions::get_transaction(storage, owner.id, theirs.id).is_ok());
}

#[test]
fn listing_pages_through_transactions() {
    let chat = Chat::new();
    chat.say("/start");
    chat.say(msg::BTN_FINANCE);
    for i in 1..=6 {
        chat.say(msg::BTN_NEW_TRANSACTION);
        chat.say("despesa");
        chat.say(&i.to_string());
        chat.say("Café");
        chat.say("cash");
        chat.say(msg::BTN_TODAY);
        chat.say("Alimentação");
    }

    let first = chat.say(msg::BTN_TRANSACTIONS);
    assert!(first[0].text.contains("página 1/2"), "{}", first[0].text);
    let buttons = first[0].keyboard.as_ref().unwrap().callbacks();
    assert!(buttons.iter().any(|b| b.data == "tx:page:2"));

    let second = chat.press("tx:page:2");
    assert!(second[0].text.contains("página 2/2"), "{}", second[0].text);
    let delete = second[0]
        .keyboard
        .as_ref()
        .unwrap()
        .callbacks()
        .into_iter()
        .find(|b| b.data.starts_with("tx:del:"))
        .unwrap()
        .data
        .replace("tx:del:", "tx:del_ok:");
    let removed = chat.press(&delete);
    assert!(removed[0].text.starts_with("🗑️ Lançamento excluído"), "{}", removed[0].text);

    let user = chat.user();
    let count =
        transactions::count_transactions(chat.bot.storage(), user.id, &TransactionFilter::default())
            .unwrap();
    assert_eq!(count, 5);
}

#[test]
fn idle_sessions_expire_with_a_notice() {
    let mut chat = Chat::new();
    chat.say("/start");
    chat.say(msg::BTN_FINANCE);
    chat.say(msg::BTN_NEW_TRANSACTION);

    chat.now = noon() + Duration::minutes(31);
    assert_eq!(chat.say_one("despesa"), msg::SESSION_EXPIRED);
    assert_eq!(chat.state(), State::MainMenu);

    // The notice refreshed the session; the next message is handled normally.
    assert_eq!(chat.say_one(msg::BTN_FINANCE), msg::FINANCE_MENU);
}

#[test]
fn swept_sessions_still_get_the_expiry_notice() {
    let mut chat = Chat::new();
    chat.say("/start");
    chat.say(msg::BTN_FINANCE);
    chat.say(msg::BTN_NEW_TRANSACTION);

    chat.now = noon() + Duration::minutes(45);
    assert_eq!(chat.bot.sweep_sessions(chat.now), 1);
    assert!(chat.bot.sessions().is_empty());

    assert_eq!(chat.say_one("despesa"), msg::SESSION_EXPIRED);
    assert_eq!(chat.state(), State::MainMenu);
    assert_eq!(chat.say_one(msg::BTN_FINANCE), msg::FINANCE_MENU);
}

#[test]
fn start_after_expiry_greets_instead_of_warning() {
    let mut chat = Chat::new();
    chat.say("/start");
    chat.now = noon() + Duration::hours(2);
    assert!(chat.say_one("/start").starts_with("👋 Olá, Ana!"));
    assert_eq!(chat.bot.sweep_sessions(noon() + Duration::hours(3)), 1);
    assert!(chat.bot.sessions().is_empty());
}

#[test]
fn users_outside_the_allow_list_are_turned_away() {
    let settings = Settings {
        allowed_users: vec![1],
        ..Settings::default()
    };
    let chat = Chat::with_settings(settings);
    assert_eq!(chat.say_one("/start"), msg::NOT_AUTHORIZED);
    assert!(users::find_by_external_id(chat.bot.storage(), USER).unwrap().is_none());
}

#[test]
fn income_is_set_from_the_profile_screen() {
    let chat = Chat::new();
    chat.say("/start");
    chat.say(msg::BTN_SETTINGS);
    assert_eq!(chat.press("set:income")[0].text, msg::ASK_INCOME);
    assert_eq!(chat.state(), State::SettingsIncome);
    let text = chat.say_one("5.000");
    assert!(text.contains("R$ 5.000,00"), "{}", text);
    assert_eq!(chat.user().monthly_income, Some(dec("5000")));

    chat.press("set:income");
    chat.say("0");
    assert_eq!(chat.user().monthly_income, None);
}

#[test]
fn export_callback_returns_a_document() {
    let chat = Chat::new();
    chat.say("/start");
    chat.say(msg::BTN_SETTINGS);
    let offer = chat.say(msg::BTN_EXPORT);
    let formats: Vec<String> = offer[0]
        .keyboard
        .as_ref()
        .unwrap()
        .callbacks()
        .into_iter()
        .map(|b| b.data.clone())
        .collect();
    assert_eq!(formats, vec!["export:csv", "export:json"]);

    let replies = chat.press("export:csv");
    let doc = replies[0].document.as_ref().unwrap();
    assert!(doc.filename.ends_with(".csv"), "{}", doc.filename);
    assert!(!doc.bytes.is_empty());
    assert_eq!(chat.state(), State::SettingsMenu);
}

#[test]
fn console_session_presses_inline_buttons_by_number() {
    let bot = Bot::new(Storage::open_in_memory().unwrap(), Settings::default());
    let dir = tempfile::tempdir().unwrap();
    let script = format!(
        "{}\n{}\n#2\n#9\n/sair\n{}\n",
        msg::BTN_FINANCE,
        msg::BTN_TRANSACTIONS,
        msg::BTN_HELP
    );
    let mut out = Vec::new();
    console::run(&bot, ana(), Cursor::new(script), &mut out, dir.path()).unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("👋 Olá, Ana!"));
    assert!(text.contains("#1 💰 Registrar receita"));
    assert!(text.contains(msg::ASK_AMOUNT));
    assert!(text.contains("(não há botão #9)"));
    assert!(!text.contains(msg::HELP), "input after /sair must be ignored");
    assert_eq!(
        bot.sessions().get((USER, USER)).unwrap().state,
        State::TransactionAmount
    );
}
