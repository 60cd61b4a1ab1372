// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

mod finance;
mod investment;
mod menu;
mod settings;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, error, warn};

use crate::bot::callback::CallbackAction;
use crate::bot::keyboard::Keyboard;
use crate::bot::messages as msg;
use crate::bot::session::Session;
use crate::bot::state::{Menu, State};
use crate::bot::{Input, Reply};
use crate::config::Settings;
use crate::db::Storage;
use crate::error::{Result, ServiceError};
use crate::models::{TransactionType, User};
use crate::services::investments::PriceSource;

/// Everything a handler may touch for one event.
pub struct Ctx<'a> {
    pub storage: &'a Storage,
    pub settings: &'a Settings,
    pub prices: Option<&'a dyn PriceSource>,
    pub user: User,
    /// Calendar day in the user's timezone.
    pub today: NaiveDate,
    pub now: DateTime<Utc>,
}

/// `"/start@finbot arg"` -> `Some("start")`.
pub(crate) fn command(text: &str) -> Option<&str> {
    let word = text.trim().strip_prefix('/')?.split_whitespace().next()?;
    Some(word.split('@').next().unwrap_or(word))
}

fn menu_text(menu: Menu) -> &'static str {
    match menu {
        Menu::Main => msg::MAIN_MENU,
        Menu::Finance => msg::FINANCE_MENU,
        Menu::Investment => msg::INVESTMENT_MENU,
        Menu::Settings => msg::SETTINGS_MENU,
    }
}

pub(crate) fn menu_reply(menu: Menu) -> Reply {
    Reply::text(menu_text(menu)).with_keyboard(Keyboard::menu(menu))
}

/// `text` followed by the menu keyboard.
pub(crate) fn menu_reply_with(text: &str, menu: Menu) -> Reply {
    Reply::text(text).with_keyboard(Keyboard::menu(menu))
}

fn go_to(session: &mut Session, menu: Menu) -> Vec<Reply> {
    session.reset(menu.state());
    vec![menu_reply(menu)]
}

fn cancel(session: &mut Session) -> Vec<Reply> {
    let menu = session.state.owning_menu();
    session.reset(menu.state());
    vec![menu_reply_with(
        &format!("{}\n\n{}", msg::CANCELLED, menu_text(menu)),
        menu,
    )]
}

fn unknown_option(session: &Session) -> Vec<Reply> {
    let menu = session.state.owning_menu();
    vec![menu_reply_with(msg::UNKNOWN_OPTION, menu)]
}

/// Accepts the button label or the plain word.
pub(crate) fn parse_kind(text: &str) -> Result<TransactionType> {
    let wanted = text.trim().to_lowercase();
    TransactionType::ALL
        .iter()
        .copied()
        .find(|k| {
            k.label().to_lowercase() == wanted
                || k.as_str() == wanted
                || k.label().to_lowercase().ends_with(&format!(" {}", wanted))
        })
        .ok_or_else(|| ServiceError::validation("Escolha Receita ou Despesa"))
}

pub(crate) fn kind_choices() -> Keyboard {
    let labels: Vec<&str> = TransactionType::ALL.iter().map(|k| k.label()).collect();
    Keyboard::choices(&labels, 2)
}

/// Run one event against the session. Failures are turned into replies here;
/// nothing below this point talks to the user about errors.
pub(crate) fn route(ctx: &Ctx<'_>, session: &mut Session, input: &Input) -> Vec<Reply> {
    let snapshot = session.clone();
    let outcome = match input {
        Input::Text(text) => on_text(ctx, session, text.trim()),
        Input::Callback(data) => on_callback(ctx, session, data),
    };
    match outcome {
        Ok(replies) => replies,
        Err(e) => recover(ctx, session, snapshot, e),
    }
}

fn recover(ctx: &Ctx<'_>, session: &mut Session, snapshot: Session, err: ServiceError) -> Vec<Reply> {
    let user_id = ctx.user.id;
    let menu = snapshot.state.owning_menu();
    match err {
        ServiceError::Validation(reason) => {
            debug!(user_id, state = ?snapshot.state, %reason, "input rejected");
            *session = snapshot;
            vec![Reply::text(format!("❌ {}", reason))]
        }
        ServiceError::Permission | ServiceError::NotFound(_) => {
            debug!(user_id, error = %err, "record not visible to user");
            session.reset(menu.state());
            vec![menu_reply_with(msg::NOT_FOUND, menu)]
        }
        ServiceError::Storage(ref e) => {
            error!(user_id, state = ?snapshot.state, error = %e, "storage failure");
            session.reset(menu.state());
            vec![menu_reply_with(msg::TRY_AGAIN_LATER, menu)]
        }
        ServiceError::Invariant(ref detail) => {
            error!(user_id, state = ?snapshot.state, %detail, "invariant violated");
            session.reset(menu.state());
            vec![menu_reply_with(msg::GENERIC_FAILURE, menu)]
        }
    }
}

fn on_text(ctx: &Ctx<'_>, session: &mut Session, text: &str) -> Result<Vec<Reply>> {
    if let Some(cmd) = command(text) {
        return Ok(match cmd {
            "start" => menu::start(ctx, session),
            "cancel" => cancel(session),
            "help" | "ajuda" => vec![Reply::text(msg::HELP)],
            "menu" => {
                let menu = session.state.owning_menu();
                go_to(session, menu)
            }
            _ => unknown_option(session),
        });
    }
    if text == msg::BTN_CANCEL {
        return Ok(cancel(session));
    }
    if text == msg::BTN_MAIN_MENU {
        return Ok(go_to(session, Menu::Main));
    }

    match session.state.owning_menu() {
        Menu::Main => menu::on_text(ctx, session, text),
        Menu::Finance => finance::on_text(ctx, session, text),
        Menu::Investment => investment::on_text(ctx, session, text),
        Menu::Settings => settings::on_text(ctx, session, text),
    }
}

fn on_callback(ctx: &Ctx<'_>, session: &mut Session, data: &str) -> Result<Vec<Reply>> {
    let Some(action) = CallbackAction::parse(data) else {
        warn!(user_id = ctx.user.id, data, "unknown callback");
        return Ok(go_to(session, Menu::Main));
    };

    use CallbackAction as A;
    match action {
        A::Noop => Ok(Vec::new()),
        A::Cancel => Ok(cancel(session)),
        A::Back(menu) => Ok(go_to(session, menu)),
        A::TransactionType(_)
        | A::TransactionDetails(_)
        | A::DeleteTransaction(_)
        | A::ConfirmDeleteTransaction(_)
        | A::TransactionsPage(_) => finance::on_callback(ctx, session, action),
        A::BuyMore(_) | A::SellInvestment(_) => investment::on_callback(ctx, session, action),
        A::Confirm | A::Decline => match session.state {
            State::BuyConfirm | State::SellConfirm => investment::on_callback(ctx, session, action),
            _ => {
                let menu = session.state.owning_menu();
                session.reset(menu.state());
                Ok(vec![menu_reply_with(msg::ACTION_EXPIRED, menu)])
            }
        },
        A::NewCategory
        | A::DeleteCategory(_)
        | A::ConfirmDeleteCategory(_)
        | A::SetProfile(_)
        | A::SetIncome
        | A::SetSavingsGoal
        | A::SetNotifications(_)
        | A::SetTimezone(_)
        | A::Export(_) => settings::on_callback(ctx, session, action),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_recognized() {
        assert_eq!(command("/start"), Some("start"));
        assert_eq!(command("  /cancel  "), Some("cancel"));
        assert_eq!(command("/help@finbot"), Some("help"));
        assert_eq!(command("/menu agora"), Some("menu"));
        assert_eq!(command("start"), None);
        assert_eq!(command("/"), None);
    }

    #[test]
    fn kinds_parse_from_labels_and_words() {
        assert_eq!(parse_kind("💰 Receita").unwrap(), TransactionType::Income);
        assert_eq!(parse_kind("despesa").unwrap(), TransactionType::Expense);
        assert_eq!(parse_kind("EXPENSE").unwrap(), TransactionType::Expense);
        assert!(parse_kind("transferência").is_err());
    }
}
