// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use serde::Serialize;

use crate::bot::callback::CallbackAction;
use crate::bot::messages as msg;
use crate::bot::state::Menu;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, action: &CallbackAction) -> Self {
        Self {
            text: text.into(),
            data: action.encode(),
        }
    }
}

/// Rows of buttons. Reply buttons send their label back as text; inline
/// buttons send a callback payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Keyboard {
    Reply(Vec<Vec<String>>),
    Inline(Vec<Vec<InlineButton>>),
}

impl Keyboard {
    pub fn reply<R, S>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Keyboard::Reply(
            rows.into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        )
    }

    /// Labels laid out `per_row` at a time, closed by a cancel row.
    pub fn choices<S: AsRef<str>>(labels: &[S], per_row: usize) -> Self {
        let mut rows: Vec<Vec<String>> = labels
            .chunks(per_row.max(1))
            .map(|chunk| chunk.iter().map(|l| l.as_ref().to_string()).collect())
            .collect();
        rows.push(vec![msg::BTN_CANCEL.to_string()]);
        Keyboard::Reply(rows)
    }

    pub fn cancel_only() -> Self {
        Keyboard::reply([[msg::BTN_CANCEL]])
    }

    pub fn menu(menu: Menu) -> Self {
        match menu {
            Menu::Main => Keyboard::reply([
                vec![msg::BTN_FINANCE, msg::BTN_INVESTMENTS],
                vec![msg::BTN_REPORTS, msg::BTN_SETTINGS],
                vec![msg::BTN_HELP],
            ]),
            Menu::Finance => Keyboard::reply([
                vec![msg::BTN_NEW_TRANSACTION, msg::BTN_TRANSACTIONS],
                vec![msg::BTN_MONTH_SUMMARY, msg::BTN_ANALYSIS],
                vec![msg::BTN_MAIN_MENU],
            ]),
            Menu::Investment => Keyboard::reply([
                vec![msg::BTN_BUY, msg::BTN_SELL],
                vec![msg::BTN_PORTFOLIO, msg::BTN_HISTORY],
                vec![msg::BTN_MAIN_MENU],
            ]),
            Menu::Settings => Keyboard::reply([
                vec![msg::BTN_PROFILE, msg::BTN_NOTIFICATIONS],
                vec![msg::BTN_CATEGORIES, msg::BTN_EXPORT],
                vec![msg::BTN_GOALS, msg::BTN_TIMEZONE],
                vec![msg::BTN_MAIN_MENU],
            ]),
        }
    }

    pub fn inline(rows: Vec<Vec<InlineButton>>) -> Self {
        Keyboard::Inline(rows)
    }

    pub fn yes_no() -> Self {
        Keyboard::Inline(vec![vec![
            InlineButton::new(msg::BTN_CONFIRM, &CallbackAction::Confirm),
            InlineButton::new(msg::BTN_CANCEL, &CallbackAction::Decline),
        ]])
    }

    /// Every callback payload carried by this keyboard, in display order.
    pub fn callbacks(&self) -> Vec<&InlineButton> {
        match self {
            Keyboard::Inline(rows) => rows.iter().flatten().collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::callback::MAX_CALLBACK_BYTES;

    #[test]
    fn choices_end_with_cancel() {
        let kb = Keyboard::choices(&["a", "b", "c"], 2);
        assert_eq!(
            kb,
            Keyboard::Reply(vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["c".to_string()],
                vec![msg::BTN_CANCEL.to_string()],
            ])
        );
    }

    #[test]
    fn main_menu_has_no_empty_buttons() {
        let Keyboard::Reply(rows) = Keyboard::menu(Menu::Main) else {
            panic!("main menu must be a reply keyboard");
        };
        assert!(rows.iter().flatten().all(|b| !b.is_empty()));
        assert_eq!(rows.iter().flatten().count(), 5);
    }

    #[test]
    fn inline_payloads_fit() {
        for button in Keyboard::yes_no().callbacks() {
            assert!(button.data.len() <= MAX_CALLBACK_BYTES);
            assert!(CallbackAction::parse(&button.data).is_some());
        }
    }
}
