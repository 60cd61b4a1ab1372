// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Inline-button payloads. Parsed once into [`CallbackAction`]; handlers
//! never look at the raw string.

use crate::bot::state::Menu;
use crate::models::{InvestorProfile, TransactionType};
use crate::services::export::ExportFormat;

/// Chat platforms reject longer callback payloads.
pub const MAX_CALLBACK_BYTES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    TransactionType(TransactionType),
    TransactionDetails(i64),
    DeleteTransaction(i64),
    ConfirmDeleteTransaction(i64),
    TransactionsPage(u32),
    BuyMore(i64),
    SellInvestment(i64),
    NewCategory,
    DeleteCategory(i64),
    ConfirmDeleteCategory(i64),
    SetProfile(InvestorProfile),
    SetIncome,
    SetSavingsGoal,
    SetNotifications(bool),
    SetTimezone(String),
    Export(ExportFormat),
    Confirm,
    Decline,
    Cancel,
    Back(Menu),
    Noop,
}

impl CallbackAction {
    pub fn encode(&self) -> String {
        match self {
            Self::TransactionType(t) => format!("tx:type:{}", t),
            Self::TransactionDetails(id) => format!("tx:info:{}", id),
            Self::DeleteTransaction(id) => format!("tx:del:{}", id),
            Self::ConfirmDeleteTransaction(id) => format!("tx:del_ok:{}", id),
            Self::TransactionsPage(page) => format!("tx:page:{}", page),
            Self::BuyMore(id) => format!("inv:buy:{}", id),
            Self::SellInvestment(id) => format!("inv:sell:{}", id),
            Self::NewCategory => "cat:new".to_string(),
            Self::DeleteCategory(id) => format!("cat:del:{}", id),
            Self::ConfirmDeleteCategory(id) => format!("cat:del_ok:{}", id),
            Self::SetProfile(p) => format!("set:profile:{}", p),
            Self::SetIncome => "set:income".to_string(),
            Self::SetSavingsGoal => "set:goal".to_string(),
            Self::SetNotifications(on) => format!("set:notif:{}", if *on { "on" } else { "off" }),
            Self::SetTimezone(tz) => format!("set:tz:{}", tz),
            Self::Export(fmt) => format!("export:{}", fmt.as_str()),
            Self::Confirm => "yes".to_string(),
            Self::Decline => "no".to_string(),
            Self::Cancel => "cancel".to_string(),
            Self::Back(menu) => format!("back:{}", menu.key()),
            Self::Noop => "noop".to_string(),
        }
    }

    /// `None` for anything this version of the bot did not produce.
    pub fn parse(data: &str) -> Option<Self> {
        if data.is_empty() || data.len() > MAX_CALLBACK_BYTES {
            return None;
        }
        let parts: Vec<&str> = data.splitn(3, ':').collect();
        let id = |s: &str| s.parse::<i64>().ok().filter(|id| *id > 0);

        let action = match parts.as_slice() {
            ["tx", "type", t] => Self::TransactionType(t.parse().ok()?),
            ["tx", "info", n] => Self::TransactionDetails(id(n)?),
            ["tx", "del", n] => Self::DeleteTransaction(id(n)?),
            ["tx", "del_ok", n] => Self::ConfirmDeleteTransaction(id(n)?),
            ["tx", "page", n] => Self::TransactionsPage(n.parse().ok().filter(|p| *p > 0)?),
            ["inv", "buy", n] => Self::BuyMore(id(n)?),
            ["inv", "sell", n] => Self::SellInvestment(id(n)?),
            ["cat", "new"] => Self::NewCategory,
            ["cat", "del", n] => Self::DeleteCategory(id(n)?),
            ["cat", "del_ok", n] => Self::ConfirmDeleteCategory(id(n)?),
            ["set", "profile", p] => Self::SetProfile(p.parse().ok()?),
            ["set", "income"] => Self::SetIncome,
            ["set", "goal"] => Self::SetSavingsGoal,
            ["set", "notif", "on"] => Self::SetNotifications(true),
            ["set", "notif", "off"] => Self::SetNotifications(false),
            ["set", "tz", tz] if !tz.is_empty() => Self::SetTimezone(tz.to_string()),
            ["export", fmt] => Self::Export(fmt.parse().ok()?),
            ["yes"] => Self::Confirm,
            ["no"] => Self::Decline,
            ["cancel"] => Self::Cancel,
            ["back", menu] => Self::Back(Menu::from_key(menu)?),
            ["noop"] => Self::Noop,
            _ => return None,
        };
        Some(action)
    }
}
