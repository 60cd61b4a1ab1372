// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Menu {
    Main,
    Finance,
    Investment,
    Settings,
}

impl Menu {
    pub fn state(self) -> State {
        match self {
            Self::Main => State::MainMenu,
            Self::Finance => State::FinanceMenu,
            Self::Investment => State::InvestmentMenu,
            Self::Settings => State::SettingsMenu,
        }
    }

    pub(crate) fn key(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Finance => "finance",
            Self::Investment => "investment",
            Self::Settings => "settings",
        }
    }

    pub(crate) fn from_key(key: &str) -> Option<Self> {
        match key {
            "main" => Some(Self::Main),
            "finance" => Some(Self::Finance),
            "investment" => Some(Self::Investment),
            "settings" => Some(Self::Settings),
            _ => None,
        }
    }
}

/// Where a session is in the conversation. Each state expects exactly one
/// kind of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    #[default]
    MainMenu,
    FinanceMenu,
    InvestmentMenu,
    SettingsMenu,

    TransactionType,
    TransactionAmount,
    TransactionDescription,
    TransactionPaymentMethod,
    TransactionDate,
    TransactionCategory,
    CategoryName,

    BuyType,
    BuyTicker,
    BuyQuantity,
    BuyPrice,
    BuyConfirm,

    SellSelect,
    SellQuantity,
    SellPrice,
    SellConfirm,

    SettingsProfile,
    SettingsIncome,
    SettingsNotifications,
    SettingsCategories,
    SettingsCategoryType,
    SettingsCategoryName,
    SettingsExport,
    SettingsGoals,
    SettingsGoalAmount,
    SettingsTimezone,
}

impl State {
    /// The menu a cancel or a failure falls back to.
    pub fn owning_menu(self) -> Menu {
        use State::*;
        match self {
            MainMenu => Menu::Main,
            FinanceMenu
            | TransactionType
            | TransactionAmount
            | TransactionDescription
            | TransactionPaymentMethod
            | TransactionDate
            | TransactionCategory
            | CategoryName => Menu::Finance,
            InvestmentMenu | BuyType | BuyTicker | BuyQuantity | BuyPrice | BuyConfirm
            | SellSelect | SellQuantity | SellPrice | SellConfirm => Menu::Investment,
            SettingsMenu
            | SettingsProfile
            | SettingsIncome
            | SettingsNotifications
            | SettingsCategories
            | SettingsCategoryType
            | SettingsCategoryName
            | SettingsExport
            | SettingsGoals
            | SettingsGoalAmount
            | SettingsTimezone => Menu::Settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wizards_fall_back_to_their_menu() {
        assert_eq!(State::TransactionDate.owning_menu(), Menu::Finance);
        assert_eq!(State::CategoryName.owning_menu(), Menu::Finance);
        assert_eq!(State::SellConfirm.owning_menu(), Menu::Investment);
        assert_eq!(State::SettingsGoalAmount.owning_menu(), Menu::Settings);
        assert_eq!(State::MainMenu.owning_menu(), Menu::Main);
    }

    #[test]
    fn menu_keys_round_trip() {
        for m in [Menu::Main, Menu::Finance, Menu::Investment, Menu::Settings] {
            assert_eq!(Menu::from_key(m.key()), Some(m));
            assert_eq!(m.state().owning_menu(), m);
        }
    }
}
