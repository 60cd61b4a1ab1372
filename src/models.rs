// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::Row;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{decimal_at, opt_decimal_at};

#[derive(Debug, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Enums stored as their lowercase key in TEXT columns.
macro_rules! text_enum {
    ($ty:ident, $kind:literal { $($variant:ident => $key:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $key),+
                }
            }
        }

        impl std::str::FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($key => Ok($ty::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: UnknownVariant| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Income,
    Expense,
}

text_enum!(TransactionType, "transaction type" {
    Income => "income",
    Expense => "expense",
});

impl TransactionType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Income => "💰 Receita",
            Self::Expense => "💸 Despesa",
        }
    }

    pub fn payment_methods(&self) -> &'static [PaymentMethod] {
        use PaymentMethod::*;
        match self {
            Self::Expense => &[
                CreditCard,
                DebitCard,
                Cash,
                Pix,
                BankSlip,
                BankTransfer,
                Financing,
                Installment,
            ],
            Self::Income => &[
                Salary,
                Pix,
                BankTransfer,
                Cash,
                Investment,
                Freelance,
                Sale,
                Bonus,
                Other,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Cash,
    Pix,
    BankSlip,
    BankTransfer,
    Financing,
    Installment,
    Salary,
    Investment,
    Freelance,
    Sale,
    Bonus,
    Other,
}

text_enum!(PaymentMethod, "payment method" {
    CreditCard => "credit_card",
    DebitCard => "debit_card",
    Cash => "cash",
    Pix => "pix",
    BankSlip => "bank_slip",
    BankTransfer => "bank_transfer",
    Financing => "financing",
    Installment => "installment",
    Salary => "salary",
    Investment => "investment",
    Freelance => "freelance",
    Sale => "sale",
    Bonus => "bonus",
    Other => "other",
});

impl PaymentMethod {
    pub fn label(&self) -> &'static str {
        match self {
            Self::CreditCard => "💳 Cartão de Crédito",
            Self::DebitCard => "💳 Cartão de Débito",
            Self::Cash => "💵 Dinheiro",
            Self::Pix => "📱 PIX",
            Self::BankSlip => "📄 Boleto",
            Self::BankTransfer => "🏦 Transferência",
            Self::Financing => "🏦 Financiamento",
            Self::Installment => "📅 Parcelado",
            Self::Salary => "💼 Salário",
            Self::Investment => "📈 Investimentos",
            Self::Freelance => "💻 Freelance",
            Self::Sale => "🛒 Venda",
            Self::Bonus => "🎁 Bônus",
            Self::Other => "💰 Outros",
        }
    }

    pub fn allowed_for(&self, kind: TransactionType) -> bool {
        kind.payment_methods().contains(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentType {
    Stock,
    Fii,
    Crypto,
    Etf,
    #[serde(rename = "fixed")]
    FixedIncome,
    Other,
}

text_enum!(InvestmentType, "investment type" {
    Stock => "stock",
    Fii => "fii",
    Crypto => "crypto",
    Etf => "etf",
    FixedIncome => "fixed",
    Other => "other",
});

impl InvestmentType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Stock => "📊 Ações",
            Self::Fii => "🏠 FIIs",
            Self::Crypto => "🪙 Criptomoedas",
            Self::Etf => "📈 ETFs",
            Self::FixedIncome => "💰 Renda Fixa",
            Self::Other => "🔄 Outros",
        }
    }

    pub fn ticker_examples(&self) -> &'static str {
        match self {
            Self::Stock => "PETR4, VALE3, ITUB4",
            Self::Fii => "MXRF11, HGLG11, XPLG11",
            Self::Crypto => "BTC, ETH, ADA",
            Self::Etf => "IVVB11, BOVA11, SMAL11",
            Self::FixedIncome => "LTN, NTN-B, CDB",
            Self::Other => "COE, LC, DEB",
        }
    }

    pub fn risk_level(&self) -> &'static str {
        match self {
            Self::Stock => "Alto",
            Self::Fii | Self::Etf => "Médio",
            Self::Crypto => "Muito Alto",
            Self::FixedIncome => "Baixo",
            Self::Other => "Variável",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestorProfile {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

text_enum!(InvestorProfile, "investor profile" {
    Conservative => "conservative",
    Moderate => "moderate",
    Aggressive => "aggressive",
});

impl InvestorProfile {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Conservative => "🛡️ Conservador",
            Self::Moderate => "⚖️ Moderado",
            Self::Aggressive => "🚀 Arrojado",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Conservative => "Prioriza segurança e preservação de capital",
            Self::Moderate => "Busca equilíbrio entre segurança e rentabilidade",
            Self::Aggressive => "Aceita mais risco em busca de maior retorno",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Dividend,
    Market,
    Opportunity,
    Reminder,
}

text_enum!(AlertType, "alert type" {
    Dividend => "dividend",
    Market => "market",
    Opportunity => "opportunity",
    Reminder => "reminder",
});

impl AlertType {
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Dividend => "💰",
            Self::Market => "📈",
            Self::Opportunity => "🎯",
            Self::Reminder => "⏰",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub external_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub investor_profile: InvestorProfile,
    pub monthly_income: Option<Decimal>,
    pub savings_goal: Option<Decimal>,
    pub timezone: String,
    pub notifications_enabled: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    pub(crate) const COLUMNS: &'static str = "id, external_id, username, first_name, last_name, \
        investor_profile, monthly_income, savings_goal, timezone, notifications_enabled, \
        created_at, updated_at";

    pub(crate) fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: r.get(0)?,
            external_id: r.get(1)?,
            username: r.get(2)?,
            first_name: r.get(3)?,
            last_name: r.get(4)?,
            investor_profile: r.get(5)?,
            monthly_income: opt_decimal_at(r, 6)?,
            savings_goal: opt_decimal_at(r, 7)?,
            timezone: r.get(8)?,
            notifications_enabled: r.get(9)?,
            created_at: r.get(10)?,
            updated_at: r.get(11)?,
        })
    }

    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name, &self.username) {
            (Some(first), Some(last), _) => format!("{} {}", first, last),
            (Some(first), None, _) => first.clone(),
            (None, _, Some(username)) => format!("@{}", username),
            _ => format!("Usuário {}", self.external_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub kind: TransactionType,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    pub is_system: bool,
}

impl Category {
    pub(crate) const COLUMNS: &'static str =
        "id, user_id, name, type, icon, description, is_active, is_system";

    pub(crate) fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: r.get(0)?,
            user_id: r.get(1)?,
            name: r.get(2)?,
            kind: r.get(3)?,
            icon: r.get(4)?,
            description: r.get(5)?,
            is_active: r.get(6)?,
            is_system: r.get(7)?,
        })
    }

    pub fn display(&self) -> String {
        match &self.icon {
            Some(icon) => format!("{} {}", icon, self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub amount: Decimal,
    pub kind: TransactionType,
    pub description: String,
    pub payment_method: PaymentMethod,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub tags: Option<String>,
    pub is_recurring: bool,
}

impl Transaction {
    pub(crate) const COLUMNS: &'static str = "t.id, t.user_id, t.category_id, t.amount, t.type, \
        t.description, t.payment_method, t.date, t.notes, t.tags, t.is_recurring";

    pub(crate) fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: r.get(0)?,
            user_id: r.get(1)?,
            category_id: r.get(2)?,
            amount: decimal_at(r, 3)?,
            kind: r.get(4)?,
            description: r.get(5)?,
            payment_method: r.get(6)?,
            date: r.get(7)?,
            notes: r.get(8)?,
            tags: r.get(9)?,
            is_recurring: r.get(10)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investment {
    pub id: i64,
    pub user_id: i64,
    pub ticker: String,
    pub kind: InvestmentType,
    pub quantity: Decimal,
    pub avg_price: Decimal,
    pub purchase_date: NaiveDate,
    pub broker: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    pub sale_quantity: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub sale_date: Option<NaiveDate>,
}

impl Investment {
    pub(crate) const COLUMNS: &'static str = "id, user_id, ticker, type, quantity, avg_price, \
        purchase_date, broker, notes, is_active, sale_quantity, sale_price, sale_date";

    pub(crate) fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: r.get(0)?,
            user_id: r.get(1)?,
            ticker: r.get(2)?,
            kind: r.get(3)?,
            quantity: decimal_at(r, 4)?,
            avg_price: decimal_at(r, 5)?,
            purchase_date: r.get(6)?,
            broker: r.get(7)?,
            notes: r.get(8)?,
            is_active: r.get(9)?,
            sale_quantity: opt_decimal_at(r, 10)?,
            sale_price: opt_decimal_at(r, 11)?,
            sale_date: r.get(12)?,
        })
    }

    /// Everything ever bought, at the running average price.
    pub fn total_invested(&self) -> Decimal {
        self.quantity * self.avg_price
    }

    pub fn current_quantity(&self) -> Decimal {
        self.quantity - self.sale_quantity.unwrap_or(Decimal::ZERO)
    }

    /// Cost basis of what is still held.
    pub fn open_cost(&self) -> Decimal {
        self.current_quantity() * self.avg_price
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub user_id: i64,
    pub kind: AlertType,
    pub title: String,
    pub message: String,
    pub scheduled_for: DateTime<Utc>,
    pub is_sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub priority: u8,
    pub metadata: Option<serde_json::Value>,
}

impl Alert {
    pub(crate) const COLUMNS: &'static str =
        "id, user_id, type, title, message, scheduled_for, is_sent, sent_at, priority, metadata";

    pub(crate) fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        let metadata: Option<String> = r.get(9)?;
        let metadata = match metadata {
            Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
            })?),
            None => None,
        };
        Ok(Self {
            id: r.get(0)?,
            user_id: r.get(1)?,
            kind: r.get(2)?,
            title: r.get(3)?,
            message: r.get(4)?,
            scheduled_for: r.get(5)?,
            is_sent: r.get(6)?,
            sent_at: r.get(7)?,
            priority: r.get(8)?,
            metadata,
        })
    }
}
