// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{Datelike, Days};

use crate::bot::callback::CallbackAction;
use crate::bot::keyboard::{InlineButton, Keyboard};
use crate::bot::messages as msg;
use crate::bot::render;
use crate::bot::session::{Session, TransactionDraft};
use crate::bot::state::{Menu, State};
use crate::bot::Reply;
use crate::error::{Result, ServiceError};
use crate::format::{brl, date_br};
use crate::models::{PaymentMethod, TransactionType};
use crate::services::categories::{self, CategoryFilter, NewCategory};
use crate::services::transactions::{self, NewTransaction, TransactionFilter};
use crate::services::{investments, summary};
use crate::validation::{parse_amount, parse_date, validate_text};

use super::{Ctx, kind_choices, menu_reply_with, parse_kind, unknown_option};

/// Transactions shown per page of the listing.
const LIST_PAGE: usize = 5;
/// Months compared by the spending trend in the analysis view.
const TREND_MONTHS: u32 = 6;

pub(super) fn on_text(ctx: &Ctx<'_>, session: &mut Session, text: &str) -> Result<Vec<Reply>> {
    match session.state {
        State::TransactionType => {
            let kind = parse_kind(text)?;
            Ok(begin(session, kind))
        }
        State::TransactionAmount => {
            let amount = parse_amount(text, &ctx.settings.amount_limits())?;
            session.draft.transaction.amount = Some(amount);
            session.state = State::TransactionDescription;
            Ok(vec![Reply::text(msg::ASK_DESCRIPTION).with_keyboard(Keyboard::cancel_only())])
        }
        State::TransactionDescription => {
            let description = validate_text(text, 1, ctx.settings.max_description_length)?;
            session.draft.transaction.description = Some(description);
            session.state = State::TransactionPaymentMethod;
            let kind = draft_kind(&session.draft.transaction)?;
            let labels: Vec<&str> = kind.payment_methods().iter().map(|m| m.label()).collect();
            Ok(vec![
                Reply::text(msg::ASK_PAYMENT_METHOD).with_keyboard(Keyboard::choices(&labels, 2)),
            ])
        }
        State::TransactionPaymentMethod => {
            let kind = draft_kind(&session.draft.transaction)?;
            let method = parse_payment_method(kind, text)?;
            session.draft.transaction.payment_method = Some(method);
            session.state = State::TransactionDate;
            Ok(vec![
                Reply::text(msg::ASK_DATE)
                    .with_keyboard(Keyboard::choices(&[msg::BTN_TODAY, msg::BTN_YESTERDAY], 2)),
            ])
        }
        State::TransactionDate => {
            let date = match text {
                msg::BTN_TODAY => ctx.today,
                msg::BTN_YESTERDAY => ctx
                    .today
                    .checked_sub_days(Days::new(1))
                    .ok_or_else(|| ServiceError::invariant("date underflow"))?,
                _ => parse_date(text, ctx.today, false)?,
            };
            session.draft.transaction.date = Some(date);
            session.state = State::TransactionCategory;
            ask_category(ctx, draft_kind(&session.draft.transaction)?)
        }
        State::TransactionCategory => {
            if text == msg::BTN_NEW_CATEGORY {
                session.state = State::CategoryName;
                return Ok(vec![
                    Reply::text(msg::ASK_CATEGORY_NAME).with_keyboard(Keyboard::cancel_only()),
                ]);
            }
            let kind = draft_kind(&session.draft.transaction)?;
            let category = categories::find_by_name(ctx.storage, ctx.user.id, kind, text)?
                .ok_or_else(|| ServiceError::validation("Categoria não encontrada. Escolha uma da lista"))?;
            let new = to_new_transaction(&session.draft.transaction, category.id)?;
            let created = transactions::create_transaction(ctx.storage, ctx.settings, ctx.user.id, &new, ctx.today)?;
            session.reset(State::FinanceMenu);
            Ok(vec![recorded(&created.amount, created.kind, &category.display())])
        }
        State::CategoryName => {
            let draft = &session.draft.transaction;
            let kind = draft_kind(draft)?;
            let category = NewCategory {
                name: text.to_string(),
                kind,
                icon: None,
                description: None,
            };
            let new = to_new_transaction(draft, 0)?;
            let (category, created) = transactions::create_with_new_category(
                ctx.storage,
                ctx.settings,
                ctx.user.id,
                &category,
                &new,
                ctx.today,
            )?;
            session.reset(State::FinanceMenu);
            Ok(vec![recorded(&created.amount, created.kind, &category.display())])
        }
        _ => menu(ctx, session, text),
    }
}

fn menu(ctx: &Ctx<'_>, session: &mut Session, text: &str) -> Result<Vec<Reply>> {
    Ok(match text {
        msg::BTN_NEW_TRANSACTION => {
            session.reset(State::TransactionType);
            vec![Reply::text(msg::ASK_TRANSACTION_TYPE).with_keyboard(kind_choices())]
        }
        msg::BTN_TRANSACTIONS => {
            session.reset(State::FinanceMenu);
            vec![list_page(ctx, 1)?]
        }
        msg::BTN_MONTH_SUMMARY => {
            session.reset(State::FinanceMenu);
            vec![month_summary(ctx)?]
        }
        msg::BTN_ANALYSIS => {
            session.reset(State::FinanceMenu);
            vec![analysis(ctx)?]
        }
        _ => unknown_option(session),
    })
}

pub(super) fn on_callback(ctx: &Ctx<'_>, session: &mut Session, action: CallbackAction) -> Result<Vec<Reply>> {
    let user_id = ctx.user.id;
    match action {
        CallbackAction::TransactionType(kind) => Ok(begin(session, kind)),
        CallbackAction::TransactionsPage(page) => {
            session.reset(State::FinanceMenu);
            Ok(vec![list_page(ctx, page)?])
        }
        CallbackAction::TransactionDetails(id) => {
            let entry = transactions::get_transaction(ctx.storage, user_id, id)?;
            session.reset(State::FinanceMenu);
            Ok(vec![Reply::text(render::transaction_details(&entry)).with_keyboard(
                Keyboard::inline(vec![vec![
                    InlineButton::new("🗑️ Excluir", &CallbackAction::DeleteTransaction(id)),
                    InlineButton::new("🔙 Voltar", &CallbackAction::Back(Menu::Finance)),
                ]]),
            )])
        }
        CallbackAction::DeleteTransaction(id) => {
            let entry = transactions::get_transaction(ctx.storage, user_id, id)?;
            session.reset(State::FinanceMenu);
            Ok(vec![
                Reply::text(format!(
                    "Excluir este lançamento?\n\n{}",
                    render::transaction_details(&entry)
                ))
                .with_keyboard(Keyboard::inline(vec![vec![
                    InlineButton::new("✅ Sim, excluir", &CallbackAction::ConfirmDeleteTransaction(id)),
                    InlineButton::new("❌ Não", &CallbackAction::Cancel),
                ]])),
            ])
        }
        CallbackAction::ConfirmDeleteTransaction(id) => {
            let removed = transactions::delete_transaction(ctx.storage, user_id, id)?;
            session.reset(State::FinanceMenu);
            Ok(vec![menu_reply_with(
                &format!(
                    "🗑️ Lançamento excluído: {} {}",
                    brl(&removed.amount),
                    removed.description
                ),
                Menu::Finance,
            )])
        }
        other => Err(ServiceError::invariant(format!(
            "finance handler got {:?}",
            other
        ))),
    }
}

/// Start the wizard with the type already known.
fn begin(session: &mut Session, kind: TransactionType) -> Vec<Reply> {
    session.reset(State::TransactionAmount);
    session.draft.transaction.kind = Some(kind);
    vec![
        Reply::text(format!("{}\n\n{}", kind.label(), msg::ASK_AMOUNT))
            .with_keyboard(Keyboard::cancel_only()),
    ]
}

fn draft_kind(draft: &TransactionDraft) -> Result<TransactionType> {
    draft
        .kind
        .ok_or_else(|| ServiceError::invariant("transaction draft has no type"))
}

fn parse_payment_method(kind: TransactionType, text: &str) -> Result<PaymentMethod> {
    let wanted = text.trim().to_lowercase();
    kind.payment_methods()
        .iter()
        .copied()
        .find(|m| m.label().to_lowercase() == wanted || m.as_str() == wanted)
        .ok_or_else(|| ServiceError::validation("Escolha uma forma de pagamento da lista"))
}

fn ask_category(ctx: &Ctx<'_>, kind: TransactionType) -> Result<Vec<Reply>> {
    let list = categories::list_categories(
        ctx.storage,
        ctx.user.id,
        CategoryFilter {
            kind: Some(kind),
            ..CategoryFilter::default()
        },
    )?;
    let mut labels: Vec<String> = list.iter().map(|c| c.display()).collect();
    labels.push(msg::BTN_NEW_CATEGORY.to_string());
    Ok(vec![Reply::text(msg::ASK_CATEGORY).with_keyboard(Keyboard::choices(&labels, 2))])
}

fn to_new_transaction(draft: &TransactionDraft, category_id: i64) -> Result<NewTransaction> {
    let missing = || ServiceError::invariant("transaction draft incomplete");
    Ok(NewTransaction {
        category_id,
        amount: draft.amount.ok_or_else(missing)?,
        kind: draft.kind.ok_or_else(missing)?,
        description: draft.description.clone().ok_or_else(missing)?,
        payment_method: draft.payment_method.ok_or_else(missing)?,
        date: draft.date.ok_or_else(missing)?,
        notes: None,
        tags: None,
        is_recurring: false,
    })
}

fn recorded(amount: &rust_decimal::Decimal, kind: TransactionType, category: &str) -> Reply {
    menu_reply_with(
        &format!(
            "✅ Lançamento registrado!\n\n{}: {}\nCategoria: {}",
            kind.label(),
            brl(amount),
            category
        ),
        Menu::Finance,
    )
}

fn start_buttons() -> Keyboard {
    Keyboard::inline(vec![vec![
        InlineButton::new(
            "💰 Registrar receita",
            &CallbackAction::TransactionType(TransactionType::Income),
        ),
        InlineButton::new(
            "💸 Registrar despesa",
            &CallbackAction::TransactionType(TransactionType::Expense),
        ),
    ]])
}

fn list_page(ctx: &Ctx<'_>, page: u32) -> Result<Reply> {
    let per_page = LIST_PAGE.min(ctx.settings.transactions_per_page).max(1);
    let total = transactions::count_transactions(ctx.storage, ctx.user.id, &TransactionFilter::default())?;
    if total == 0 {
        return Ok(Reply::text("📋 Nenhum lançamento registrado ainda.").with_keyboard(start_buttons()));
    }
    let pages = total.div_ceil(per_page) as u32;
    let page = page.clamp(1, pages);
    let filter = TransactionFilter {
        limit: Some(per_page),
        offset: (page as usize - 1) * per_page,
        ..TransactionFilter::default()
    };
    let entries = transactions::list_transactions(ctx.storage, ctx.settings, ctx.user.id, &filter)?;

    let mut text = format!("📋 Lançamentos (página {}/{})\n", page, pages);
    let mut rows = Vec::with_capacity(entries.len() + 1);
    for (i, entry) in entries.iter().enumerate() {
        let n = filter.offset + i + 1;
        text.push_str(&format!("\n{}. {}", n, render::transaction_line(entry)));
        let id = entry.transaction.id;
        rows.push(vec![
            InlineButton::new(format!("🔍 {}", n), &CallbackAction::TransactionDetails(id)),
            InlineButton::new(format!("🗑️ {}", n), &CallbackAction::DeleteTransaction(id)),
        ]);
    }
    let mut nav = Vec::new();
    if page > 1 {
        nav.push(InlineButton::new("⬅️ Anterior", &CallbackAction::TransactionsPage(page - 1)));
    }
    if page < pages {
        nav.push(InlineButton::new("Próxima ➡️", &CallbackAction::TransactionsPage(page + 1)));
    }
    if !nav.is_empty() {
        rows.push(nav);
    }
    Ok(Reply::text(text).with_keyboard(Keyboard::inline(rows)))
}

pub(super) fn month_summary(ctx: &Ctx<'_>) -> Result<Reply> {
    let s = summary::monthly_summary(
        ctx.storage,
        ctx.user.id,
        ctx.today.year(),
        ctx.today.month(),
        ctx.today,
    )?;
    let reply = Reply::text(render::month_summary(&s));
    Ok(if s.transaction_count == 0 {
        reply.with_keyboard(start_buttons())
    } else {
        reply
    })
}

pub(super) fn analysis(ctx: &Ctx<'_>) -> Result<Reply> {
    let user_id = ctx.user.id;
    let health = summary::health_score(ctx.storage, &ctx.settings.health, user_id, ctx.today)?;
    let trend = summary::spending_trend(ctx.storage, user_id, TREND_MONTHS, ctx.today)?;
    let month = summary::monthly_summary(
        ctx.storage,
        user_id,
        ctx.today.year(),
        ctx.today.month(),
        ctx.today,
    )?;
    let portfolio = investments::portfolio_summary(ctx.storage, user_id, ctx.prices)?;
    let advice = summary::recommendations(&health, &month, Some(&portfolio));
    let mut text = render::analysis(&health, &trend, &advice);
    if let Some(goal) = ctx.user.savings_goal.filter(|g| !g.is_zero()) {
        text.push_str(&format!(
            "\n\n🎯 Meta de poupança: {} | Poupado no mês: {}",
            brl(&goal),
            brl(&month.balance)
        ));
    }
    text.push_str(&format!("\n\nAtualizado em {}", date_br(&ctx.today)));
    Ok(Reply::text(text))
}
