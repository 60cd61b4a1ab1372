// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rust_decimal::Decimal;

use crate::bot::Reply;
use crate::bot::callback::CallbackAction;
use crate::bot::keyboard::{InlineButton, Keyboard};
use crate::bot::messages as msg;
use crate::bot::render;
use crate::bot::session::{BuyDraft, Session, SellDraft};
use crate::bot::state::{Menu, State};
use crate::error::{Result, ServiceError};
use crate::format::{brl, quantity};
use crate::models::{Investment, InvestmentType};
use crate::services::investments::{self, Buy, Sell};
use crate::validation::{parse_price, parse_quantity, validate_ticker};

use super::{Ctx, cancel, menu_reply_with, unknown_option};

/// Positions offered as inline buttons under the portfolio view.
const PORTFOLIO_BUTTONS: usize = 10;

pub(super) fn on_text(ctx: &Ctx<'_>, session: &mut Session, text: &str) -> Result<Vec<Reply>> {
    match session.state {
        State::BuyType => {
            let kind = parse_investment_type(text)?;
            session.draft.buy.kind = Some(kind);
            session.state = State::BuyTicker;
            Ok(vec![
                Reply::text(format!(
                    "{}\nRisco: {}\n\n🏷️ Informe o código do ativo (ex.: {}):",
                    kind.label(),
                    kind.risk_level(),
                    kind.ticker_examples()
                ))
                .with_keyboard(Keyboard::cancel_only()),
            ])
        }
        State::BuyTicker => {
            let kind = session.draft.buy.kind.ok_or_else(incomplete)?;
            let ticker = validate_ticker(text, Some(kind))?;
            let existing = investments::find_active_by_ticker(ctx.storage, ctx.user.id, &ticker)?;
            if let Some(held) = &existing {
                if held.kind != kind {
                    return Err(ServiceError::validation(format!(
                        "{} já está na carteira como {}",
                        held.ticker,
                        held.kind.label()
                    )));
                }
            }
            session.draft.buy.ticker = Some(ticker);
            session.state = State::BuyQuantity;
            let mut prompt = String::new();
            if let Some(held) = existing {
                prompt.push_str(&format!(
                    "Você já possui {} de {} a {} (preço médio). A compra será somada.\n\n",
                    quantity(&held.current_quantity()),
                    held.ticker,
                    brl(&held.avg_price)
                ));
            }
            prompt.push_str(msg::ASK_QUANTITY);
            Ok(vec![Reply::text(prompt).with_keyboard(Keyboard::cancel_only())])
        }
        State::BuyQuantity => {
            session.draft.buy.quantity = Some(parse_quantity(text)?);
            session.state = State::BuyPrice;
            Ok(vec![Reply::text(msg::ASK_PRICE).with_keyboard(Keyboard::cancel_only())])
        }
        State::BuyPrice => {
            let price = parse_price(text)?;
            investments::trade_value(session.draft.buy.quantity.ok_or_else(incomplete)?, price)?;
            session.draft.buy.price = Some(price);
            session.state = State::BuyConfirm;
            Ok(vec![buy_confirmation(&session.draft.buy)?])
        }
        State::SellSelect => {
            let inv = investments::find_active_by_ticker(ctx.storage, ctx.user.id, text)?
                .ok_or_else(|| ServiceError::validation("Ativo não encontrado na sua carteira"))?;
            Ok(start_sell(session, &inv))
        }
        State::SellQuantity => {
            let available = session.draft.sell.available.ok_or_else(incomplete)?;
            let wanted = if msg::SELL_ALL.contains(&text.to_lowercase().as_str()) {
                available
            } else {
                parse_quantity(text)?
            };
            if wanted > available {
                return Err(ServiceError::validation(format!(
                    "Quantidade maior que a disponível ({})",
                    quantity(&available)
                )));
            }
            session.draft.sell.quantity = Some(wanted);
            session.state = State::SellPrice;
            Ok(vec![Reply::text(msg::ASK_PRICE).with_keyboard(Keyboard::cancel_only())])
        }
        State::SellPrice => {
            let price = parse_price(text)?;
            investments::trade_value(session.draft.sell.quantity.ok_or_else(incomplete)?, price)?;
            session.draft.sell.price = Some(price);
            session.state = State::SellConfirm;
            Ok(vec![sell_confirmation(&session.draft.sell)?])
        }
        State::BuyConfirm | State::SellConfirm => match yes_or_no(text) {
            Some(true) => confirm(ctx, session),
            Some(false) => Ok(cancel(session)),
            None => Ok(vec![
                Reply::text("Use os botões para confirmar ou cancelar.").with_keyboard(Keyboard::yes_no()),
            ]),
        },
        _ => menu(ctx, session, text),
    }
}

fn menu(ctx: &Ctx<'_>, session: &mut Session, text: &str) -> Result<Vec<Reply>> {
    let user_id = ctx.user.id;
    Ok(match text {
        msg::BTN_BUY => {
            session.reset(State::BuyType);
            let labels: Vec<&str> = InvestmentType::ALL.iter().map(|k| k.label()).collect();
            vec![Reply::text(msg::ASK_INVESTMENT_TYPE).with_keyboard(Keyboard::choices(&labels, 2))]
        }
        msg::BTN_SELL => {
            let positions = investments::list_investments(ctx.storage, user_id, true)?;
            if positions.is_empty() {
                session.reset(State::InvestmentMenu);
                return Ok(vec![menu_reply_with(msg::NO_POSITIONS, Menu::Investment)]);
            }
            session.reset(State::SellSelect);
            let tickers: Vec<&str> = positions.iter().map(|p| p.ticker.as_str()).collect();
            vec![Reply::text(msg::ASK_SELL_SELECT).with_keyboard(Keyboard::choices(&tickers, 3))]
        }
        msg::BTN_PORTFOLIO => {
            session.reset(State::InvestmentMenu);
            let positions = investments::list_investments(ctx.storage, user_id, true)?;
            let summary = investments::portfolio_summary(ctx.storage, user_id, ctx.prices)?;
            let reply = Reply::text(render::portfolio(&summary, &positions));
            let rows: Vec<Vec<InlineButton>> = positions
                .iter()
                .take(PORTFOLIO_BUTTONS)
                .map(|p| {
                    vec![
                        InlineButton::new(format!("➕ {}", p.ticker), &CallbackAction::BuyMore(p.id)),
                        InlineButton::new(format!("➖ {}", p.ticker), &CallbackAction::SellInvestment(p.id)),
                    ]
                })
                .collect();
            if rows.is_empty() {
                vec![reply]
            } else {
                vec![reply.with_keyboard(Keyboard::inline(rows))]
            }
        }
        msg::BTN_HISTORY => {
            session.reset(State::InvestmentMenu);
            let all = investments::list_investments(ctx.storage, user_id, false)?;
            vec![Reply::text(render::history(&all))]
        }
        _ => unknown_option(session),
    })
}

pub(super) fn on_callback(ctx: &Ctx<'_>, session: &mut Session, action: CallbackAction) -> Result<Vec<Reply>> {
    match action {
        CallbackAction::BuyMore(id) => {
            let inv = active_position(ctx, id)?;
            session.reset(State::BuyQuantity);
            session.draft.buy = BuyDraft {
                kind: Some(inv.kind),
                ticker: Some(inv.ticker.clone()),
                ..BuyDraft::default()
            };
            Ok(vec![
                Reply::text(format!(
                    "➕ Comprar mais {} (você possui {})\n\n{}",
                    inv.ticker,
                    quantity(&inv.current_quantity()),
                    msg::ASK_QUANTITY
                ))
                .with_keyboard(Keyboard::cancel_only()),
            ])
        }
        CallbackAction::SellInvestment(id) => {
            let inv = active_position(ctx, id)?;
            Ok(start_sell(session, &inv))
        }
        CallbackAction::Confirm => confirm(ctx, session),
        CallbackAction::Decline => Ok(cancel(session)),
        other => Err(ServiceError::invariant(format!(
            "investment handler got {:?}",
            other
        ))),
    }
}

fn incomplete() -> ServiceError {
    ServiceError::invariant("investment draft incomplete")
}

fn yes_or_no(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "sim" | "s" | "yes" | "y" | "ok" => Some(true),
        "não" | "nao" | "n" | "no" => Some(false),
        t if t == msg::BTN_CONFIRM.to_lowercase() => Some(true),
        _ => None,
    }
}

fn parse_investment_type(text: &str) -> Result<InvestmentType> {
    let wanted = text.trim().to_lowercase();
    InvestmentType::ALL
        .iter()
        .copied()
        .find(|k| k.label().to_lowercase() == wanted || k.as_str() == wanted)
        .ok_or_else(|| ServiceError::validation("Escolha um tipo de investimento da lista"))
}

fn active_position(ctx: &Ctx<'_>, id: i64) -> Result<Investment> {
    let inv = investments::get_investment(ctx.storage, ctx.user.id, id)?;
    if !inv.is_active {
        return Err(ServiceError::validation(format!(
            "A posição em {} já foi encerrada",
            inv.ticker
        )));
    }
    Ok(inv)
}

fn start_sell(session: &mut Session, inv: &Investment) -> Vec<Reply> {
    let available = inv.current_quantity();
    session.reset(State::SellQuantity);
    session.draft.sell = SellDraft {
        investment_id: Some(inv.id),
        ticker: Some(inv.ticker.clone()),
        available: Some(available),
        ..SellDraft::default()
    };
    vec![
        Reply::text(format!(
            "Você possui {} de {} (preço médio {}).\n\n{}",
            quantity(&available),
            inv.ticker,
            brl(&inv.avg_price),
            msg::ASK_SELL_QUANTITY
        ))
        .with_keyboard(Keyboard::choices(&["Tudo"], 1)),
    ]
}

fn buy_confirmation(draft: &BuyDraft) -> Result<Reply> {
    let (kind, ticker, qty, price) = match (draft.kind, &draft.ticker, draft.quantity, draft.price) {
        (Some(k), Some(t), Some(q), Some(p)) => (k, t, q, p),
        _ => return Err(incomplete()),
    };
    Ok(Reply::text(format!(
        "Confirmar compra?\n\nAtivo: {} ({})\nQuantidade: {}\nPreço: {}\nTotal: {}",
        ticker,
        kind.label(),
        quantity(&qty),
        brl(&price),
        brl(&(qty * price))
    ))
    .with_keyboard(Keyboard::yes_no()))
}

fn sell_confirmation(draft: &SellDraft) -> Result<Reply> {
    let (ticker, qty, price) = match (&draft.ticker, draft.quantity, draft.price) {
        (Some(t), Some(q), Some(p)) => (t, q, p),
        _ => return Err(incomplete()),
    };
    Ok(Reply::text(format!(
        "Confirmar venda?\n\nAtivo: {}\nQuantidade: {}\nPreço: {}\nTotal: {}",
        ticker,
        quantity(&qty),
        brl(&price),
        brl(&(qty * price))
    ))
    .with_keyboard(Keyboard::yes_no()))
}

fn confirm(ctx: &Ctx<'_>, session: &mut Session) -> Result<Vec<Reply>> {
    match session.state {
        State::BuyConfirm => {
            let d = &session.draft.buy;
            let order = Buy {
                ticker: d.ticker.clone().ok_or_else(incomplete)?,
                kind: d.kind.ok_or_else(incomplete)?,
                quantity: d.quantity.ok_or_else(incomplete)?,
                price: d.price.ok_or_else(incomplete)?,
                date: ctx.today,
                broker: None,
            };
            let outcome = investments::buy(ctx.storage, ctx.settings, ctx.user.id, &order, ctx.today)?;
            session.reset(State::InvestmentMenu);
            let inv = &outcome.investment;
            let note = if outcome.merged { "\nPosição somada à existente." } else { "" };
            Ok(vec![menu_reply_with(
                &format!(
                    "✅ Compra registrada!\n\n{}: {} a {} (preço médio){}",
                    inv.ticker,
                    quantity(&inv.current_quantity()),
                    brl(&inv.avg_price),
                    note
                ),
                Menu::Investment,
            )])
        }
        State::SellConfirm => {
            let d = &session.draft.sell;
            let order = Sell {
                investment_id: d.investment_id.ok_or_else(incomplete)?,
                quantity: d.quantity.ok_or_else(incomplete)?,
                price: d.price.ok_or_else(incomplete)?,
                date: ctx.today,
            };
            let outcome = investments::sell(ctx.storage, ctx.user.id, &order, ctx.today)?;
            session.reset(State::InvestmentMenu);
            let result = if outcome.realized >= Decimal::ZERO { "📈 Lucro" } else { "📉 Prejuízo" };
            let mut text = format!(
                "✅ Venda registrada!\n\nRecebido: {}\n{}: {}",
                brl(&outcome.proceeds),
                result,
                brl(&outcome.realized.abs())
            );
            if outcome.closed {
                text.push_str(&format!("\nPosição em {} encerrada.", outcome.investment.ticker));
            } else {
                text.push_str(&format!(
                    "\nRestam {} de {}.",
                    quantity(&outcome.investment.current_quantity()),
                    outcome.investment.ticker
                ));
            }
            Ok(vec![menu_reply_with(&text, Menu::Investment)])
        }
        _ => {
            let menu = session.state.owning_menu();
            session.reset(menu.state());
            Ok(vec![menu_reply_with(msg::ACTION_EXPIRED, menu)])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_words() {
        assert_eq!(yes_or_no("Sim"), Some(true));
        assert_eq!(yes_or_no("não"), Some(false));
        assert_eq!(yes_or_no(msg::BTN_CONFIRM), Some(true));
        assert_eq!(yes_or_no("talvez"), None);
    }

    #[test]
    fn investment_types_parse_from_labels() {
        assert_eq!(parse_investment_type("🏠 FIIs").unwrap(), InvestmentType::Fii);
        assert_eq!(parse_investment_type("fixed").unwrap(), InvestmentType::FixedIncome);
        assert!(parse_investment_type("imóvel").is_err());
    }
}
