// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::Datelike;
use rust_decimal::Decimal;

use crate::bot::callback::CallbackAction;
use crate::bot::keyboard::{InlineButton, Keyboard};
use crate::bot::messages as msg;
use crate::bot::render;
use crate::bot::session::Session;
use crate::bot::state::{Menu, State};
use crate::bot::{Document, Reply};
use crate::error::{Result, ServiceError};
use crate::format::{brl, percent};
use crate::models::InvestorProfile;
use crate::services::categories::{self, CategoryFilter, CategoryRemoval, NewCategory};
use crate::services::export::{self, ExportFormat};
use crate::services::summary;
use crate::services::users::{self, ProfileUpdate};
use crate::validation::{AMOUNT_CEILING, AmountLimits, parse_amount};

use super::{Ctx, kind_choices, menu_reply_with, parse_kind, unknown_option};

pub(super) fn on_text(ctx: &Ctx<'_>, session: &mut Session, text: &str) -> Result<Vec<Reply>> {
    match session.state {
        State::SettingsIncome => {
            let income = parse_optional_amount(text)?;
            users::update_profile(
                ctx.storage,
                ctx.user.id,
                &ProfileUpdate {
                    monthly_income: Some(income),
                    ..ProfileUpdate::default()
                },
            )?;
            session.reset(State::SettingsMenu);
            let text = match income {
                Some(v) => format!("✅ Renda mensal atualizada: {}", brl(&v)),
                None => "✅ Renda mensal removida.".to_string(),
            };
            Ok(vec![menu_reply_with(&text, Menu::Settings)])
        }
        State::SettingsGoalAmount => {
            let goal = parse_optional_amount(text)?;
            users::update_profile(
                ctx.storage,
                ctx.user.id,
                &ProfileUpdate {
                    savings_goal: Some(goal),
                    ..ProfileUpdate::default()
                },
            )?;
            session.reset(State::SettingsMenu);
            let text = match goal {
                Some(v) => format!("🎯 Meta de poupança definida: {} por mês", brl(&v)),
                None => "🎯 Meta de poupança removida.".to_string(),
            };
            Ok(vec![menu_reply_with(&text, Menu::Settings)])
        }
        State::SettingsCategoryType => {
            let kind = parse_kind(text)?;
            session.draft.category.kind = Some(kind);
            session.state = State::SettingsCategoryName;
            Ok(vec![Reply::text(msg::ASK_CATEGORY_NAME).with_keyboard(Keyboard::cancel_only())])
        }
        State::SettingsCategoryName => {
            let kind = session
                .draft
                .category
                .kind
                .ok_or_else(|| ServiceError::invariant("category draft has no type"))?;
            let category = categories::create_category(
                ctx.storage,
                ctx.settings,
                ctx.user.id,
                &NewCategory {
                    name: text.to_string(),
                    kind,
                    icon: None,
                    description: None,
                },
            )?;
            session.reset(State::SettingsMenu);
            Ok(vec![menu_reply_with(
                &format!("✅ Categoria criada: {} ({})", category.display(), kind.label()),
                Menu::Settings,
            )])
        }
        _ => menu(ctx, session, text),
    }
}

fn menu(ctx: &Ctx<'_>, session: &mut Session, text: &str) -> Result<Vec<Reply>> {
    let user = &ctx.user;
    Ok(match text {
        msg::BTN_PROFILE => {
            session.reset(State::SettingsProfile);
            let stats = users::user_stats(ctx.storage, user.id)?;
            let mut rows: Vec<Vec<InlineButton>> = InvestorProfile::ALL
                .iter()
                .map(|p| {
                    let mark = if *p == user.investor_profile { " ✓" } else { "" };
                    vec![InlineButton::new(
                        format!("{}{}", p.label(), mark),
                        &CallbackAction::SetProfile(*p),
                    )]
                })
                .collect();
            rows.push(vec![InlineButton::new("💵 Renda mensal", &CallbackAction::SetIncome)]);
            vec![Reply::text(render::profile(user, &stats)).with_keyboard(Keyboard::inline(rows))]
        }
        msg::BTN_NOTIFICATIONS => {
            session.reset(State::SettingsNotifications);
            let status = if user.notifications_enabled { "ativadas" } else { "desativadas" };
            vec![
                Reply::text(format!("🔔 Suas notificações estão {}.", status)).with_keyboard(
                    Keyboard::inline(vec![vec![
                        InlineButton::new("🔔 Ativar", &CallbackAction::SetNotifications(true)),
                        InlineButton::new("🔕 Desativar", &CallbackAction::SetNotifications(false)),
                    ]]),
                ),
            ]
        }
        msg::BTN_CATEGORIES => {
            session.reset(State::SettingsCategories);
            let list = categories::list_categories(ctx.storage, user.id, CategoryFilter::default())?;
            let mut rows = vec![vec![InlineButton::new(msg::BTN_NEW_CATEGORY, &CallbackAction::NewCategory)]];
            rows.extend(list.iter().filter(|c| !c.is_system).map(|c| {
                vec![InlineButton::new(
                    format!("🗑️ {}", c.display()),
                    &CallbackAction::DeleteCategory(c.id),
                )]
            }));
            vec![Reply::text(render::categories(&list)).with_keyboard(Keyboard::inline(rows))]
        }
        msg::BTN_EXPORT => {
            session.reset(State::SettingsExport);
            vec![Reply::text(msg::ASK_EXPORT_FORMAT).with_keyboard(Keyboard::inline(vec![vec![
                InlineButton::new("📄 CSV", &CallbackAction::Export(ExportFormat::Csv)),
                InlineButton::new("🧾 JSON", &CallbackAction::Export(ExportFormat::Json)),
            ]]))]
        }
        msg::BTN_GOALS => {
            session.reset(State::SettingsGoals);
            vec![goals_view(ctx)?]
        }
        msg::BTN_TIMEZONE => {
            session.reset(State::SettingsTimezone);
            let rows = msg::BR_TIMEZONES
                .iter()
                .map(|(name, label)| {
                    let mark = if *name == user.timezone { " ✓" } else { "" };
                    vec![InlineButton::new(
                        format!("{}{}", label, mark),
                        &CallbackAction::SetTimezone(name.to_string()),
                    )]
                })
                .collect();
            vec![Reply::text(msg::ASK_TIMEZONE).with_keyboard(Keyboard::inline(rows))]
        }
        _ => unknown_option(session),
    })
}

pub(super) fn on_callback(ctx: &Ctx<'_>, session: &mut Session, action: CallbackAction) -> Result<Vec<Reply>> {
    let user_id = ctx.user.id;
    match action {
        CallbackAction::SetProfile(profile) => {
            update(ctx, &ProfileUpdate {
                investor_profile: Some(profile),
                ..ProfileUpdate::default()
            })?;
            session.reset(State::SettingsMenu);
            Ok(vec![menu_reply_with(
                &format!("✅ Perfil atualizado: {}\n{}", profile.label(), profile.description()),
                Menu::Settings,
            )])
        }
        CallbackAction::SetIncome => {
            session.reset(State::SettingsIncome);
            Ok(vec![Reply::text(msg::ASK_INCOME).with_keyboard(Keyboard::cancel_only())])
        }
        CallbackAction::SetSavingsGoal => {
            session.reset(State::SettingsGoalAmount);
            Ok(vec![Reply::text(msg::ASK_GOAL).with_keyboard(Keyboard::cancel_only())])
        }
        CallbackAction::SetNotifications(on) => {
            update(ctx, &ProfileUpdate {
                notifications_enabled: Some(on),
                ..ProfileUpdate::default()
            })?;
            session.reset(State::SettingsMenu);
            let text = if on { "🔔 Notificações ativadas." } else { "🔕 Notificações desativadas." };
            Ok(vec![menu_reply_with(text, Menu::Settings)])
        }
        CallbackAction::SetTimezone(tz) => {
            update(ctx, &ProfileUpdate {
                timezone: Some(tz.clone()),
                ..ProfileUpdate::default()
            })?;
            session.reset(State::SettingsMenu);
            Ok(vec![menu_reply_with(&format!("🌍 Fuso horário definido: {}", tz), Menu::Settings)])
        }
        CallbackAction::NewCategory => {
            session.reset(State::SettingsCategoryType);
            Ok(vec![Reply::text(msg::ASK_CATEGORY_TYPE).with_keyboard(kind_choices())])
        }
        CallbackAction::DeleteCategory(id) => {
            let category = categories::get_category(ctx.storage, user_id, id)?;
            if category.is_system {
                return Err(ServiceError::validation(
                    "Categorias do sistema não podem ser excluídas",
                ));
            }
            session.reset(State::SettingsCategories);
            Ok(vec![
                Reply::text(format!("Excluir a categoria {}?", category.display())).with_keyboard(
                    Keyboard::inline(vec![vec![
                        InlineButton::new("✅ Sim, excluir", &CallbackAction::ConfirmDeleteCategory(id)),
                        InlineButton::new("❌ Não", &CallbackAction::Cancel),
                    ]]),
                ),
            ])
        }
        CallbackAction::ConfirmDeleteCategory(id) => {
            let outcome = categories::delete_category(ctx.storage, user_id, id)?;
            session.reset(State::SettingsMenu);
            let text = match outcome {
                CategoryRemoval::Deleted => "🗑️ Categoria excluída.",
                CategoryRemoval::Deactivated => {
                    "🗃️ A categoria tem lançamentos e foi desativada. O histórico foi mantido."
                }
            };
            Ok(vec![menu_reply_with(text, Menu::Settings)])
        }
        CallbackAction::Export(format) => {
            let export = export::export_user_data(ctx.storage, user_id, format, ctx.today)?;
            session.reset(State::SettingsMenu);
            Ok(vec![
                Reply::text(format!(
                    "📤 Exportação concluída: {} registros em {}.",
                    export.rows,
                    format.as_str().to_uppercase()
                ))
                .with_document(Document {
                    filename: export.filename,
                    bytes: export.bytes,
                })
                .with_keyboard(Keyboard::menu(Menu::Settings)),
            ])
        }
        other => Err(ServiceError::invariant(format!(
            "settings handler got {:?}",
            other
        ))),
    }
}

fn update(ctx: &Ctx<'_>, update: &ProfileUpdate) -> Result<()> {
    users::update_profile(ctx.storage, ctx.user.id, update).map(|_| ())
}

/// `0` clears the value.
fn parse_optional_amount(text: &str) -> Result<Option<Decimal>> {
    let trimmed = text.trim();
    if trimmed == "0" || trimmed == "0,00" || trimmed == "0.00" {
        return Ok(None);
    }
    let limits = AmountLimits {
        min: Decimal::new(1, 2),
        max: AMOUNT_CEILING,
    };
    Ok(Some(parse_amount(trimmed, &limits)?))
}

fn goals_view(ctx: &Ctx<'_>) -> Result<Reply> {
    let month = summary::monthly_summary(
        ctx.storage,
        ctx.user.id,
        ctx.today.year(),
        ctx.today.month(),
        ctx.today,
    )?;
    let mut text = "🎯 Metas\n\n".to_string();
    match ctx.user.savings_goal {
        Some(goal) if !goal.is_zero() => {
            let saved = month.balance.max(Decimal::ZERO);
            let progress = (saved / goal * Decimal::ONE_HUNDRED).min(Decimal::ONE_HUNDRED);
            text.push_str(&format!(
                "Meta mensal de poupança: {}\nPoupado este mês: {} ({})",
                brl(&goal),
                brl(&month.balance),
                percent(&progress)
            ));
        }
        _ => text.push_str("Você ainda não definiu uma meta de poupança."),
    }
    if let Some(income) = ctx.user.monthly_income.filter(|i| !i.is_zero()) {
        let suggested = (income * Decimal::new(2, 1)).round_dp(2);
        text.push_str(&format!(
            "\n\nSugestão: poupar 20% da renda ({}).",
            brl(&suggested)
        ));
    }
    Ok(Reply::text(text).with_keyboard(Keyboard::inline(vec![vec![InlineButton::new(
        "🎯 Definir meta",
        &CallbackAction::SetSavingsGoal,
    )]])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_clears_optional_amounts() {
        assert_eq!(parse_optional_amount("0").unwrap(), None);
        assert_eq!(parse_optional_amount(" 0,00 ").unwrap(), None);
        assert_eq!(
            parse_optional_amount("5.000,00").unwrap(),
            Some(Decimal::new(500000, 2))
        );
        assert!(parse_optional_amount("-10").is_err());
    }
}
