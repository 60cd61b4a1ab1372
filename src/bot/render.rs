// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Plain-text views of service results.

use rust_decimal::Decimal;
use std::fmt::Write;

use crate::format::{brl, date_br, month_name, percent, quantity};
use crate::models::{Category, Investment, TransactionType, User};
use crate::services::investments::PortfolioSummary;
use crate::services::summary::{CategoryTotal, HealthScore, MonthlySummary, SpendingTrend};
use crate::services::transactions::TransactionEntry;
use crate::services::users::UserStats;

fn signed(kind: TransactionType, amount: &Decimal) -> String {
    match kind {
        TransactionType::Income => format!("+{}", brl(amount)),
        TransactionType::Expense => format!("-{}", brl(amount)),
    }
}

fn category_block(out: &mut String, title: &str, totals: &[CategoryTotal]) {
    if totals.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{}", title);
    for t in totals {
        let _ = writeln!(out, "• {}: {} ({})", t.category, brl(&t.total), percent(&t.share));
    }
}

pub fn month_summary(s: &MonthlySummary) -> String {
    let mut out = format!("📊 Resumo de {} de {}\n\n", month_name(s.month), s.year);
    let _ = writeln!(out, "💰 Receitas: {}", brl(&s.total_income));
    let _ = writeln!(out, "💸 Despesas: {}", brl(&s.total_expenses));
    let _ = writeln!(out, "📈 Saldo: {}", brl(&s.balance));
    let _ = writeln!(out, "💾 Taxa de poupança: {}", percent(&s.savings_rate));
    let _ = writeln!(out, "📅 Gasto médio diário: {}", brl(&s.daily_average_expense));
    let _ = writeln!(out, "🧾 Lançamentos: {}", s.transaction_count);
    category_block(&mut out, "Receitas por categoria:", &s.income_by_category);
    category_block(&mut out, "Despesas por categoria:", &s.expenses_by_category);
    out.trim_end().to_string()
}

pub fn analysis(health: &HealthScore, trend: &SpendingTrend, advice: &[String]) -> String {
    let mut out = format!(
        "{} Saúde financeira: {}/100 ({})\n",
        health.label.emoji(),
        health.score,
        health.label.text()
    );
    if health.months_analyzed > 0 {
        let _ = writeln!(
            out,
            "Meses analisados: {} | Poupança média: {} | Meses positivos: {}",
            health.months_analyzed,
            percent(&health.average_savings_rate),
            health.positive_months
        );
    }
    let _ = writeln!(out, "\n📉 Tendência de gastos: {}", trend.trend.text());
    if !trend.change.is_zero() {
        let _ = writeln!(out, "Variação: {}", percent(&trend.change));
    }
    for (month, expenses) in &trend.monthly_expenses {
        let _ = writeln!(out, "• {}: {}", month, brl(expenses));
    }
    if !advice.is_empty() {
        let _ = writeln!(out, "\n💡 Recomendações:");
        for line in advice {
            let _ = writeln!(out, "{}", line);
        }
    }
    out.trim_end().to_string()
}

pub fn portfolio(summary: &PortfolioSummary, positions: &[Investment]) -> String {
    if positions.is_empty() {
        return "💼 Sua carteira está vazia.".to_string();
    }
    let mut out = "💼 Sua carteira\n\n".to_string();
    let _ = writeln!(out, "Investido: {}", brl(&summary.total_invested));
    let _ = writeln!(out, "Valor atual: {}", brl(&summary.current_value));
    if summary.priced {
        let _ = writeln!(
            out,
            "Resultado: {} ({})",
            brl(&summary.profit_loss),
            percent(&summary.profit_loss_pct)
        );
    } else {
        let _ = writeln!(out, "Sem cotações: valor atual igual ao investido.");
    }
    let _ = writeln!(
        out,
        "Ativos: {} | Tipos: {} | Diversificação: {}/100",
        summary.asset_count, summary.type_count, summary.diversification_score
    );
    for group in &summary.by_type {
        let _ = writeln!(
            out,
            "\n{} {} ({})",
            group.kind.label(),
            brl(&group.invested),
            percent(&group.percentage)
        );
        for inv in positions.iter().filter(|i| i.kind == group.kind) {
            let _ = writeln!(
                out,
                "• {}: {} x {}",
                inv.ticker,
                quantity(&inv.current_quantity()),
                brl(&inv.avg_price)
            );
        }
    }
    out.trim_end().to_string()
}

pub fn history(positions: &[Investment]) -> String {
    if positions.is_empty() {
        return "📜 Nenhuma operação registrada.".to_string();
    }
    let mut out = "📜 Histórico de investimentos\n".to_string();
    for inv in positions {
        let status = if inv.is_active { "ativo" } else { "encerrado" };
        let _ = write!(
            out,
            "\n{} ({}) {}: {} x {} desde {}",
            inv.ticker,
            inv.kind.label(),
            status,
            quantity(&inv.quantity),
            brl(&inv.avg_price),
            date_br(&inv.purchase_date)
        );
        if let Some(sold) = inv.sale_quantity.filter(|q| !q.is_zero()) {
            let _ = write!(out, ", vendidos {}", quantity(&sold));
        }
        if let (Some(price), Some(date)) = (inv.sale_price, inv.sale_date) {
            let _ = write!(out, " a {} em {}", brl(&price), date_br(&date));
        }
    }
    out
}

pub fn transaction_line(entry: &TransactionEntry) -> String {
    let t = &entry.transaction;
    format!(
        "{} {} {}",
        date_br(&t.date),
        signed(t.kind, &t.amount),
        t.description
    )
}

pub fn transaction_details(entry: &TransactionEntry) -> String {
    let t = &entry.transaction;
    let mut out = format!("{}\n\n", t.kind.label());
    let _ = writeln!(out, "Valor: {}", brl(&t.amount));
    let _ = writeln!(out, "Descrição: {}", t.description);
    let _ = writeln!(out, "Categoria: {}", entry.category);
    let _ = writeln!(out, "Pagamento: {}", t.payment_method.label());
    let _ = writeln!(out, "Data: {}", date_br(&t.date));
    if let Some(notes) = &t.notes {
        let _ = writeln!(out, "Observações: {}", notes);
    }
    out.trim_end().to_string()
}

pub fn profile(user: &User, stats: &UserStats) -> String {
    let mut out = format!("👤 {}\n\n", user.display_name());
    let _ = writeln!(
        out,
        "Perfil de investidor: {}\n{}",
        user.investor_profile.label(),
        user.investor_profile.description()
    );
    let income = user.monthly_income.map(|v| brl(&v)).unwrap_or_else(|| "não informada".into());
    let goal = user.savings_goal.map(|v| brl(&v)).unwrap_or_else(|| "não definida".into());
    let _ = writeln!(out, "Renda mensal: {}", income);
    let _ = writeln!(out, "Meta de poupança: {}", goal);
    let _ = writeln!(out, "Fuso horário: {}", user.timezone);
    let _ = writeln!(
        out,
        "\nLançamentos: {} | Ativos: {} | Categorias próprias: {}",
        stats.transactions, stats.active_investments, stats.custom_categories
    );
    let _ = writeln!(out, "Membro desde {}", date_br(&stats.member_since.date()));
    out.trim_end().to_string()
}

pub fn categories(list: &[Category]) -> String {
    let mut out = "🏷️ Suas categorias\n".to_string();
    for kind in TransactionType::ALL {
        let _ = writeln!(out, "\n{}", kind.label());
        for c in list.iter().filter(|c| c.kind == *kind) {
            let marker = if c.is_system { "" } else { " (personalizada)" };
            let _ = writeln!(out, "• {}{}", c.display(), marker);
        }
    }
    out.trim_end().to_string()
}
