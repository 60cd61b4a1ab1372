// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Button labels and fixed texts.

pub const BTN_FINANCE: &str = "💰 Finanças";
pub const BTN_INVESTMENTS: &str = "📈 Investimentos";
pub const BTN_REPORTS: &str = "📊 Relatórios";
pub const BTN_SETTINGS: &str = "⚙️ Configurações";
pub const BTN_HELP: &str = "❓ Ajuda";

pub const BTN_NEW_TRANSACTION: &str = "➕ Novo Lançamento";
pub const BTN_TRANSACTIONS: &str = "📋 Lançamentos";
pub const BTN_MONTH_SUMMARY: &str = "📊 Resumo do Mês";
pub const BTN_ANALYSIS: &str = "📈 Análise";
pub const BTN_MAIN_MENU: &str = "🔙 Menu Principal";

pub const BTN_BUY: &str = "➕ Comprar";
pub const BTN_SELL: &str = "➖ Vender";
pub const BTN_PORTFOLIO: &str = "💼 Carteira";
pub const BTN_HISTORY: &str = "📜 Histórico";

pub const BTN_PROFILE: &str = "👤 Perfil";
pub const BTN_NOTIFICATIONS: &str = "🔔 Notificações";
pub const BTN_CATEGORIES: &str = "🏷️ Categorias";
pub const BTN_EXPORT: &str = "📤 Exportar";
pub const BTN_GOALS: &str = "🎯 Metas";
pub const BTN_TIMEZONE: &str = "🌍 Fuso Horário";

pub const BTN_CANCEL: &str = "❌ Cancelar";
pub const BTN_CONFIRM: &str = "✅ Confirmar";
pub const BTN_TODAY: &str = "📅 Hoje";
pub const BTN_YESTERDAY: &str = "📅 Ontem";
pub const BTN_NEW_CATEGORY: &str = "➕ Nova Categoria";

pub const WELCOME: &str = "👋 Olá, {name}!\n\n\
Sou seu assistente de finanças pessoais. Com ele você pode:\n\
• registrar receitas e despesas\n\
• acompanhar o resumo do mês e sua saúde financeira\n\
• controlar sua carteira de investimentos\n\n\
Escolha uma opção no menu abaixo.";

pub const HELP: &str = "❓ Ajuda\n\n\
/start  volta ao menu principal\n\
/menu   mostra o menu atual\n\
/cancel cancela a operação em andamento\n\
/help   mostra esta mensagem\n\n\
Valores: 1.234,56 ou 1234.56\n\
Datas: hoje, ontem, DD/MM ou DD/MM/AAAA";

pub const MAIN_MENU: &str = "🏠 Menu principal. O que deseja fazer?";
pub const FINANCE_MENU: &str = "💰 Finanças. Escolha uma opção:";
pub const INVESTMENT_MENU: &str = "📈 Investimentos. Escolha uma opção:";
pub const SETTINGS_MENU: &str = "⚙️ Configurações. Escolha uma opção:";

pub const NOT_FOUND: &str = "🔍 Registro não encontrado.";
pub const TRY_AGAIN_LATER: &str = "⏳ Não foi possível concluir agora. Tente novamente em instantes.";
pub const GENERIC_FAILURE: &str = "⚠️ Algo deu errado. Voltamos ao menu.";
pub const SESSION_EXPIRED: &str = "⌛ Sua sessão expirou por inatividade. Voltamos ao menu principal.";
pub const UNKNOWN_OPTION: &str = "🤔 Não entendi. Use os botões do menu.";
pub const CANCELLED: &str = "❌ Operação cancelada.";
pub const NOT_AUTHORIZED: &str = "🚫 Você não tem permissão para usar este bot.";
pub const ACTION_EXPIRED: &str = "⌛ Esta ação não está mais disponível.";

pub const ASK_TRANSACTION_TYPE: &str = "Qual o tipo do lançamento?";
pub const ASK_AMOUNT: &str = "💵 Qual o valor? (ex.: 1.234,56)";
pub const ASK_DESCRIPTION: &str = "📝 Descreva o lançamento:";
pub const ASK_PAYMENT_METHOD: &str = "💳 Qual a forma de pagamento?";
pub const ASK_DATE: &str = "📅 Qual a data? (hoje, ontem, DD/MM ou DD/MM/AAAA)";
pub const ASK_CATEGORY: &str = "🏷️ Escolha a categoria:";
pub const ASK_CATEGORY_NAME: &str = "🏷️ Nome da nova categoria:";

pub const ASK_INVESTMENT_TYPE: &str = "Qual o tipo de investimento?";
pub const ASK_QUANTITY: &str = "🔢 Quantidade:";
pub const ASK_PRICE: &str = "💵 Preço unitário (ex.: 25,50):";
pub const ASK_SELL_SELECT: &str = "Qual ativo deseja vender?";
pub const ASK_SELL_QUANTITY: &str = "🔢 Quantidade a vender (ou \"tudo\"):";
pub const NO_POSITIONS: &str = "💼 Você não possui ativos na carteira.";

pub const ASK_INCOME: &str = "💵 Qual a sua renda mensal? (0 para remover)";
pub const ASK_GOAL: &str = "🎯 Quanto deseja poupar por mês? (0 para remover)";
pub const ASK_CATEGORY_TYPE: &str = "A nova categoria é de receita ou despesa?";
pub const ASK_EXPORT_FORMAT: &str = "📤 Em qual formato deseja exportar seus dados?";
pub const ASK_TIMEZONE: &str = "🌍 Escolha o seu fuso horário:";

/// Zones offered in settings.
pub const BR_TIMEZONES: &[(&str, &str)] = &[
    ("America/Sao_Paulo", "Brasília (UTC-3)"),
    ("America/Manaus", "Manaus (UTC-4)"),
    ("America/Rio_Branco", "Rio Branco (UTC-5)"),
    ("America/Noronha", "Fernando de Noronha (UTC-2)"),
];

/// Words accepted as "sell everything".
pub const SELL_ALL: &[&str] = &["tudo", "todas", "todos", "all"];
