// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::config::Settings;
use crate::db::Storage;
use crate::error::{Result, ServiceError};
use crate::models::{Category, TransactionType};
use crate::validation::{validate_category_name, validate_text};

/// Seeded for every new user; flagged as system so they cannot be edited.
pub const DEFAULT_CATEGORIES: &[(TransactionType, &str, &str, &str)] = &[
    (TransactionType::Income, "Salário", "💼", "Salário mensal e benefícios"),
    (TransactionType::Income, "Freelance", "💻", "Trabalhos freelance e consultoria"),
    (TransactionType::Income, "Investimentos", "📈", "Rendimentos de investimentos"),
    (TransactionType::Income, "Vendas", "🛒", "Vendas de produtos e serviços"),
    (TransactionType::Income, "Bônus", "🎁", "Bônus, comissões e gratificações"),
    (TransactionType::Income, "Aluguel", "🏠", "Renda de aluguéis"),
    (TransactionType::Income, "Outros", "💰", "Outras fontes de receita"),
    (TransactionType::Expense, "Alimentação", "🍽️", "Supermercado, restaurantes e delivery"),
    (TransactionType::Expense, "Transporte", "🚗", "Combustível, transporte público e viagens"),
    (TransactionType::Expense, "Moradia", "🏠", "Aluguel, condomínio e manutenção"),
    (TransactionType::Expense, "Saúde", "🏥", "Plano de saúde, medicamentos e consultas"),
    (TransactionType::Expense, "Educação", "📚", "Cursos, livros e material escolar"),
    (TransactionType::Expense, "Lazer", "🎮", "Entretenimento, cinema e atividades"),
    (TransactionType::Expense, "Compras", "🛍️", "Roupas, eletrônicos e compras diversas"),
    (TransactionType::Expense, "Contas", "📄", "Água, luz, internet e telefone"),
    (TransactionType::Expense, "Impostos", "📋", "IPTU, IPVA e outros impostos"),
    (TransactionType::Expense, "Seguros", "🛡️", "Seguro auto, residencial e vida"),
    (TransactionType::Expense, "Pets", "🐕", "Veterinário, ração e cuidados com pets"),
    (TransactionType::Expense, "Beleza", "💄", "Salão, cosméticos e cuidados pessoais"),
    (TransactionType::Expense, "Doações", "❤️", "Doações e caridade"),
    (TransactionType::Expense, "Outros", "💸", "Outras despesas não categorizadas"),
];

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub kind: TransactionType,
    pub icon: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct CategoryFilter {
    pub kind: Option<TransactionType>,
    pub active_only: bool,
    pub include_system: bool,
}

impl Default for CategoryFilter {
    fn default() -> Self {
        Self {
            kind: None,
            active_only: true,
            include_system: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryRemoval {
    /// Still referenced by transactions; hidden instead of removed.
    Deactivated,
    Deleted,
}

pub(crate) fn seed_defaults(conn: &Connection, user_id: i64) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO categories(user_id, name, name_key, type, icon, description, is_system)
         VALUES (?1,?2,?3,?4,?5,?6,1)",
    )?;
    for (kind, name, icon, description) in DEFAULT_CATEGORIES {
        stmt.execute(params![user_id, name, name_key(name), kind, icon, description])?;
    }
    Ok(())
}

pub fn create_category(
    storage: &Storage,
    settings: &Settings,
    user_id: i64,
    new: &NewCategory,
) -> Result<Category> {
    let category = storage.write(|tx| insert_category(tx, settings, user_id, new))?;
    info!(user_id, category_id = category.id, name = %category.name, "category created");
    Ok(category)
}

/// Uniqueness key. SQLite's NOCASE folds ASCII only, so accented names are
/// folded here.
fn name_key(name: &str) -> String {
    name.to_lowercase()
}

/// Shared by the wizard path that creates a category and a transaction in one go.
/// A deactivated custom category with the same name is brought back instead
/// of inserting a new row.
pub(crate) fn insert_category(
    conn: &Connection,
    settings: &Settings,
    user_id: i64,
    new: &NewCategory,
) -> Result<Category> {
    let name = validate_category_name(&new.name)?;
    let description = new
        .description
        .as_deref()
        .map(|d| validate_text(d, 0, 255))
        .transpose()?
        .filter(|d| !d.is_empty());

    let dormant = match same_name(conn, user_id, new.kind, &name, None)? {
        Some(existing) if !existing.is_active && !existing.is_system => Some(existing),
        Some(_) => {
            return Err(ServiceError::validation(format!(
                "Já existe uma categoria '{}' deste tipo",
                name
            )));
        }
        None => None,
    };

    let custom: i64 = conn.query_row(
        "SELECT COUNT(*) FROM categories WHERE user_id=?1 AND is_system=0 AND is_active=1",
        params![user_id],
        |r| r.get(0),
    )?;
    if custom as usize >= settings.max_categories_per_user {
        return Err(ServiceError::validation(format!(
            "Limite de {} categorias personalizadas atingido",
            settings.max_categories_per_user
        )));
    }

    if let Some(existing) = dormant {
        conn.execute(
            "UPDATE categories SET name=?1, name_key=?2, is_active=1,
             icon=COALESCE(?3, icon), description=COALESCE(?4, description) WHERE id=?5",
            params![name, name_key(&name), new.icon, description, existing.id],
        )?;
        debug!(user_id, category_id = existing.id, "deactivated category reactivated");
        return load(conn, existing.id);
    }

    conn.execute(
        "INSERT INTO categories(user_id, name, name_key, type, icon, description, is_system)
         VALUES (?1,?2,?3,?4,?5,?6,0)",
        params![user_id, name, name_key(&name), new.kind, new.icon, description],
    )?;
    load(conn, conn.last_insert_rowid())
}

/// The user's category of this type whose name folds to the same key, active or not.
fn same_name(
    conn: &Connection,
    user_id: i64,
    kind: TransactionType,
    name: &str,
    except_id: Option<i64>,
) -> Result<Option<Category>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {} FROM categories WHERE user_id=?1 AND type=?2 AND name_key=?3 AND id<>?4",
                Category::COLUMNS
            ),
            params![user_id, kind, name_key(name), except_id.unwrap_or(-1)],
            Category::from_row,
        )
        .optional()?)
}

fn load(conn: &Connection, id: i64) -> Result<Category> {
    conn.query_row(
        &format!("SELECT {} FROM categories WHERE id=?1", Category::COLUMNS),
        params![id],
        Category::from_row,
    )
    .optional()?
    .ok_or(ServiceError::NotFound("category"))
}

/// Load a category and check it belongs to `user_id`.
pub(crate) fn owned(conn: &Connection, user_id: i64, id: i64) -> Result<Category> {
    let category = load(conn, id)?;
    if category.user_id != user_id {
        return Err(ServiceError::Permission);
    }
    Ok(category)
}

pub fn get_category(storage: &Storage, user_id: i64, id: i64) -> Result<Category> {
    storage.read(|conn| owned(conn, user_id, id))
}

/// Custom categories first, then system ones, each alphabetically.
pub fn list_categories(
    storage: &Storage,
    user_id: i64,
    filter: CategoryFilter,
) -> Result<Vec<Category>> {
    storage.read(|conn| {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM categories
             WHERE user_id=?1
               AND (?2 IS NULL OR type=?2)
               AND (?3=0 OR is_active=1)
               AND (?4=1 OR is_system=0)
             ORDER BY is_system ASC, name COLLATE NOCASE ASC",
            Category::COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![user_id, filter.kind, filter.active_only, filter.include_system],
            Category::from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    })
}

/// Match a button label (`"🍽️ Alimentação"`) or a bare name, ignoring case.
pub fn find_by_name(
    storage: &Storage,
    user_id: i64,
    kind: TransactionType,
    text: &str,
) -> Result<Option<Category>> {
    let wanted = text.trim().to_lowercase();
    let categories = list_categories(
        storage,
        user_id,
        CategoryFilter {
            kind: Some(kind),
            ..CategoryFilter::default()
        },
    )?;
    Ok(categories
        .into_iter()
        .find(|c| c.name.to_lowercase() == wanted || c.display().to_lowercase() == wanted))
}

pub fn update_category(
    storage: &Storage,
    user_id: i64,
    id: i64,
    update: &CategoryUpdate,
) -> Result<Category> {
    let category = storage.write(|tx| {
        let mut category = owned(tx, user_id, id)?;
        if category.is_system {
            return Err(ServiceError::validation(
                "Categorias do sistema não podem ser alteradas",
            ));
        }
        if let Some(name) = &update.name {
            let name = validate_category_name(name)?;
            if same_name(tx, user_id, category.kind, &name, Some(id))?.is_some() {
                return Err(ServiceError::validation(format!(
                    "Já existe uma categoria '{}' deste tipo",
                    name
                )));
            }
            category.name = name;
        }
        if let Some(description) = &update.description {
            category.description = Some(validate_text(description, 0, 255)?).filter(|d| !d.is_empty());
        }
        if let Some(icon) = &update.icon {
            category.icon = Some(icon.trim().to_string()).filter(|i| !i.is_empty());
        }
        if let Some(active) = update.is_active {
            category.is_active = active;
        }
        tx.execute(
            "UPDATE categories SET name=?1, name_key=?2, description=?3, icon=?4, is_active=?5
             WHERE id=?6",
            params![
                category.name,
                name_key(&category.name),
                category.description,
                category.icon,
                category.is_active,
                id
            ],
        )?;
        Ok(category)
    })?;
    info!(user_id, category_id = id, "category updated");
    Ok(category)
}

pub fn delete_category(storage: &Storage, user_id: i64, id: i64) -> Result<CategoryRemoval> {
    let outcome = storage.write(|tx| {
        let category = owned(tx, user_id, id)?;
        if category.is_system {
            return Err(ServiceError::validation(
                "Categorias do sistema não podem ser excluídas",
            ));
        }
        let used: i64 = tx.query_row(
            "SELECT COUNT(*) FROM transactions WHERE category_id=?1",
            params![id],
            |r| r.get(0),
        )?;
        if used > 0 {
            tx.execute("UPDATE categories SET is_active=0 WHERE id=?1", params![id])?;
            Ok(CategoryRemoval::Deactivated)
        } else {
            tx.execute("DELETE FROM categories WHERE id=?1", params![id])?;
            Ok(CategoryRemoval::Deleted)
        }
    })?;
    info!(user_id, category_id = id, ?outcome, "category removed");
    Ok(outcome)
}
