//! Category models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::flag;

#[derive(Debug, Clone, FromRow)]
pub struct CategoryRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub active: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            active: flag(row.active),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl Category {
    pub fn is_active(&self) -> bool {
        self.active
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryFilter {
    pub search: Option<String>,
    pub active: Option<bool>,
}
