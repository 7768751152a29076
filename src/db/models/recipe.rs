//! Recipe models, the joined read view and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::user::Role;
use crate::db::flag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(format!("Unknown difficulty: {}", s)),
        }
    }
}

impl From<String> for Difficulty {
    fn from(s: String) -> Self {
        s.parse().unwrap_or_default()
    }
}

/// A `recipes` row joined with its category, author and rating aggregate.
#[derive(Debug, Clone, FromRow)]
pub struct RecipeRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub ingredients: String,
    pub steps: String,
    pub prep_time: Option<i64>,
    pub servings: i64,
    pub difficulty: String,
    pub category_id: String,
    pub author_id: String,
    pub approved: i64,
    pub active: i64,
    pub view_count: i64,
    pub created_at: String,
    pub updated_at: String,
    pub category_name: String,
    pub category_active: i64,
    pub author_name: String,
    pub author_active: i64,
    pub average_rating: f64,
    pub rating_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: String,
    pub title: String,
    pub description: String,
    pub ingredients: String,
    pub steps: String,
    pub prep_time: Option<i64>,
    pub servings: i64,
    pub difficulty: Difficulty,
    pub category_id: String,
    pub category_name: String,
    pub author_id: String,
    pub author_name: String,
    pub approved: bool,
    pub active: bool,
    pub view_count: i64,
    pub average_rating: f64,
    pub rating_count: i64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip)]
    pub category_active: bool,
    #[serde(skip)]
    pub author_active: bool,
}

impl From<RecipeRow> for Recipe {
    fn from(row: RecipeRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            ingredients: row.ingredients,
            steps: row.steps,
            prep_time: row.prep_time,
            servings: row.servings,
            difficulty: Difficulty::from(row.difficulty),
            category_id: row.category_id,
            category_name: row.category_name,
            author_id: row.author_id,
            author_name: row.author_name,
            approved: flag(row.approved),
            active: flag(row.active),
            view_count: row.view_count,
            average_rating: row.average_rating,
            rating_count: row.rating_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
            category_active: flag(row.category_active),
            author_active: flag(row.author_active),
        }
    }
}

impl Recipe {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_approved(&self) -> bool {
        self.approved
    }

    /// Admins may edit any recipe; everyone else only their own.
    pub fn can_edit(&self, actor_id: &str, actor_role: Role) -> bool {
        actor_role.is_admin() || self.author_id == actor_id
    }

    /// Shown to the public only when it and its category and author are all live.
    pub fn is_publicly_visible(&self) -> bool {
        self.active && self.approved && self.category_active && self.author_active
    }
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub title: String,
    pub description: String,
    pub ingredients: String,
    pub steps: String,
    pub prep_time: Option<i64>,
    pub servings: i64,
    pub difficulty: Difficulty,
    pub category_id: String,
    pub author_id: String,
}

/// Updatable recipe fields. `approved` and `active` are moderation fields;
/// see [`RecipeUpdate::without_moderation`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub ingredients: Option<String>,
    pub steps: Option<String>,
    pub prep_time: Option<i64>,
    pub servings: Option<i64>,
    pub difficulty: Option<Difficulty>,
    pub category_id: Option<String>,
    pub approved: Option<bool>,
    pub active: Option<bool>,
}

impl RecipeUpdate {
    /// Drop the moderation fields, for actors who may not moderate.
    pub fn without_moderation(self) -> Self {
        Self {
            approved: None,
            active: None,
            ..self
        }
    }

    pub fn touches_moderation(&self) -> bool {
        self.approved.is_some() || self.active.is_some()
    }
}

/// Public free-text search; only approved, live recipes match.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeSearch {
    pub term: Option<String>,
    pub category_id: Option<String>,
    pub difficulty: Option<Difficulty>,
}

/// Listing filter over live recipes; `only_approved = false` is the
/// moderation queue view.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeFilter {
    pub category_id: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub author_id: Option<String>,
    #[serde(default = "default_only_approved")]
    pub only_approved: bool,
}

fn default_only_approved() -> bool {
    true
}

impl Default for RecipeFilter {
    fn default() -> Self {
        Self {
            category_id: None,
            difficulty: None,
            author_id: None,
            only_approved: default_only_approved(),
        }
    }
}
