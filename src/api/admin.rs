//! Admin listings: the recipe moderation queue and user management.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::{Difficulty, Page, Pagination, Recipe, RecipeFilter, Role, UserFilter, UserResponse};
use crate::policy::Actor;
use crate::AppState;

use super::auth::require_admin;
use super::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct AdminRecipeQuery {
    /// `true` lists approved recipes only; otherwise pending ones are included
    pub approved: Option<bool>,
    pub category_id: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub author_id: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AdminUserQuery {
    pub search: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_recipes(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<AdminRecipeQuery>,
) -> Result<Json<Page<Recipe>>, ApiError> {
    require_admin(&actor)?;

    let filter = RecipeFilter {
        category_id: query.category_id,
        difficulty: query.difficulty,
        author_id: query.author_id,
        only_approved: query.approved.unwrap_or(false),
    };
    let page = state
        .recipes
        .list(&filter, Pagination::new(query.page, query.limit))
        .await?;
    Ok(Json(page))
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<AdminUserQuery>,
) -> Result<Json<Page<UserResponse>>, ApiError> {
    require_admin(&actor)?;

    let filter = UserFilter {
        search: query.search,
        role: query.role,
        active: query.active,
    };
    let page = state
        .users
        .list(&filter, Pagination::new(query.page, query.limit))
        .await?;
    Ok(Json(page.map(UserResponse::from)))
}
