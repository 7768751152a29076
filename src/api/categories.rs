//! Category endpoints. Reads are public; writes are admin-only.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{Category, CategoryUpdate, NewCategory};
use crate::policy::{can_create_category, Actor};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_category_description, validate_category_name};

fn require_category_admin(actor: &Actor) -> Result<(), ApiError> {
    if can_create_category(actor.role) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only admins can manage categories"))
    }
}

/// List active categories
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.categories.list_active().await?))
}

pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Category>, ApiError> {
    let category = state
        .categories
        .find_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;
    Ok(Json(category))
}

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(req): Json<NewCategory>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    require_category_admin(&actor)?;

    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("name", validate_category_name(&req.name))
        .check("description", validate_category_description(&req.description));
    errors.finish()?;

    let category = state.categories.create(req).await?;
    tracing::info!("Category '{}' created by {}", category.name, actor.id);

    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    actor: Actor,
    Json(req): Json<CategoryUpdate>,
) -> Result<Json<Category>, ApiError> {
    require_category_admin(&actor)?;

    let mut errors = ValidationErrorBuilder::new();
    if let Some(name) = &req.name {
        errors.check("name", validate_category_name(name));
    }
    if let Some(description) = &req.description {
        errors.check("description", validate_category_description(description));
    }
    errors.finish()?;

    Ok(Json(state.categories.update(&id, &req).await?))
}

/// Soft delete. Deleting a category that is already inactive is a 404.
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    actor: Actor,
) -> Result<StatusCode, ApiError> {
    require_category_admin(&actor)?;

    state
        .categories
        .find_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;
    state.categories.deactivate(&id).await?;

    Ok(StatusCode::NO_CONTENT)
}
