//! Recipe endpoints: public search and detail, authenticated submission,
//! owner-or-admin edits.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::{Difficulty, NewRecipe, Page, Pagination, Recipe, RecipeSearch, RecipeUpdate};
use crate::policy::{can_moderate_recipe, can_mutate_recipe, Actor};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_prep_time, validate_required_text, validate_servings, validate_title,
};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
    pub category_id: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRecipeRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub ingredients: String,
    pub steps: String,
    pub prep_time: Option<i64>,
    #[serde(default = "default_servings")]
    pub servings: i64,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub category_id: String,
}

fn default_servings() -> i64 {
    1
}

fn validate_create_request(req: &CreateRecipeRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("title", validate_title(&req.title))
        .check("ingredients", validate_required_text(&req.ingredients, "Ingredients"))
        .check("steps", validate_required_text(&req.steps, "Steps"))
        .check("servings", validate_servings(req.servings))
        .check("prep_time", validate_prep_time(req.prep_time))
        .check("category_id", validate_required_text(&req.category_id, "Category"));
    errors.finish()
}

fn validate_update_request(req: &RecipeUpdate) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(title) = &req.title {
        errors.check("title", validate_title(title));
    }
    if let Some(ingredients) = &req.ingredients {
        errors.check("ingredients", validate_required_text(ingredients, "Ingredients"));
    }
    if let Some(steps) = &req.steps {
        errors.check("steps", validate_required_text(steps, "Steps"));
    }
    if let Some(servings) = req.servings {
        errors.check("servings", validate_servings(servings));
    }
    errors.check("prep_time", validate_prep_time(req.prep_time));
    errors.finish()
}

/// Public search over approved recipes
pub async fn search_recipes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Page<Recipe>>, ApiError> {
    let search = RecipeSearch {
        term: query.search,
        category_id: query.category_id,
        difficulty: query.difficulty,
    };
    let page = state
        .recipes
        .search(&search, Pagination::new(query.page, query.limit))
        .await?;
    Ok(Json(page))
}

/// Recipe detail; counts a view
pub async fn get_recipe(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Recipe>, ApiError> {
    Ok(Json(state.recipes.view(&id).await?))
}

/// Submit a recipe; it waits for approval
pub async fn create_recipe(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(req): Json<CreateRecipeRequest>,
) -> Result<(StatusCode, Json<Recipe>), ApiError> {
    validate_create_request(&req)?;

    let recipe = state
        .recipes
        .create(NewRecipe {
            title: req.title,
            description: req.description,
            ingredients: req.ingredients,
            steps: req.steps,
            prep_time: req.prep_time,
            servings: req.servings,
            difficulty: req.difficulty,
            category_id: req.category_id,
            author_id: actor.id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(recipe)))
}

/// Load a live recipe the actor may change. Admins also reach inactive ones.
async fn load_for_mutation(state: &AppState, id: &str, actor: &Actor) -> Result<Recipe, ApiError> {
    let recipe = state
        .recipes
        .find_by_id(id)
        .await?
        .filter(|r| r.is_active() || actor.is_admin())
        .ok_or_else(|| ApiError::not_found("Recipe not found"))?;

    if !can_mutate_recipe(&actor.id, actor.role, &recipe) {
        return Err(ApiError::forbidden(
            "You can only change your own recipes",
        ));
    }
    Ok(recipe)
}

pub async fn update_recipe(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    actor: Actor,
    Json(req): Json<RecipeUpdate>,
) -> Result<Json<Recipe>, ApiError> {
    validate_update_request(&req)?;
    load_for_mutation(&state, &id, &actor).await?;

    let update = if can_moderate_recipe(actor.role) {
        req
    } else {
        if req.touches_moderation() {
            tracing::debug!(
                recipe_id = %id,
                user_id = %actor.id,
                "Ignoring moderation fields from non-admin"
            );
        }
        req.without_moderation()
    };

    Ok(Json(state.recipes.update(&id, &update).await?))
}

/// Soft delete. Deleting an inactive recipe is a 404.
pub async fn delete_recipe(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    actor: Actor,
) -> Result<StatusCode, ApiError> {
    let recipe = load_for_mutation(&state, &id, &actor).await?;
    if !recipe.is_active() {
        return Err(ApiError::not_found("Recipe not found"));
    }

    state.recipes.deactivate(&id).await?;
    tracing::info!("Recipe {} deleted by {}", id, actor.id);

    Ok(StatusCode::NO_CONTENT)
}
