//! Recipe persistence and the joined, rating-aggregated read queries.

use uuid::Uuid;

use crate::db::query::{arguments, fold, Assignments, Filter, Value};
use crate::db::{
    now, DbPool, NewRecipe, Page, Pagination, Recipe, RecipeFilter, RecipeRow, RecipeSearch,
    RecipeUpdate,
};
use crate::error::{Error, Result};

const RECIPE_SELECT: &str = r#"
    SELECT
        r.id, r.title, r.description, r.ingredients, r.steps, r.prep_time, r.servings,
        r.difficulty, r.category_id, r.author_id, r.approved, r.active, r.view_count,
        r.created_at, r.updated_at,
        c.name AS category_name, c.active AS category_active,
        u.name AS author_name, u.active AS author_active,
        CAST(COALESCE(AVG(rt.rating), 0) AS REAL) AS average_rating,
        COUNT(rt.id) AS rating_count
    FROM recipes r
    INNER JOIN categories c ON c.id = r.category_id
    INNER JOIN users u ON u.id = r.author_id
    LEFT JOIN ratings rt ON rt.recipe_id = r.id
"#;

const RECIPE_COUNT: &str = r#"
    SELECT COUNT(*)
    FROM recipes r
    INNER JOIN categories c ON c.id = r.category_id
    INNER JOIN users u ON u.id = r.author_id
"#;

const SEARCH_COLUMNS: [&str; 3] = [
    "r.title_folded",
    "r.description_folded",
    "r.ingredients_folded",
];

/// Live recipes: the recipe, its category and its author are all active.
fn live() -> Filter {
    Filter::new()
        .require("r.active = 1")
        .require("c.active = 1")
        .require("u.active = 1")
}

#[derive(Clone)]
pub struct RecipeRepository {
    db: DbPool,
}

impl RecipeRepository {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Submit a recipe. It starts unapproved, active and with no views.
    pub async fn create(&self, new_recipe: NewRecipe) -> Result<Recipe> {
        self.ensure_active_category(&new_recipe.category_id).await?;
        self.ensure_active_author(&new_recipe.author_id).await?;

        let id = Uuid::new_v4().to_string();
        let now = now();
        let title = new_recipe.title.trim();
        let description = new_recipe.description.trim();

        sqlx::query(
            r#"
            INSERT INTO recipes (
                id, title, description, ingredients, steps,
                title_folded, description_folded, ingredients_folded,
                prep_time, servings, difficulty,
                category_id, author_id, approved, active, view_count, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 1, 0, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(title)
        .bind(description)
        .bind(&new_recipe.ingredients)
        .bind(&new_recipe.steps)
        .bind(fold(title))
        .bind(fold(description))
        .bind(fold(&new_recipe.ingredients))
        .bind(new_recipe.prep_time)
        .bind(new_recipe.servings)
        .bind(new_recipe.difficulty.as_str())
        .bind(&new_recipe.category_id)
        .bind(&new_recipe.author_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.db)
        .await?;

        tracing::info!(
            recipe_id = %id,
            author_id = %new_recipe.author_id,
            "Recipe submitted for approval"
        );
        self.get(&id).await
    }

    /// Any recipe by id, whatever its moderation state.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Recipe>> {
        let sql = format!("{} WHERE r.id = ? GROUP BY r.id", RECIPE_SELECT);
        let row: Option<RecipeRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Recipe::from))
    }

    async fn get(&self, id: &str) -> Result<Recipe> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found("Recipe"))
    }

    /// Public detail read. Counts a view; concurrent readers may lose an
    /// increment.
    pub async fn view(&self, id: &str) -> Result<Recipe> {
        let mut recipe = self
            .find_by_id(id)
            .await?
            .filter(Recipe::is_publicly_visible)
            .ok_or_else(|| Error::NotFound("Recipe not found or unavailable".to_string()))?;

        sqlx::query("UPDATE recipes SET view_count = view_count + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;
        recipe.view_count += 1;

        Ok(recipe)
    }

    /// Live recipes, optionally including those still awaiting approval.
    pub async fn list(&self, filter: &RecipeFilter, pagination: Pagination) -> Result<Page<Recipe>> {
        let mut predicate = live();
        if filter.only_approved {
            predicate = predicate.require("r.approved = 1");
        }
        let predicate = predicate
            .eq_text("r.category_id", filter.category_id.as_deref())
            .eq("r.difficulty", filter.difficulty.map(|d| d.as_str()))
            .eq_text("r.author_id", filter.author_id.as_deref());

        self.fetch_page(&predicate, pagination).await
    }

    /// Public search over approved, live recipes.
    pub async fn search(&self, search: &RecipeSearch, pagination: Pagination) -> Result<Page<Recipe>> {
        let predicate = live()
            .require("r.approved = 1")
            .contains_any(&SEARCH_COLUMNS, search.term.as_deref())
            .eq_text("r.category_id", search.category_id.as_deref())
            .eq("r.difficulty", search.difficulty.map(|d| d.as_str()));

        self.fetch_page(&predicate, pagination).await
    }

    async fn fetch_page(&self, predicate: &Filter, pagination: Pagination) -> Result<Page<Recipe>> {
        let where_clause = predicate.where_clause();

        let count_sql = format!("{} {}", RECIPE_COUNT, where_clause);
        let total: i64 = sqlx::query_scalar_with(&count_sql, predicate.arguments()?)
            .fetch_one(&self.db)
            .await?;

        let sql = format!(
            "{} {} GROUP BY r.id ORDER BY r.created_at DESC, r.id DESC LIMIT ? OFFSET ?",
            RECIPE_SELECT, where_clause
        );
        let mut values = predicate.values().to_vec();
        values.push(Value::Int(pagination.limit()));
        values.push(Value::Int(pagination.offset()));
        let rows: Vec<RecipeRow> = sqlx::query_as_with(&sql, arguments(&values)?)
            .fetch_all(&self.db)
            .await?;

        Ok(Page::new(
            rows.into_iter().map(Recipe::from).collect(),
            total,
            pagination,
        ))
    }

    /// Apply the supplied fields. Callers decide who may touch the
    /// moderation fields.
    pub async fn update(&self, id: &str, update: &RecipeUpdate) -> Result<Recipe> {
        let title = update.title.as_deref().map(str::trim);
        let description = update.description.as_deref().map(str::trim);
        let ingredients = update.ingredients.as_deref();

        let mut set = Assignments::new();
        set.set("title", title)
            .set("title_folded", title.map(fold))
            .set("description", description)
            .set("description_folded", description.map(fold))
            .set("ingredients", ingredients)
            .set("ingredients_folded", ingredients.map(fold))
            .set("steps", update.steps.as_deref())
            .set("prep_time", update.prep_time)
            .set("servings", update.servings)
            .set("difficulty", update.difficulty.map(|d| d.as_str()))
            .set("category_id", update.category_id.as_deref())
            .set("approved", update.approved)
            .set("active", update.active);
        if set.is_empty() {
            return Err(Error::NoValidFields);
        }

        if let Some(category_id) = &update.category_id {
            self.ensure_active_category(category_id).await?;
        }

        let (sql, args) = set.into_update("recipes", now(), id)?;
        let result = sqlx::query_with(&sql, args).execute(&self.db).await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("Recipe"));
        }

        self.get(id).await
    }

    /// Soft delete; repeating it is not an error at this layer.
    pub async fn deactivate(&self, id: &str) -> Result<Recipe> {
        let update = RecipeUpdate {
            active: Some(false),
            ..Default::default()
        };
        let recipe = self.update(id, &update).await?;
        tracing::info!(recipe_id = %id, "Recipe deactivated");
        Ok(recipe)
    }

    async fn ensure_active_category(&self, category_id: &str) -> Result<()> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE id = ? AND active = 1")
                .bind(category_id)
                .fetch_one(&self.db)
                .await?;
        if count == 0 {
            return Err(Error::ForeignKeyInvalid(
                "Category is invalid or inactive".to_string(),
            ));
        }
        Ok(())
    }

    async fn ensure_active_author(&self, author_id: &str) -> Result<()> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = ? AND active = 1")
            .bind(author_id)
            .fetch_one(&self.db)
            .await?;
        if count == 0 {
            return Err(Error::ForeignKeyInvalid(
                "Author is invalid or inactive".to_string(),
            ));
        }
        Ok(())
    }
}
