use uuid::Uuid;

use crate::db::query::{arguments, fold, Assignments, Filter, Value};
use crate::db::{
    now, Category, CategoryFilter, CategoryRow, CategoryUpdate, DbPool, NewCategory, Page,
    Pagination,
};
use crate::error::{Error, Result};

const CATEGORY_COLUMNS: &str = "id, name, description, active, created_at, updated_at";

fn duplicate_name() -> Error {
    Error::DuplicateKey("Category already exists".to_string())
}

#[derive(Clone)]
pub struct CategoryRepository {
    db: DbPool,
}

impl CategoryRepository {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Create a category. The name must be free among active categories;
    /// names of deactivated categories may be reused.
    pub async fn create(&self, new_category: NewCategory) -> Result<Category> {
        let name = new_category.name.trim();
        if self.find_by_name(name).await?.is_some() {
            return Err(duplicate_name());
        }

        let id = Uuid::new_v4().to_string();
        let now = now();
        let description = new_category.description.trim();

        sqlx::query(
            r#"
            INSERT INTO categories (
                id, name, description, name_folded, description_folded, active,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(name)
        .bind(description)
        .bind(fold(name))
        .bind(fold(description))
        .bind(&now)
        .bind(&now)
        .execute(&self.db)
        .await
        .map_err(|e| match Error::from(e) {
            Error::DuplicateKey(_) => duplicate_name(),
            other => other,
        })?;

        tracing::info!(category_id = %id, name = %name, "Category created");
        self.get(&id).await
    }

    /// Active category by id.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Category>> {
        let sql = format!(
            "SELECT {} FROM categories WHERE id = ? AND active = 1",
            CATEGORY_COLUMNS
        );
        let row: Option<CategoryRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Category::from))
    }

    /// Active category by exact name.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Category>> {
        let sql = format!(
            "SELECT {} FROM categories WHERE name = ? AND active = 1",
            CATEGORY_COLUMNS
        );
        let row: Option<CategoryRow> = sqlx::query_as(&sql)
            .bind(name.trim())
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Category::from))
    }

    async fn get(&self, id: &str) -> Result<Category> {
        let sql = format!("SELECT {} FROM categories WHERE id = ?", CATEGORY_COLUMNS);
        let row: Option<CategoryRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        row.map(Category::from)
            .ok_or_else(|| Error::not_found("Category"))
    }

    /// All active categories, by name.
    pub async fn list_active(&self) -> Result<Vec<Category>> {
        let sql = format!(
            "SELECT {} FROM categories WHERE active = 1 ORDER BY name ASC",
            CATEGORY_COLUMNS
        );
        let rows: Vec<CategoryRow> = sqlx::query_as(&sql).fetch_all(&self.db).await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    pub async fn list(
        &self,
        filter: &CategoryFilter,
        pagination: Pagination,
    ) -> Result<Page<Category>> {
        let filter_sql = Filter::new()
            .eq("active", filter.active)
            .contains_any(
                &["name_folded", "description_folded"],
                filter.search.as_deref(),
            );
        let where_clause = filter_sql.where_clause();

        let count_sql = format!("SELECT COUNT(*) FROM categories {}", where_clause);
        let total: i64 = sqlx::query_scalar_with(&count_sql, filter_sql.arguments()?)
            .fetch_one(&self.db)
            .await?;

        let sql = format!(
            "SELECT {} FROM categories {} ORDER BY name ASC, id ASC LIMIT ? OFFSET ?",
            CATEGORY_COLUMNS, where_clause
        );
        let mut values = filter_sql.values().to_vec();
        values.push(Value::Int(pagination.limit()));
        values.push(Value::Int(pagination.offset()));
        let rows: Vec<CategoryRow> = sqlx::query_as_with(&sql, arguments(&values)?)
            .fetch_all(&self.db)
            .await?;

        Ok(Page::new(
            rows.into_iter().map(Category::from).collect(),
            total,
            pagination,
        ))
    }

    pub async fn update(&self, id: &str, update: &CategoryUpdate) -> Result<Category> {
        let name = update.name.as_deref().map(str::trim);
        if let Some(name) = name {
            if let Some(owner) = self.find_by_name(name).await? {
                if owner.id != id {
                    return Err(duplicate_name());
                }
            }
        }

        let description = update.description.as_deref().map(str::trim);
        let mut set = Assignments::new();
        set.set("name", name)
            .set("name_folded", name.map(fold))
            .set("description", description)
            .set("description_folded", description.map(fold))
            .set("active", update.active);
        self.apply(id, set).await
    }

    /// Soft delete; repeating it is not an error at this layer.
    pub async fn deactivate(&self, id: &str) -> Result<Category> {
        let mut set = Assignments::new();
        set.set("active", Some(false));
        let category = self.apply(id, set).await?;
        tracing::info!(category_id = %id, "Category deactivated");
        Ok(category)
    }

    /// Fails with `DuplicateKey` if another active category took the name meanwhile.
    pub async fn activate(&self, id: &str) -> Result<Category> {
        let mut set = Assignments::new();
        set.set("active", Some(true));
        self.apply(id, set).await
    }

    async fn apply(&self, id: &str, set: Assignments) -> Result<Category> {
        if set.is_empty() {
            return Err(Error::NoValidFields);
        }

        let (sql, args) = set.into_update("categories", now(), id)?;
        let result = sqlx::query_with(&sql, args)
            .execute(&self.db)
            .await
            .map_err(|e| match Error::from(e) {
                Error::DuplicateKey(_) => duplicate_name(),
                other => other,
            })?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("Category"));
        }

        self.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use tokio_test::assert_ok;

    async fn repo() -> CategoryRepository {
        CategoryRepository::new(connect_in_memory().await.unwrap())
    }

    fn new_category(name: &str) -> NewCategory {
        NewCategory {
            name: name.to_string(),
            description: "Sweet things".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_returns_reloaded_row() {
        let repo = repo().await;
        let created = repo.create(new_category(" Desserts ")).await.unwrap();

        assert_eq!(created.name, "Desserts");
        assert!(created.is_active());
        assert_eq!(created.created_at, created.updated_at);

        let found = repo.find_by_id(&created.id).await.unwrap();
        assert_eq!(found, Some(created));
    }

    #[tokio::test]
    async fn test_name_unique_among_active_only() {
        let repo = repo().await;
        let first = repo.create(new_category("Desserts")).await.unwrap();

        let err = repo.create(new_category("Desserts")).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(_)));

        // Exact match per collation; a differently cased name is a new category
        assert_ok!(repo.create(new_category("desserts")).await);

        repo.deactivate(&first.id).await.unwrap();
        let reused = repo.create(new_category("Desserts")).await.unwrap();
        assert_ne!(reused.id, first.id);

        let err = repo.activate(&first.id).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn test_update_with_no_fields_leaves_row_alone() {
        let repo = repo().await;
        let category = repo.create(new_category("Soups")).await.unwrap();

        let err = repo
            .update(&category.id, &CategoryUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoValidFields));

        let reloaded = repo.find_by_id(&category.id).await.unwrap().unwrap();
        assert_eq!(reloaded, category);
    }

    #[tokio::test]
    async fn test_rename_conflicts_with_other_active_category() {
        let repo = repo().await;
        repo.create(new_category("Soups")).await.unwrap();
        let salads = repo.create(new_category("Salads")).await.unwrap();

        let rename = CategoryUpdate {
            name: Some("Soups".to_string()),
            ..Default::default()
        };
        let err = repo.update(&salads.id, &rename).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(_)));

        let keep_name = CategoryUpdate {
            name: Some("Salads".to_string()),
            description: Some("Green".to_string()),
            ..Default::default()
        };
        let updated = repo.update(&salads.id, &keep_name).await.unwrap();
        assert_eq!(updated.description, "Green");
    }

    #[tokio::test]
    async fn test_list_active_and_paged() {
        let repo = repo().await;
        for name in ["Soups", "Breads", "Salads"] {
            repo.create(new_category(name)).await.unwrap();
        }
        let gone = repo.create(new_category("Drinks")).await.unwrap();
        repo.deactivate(&gone.id).await.unwrap();

        let names: Vec<String> = repo
            .list_active()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Breads", "Salads", "Soups"]);

        let inactive = repo
            .list(
                &CategoryFilter {
                    active: Some(false),
                    ..Default::default()
                },
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(inactive.total, 1);
        assert_eq!(inactive.items[0].name, "Drinks");

        let page = repo
            .list(&CategoryFilter::default(), Pagination::new(Some(1), Some(3)))
            .await
            .unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.items.len(), 3);
        assert!(page.has_next);
    }

    #[tokio::test]
    async fn test_search_folds_accented_names() {
        let repo = repo().await;
        let sweets = repo
            .create(NewCategory {
                name: "DOCES E SOBREMESAS".to_string(),
                description: "Pudins, bolos e CRÈME brûlée".to_string(),
            })
            .await
            .unwrap();
        repo.create(NewCategory {
            name: "Sopas".to_string(),
            description: String::new(),
        })
        .await
        .unwrap();

        let search = |term: &str| CategoryFilter {
            search: Some(term.to_string()),
            ..Default::default()
        };
        let found = repo.list(&search("crème"), Pagination::default()).await.unwrap();
        assert_eq!(found.total, 1);
        assert_eq!(found.items[0].id, sweets.id);

        let update = CategoryUpdate {
            name: Some("Pães".to_string()),
            ..Default::default()
        };
        repo.update(&sweets.id, &update).await.unwrap();
        let found = repo.list(&search("PÃES"), Pagination::default()).await.unwrap();
        assert_eq!(found.total, 1);
    }

    #[tokio::test]
    async fn test_deactivate_missing_category() {
        let repo = repo().await;
        let err = repo.deactivate("missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
