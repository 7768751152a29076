//! Account persistence: lookups, profile updates and login bookkeeping.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::db::query::{arguments, fold, Assignments, Filter, Value};
use crate::db::{
    normalize_email, now, timestamp, DbPool, NewUser, Page, Pagination, User, UserFilter, UserRow,
    UserUpdate,
};
use crate::error::{Error, Result};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, active, created_at, updated_at, \
     last_login_at, failed_login_count, locked_until";

#[derive(Clone)]
pub struct UserRepository {
    db: DbPool,
}

impl UserRepository {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Register an account. Fails with `DuplicateKey` when an active account
    /// already owns the email.
    pub async fn create(&self, new_user: NewUser) -> Result<User> {
        let email = normalize_email(&new_user.email);
        if self.find_by_email(&email).await?.is_some() {
            return Err(Error::DuplicateKey("Email is already in use".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let now = now();
        let name = new_user.name.trim();

        sqlx::query(
            r#"
            INSERT INTO users (
                id, name, name_folded, email, password_hash, role, active, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(name)
        .bind(fold(name))
        .bind(&email)
        .bind(&new_user.password_hash)
        .bind(new_user.role.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.db)
        .await
        .map_err(|e| match Error::from(e) {
            Error::DuplicateKey(_) => Error::DuplicateKey("Email is already in use".to_string()),
            other => other,
        })?;

        tracing::info!(user_id = %id, role = %new_user.role, "User created");
        self.get(&id).await
    }

    /// Active account by id.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ? AND active = 1", USER_COLUMNS);
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(User::from))
    }

    /// Active account by email (case-insensitive).
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE email = ? AND active = 1",
            USER_COLUMNS
        );
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(normalize_email(email))
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(User::from))
    }

    /// Any account by id, active or not.
    async fn get(&self, id: &str) -> Result<User> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        row.map(User::from).ok_or_else(|| Error::not_found("User"))
    }

    pub async fn list(&self, filter: &UserFilter, pagination: Pagination) -> Result<Page<User>> {
        let filter_sql = Filter::new()
            .eq("role", filter.role.map(|r| r.as_str()))
            .eq("active", filter.active)
            .contains_any(&["name_folded", "email"], filter.search.as_deref());
        let where_clause = filter_sql.where_clause();

        let count_sql = format!("SELECT COUNT(*) FROM users {}", where_clause);
        let total: i64 = sqlx::query_scalar_with(&count_sql, filter_sql.arguments()?)
            .fetch_one(&self.db)
            .await?;

        let sql = format!(
            "SELECT {} FROM users {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            USER_COLUMNS, where_clause
        );
        let mut values = filter_sql.values().to_vec();
        values.push(Value::Int(pagination.limit()));
        values.push(Value::Int(pagination.offset()));
        let rows: Vec<UserRow> = sqlx::query_as_with(&sql, arguments(&values)?)
            .fetch_all(&self.db)
            .await?;

        Ok(Page::new(
            rows.into_iter().map(User::from).collect(),
            total,
            pagination,
        ))
    }

    /// Apply the supplied profile fields and return the reloaded account.
    pub async fn update(&self, id: &str, update: &UserUpdate) -> Result<User> {
        let email = update.email.as_deref().map(normalize_email);
        if let Some(email) = &email {
            if let Some(owner) = self.find_by_email(email).await? {
                if owner.id != id {
                    return Err(Error::DuplicateKey("Email is already in use".to_string()));
                }
            }
        }

        let name = update.name.as_deref().map(str::trim);
        let mut set = Assignments::new();
        set.set("name", name)
            .set("name_folded", name.map(fold))
            .set("email", email)
            .set("role", update.role.map(|r| r.as_str()))
            .set("active", update.active);
        self.apply(id, set).await
    }

    /// Soft delete. Deactivating an inactive account is not an error here.
    pub async fn deactivate(&self, id: &str) -> Result<User> {
        let mut set = Assignments::new();
        set.set("active", Some(false));
        let user = self.apply(id, set).await?;
        tracing::info!(user_id = %id, "User deactivated");
        Ok(user)
    }

    pub async fn set_password(&self, id: &str, password_hash: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(now())
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("User"));
        }
        Ok(())
    }

    /// Count a failed login and start a lockout once the count reaches
    /// `threshold`. One statement; concurrent attempts may still interleave.
    pub async fn record_failed_login(
        &self,
        id: &str,
        threshold: i64,
        window: Duration,
        at: DateTime<Utc>,
    ) -> Result<User> {
        sqlx::query(
            r#"
            UPDATE users
            SET failed_login_count = failed_login_count + 1,
                locked_until = CASE
                    WHEN failed_login_count + 1 >= ? THEN ?
                    ELSE locked_until
                END
            WHERE id = ?
            "#,
        )
        .bind(threshold)
        .bind(timestamp(at + window))
        .bind(id)
        .execute(&self.db)
        .await?;

        self.get(id).await
    }

    /// Clear the failure counter and lockout, and stamp the login time.
    pub async fn reset_login_state(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET failed_login_count = 0, locked_until = NULL, last_login_at = ?
            WHERE id = ?
            "#,
        )
        .bind(timestamp(at))
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn apply(&self, id: &str, set: Assignments) -> Result<User> {
        if set.is_empty() {
            return Err(Error::NoValidFields);
        }

        let (sql, args) = set.into_update("users", now(), id)?;
        let result = sqlx::query_with(&sql, args)
            .execute(&self.db)
            .await
            .map_err(|e| match Error::from(e) {
                Error::DuplicateKey(_) => {
                    Error::DuplicateKey("Email is already in use".to_string())
                }
                other => other,
            })?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("User"));
        }

        self.get(id).await
    }
}
