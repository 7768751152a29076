//! Composition of parameterized SQL fragments.
//!
//! Only structural text (column names and fixed clauses chosen by the caller)
//! is ever assembled into SQL. Every user-supplied value travels as a bound
//! parameter, in the same order as its `?` placeholder.

use serde::Serialize;
use sqlx::sqlite::SqliteArguments;
use sqlx::Arguments;

/// A value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Int(i64),
    Bool(bool),
    Null,
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

fn push_value<'q>(args: &mut SqliteArguments<'q>, value: &Value) -> Result<(), sqlx::Error> {
    let result = match value {
        Value::Text(s) => args.add(s.clone()),
        Value::Int(i) => args.add(*i),
        Value::Bool(b) => args.add(i64::from(*b)),
        Value::Null => args.add(Option::<String>::None),
    };
    result.map_err(sqlx::Error::Encode)
}

/// Build an argument list from values, in placeholder order.
pub fn arguments<'q>(values: &[Value]) -> Result<SqliteArguments<'q>, sqlx::Error> {
    let mut args = SqliteArguments::default();
    for value in values {
        push_value(&mut args, value)?;
    }
    Ok(args)
}

/// Escape LIKE wildcards so the term matches literally (used with `ESCAPE '\'`).
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Unicode lowercase form kept in the `*_folded` search columns.
///
/// SQLite's `LIKE` only folds ASCII, so both the stored text and the search
/// term are folded here before matching.
pub fn fold(text: &str) -> String {
    text.to_lowercase()
}

/// Trim an optional text filter; blank means absent.
fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Conjunction of predicates plus the parameters they bind.
///
/// An absent filter adds neither a clause nor a parameter, so the same
/// `Filter` can drive both a page query and its matching count query.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<String>,
    values: Vec<Value>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fixed clause that binds nothing, e.g. `r.active = 1`.
    pub fn require(mut self, clause: &'static str) -> Self {
        self.clauses.push(clause.to_string());
        self
    }

    /// `column = ?` when `value` is present.
    pub fn eq<V: Into<Value>>(mut self, column: &'static str, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.clauses.push(format!("{} = ?", column));
            self.values.push(v.into());
        }
        self
    }

    /// `column = ?` for a text value; blank text counts as absent.
    pub fn eq_text(self, column: &'static str, value: Option<&str>) -> Self {
        let value = present(value).map(str::to_string);
        self.eq(column, value)
    }

    /// Case-insensitive substring match of `term` against any of `columns`,
    /// which must hold text already passed through [`fold`].
    pub fn contains_any(mut self, columns: &[&'static str], term: Option<&str>) -> Self {
        let Some(term) = present(term) else {
            return self;
        };
        if columns.is_empty() {
            return self;
        }

        let pattern = format!("%{}%", escape_like(&fold(term)));
        let alternatives: Vec<String> = columns
            .iter()
            .map(|column| format!("{} LIKE ? ESCAPE '\\'", column))
            .collect();
        self.clauses.push(format!("({})", alternatives.join(" OR ")));
        for _ in columns {
            self.values.push(Value::Text(pattern.clone()));
        }
        self
    }

    /// `WHERE a AND b ...`, or an empty string when nothing applies.
    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn arguments<'q>(&self) -> Result<SqliteArguments<'q>, sqlx::Error> {
        arguments(&self.values)
    }
}

/// `SET col = ?, ...` assignments for a partial update.
#[derive(Debug, Clone, Default)]
pub struct Assignments {
    columns: Vec<&'static str>,
    values: Vec<Value>,
}

impl Assignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `column` when the field was supplied.
    pub fn set<V: Into<Value>>(&mut self, column: &'static str, value: Option<V>) -> &mut Self {
        if let Some(v) = value {
            self.columns.push(column);
            self.values.push(v.into());
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[&'static str] {
        &self.columns
    }

    /// `UPDATE table SET ..., updated_at = ? WHERE id = ?` with its arguments.
    pub fn into_update(
        self,
        table: &'static str,
        updated_at: String,
        id: &str,
    ) -> Result<(String, SqliteArguments<'static>), sqlx::Error> {
        let set: Vec<String> = self
            .columns
            .iter()
            .map(|column| format!("{} = ?", column))
            .collect();
        let sql = format!(
            "UPDATE {} SET {}, updated_at = ? WHERE id = ?",
            table,
            set.join(", ")
        );

        let mut values = self.values;
        values.push(Value::Text(updated_at));
        values.push(Value::Text(id.to_string()));
        Ok((sql, arguments(&values)?))
    }
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: i64,
    limit: i64,
}

impl Pagination {
    pub const DEFAULT_LIMIT: i64 = 10;

    /// Missing values take defaults; values below 1 are raised to 1.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).max(1),
        }
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Rows to skip; saturates instead of overflowing on huge pages.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 {
            0
        } else {
            total / self.limit + i64::from(total % self.limit != 0)
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results together with the totals of the unpaged query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        let total_pages = pagination.total_pages(total);
        let page = pagination.page();
        Self {
            items,
            total,
            page,
            total_pages,
            has_next: page < total_pages,
            has_prev: total > 0 && page > 1,
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_prev: self.has_prev,
        }
    }
}
