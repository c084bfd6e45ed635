use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use opgave_common::models::todo::{Priority, Todo, TodoFilters};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const TODO_COLUMNS: &str = "id, title, description, priority, completed, user_id, created_at, updated_at";

/// Todo row from the database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TodoRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub completed: bool,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TodoRow {
    /// Convert into the shared wire model. Fails only if the stored priority
    /// violates the table's CHECK constraint.
    pub fn into_model(self) -> Result<Todo> {
        let priority = self
            .priority
            .parse::<Priority>()
            .map_err(anyhow::Error::new)?;
        Ok(Todo {
            id: self.id,
            title: self.title,
            description: self.description,
            priority,
            completed: self.completed,
            user_id: self.user_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Repository for todo operations. Every statement carries the owner id in
/// its WHERE clause; a caller can never reach another user's rows.
pub struct TodoRepo;

impl TodoRepo {
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        title: &str,
        description: &str,
        priority: Priority,
    ) -> Result<TodoRow> {
        let id = Uuid::new_v4();
        let row = sqlx::query_as::<_, TodoRow>(&format!(
            "INSERT INTO todos (id, title, description, priority, user_id) VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            TODO_COLUMNS
        ))
        .bind(id)
        .bind(title)
        .bind(description)
        .bind(priority.as_str())
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to create todo")?;
        Ok(row)
    }

    /// Append the owner-scoped filter predicate. Every clause is a bind
    /// parameter pushed through the query builder; the owner filter is
    /// unconditional.
    fn push_predicate(qb: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, filters: &TodoFilters) {
        qb.push(" WHERE user_id = ").push_bind(user_id);
        if let Some(ids) = &filters.ids {
            if !ids.is_empty() {
                qb.push(" AND id = ANY(").push_bind(ids.clone()).push(")");
            }
        }
        if let Some(search) = &filters.search {
            if !search.is_empty() {
                qb.push(" AND title ILIKE ")
                    .push_bind(format!("%{}%", search));
            }
        }
        if let Some(priority) = filters.priority {
            qb.push(" AND priority = ").push_bind(priority.as_str());
        }
        if let Some(completed) = filters.completed {
            qb.push(" AND completed = ").push_bind(completed);
        }
    }

    /// Total number of rows matching the predicate, independent of paging
    pub async fn count(pool: &PgPool, user_id: Uuid, filters: &TodoFilters) -> Result<i64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM todos");
        Self::push_predicate(&mut qb, user_id, filters);
        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(pool)
            .await
            .context("Failed to count todos")?;
        Ok(count)
    }

    /// One page of matching rows, newest first
    pub async fn list(
        pool: &PgPool,
        user_id: Uuid,
        filters: &TodoFilters,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TodoRow>> {
        let mut qb = QueryBuilder::new(format!("SELECT {} FROM todos", TODO_COLUMNS));
        Self::push_predicate(&mut qb, user_id, filters);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = qb
            .build_query_as::<TodoRow>()
            .fetch_all(pool)
            .await
            .context("Failed to list todos")?;
        Ok(rows)
    }

    /// Partial update scoped by owner; None leaves a column untouched.
    /// Returns None when the id does not exist or belongs to someone else.
    pub async fn update(
        pool: &PgPool,
        user_id: Uuid,
        id: Uuid,
        title: Option<&str>,
        description: Option<&str>,
        priority: Option<Priority>,
        completed: Option<bool>,
    ) -> Result<Option<TodoRow>> {
        let row = sqlx::query_as::<_, TodoRow>(&format!(
            r#"
            UPDATE todos
            SET title = COALESCE($1, title),
                description = COALESCE($2, description),
                priority = COALESCE($3, priority),
                completed = COALESCE($4, completed),
                updated_at = NOW()
            WHERE id = $5 AND user_id = $6
            RETURNING {}
            "#,
            TODO_COLUMNS
        ))
        .bind(title)
        .bind(description)
        .bind(priority.map(|p| p.as_str()))
        .bind(completed)
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to update todo")?;
        Ok(row)
    }

    /// Delete scoped by owner; false when no owned row matched
    pub async fn delete(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await
            .context("Failed to delete todo")?;
        Ok(result.rows_affected() > 0)
    }
}
