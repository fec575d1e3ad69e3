use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{NewTodo, Todo, TodoChange, TodoItem, TodoPatch};
use crate::database::query_builder::QueryBuilder;
use crate::filter::FilterData;

const TABLE: &str = "todos";

/// Persistence contract for todos.
///
/// The `where_clause` values are opaque predicates produced by the service's
/// merge step; this layer compiles and executes them. Column validity is
/// resolved here (an unknown column fails the query, not the merge).
#[async_trait]
pub trait TodoRepository: Send + Sync {
    async fn count(&self, where_clause: Value) -> Result<i64, DatabaseError>;

    async fn find_page(
        &self,
        where_clause: Value,
        order: Option<Value>,
        limit: i32,
        offset: i32,
    ) -> Result<Vec<TodoItem>, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Todo>, DatabaseError>;

    async fn insert(&self, user_id: Uuid, data: NewTodo) -> Result<Todo, DatabaseError>;

    async fn update(&self, id: Uuid, patch: TodoPatch) -> Result<TodoChange, DatabaseError>;

    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError>;
}

/// Postgres-backed repository over the shared pool.
pub struct PgTodoRepository {
    pool: PgPool,
}

impl PgTodoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TodoRepository for PgTodoRepository {
    async fn count(&self, where_clause: Value) -> Result<i64, DatabaseError> {
        QueryBuilder::<Todo>::new(TABLE)?
            .filter(FilterData {
                where_clause: Some(where_clause),
                ..Default::default()
            })?
            .count(&self.pool)
            .await
    }

    async fn find_page(
        &self,
        where_clause: Value,
        order: Option<Value>,
        limit: i32,
        offset: i32,
    ) -> Result<Vec<TodoItem>, DatabaseError> {
        QueryBuilder::<TodoItem>::new(TABLE)?
            .filter(FilterData {
                select: Some(TodoItem::COLUMNS.iter().map(|c| c.to_string()).collect()),
                where_clause: Some(where_clause),
                order,
                limit: Some(limit),
                offset: Some(offset),
            })?
            .select_all(&self.pool)
            .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Todo>, DatabaseError> {
        let todo = sqlx::query_as::<_, Todo>(
            "SELECT id, title, description, entry_date, is_completed, user_id, \
             created_at, updated_at \
             FROM todos WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(todo)
    }

    async fn insert(&self, user_id: Uuid, data: NewTodo) -> Result<Todo, DatabaseError> {
        let todo = sqlx::query_as::<_, Todo>(
            "INSERT INTO todos (id, title, description, entry_date, is_completed, user_id, \
             created_at, updated_at) \
             VALUES ($1, $2, $3, $4, false, $5, now(), now()) \
             RETURNING id, title, description, entry_date, is_completed, user_id, \
             created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.entry_date)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(todo)
    }

    async fn update(&self, id: Uuid, patch: TodoPatch) -> Result<TodoChange, DatabaseError> {
        // COALESCE keeps the stored value for absent fields. The owner
        // column is deliberately not in the SET list.
        let change = sqlx::query_as::<_, TodoChange>(
            "UPDATE todos SET \
             title = COALESCE($2, title), \
             description = COALESCE($3, description), \
             entry_date = COALESCE($4, entry_date), \
             is_completed = COALESCE($5, is_completed), \
             updated_at = now() \
             WHERE id = $1 \
             RETURNING id, title, description, user_id",
        )
        .bind(id)
        .bind(patch.title)
        .bind(patch.description)
        .bind(patch.entry_date)
        .bind(patch.is_completed)
        .fetch_one(&self.pool)
        .await?;
        Ok(change)
    }

    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM todos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
