// Todo resource handlers
//
// Request validation (the shape checks an API gateway or schema layer would
// do) lives here; ownership and query semantics live in the service.

use crate::database::{DatabaseManager, PgTodoRepository};
use crate::error::ApiError;
use crate::services::TodoService;

pub mod create; // POST /api/todos
pub mod delete; // DELETE /api/todos/:id
pub mod list; // GET /api/todos
pub mod show; // GET /api/todos/:id
pub mod update; // PATCH /api/todos/:id

pub use create::todo_create;
pub use delete::todo_delete;
pub use list::todo_list;
pub use show::todo_show;
pub use update::todo_update;

/// Service over the shared pool. Cheap to build per request; the pool is
/// the only long-lived piece.
pub(crate) async fn service() -> Result<TodoService<PgTodoRepository>, ApiError> {
    let pool = DatabaseManager::pool().await?;
    Ok(TodoService::new(PgTodoRepository::new(pool)))
}
