pub mod authorize;
pub mod todo_service;

pub use todo_service::{ListFilter, ListOptions, TodoError, TodoPage, TodoService};
