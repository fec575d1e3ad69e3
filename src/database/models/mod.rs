pub mod todo;

pub use todo::{NewTodo, Todo, TodoChange, TodoItem, TodoPatch};
