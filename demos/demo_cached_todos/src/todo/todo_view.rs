use crate::todo::todo_model::TodoState;
use crate::todo::todo_state::TodoProgress;
use easefetch::Async;
use tracing::{debug, info};

pub fn show_todos(state: &TodoState) {
    info!("=================================");
    let todos = match state {
        Async::Loading => {
            info!("| Loading...");
            return;
        }
        Async::Fail { error } => {
            info!("| Error: {error}");
            return;
        }
        Async::Success { value } => value,
    };
    info!("| {}", TodoProgress::of(todos));
    if todos.is_empty() {
        debug!("| No todos available.");
    }
    for todo in todos {
        let status = if todo.completed { "✓" } else { " " };
        debug!("| [{}] {} {}", todo.id, status, todo.text);
    }
}
