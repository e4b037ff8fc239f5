use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: u32,
    pub text: String,
    pub completed: bool,
}

impl Todo {
    pub fn new(id: u32, text: &str, completed: bool) -> Self {
        Self {
            id,
            text: text.to_string(),
            completed,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TodoProgress {
    pub completed: usize,
    pub total: usize,
    pub percentage: f64,
}

impl TodoProgress {
    pub fn of(todos: &[Todo]) -> Self {
        let total = todos.len();
        if total == 0 {
            return TodoProgress::default();
        }
        let completed = todos.iter().filter(|todo| todo.completed).count();
        TodoProgress {
            completed,
            total,
            percentage: (completed as f64 / total as f64) * 100.0,
        }
    }
}

impl Display for TodoProgress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Progress:{}/{} Percentage:{:.2}%",
            self.completed, self.total, self.percentage
        )
    }
}
