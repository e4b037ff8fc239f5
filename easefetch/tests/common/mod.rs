#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: u32,
    pub title: String,
    pub completed: bool,
}

impl Todo {
    pub fn new(id: u32, title: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            completed: false,
        }
    }
}

/// A stand-in for an HTTP request: the todo list of `user`, after `latency`.
pub async fn fetch_todos(user: u32, latency: Duration) -> Result<Vec<Todo>, String> {
    tokio::time::sleep(latency).await;
    if user == 0 {
        return Err("404 Not Found".to_string());
    }
    Ok((1..=user)
        .map(|id| Todo::new(id, &format!("todo {id} of user {user}")))
        .collect())
}
