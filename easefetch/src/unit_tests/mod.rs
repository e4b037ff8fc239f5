use crate::mock::MockStorage;
use crate::Storages;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

mod tracker_test;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: u32,
    pub title: String,
}

impl Todo {
    pub fn new(id: u32, title: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
        }
    }
}

/// Session and local backends, both recording.
pub struct TestStorages {
    pub session: Arc<MockStorage>,
    pub local: Arc<MockStorage>,
}

impl TestStorages {
    pub fn new() -> Self {
        Self {
            session: Arc::new(MockStorage::new()),
            local: Arc::new(MockStorage::new()),
        }
    }

    pub fn storages(&self) -> Storages {
        Storages::new(self.session.clone(), self.local.clone())
    }
}

/// Collects every value a callback was called with.
#[derive(Clone)]
pub struct Calls<V> {
    seen: Arc<Mutex<Vec<V>>>,
}

impl<V> Default for Calls<V> {
    fn default() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<V: Clone> Calls<V> {
    pub fn push(&self, value: V) {
        self.seen.lock().unwrap().push(value);
    }

    pub fn seen(&self) -> Vec<V> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}
