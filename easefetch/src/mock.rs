//! Test doubles for trackers: a recording storage backend and a scripted
//! producer whose invocations can be held open and released in any order.

use crate::{ProducerFuture, StorageBackend, StorageError};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

/// One recorded call against a [`MockStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOperation {
    Get { key: String },
    Set { key: String, value: String },
}

/// An in-memory storage backend that records every call.
#[derive(Debug, Default)]
pub struct MockStorage {
    items: Mutex<HashMap<String, String>>,
    operations: Mutex<Vec<StorageOperation>>,
    failing: bool,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that records calls but rejects all of them, like storage
    /// disabled by the host.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Seeds `key` without recording an operation.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn operations(&self) -> Vec<StorageOperation> {
        self.operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get_count(&self) -> usize {
        self.operations()
            .iter()
            .filter(|op| matches!(op, StorageOperation::Get { .. }))
            .count()
    }

    pub fn set_count(&self) -> usize {
        self.operations()
            .iter()
            .filter(|op| matches!(op, StorageOperation::Set { .. }))
            .count()
    }

    fn record(&self, operation: StorageOperation) {
        self.operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(operation);
    }
}

impl StorageBackend for MockStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.record(StorageOperation::Get {
            key: key.to_string(),
        });
        if self.failing {
            return Err(StorageError::Unavailable);
        }
        Ok(self.raw(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.record(StorageOperation::Set {
            key: key.to_string(),
            value: value.to_string(),
        });
        if self.failing {
            return Err(StorageError::Unavailable);
        }
        self.insert_raw(key, value);
        Ok(())
    }
}

/// Releases one held invocation of a [`MockProducer`].
#[derive(Debug)]
pub struct MockGate {
    tx: oneshot::Sender<()>,
}

impl MockGate {
    pub fn release(self) {
        let _ = self.tx.send(());
    }
}

enum MockedResult<T, E> {
    Ready(Result<T, E>),
    Gated(oneshot::Receiver<()>, Result<T, E>),
}

/// A producer that answers invocations from a script, in call order.
///
/// Once the script runs out, further invocations never settle.
pub struct MockProducer<T, E> {
    calls: Arc<AtomicUsize>,
    script: Arc<Mutex<VecDeque<MockedResult<T, E>>>>,
    delay: Option<Duration>,
}

impl<T, E> MockProducer<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            script: Arc::new(Mutex::new(VecDeque::new())),
            delay: None,
        }
    }

    /// Every invocation sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues an answer returned as soon as the invocation is polled.
    pub fn respond(&self, result: Result<T, E>) {
        self.push(MockedResult::Ready(result));
    }

    /// Queues an answer held back until the returned gate is released.
    pub fn respond_gated(&self, result: Result<T, E>) -> MockGate {
        let (tx, rx) = oneshot::channel();
        self.push(MockedResult::Gated(rx, result));
        MockGate { tx }
    }

    /// How many times the producer has been invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The producer function to hand to [`crate::track`].
    pub fn producer(&self) -> impl Fn() -> ProducerFuture<T, E> + Send + Sync + 'static {
        let calls = self.calls.clone();
        let script = self.script.clone();
        let delay = self.delay;
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let next = script
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            Box::pin(async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                match next {
                    Some(MockedResult::Ready(result)) => result,
                    Some(MockedResult::Gated(rx, result)) => {
                        let _ = rx.await;
                        result
                    }
                    None => std::future::pending().await,
                }
            }) as ProducerFuture<T, E>
        }
    }

    fn push(&self, result: MockedResult<T, E>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
    }
}

impl<T, E> Default for MockProducer<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
