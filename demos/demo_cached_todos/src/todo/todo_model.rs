use crate::todo::todo_state::Todo;
use easefetch::{
    track, Async, AsyncError, CacheConfig, ConfigError, FetchConfig, FetchTracker, Storages,
};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

pub type TodoState = Async<Vec<Todo>, String>;

/// The todo screen: a cached "pinned" list and an uncached, paged list.
pub struct TodoModel {
    pinned: FetchTracker<Vec<Todo>, String, u32>,
    page: Arc<AtomicU32>,
    paged: FetchTracker<Vec<Todo>, String, u32>,
}

impl TodoModel {
    pub fn new(storage_file: &Path) -> Result<Self, ConfigError> {
        let cache = CacheConfig::new("pinned-todos")
            .expires_after(Duration::from_secs(30))
            .use_local_storage(true);
        let pinned_config = FetchConfig::new()
            .storages(Storages::with_file(storage_file))
            .cache(cache)?
            .type_check(|todos: &Vec<Todo>| todos.iter().all(|todo| !todo.text.is_empty()))
            .on_success(|todos: &Vec<Todo>| info!("fetched {} pinned todos", todos.len()));
        let pinned = track(|| fetch_page(1), pinned_config, None);

        let page = Arc::new(AtomicU32::new(1));
        let producer = {
            let page = page.clone();
            move || fetch_page(page.load(Ordering::SeqCst))
        };
        let paged_config = FetchConfig::new()
            .on_error(|error: &AsyncError<String>| warn!("page fetch failed: {error}"));
        let paged = track(producer, paged_config, Some(vec![1]));

        Ok(Self {
            pinned,
            page,
            paged,
        })
    }

    pub fn pinned(&self) -> &FetchTracker<Vec<Todo>, String, u32> {
        &self.pinned
    }

    pub fn paged(&self) -> &FetchTracker<Vec<Todo>, String, u32> {
        &self.paged
    }

    pub fn show_page(&self, page: u32) {
        self.page.store(page, Ordering::SeqCst);
        self.paged.render(Some(vec![page]));
    }
}

/// Pretends to be a slow HTTP endpoint. Page 0 does not exist.
async fn fetch_page(page: u32) -> Result<Vec<Todo>, String> {
    sleep(Duration::from_millis(500)).await;
    if page == 0 {
        return Err("404 Not Found".to_string());
    }
    let titles = [
        "Build a Todo App",
        "Contribute to Open Source",
        "Read Rust Book",
        "Learn Async Rust",
    ];
    Ok(titles
        .iter()
        .enumerate()
        .map(|(index, title)| {
            let id = (page - 1) * titles.len() as u32 + index as u32;
            Todo::new(id, &format!("{title} (page {page})"), index % 2 == 0)
        })
        .collect())
}
