mod async_error;
mod async_state;
mod cache;
mod config;
mod deps;
pub mod mock;
mod storage;
mod stream_ext;
mod tracker;

pub use async_error::*;
pub use async_state::*;
pub use cache::{is_fresh, CacheEntry, Clock, ManualClock, ResultCache, SystemClock};
pub use config::*;
pub use deps::dependencies_changed;
pub use storage::*;
pub use stream_ext::*;
pub use tracker::{track, FetchTracker, ProducerFuture};

#[cfg(test)]
mod unit_tests;
