use crate::mock::MockProducer;
use crate::unit_tests::{Calls, TestStorages, Todo};
use crate::{
    track, Async, AsyncError, CacheConfig, EaseFetchStreamExt, FetchConfig, ManualClock,
    ResultCache,
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

async fn let_tasks_run() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

// Test a plain resolution
#[tokio::test]
async fn test_track_success() {
    let producer = MockProducer::<String, String>::new();
    producer.respond(Ok("Async Result".to_string()));

    let tracker = track(producer.producer(), FetchConfig::new(), None::<Vec<u32>>);
    assert_eq!(tracker.get_state(), Async::Loading);

    let state = tracker.settled().await;
    assert_eq!(state, Async::success("Async Result".to_string()));
    assert!(!state.loading());
    assert!(state.error().is_none());
    assert_eq!(producer.calls(), 1);
}

// Test the observed sequence of states
#[tokio::test]
async fn test_track_state_sequence() {
    let producer = MockProducer::<u32, String>::new().with_delay(Duration::from_millis(5));
    producer.respond(Ok(3));

    let tracker = track(producer.producer(), FetchConfig::new(), Some(vec![1]));
    let states: Vec<Async<u32, String>> = tracker.to_stream().until_settled().collect().await;

    assert_eq!(states, vec![Async::Loading, Async::success(3)]);
}

// A rejection is surfaced verbatim and reported once
#[tokio::test]
async fn test_track_rejection() {
    let producer = MockProducer::<u32, String>::new();
    producer.respond(Err("Operation failed".to_string()));

    let successes = Calls::<u32>::default();
    let errors = Calls::<AsyncError<String>>::default();
    let config = FetchConfig::new()
        .on_success({
            let successes = successes.clone();
            move |value: &u32| successes.push(*value)
        })
        .on_error({
            let errors = errors.clone();
            move |error: &AsyncError<String>| errors.push(error.clone())
        });

    let tracker = track(producer.producer(), config, None::<Vec<u32>>);
    let state = tracker.settled().await;

    assert_eq!(
        state.error(),
        Some(&AsyncError::Rejected("Operation failed".to_string()))
    );
    assert_eq!(state.result(), None);
    assert!(!state.loading());
    assert_eq!(
        errors.seen(),
        vec![AsyncError::Rejected("Operation failed".to_string())]
    );
    assert_eq!(successes.count(), 0);
}

// A value refused by the type check fails and is never cached
#[tokio::test]
async fn test_track_type_check_failure() {
    let backends = TestStorages::new();
    let producer = MockProducer::<Vec<Todo>, String>::new();
    producer.respond(Ok(vec![]));

    let errors = Calls::<AsyncError<String>>::default();
    let successes = Calls::<usize>::default();
    let config = FetchConfig::new()
        .storages(backends.storages())
        .cache(CacheConfig::new("todos").expires_ms(20000))
        .unwrap()
        .type_check(|todos: &Vec<Todo>| !todos.is_empty())
        .on_success({
            let successes = successes.clone();
            move |todos: &Vec<Todo>| successes.push(todos.len())
        })
        .on_error({
            let errors = errors.clone();
            move |error: &AsyncError<String>| errors.push(error.clone())
        });

    let tracker = track(producer.producer(), config, None::<Vec<u32>>);
    let state = tracker.settled().await;

    assert!(state.is_fail_with_type_check());
    assert_eq!(state.result(), None);
    assert_eq!(errors.seen(), vec![AsyncError::TypeCheck]);
    assert_eq!(successes.count(), 0);
    assert_eq!(backends.session.set_count(), 0);
}

// A value passing the type check succeeds
#[tokio::test]
async fn test_track_type_check_success() {
    let producer = MockProducer::<u32, String>::new();
    producer.respond(Ok(42));

    let config = FetchConfig::new().type_check(|value: &u32| *value > 10);
    let tracker = track(producer.producer(), config, None::<Vec<u32>>);

    assert_eq!(tracker.settled().await, Async::success(42));
}

// A successful resolution is written through under the cache key
#[tokio::test]
async fn test_track_writes_result_to_cache() {
    let backends = TestStorages::new();
    let clock = ManualClock::new(1000);
    let producer = MockProducer::<Vec<Todo>, String>::new();
    producer.respond(Ok(vec![Todo::new(1, "a")]));

    let config = FetchConfig::new()
        .storages(backends.storages())
        .clock(Arc::new(clock.clone()))
        .cache(CacheConfig::new("todos").expires_ms(20000))
        .unwrap();

    let tracker = track(producer.producer(), config, None::<Vec<u32>>);
    tracker.settled().await;

    let raw = backends.session.raw("todos").unwrap();
    let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(
        stored,
        serde_json::json!({ "value": [{ "id": 1, "title": "a" }], "storedAt": 1000 })
    );
    assert_eq!(backends.local.set_count(), 0);
}

// Without cacheResult the cache is read but never written
#[tokio::test]
async fn test_track_without_cache_result_does_not_write() {
    let backends = TestStorages::new();
    let producer = MockProducer::<u32, String>::new();
    producer.respond(Ok(1));

    let config = FetchConfig::new()
        .storages(backends.storages())
        .cache(CacheConfig::new("k").cache_result(false).expires_ms(1000))
        .unwrap();

    let tracker = track(producer.producer(), config, None::<Vec<u32>>);
    assert_eq!(tracker.settled().await, Async::success(1));
    assert_eq!(backends.session.get_count(), 1);
    assert_eq!(backends.session.set_count(), 0);
}

// A fresh entry is served without calling the producer or callbacks
#[tokio::test]
async fn test_track_cache_hit() {
    let backends = TestStorages::new();
    let clock = ManualClock::new(1000);
    ResultCache::new(backends.local.clone())
        .write("todos", &vec![Todo::new(1, "a")], 1000)
        .unwrap();

    let producer = MockProducer::<Vec<Todo>, String>::new();
    let successes = Calls::<usize>::default();
    let checks = Calls::<usize>::default();
    let config = FetchConfig::new()
        .storages(backends.storages())
        .clock(Arc::new(clock.clone()))
        .cache(
            CacheConfig::new("todos")
                .expires_ms(20000)
                .use_local_storage(true),
        )
        .unwrap()
        .type_check({
            let checks = checks.clone();
            move |todos: &Vec<Todo>| {
                checks.push(todos.len());
                true
            }
        })
        .on_success({
            let successes = successes.clone();
            move |todos: &Vec<Todo>| successes.push(todos.len())
        });

    clock.set(5000);
    let tracker = track(producer.producer(), config, None::<Vec<u32>>);

    let state = tracker.get_state();
    assert_eq!(state, Async::success(vec![Todo::new(1, "a")]));
    assert!(!state.loading());
    assert!(state.error().is_none());
    assert_eq!(producer.calls(), 0);
    assert_eq!(successes.count(), 0);
    assert_eq!(checks.count(), 0);
}

// Entry stored at t=1000 with a 20000ms expiry: fresh at 20000, stale at 21500
#[tokio::test]
async fn test_track_cache_expiry_scenario() {
    let backends = TestStorages::new();
    let clock = ManualClock::new(1000);
    ResultCache::new(backends.session.clone())
        .write("item", &serde_json::json!({ "id": 1 }), 1000)
        .unwrap();

    let producer = MockProducer::<serde_json::Value, String>::new();
    producer.respond(Ok(serde_json::json!({ "id": 2 })));
    let config = FetchConfig::new()
        .storages(backends.storages())
        .clock(Arc::new(clock.clone()))
        .cache(CacheConfig::new("item").expires_ms(20000))
        .unwrap();

    clock.set(20000);
    let tracker = track(producer.producer(), config, Some(vec![1]));
    assert_eq!(tracker.get_state(), Async::success(serde_json::json!({ "id": 1 })));
    assert_eq!(producer.calls(), 0);

    clock.set(21500);
    tracker.render(Some(vec![2]));
    let state = tracker.settled().await;
    assert_eq!(state, Async::success(serde_json::json!({ "id": 2 })));
    assert_eq!(producer.calls(), 1);

    let stored: serde_json::Value =
        serde_json::from_str(&backends.session.raw("item").unwrap()).unwrap();
    assert_eq!(stored["storedAt"], 21500);
}

// Non-positive expiry never reuses an entry
#[tokio::test]
async fn test_track_zero_expiry_always_misses() {
    let backends = TestStorages::new();
    ResultCache::new(backends.session.clone())
        .write("k", &7u32, 0)
        .unwrap();

    let producer = MockProducer::<u32, String>::new();
    producer.respond(Ok(8));
    let config = FetchConfig::new()
        .storages(backends.storages())
        .clock(Arc::new(ManualClock::new(0)))
        .cache(CacheConfig::new("k"))
        .unwrap();

    let tracker = track(producer.producer(), config, None::<Vec<u32>>);
    assert_eq!(tracker.settled().await, Async::success(8));
    assert_eq!(producer.calls(), 1);
}

// A corrupt entry is a miss, not an error
#[tokio::test]
async fn test_track_corrupt_cache_entry_is_miss() {
    let backends = TestStorages::new();
    backends.session.insert_raw("k", "{ not json");

    let producer = MockProducer::<u32, String>::new();
    producer.respond(Ok(1));
    let errors = Calls::<AsyncError<String>>::default();
    let config = FetchConfig::new()
        .storages(backends.storages())
        .cache(CacheConfig::new("k").expires_ms(60_000))
        .unwrap()
        .on_error({
            let errors = errors.clone();
            move |error: &AsyncError<String>| errors.push(error.clone())
        });

    let tracker = track(producer.producer(), config, None::<Vec<u32>>);
    assert_eq!(tracker.settled().await, Async::success(1));
    assert_eq!(errors.count(), 0);
}

// Unavailable storage degrades to always-miss
#[tokio::test]
async fn test_track_with_unavailable_storage() {
    let producer = MockProducer::<u32, String>::new();
    producer.respond(Ok(1));
    producer.respond(Ok(2));
    let config = FetchConfig::new()
        .cache(CacheConfig::new("k").expires_ms(60_000))
        .unwrap();

    let tracker = track(producer.producer(), config, Some(vec![1]));
    assert_eq!(tracker.settled().await, Async::success(1));

    tracker.remount();
    assert_eq!(tracker.settled().await, Async::success(2));
    assert_eq!(producer.calls(), 2);
}

// A later-started invocation wins even when the earlier one settles last
#[tokio::test]
async fn test_superseded_settlement_is_discarded() {
    let producer = MockProducer::<u32, String>::new();
    let first = producer.respond_gated(Ok(1));
    let second = producer.respond_gated(Ok(2));

    let successes = Calls::<u32>::default();
    let config = FetchConfig::new().on_success({
        let successes = successes.clone();
        move |value: &u32| successes.push(*value)
    });

    let tracker = track(producer.producer(), config, Some(vec![1]));
    tracker.render(Some(vec![2]));
    assert_eq!(tracker.await_state().await, Ok(Async::Loading));
    assert_eq!(producer.calls(), 2);

    second.release();
    assert_eq!(tracker.settled().await, Async::success(2));

    first.release();
    let_tasks_run().await;
    assert_eq!(tracker.await_state().await, Ok(Async::success(2)));
    assert_eq!(successes.seen(), vec![2]);
}

// An earlier invocation settling first does not end the newer one's loading
#[tokio::test]
async fn test_superseded_settlement_while_current_pending() {
    let producer = MockProducer::<u32, String>::new();
    let first = producer.respond_gated(Err("stale".to_string()));
    let second = producer.respond_gated(Ok(2));

    let errors = Calls::<AsyncError<String>>::default();
    let config = FetchConfig::new().on_error({
        let errors = errors.clone();
        move |error: &AsyncError<String>| errors.push(error.clone())
    });

    let tracker = track(producer.producer(), config, Some(vec!["a"]));
    tracker.render(Some(vec!["b"]));

    first.release();
    let_tasks_run().await;
    assert_eq!(tracker.await_state().await, Ok(Async::Loading));
    assert_eq!(errors.count(), 0);

    second.release();
    assert_eq!(tracker.settled().await, Async::success(2));
}

// [1] -> [1] is a no-op, [1] -> [2] is exactly one new invocation
#[tokio::test]
async fn test_dependency_changes() {
    let producer = MockProducer::<u32, String>::new();
    producer.respond(Ok(1));
    producer.respond(Ok(2));

    let tracker = track(producer.producer(), FetchConfig::new(), Some(vec![1]));
    assert_eq!(tracker.settled().await, Async::success(1));

    tracker.render(Some(vec![1]));
    assert_eq!(tracker.await_state().await, Ok(Async::success(1)));
    assert_eq!(producer.calls(), 1);

    tracker.render(Some(vec![2]));
    assert_eq!(tracker.settled().await, Async::success(2));
    assert_eq!(producer.calls(), 2);

    tracker.render(Some(vec![2]));
    tracker.render(Some(vec![2]));
    let_tasks_run().await;
    assert_eq!(producer.calls(), 2);
}

// Without dependencies the producer runs once per mount
#[tokio::test]
async fn test_no_dependencies_runs_once() {
    let producer = MockProducer::<u32, String>::new();
    producer.respond(Ok(1));
    producer.respond(Ok(2));

    let tracker = track(producer.producer(), FetchConfig::new(), None::<Vec<u32>>);
    assert_eq!(tracker.settled().await, Async::success(1));

    tracker.render(None);
    tracker.render(None);
    assert_eq!(tracker.await_state().await, Ok(Async::success(1)));
    assert_eq!(producer.calls(), 1);

    tracker.remount();
    assert_eq!(tracker.settled().await, Async::success(2));
    assert_eq!(producer.calls(), 2);
}

// A new invocation clears the previous result
#[tokio::test]
async fn test_new_invocation_clears_result() {
    let producer = MockProducer::<u32, String>::new();
    producer.respond(Ok(1));
    let gate = producer.respond_gated(Ok(2));

    let tracker = track(producer.producer(), FetchConfig::new(), Some(vec![1]));
    assert_eq!(tracker.settled().await, Async::success(1));

    tracker.render(Some(vec![2]));
    let state = tracker.await_state().await.unwrap();
    assert!(state.loading());
    assert_eq!(state.result(), None);
    assert_eq!(state.error(), None);

    gate.release();
    assert_eq!(tracker.settled().await, Async::success(2));
}

// A panicking producer settles as a failure instead of loading forever
#[tokio::test]
async fn test_producer_panic() {
    let tracker = track(
        || async {
            if true {
                panic!("producer exploded");
            }
            Ok::<u32, String>(1)
        },
        FetchConfig::new(),
        None::<Vec<u32>>,
    );

    let state = tracker.settled().await;
    assert!(state.is_fail_with_panic());
}

// A producer that never settles keeps the tracker loading
#[tokio::test]
async fn test_producer_never_settles() {
    let producer = MockProducer::<u32, String>::new();
    let tracker = track(producer.producer(), FetchConfig::new(), None::<Vec<u32>>);

    let result = tokio::time::timeout(Duration::from_millis(50), tracker.settled()).await;
    assert!(result.is_err());
    assert!(tracker.get_state().loading());
}

// Dropping the tracker discards in-flight settlements
#[tokio::test]
async fn test_drop_discards_settlement() {
    let producer = MockProducer::<u32, String>::new();
    let gate = producer.respond_gated(Ok(1));
    let successes = Calls::<u32>::default();
    let config = FetchConfig::new().on_success({
        let successes = successes.clone();
        move |value: &u32| successes.push(*value)
    });

    let tracker = track(producer.producer(), config, None::<Vec<u32>>);
    drop(tracker);

    gate.release();
    let_tasks_run().await;
    assert_eq!(successes.count(), 0);
}

// A panicking on_success is contained: the value still settles and later renders still run
#[tokio::test]
async fn test_on_success_panic_keeps_tracker_alive() {
    let producer = MockProducer::<u32, String>::new();
    producer.respond(Ok(1));
    producer.respond(Ok(2));
    let config = FetchConfig::new().on_success(|value: &u32| {
        if *value == 1 {
            panic!("callback exploded");
        }
    });

    let tracker = track(producer.producer(), config, Some(vec![1]));
    let state = tokio::time::timeout(Duration::from_secs(1), tracker.settled())
        .await
        .unwrap();
    assert_eq!(state, Async::success(1));

    tracker.render(Some(vec![2]));
    let state = tokio::time::timeout(Duration::from_secs(1), tracker.settled())
        .await
        .unwrap();
    assert_eq!(state, Async::success(2));
    assert_eq!(producer.calls(), 2);
}

// A panicking type check fails the invocation and nothing is cached
#[tokio::test]
async fn test_type_check_panic_fails_invocation() {
    let backends = TestStorages::new();
    let producer = MockProducer::<u32, String>::new();
    producer.respond(Ok(1));
    let errors = Calls::<AsyncError<String>>::default();
    let config = FetchConfig::new()
        .storages(backends.storages())
        .cache(CacheConfig::new("k").expires_ms(1000))
        .unwrap()
        .type_check(|_: &u32| panic!("check exploded"))
        .on_error({
            let errors = errors.clone();
            move |error: &AsyncError<String>| errors.push(error.clone())
        });

    let tracker = track(producer.producer(), config, None::<Vec<u32>>);
    let state = tracker.settled().await;

    assert!(state.is_fail_with_panic());
    assert_eq!(
        state.error(),
        Some(&AsyncError::Panicked("type check panicked: check exploded".to_string()))
    );
    assert_eq!(errors.count(), 1);
    assert_eq!(backends.session.set_count(), 0);
}

// A panicking on_error still leaves the tracker failed and responsive
#[tokio::test]
async fn test_on_error_panic_keeps_tracker_alive() {
    let producer = MockProducer::<u32, String>::new();
    producer.respond(Err("offline".to_string()));
    producer.respond(Ok(2));
    let config = FetchConfig::new().on_error(|_: &AsyncError<String>| panic!("handler exploded"));

    let tracker = track(producer.producer(), config, Some(vec![1]));
    assert_eq!(
        tracker.settled().await,
        Async::fail_with_rejection("offline".to_string())
    );

    tracker.render(Some(vec![2]));
    assert_eq!(tracker.settled().await, Async::success(2));
}

// A panicking with_state action does not stop later state queries
#[tokio::test]
async fn test_with_state_panic_is_contained() {
    let producer = MockProducer::<u32, String>::new();
    producer.respond(Ok(1));

    let tracker = track(producer.producer(), FetchConfig::new(), None::<Vec<u32>>);
    tracker.with_state(|_| panic!("action exploded"));
    assert_eq!(tracker.settled().await, Async::success(1));
}

// A cache hit on render supersedes an invocation still in flight
#[tokio::test]
async fn test_cache_hit_supersedes_inflight_invocation() {
    let backends = TestStorages::new();
    let clock = ManualClock::new(5000);
    let producer = MockProducer::<u32, String>::new();
    let gate = producer.respond_gated(Ok(1));

    let successes = Calls::<u32>::default();
    let config = FetchConfig::new()
        .storages(backends.storages())
        .clock(Arc::new(clock.clone()))
        .cache(CacheConfig::new("k").cache_result(false).expires_ms(1000))
        .unwrap()
        .on_success({
            let successes = successes.clone();
            move |value: &u32| successes.push(*value)
        });

    let tracker = track(producer.producer(), config, Some(vec![1]));
    assert_eq!(tracker.get_state(), Async::Loading);

    // Another writer fills the cache while the first invocation is in flight
    ResultCache::new(backends.session.clone())
        .write("k", &99u32, 5000)
        .unwrap();
    tracker.render(Some(vec![2]));
    assert_eq!(tracker.await_state().await, Ok(Async::success(99)));

    gate.release();
    let_tasks_run().await;
    assert_eq!(tracker.await_state().await, Ok(Async::success(99)));
    assert_eq!(producer.calls(), 1);
    assert_eq!(successes.count(), 0);
}

// The signal view follows the same transitions as the stream
#[tokio::test]
async fn test_to_signal() {
    use futures_signals::signal::SignalExt;

    let producer = MockProducer::<u32, String>::new().with_delay(Duration::from_millis(5));
    producer.respond(Ok(3));

    let tracker = track(producer.producer(), FetchConfig::new(), None::<Vec<u32>>);
    let loading: Vec<bool> = tracker
        .to_signal()
        .map(|state| state.loading())
        .to_stream()
        .stop_if(|loading| !*loading)
        .collect()
        .await;

    assert_eq!(loading, vec![true, false]);
}
