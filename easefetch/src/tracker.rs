use crate::cache::ResultCacheLayer;
use crate::config::{ErrorCallback, SuccessCallback, TypeCheck};
use crate::deps::Dependencies;
use crate::{Async, AsyncError, Clock, FetchConfig};
use futures_core::Stream;
use futures_signals::signal::{Mutable, MutableSignalCloned, SignalExt, SignalStream};
use std::any::Any;
use std::future::{pending, poll_fn, Future};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::{pin, Pin};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot::error::RecvError;
use tracing::{debug, trace, warn};

/// The boxed future a producer hands back for one invocation.
pub type ProducerFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

type Producer<T, E> = Arc<dyn Fn() -> ProducerFuture<T, E> + Send + Sync>;
type StateAction<T, E> = Box<dyn FnOnce(Async<T, E>) + Send>;

enum Command<D> {
    Render(Option<Vec<D>>),
    Remount,
}

struct Settlement<T, E> {
    invocation: u64,
    outcome: Result<T, AsyncError<E>>,
}

/// Tracks the lifecycle of an asynchronous producer as observable state.
///
/// A tracker is created with [`track`], which starts the first invocation right
/// away. Every later call to [`FetchTracker::render`] compares the new
/// dependency sequence with the previous one and starts a new invocation only
/// when they differ. Only the most recently started invocation may settle the
/// state; results of superseded invocations are dropped on arrival.
///
/// All transitions happen on a single background task, so the state is never
/// mutated concurrently. Callbacks, the type check and `with_state` actions
/// run on that task too; a panic in any of them is caught and logged, so the
/// task keeps processing renders. Dropping the tracker stops that task, after
/// which any in-flight producer result is discarded.
pub struct FetchTracker<T: Clone, E: Clone, D> {
    state: Mutable<Async<T, E>>,
    command_tx: UnboundedSender<Command<D>>,
    with_state_tx: UnboundedSender<StateAction<T, E>>,
}

/// Starts tracking `producer`. Must be called inside a tokio runtime.
///
/// The returned tracker is already `Loading`, or `Success` when a fresh cache
/// entry was found. `dependencies` of `None` means the producer runs once for
/// the lifetime of the tracker unless [`FetchTracker::remount`] is called.
///
/// ```no_run
/// use easefetch::{track, FetchConfig};
///
/// # async fn example() {
/// let tracker = track(
///     || async { Ok::<_, String>(vec!["todo".to_string()]) },
///     FetchConfig::new(),
///     Some(vec![1u32]),
/// );
/// let state = tracker.settled().await;
/// assert_eq!(state.result().map(Vec::len), Some(1));
/// # }
/// ```
pub fn track<T, E, D, F, Fut>(
    producer: F,
    config: FetchConfig<T, E>,
    dependencies: Option<Vec<D>>,
) -> FetchTracker<T, E, D>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    D: PartialEq + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    FetchTracker::track(producer, config, dependencies)
}

impl<T, E, D> FetchTracker<T, E, D>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    D: PartialEq + Send + 'static,
{
    pub fn track<F, Fut>(producer: F, config: FetchConfig<T, E>, dependencies: Option<Vec<D>>) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let producer: Producer<T, E> =
            Arc::new(move || Box::pin(producer()) as ProducerFuture<T, E>);
        let state = Mutable::new(Async::Loading);
        let (command_tx, command_rx) = tokio::sync::mpsc::unbounded_channel::<Command<D>>();
        let (with_state_tx, with_state_rx) =
            tokio::sync::mpsc::unbounded_channel::<StateAction<T, E>>();
        let (settle_tx, settle_rx) = tokio::sync::mpsc::unbounded_channel::<Settlement<T, E>>();

        let mut invocations = Invocations {
            state: state.clone(),
            producer,
            cache: config.result_cache(),
            type_check: config.type_check,
            on_success: config.on_success,
            on_error: config.on_error,
            clock: config.clock,
            dependencies: Dependencies::new(dependencies),
            current: 0,
            settle_tx,
        };
        invocations.start();

        tokio::spawn(async move {
            Self::process_queue(invocations, command_rx, with_state_rx, settle_rx).await;
        });

        FetchTracker {
            state,
            command_tx,
            with_state_tx,
        }
    }

    async fn process_queue(
        mut invocations: Invocations<T, E, D>,
        mut command_rx: UnboundedReceiver<Command<D>>,
        mut with_state_rx: UnboundedReceiver<StateAction<T, E>>,
        mut settle_rx: UnboundedReceiver<Settlement<T, E>>,
    ) {
        loop {
            tokio::select! {
                biased;
                command = command_rx.recv() => match command {
                    Some(Command::Render(dependencies)) => invocations.render(dependencies),
                    Some(Command::Remount) => invocations.start(),
                    None => break,
                },
                Some(action) = with_state_rx.recv() => {
                    let state = invocations.state.get_cloned();
                    let _ = guarded(invocations.current, "with_state action", || action(state));
                }
                Some(settlement) = settle_rx.recv() => invocations.settle(settlement),
            }
        }
        debug!(invocation = invocations.current, "tracker dropped, stopping");
    }

    /// One re-render of the host with the current dependency sequence.
    ///
    /// The sequence is compared element-wise with the one from the previous
    /// render (or from [`track`]). A new invocation starts only when the
    /// lengths differ or some element is not equal; otherwise this is a no-op.
    /// `None` is treated as an empty sequence.
    ///
    /// The render is queued and applied on the tracker's task, in call order.
    /// Use [`FetchTracker::await_state`] to observe the state after it.
    ///
    /// ## Examples
    ///
    /// ```no_run
    /// use easefetch::{track, FetchConfig};
    ///
    /// # async fn example() {
    /// let tracker = track(|| async { Ok::<_, String>(1) }, FetchConfig::new(), Some(vec![1u32]));
    ///
    /// // Same dependencies, nothing happens
    /// tracker.render(Some(vec![1]));
    ///
    /// // Changed dependencies start a new invocation and clear the result
    /// tracker.render(Some(vec![2]));
    /// assert!(tracker.await_state().await.unwrap().loading());
    /// # }
    /// ```
    pub fn render(&self, dependencies: Option<Vec<D>>) {
        let _ = self.command_tx.send(Command::Render(dependencies));
    }

    /// Starts a new invocation regardless of the dependencies.
    ///
    /// This models the host being unmounted and mounted again: the cache is
    /// consulted and, on a miss, the producer is called once more. Any
    /// invocation still in flight is superseded.
    ///
    /// ## Examples
    ///
    /// ```no_run
    /// use easefetch::{track, FetchConfig};
    ///
    /// # async fn example() {
    /// let tracker = track(|| async { Ok::<_, String>(1) }, FetchConfig::new(), None::<Vec<u32>>);
    /// tracker.settled().await;
    ///
    /// tracker.remount();
    /// assert_eq!(tracker.settled().await.value(), Some(1));
    /// # }
    /// ```
    pub fn remount(&self) {
        let _ = self.command_tx.send(Command::Remount);
    }
}

impl<T, E, D> FetchTracker<T, E, D>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// A stream of state changes, starting with the current state.
    ///
    /// Intermediate states may be skipped when several transitions happen
    /// before the stream is polled; the latest one is always delivered.
    ///
    /// ## Examples
    ///
    /// ```no_run
    /// use easefetch::{track, Async, EaseFetchStreamExt, FetchConfig};
    /// use futures::StreamExt;
    ///
    /// # async fn example() {
    /// let tracker = track(|| async { Ok::<_, String>(1) }, FetchConfig::new(), None::<Vec<u32>>);
    /// let states: Vec<Async<u32, String>> = tracker.to_stream().until_settled().collect().await;
    /// assert_eq!(states.last(), Some(&Async::success(1)));
    /// # }
    /// ```
    pub fn to_stream(&self) -> SignalStream<MutableSignalCloned<Async<T, E>>> {
        self.to_signal().to_stream()
    }

    /// The state as a futures-signals signal, for composing with other
    /// signals (`map_ref!`, `SignalExt::map`, `dedupe_cloned`).
    pub fn to_signal(&self) -> MutableSignalCloned<Async<T, E>> {
        self.state.signal_cloned()
    }

    /// The state as of now, without waiting for queued renders.
    pub fn get_state(&self) -> Async<T, E> {
        self.state.get_cloned()
    }

    /// Runs `action` on the tracker's task with the state as it is once every
    /// previously queued render and remount has been applied.
    pub fn with_state<F>(&self, action: F)
    where
        F: FnOnce(Async<T, E>) + Send + 'static,
    {
        let _ = self.with_state_tx.send(Box::new(action));
    }

    /// The state once every render and remount sent before this call has been
    /// processed.
    pub async fn await_state(&self) -> Result<Async<T, E>, RecvError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.with_state(move |state| {
            let _ = tx.send(state);
        });
        rx.await
    }

    /// Waits for the current invocation to settle and returns its state.
    ///
    /// The returned state is always `Success` or `Fail`. Never returns if the
    /// producer never settles.
    pub async fn settled(&self) -> Async<T, E> {
        if let Ok(current) = self.await_state().await {
            if current.is_complete() {
                return current;
            }
        }
        let mut stream = pin!(self.to_stream());
        while let Some(state) = poll_fn(|cx| stream.as_mut().poll_next(cx)).await {
            if state.is_complete() {
                return state;
            }
        }
        pending().await
    }
}

/// The state machine behind a tracker. Owned by the tracker's task.
struct Invocations<T: Clone, E: Clone, D> {
    state: Mutable<Async<T, E>>,
    producer: Producer<T, E>,
    cache: Option<Arc<dyn ResultCacheLayer<T>>>,
    type_check: Option<TypeCheck<T>>,
    on_success: Option<SuccessCallback<T>>,
    on_error: Option<ErrorCallback<E>>,
    clock: Arc<dyn Clock>,
    dependencies: Dependencies<D>,
    current: u64,
    settle_tx: UnboundedSender<Settlement<T, E>>,
}

impl<T, E, D> Invocations<T, E, D>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    D: PartialEq,
{
    fn render(&mut self, dependencies: Option<Vec<D>>) {
        if self.dependencies.update(dependencies) {
            self.start();
        } else {
            trace!(invocation = self.current, "dependencies unchanged");
        }
    }

    fn start(&mut self) {
        self.current += 1;
        let invocation = self.current;

        if let Some(cache) = &self.cache {
            if let Some(value) = cache.lookup(self.clock.now_millis()) {
                debug!(invocation, "serving invocation from cache");
                self.state.set(Async::success(value));
                return;
            }
        }

        debug!(invocation, "starting producer");
        self.state.set(Async::Loading);
        let computation = (self.producer)();
        let settle_tx = self.settle_tx.clone();
        tokio::spawn(async move {
            // Run the producer in its own task so a panic surfaces as a JoinError
            let outcome = match tokio::spawn(computation).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(reason)) => Err(AsyncError::Rejected(reason)),
                Err(e) => Err(AsyncError::Panicked(e.to_string())),
            };
            let _ = settle_tx.send(Settlement {
                invocation,
                outcome,
            });
        });
    }

    fn settle(&mut self, settlement: Settlement<T, E>) {
        let Settlement {
            invocation,
            outcome,
        } = settlement;
        if invocation != self.current {
            debug!(invocation, current = self.current, "discarding superseded settlement");
            return;
        }

        match outcome {
            Ok(value) => {
                if let Some(check) = &self.type_check {
                    match guarded(invocation, "type check", || check(&value)) {
                        Ok(true) => {}
                        Ok(false) => {
                            debug!(invocation, "resolved value failed the type check");
                            self.fail(AsyncError::TypeCheck);
                            return;
                        }
                        Err(message) => {
                            self.fail(AsyncError::Panicked(message));
                            return;
                        }
                    }
                }
                if let Some(cache) = self.cache.as_ref().filter(|cache| cache.writes_results()) {
                    let now = self.clock.now_millis();
                    let _ = guarded(invocation, "cache write", || cache.store(&value, now));
                }
                if let Some(on_success) = &self.on_success {
                    let _ = guarded(invocation, "on_success", || on_success(&value));
                }
                debug!(invocation, "invocation succeeded");
                self.state.set(Async::success(value));
            }
            Err(error) => {
                debug!(invocation, "invocation failed");
                self.fail(error);
            }
        }
    }

    fn fail(&mut self, error: AsyncError<E>) {
        if let Some(on_error) = &self.on_error {
            let _ = guarded(self.current, "on_error", || on_error(&error));
        }
        self.state.set(Async::fail(error));
    }
}

/// Runs user code on the tracker's task. A panic is logged and returned as
/// its message instead of unwinding through the task.
fn guarded<R>(invocation: u64, what: &'static str, f: impl FnOnce() -> R) -> Result<R, String> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        warn!(invocation, what, %message, "user code panicked on the tracker task");
        format!("{what} panicked: {message}")
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
