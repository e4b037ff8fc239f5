use crate::AsyncError;

/// The observable state of one tracked invocation.
///
/// `Async` is the `{ loading, result, error }` triple of a fetch folded into a
/// single enum, so `result` and `error` can never both be set.
///
/// There is no idle variant: [`crate::track`] starts the first invocation
/// before it returns, so a tracker is observable only from `Loading` onwards.
///
/// - `Loading`: the current invocation has not settled. Both `result` and
///   `error` are cleared.
/// - `Success`: the invocation resolved (or was served from the cache).
/// - `Fail`: the invocation rejected, panicked, or failed the type check.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Async<T: Clone, E: Clone> {
    Loading,
    Success { value: T },
    Fail { error: AsyncError<E> },
}

impl<T: Clone, E: Clone> Async<T, E> {
    pub fn success(value: T) -> Self {
        Async::Success { value }
    }

    pub fn fail(error: AsyncError<E>) -> Self {
        Async::Fail { error }
    }

    pub fn fail_with_rejection(reason: E) -> Self {
        Async::Fail {
            error: AsyncError::Rejected(reason),
        }
    }

    pub fn fail_with_type_check() -> Self {
        Async::Fail {
            error: AsyncError::TypeCheck,
        }
    }

    /// True while the current invocation's producer has not settled.
    pub fn loading(&self) -> bool {
        matches!(self, Async::Loading)
    }

    /// The last resolved (or cache-hit) value, if the state is `Success`.
    pub fn result(&self) -> Option<&T> {
        self.value_ref()
    }

    /// The failure of the current invocation, if the state is `Fail`.
    pub fn error(&self) -> Option<&AsyncError<E>> {
        self.error_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading()
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Async::Success { .. })
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Async::Fail { .. })
    }

    /// Settled, either way.
    pub fn is_complete(&self) -> bool {
        matches!(self, Async::Success { .. } | Async::Fail { .. })
    }

    pub fn is_incomplete(&self) -> bool {
        !self.is_complete()
    }

    pub fn value_ref(&self) -> Option<&T> {
        match self {
            Async::Success { value } => Some(value),
            _ => None,
        }
    }

    pub fn value(self) -> Option<T> {
        match self {
            Async::Success { value } => Some(value),
            _ => None,
        }
    }

    pub fn error_ref(&self) -> Option<&AsyncError<E>> {
        match self {
            Async::Fail { error } => Some(error),
            _ => None,
        }
    }

    pub fn is_fail_with_rejection(&self) -> bool {
        self.error_ref().is_some_and(AsyncError::is_rejected)
    }

    pub fn is_fail_with_type_check(&self) -> bool {
        self.error_ref().is_some_and(AsyncError::is_type_check)
    }

    pub fn is_fail_with_panic(&self) -> bool {
        self.error_ref().is_some_and(AsyncError::is_panicked)
    }
}

impl<T: Clone, E: Clone> From<Result<T, E>> for Async<T, E> {
    fn from(value: Result<T, E>) -> Self {
        match value {
            Ok(value) => Async::success(value),
            Err(reason) => Async::fail_with_rejection(reason),
        }
    }
}

impl<T: Clone, E: Clone> From<&Async<T, E>> for Option<T> {
    fn from(value: &Async<T, E>) -> Self {
        value.value_ref().cloned()
    }
}
