/// Returns true when `next` differs from `prev` and a new invocation is due.
///
/// Two sequences are equal iff they have the same length and every pair of
/// elements compares equal. A missing sequence counts as empty, so an
/// invocation tracked without dependencies runs exactly once per mount.
pub fn dependencies_changed<D: PartialEq>(prev: &[D], next: &[D]) -> bool {
    prev.len() != next.len() || prev.iter().zip(next).any(|(a, b)| a != b)
}

/// The dependency sequence of the last render.
#[derive(Debug, Clone)]
pub(crate) struct Dependencies<D> {
    current: Vec<D>,
}

impl<D: PartialEq> Dependencies<D> {
    pub(crate) fn new(initial: Option<Vec<D>>) -> Self {
        Self {
            current: initial.unwrap_or_default(),
        }
    }

    /// Records `next` and reports whether it differs from the previous render.
    pub(crate) fn update(&mut self, next: Option<Vec<D>>) -> bool {
        let next = next.unwrap_or_default();
        if dependencies_changed(&self.current, &next) {
            self.current = next;
            true
        } else {
            false
        }
    }
}
