use crate::Async;
use futures_core::stream::Stream;
use pin_project::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Extra combinators for observing tracker state as a stream.
pub trait EaseFetchStreamExt: Stream {
    /// Yields items up to and including the first one for which `test` returns
    /// true, then ends.
    ///
    /// ```no_run
    /// use easefetch::{track, EaseFetchStreamExt, FetchConfig};
    /// use futures::StreamExt;
    ///
    /// # async fn example() {
    /// let tracker = track(|| async { Ok::<u32, String>(7) }, FetchConfig::new(), None::<Vec<u8>>);
    /// tracker
    ///     .to_stream()
    ///     .stop_if(|state| state.is_complete())
    ///     .for_each(|state| {
    ///         println!("{state:?}");
    ///         async {}
    ///     })
    ///     .await;
    /// # }
    /// ```
    fn stop_if<F>(self, test: F) -> StopIf<Self, F>
    where
        F: FnMut(&Self::Item) -> bool,
        Self: Sized,
    {
        StopIf {
            stream: self,
            stopped: false,
            test,
        }
    }

    /// Yields tracker states until the first settled one, inclusive.
    fn until_settled<T, E>(self) -> StopIf<Self, fn(&Async<T, E>) -> bool>
    where
        T: Clone,
        E: Clone,
        Self: Stream<Item = Async<T, E>> + Sized,
    {
        self.stop_if(Async::is_complete as fn(&Async<T, E>) -> bool)
    }
}

impl<S: ?Sized> EaseFetchStreamExt for S where S: Stream {}

#[pin_project(project = StopIfProj)]
#[derive(Debug)]
#[must_use = "Streams do nothing unless polled"]
pub struct StopIf<A, B> {
    #[pin]
    stream: A,
    stopped: bool,
    test: B,
}

impl<A, B> Stream for StopIf<A, B>
where
    A: Stream,
    B: FnMut(&A::Item) -> bool,
{
    type Item = A::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let StopIfProj {
            stream,
            stopped,
            test,
        } = self.project();

        if *stopped {
            return Poll::Ready(None);
        }
        match stream.poll_next(cx) {
            Poll::Ready(Some(value)) => {
                *stopped = test(&value);
                Poll::Ready(Some(value))
            }
            Poll::Ready(None) => {
                *stopped = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
