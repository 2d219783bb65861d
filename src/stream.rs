//! Query result stream
//!
//! Sub-query workers push into one bounded channel; the caller drains it as
//! a [`Stream`]. Dropping the stream cancels every worker still running.

use futures_util::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::event::Event;

/// Room for this many undrained events before workers block
pub const QUERY_CHANNEL_CAPACITY: usize = 32;

pin_project! {
    /// Merged, single-pass output of one query
    pub struct EventStream {
        #[pin]
        receiver: mpsc::Receiver<Event>,
        cancel: CancellationToken,
        // Events handed to the caller so far
        emitted: usize,
    }

    impl PinnedDrop for EventStream {
        fn drop(this: Pin<&mut Self>) {
            this.project().cancel.cancel();
        }
    }
}

impl EventStream {
    pub fn new(receiver: mpsc::Receiver<Event>, cancel: CancellationToken) -> Self {
        Self {
            receiver,
            cancel,
            emitted: 0,
        }
    }

    /// Create a sender/stream pair sharing `cancel`
    pub fn channel(cancel: CancellationToken) -> (mpsc::Sender<Event>, Self) {
        let (tx, rx) = mpsc::channel(QUERY_CHANNEL_CAPACITY);
        (tx, Self::new(rx, cancel))
    }

    /// Stop all workers; the stream ends on the next poll
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Drain into a vector
    pub async fn collect_all(mut self) -> Vec<Event> {
        use futures_util::StreamExt;

        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        events
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if this.cancel.is_cancelled() {
            return Poll::Ready(None);
        }

        match this.receiver.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                *this.emitted += 1;
                Poll::Ready(Some(event))
            }
            other => other,
        }
    }
}
