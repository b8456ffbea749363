//! Latest-value handoff between a tracking thread and the render loop.
//!
//! A face tracker and a renderer rarely run at the same rate. The renderer only ever
//! cares about the most recent landmark packet, so the connecting channel holds a
//! single value and overwrites it when the producer gets ahead.

use std::sync::Arc;

use crossbeam::queue::ArrayQueue;

/// Creates a connected pair of [`FeedSender`] and [`FeedReceiver`].
pub fn latest<T>() -> (FeedSender<T>, FeedReceiver<T>) {
    // Capacity of 1 means the slot only ever holds the newest value and `publish` never
    // blocks, which is the property we want.
    let queue = Arc::new(ArrayQueue::new(1));
    (
        FeedSender {
            queue: queue.clone(),
        },
        FeedReceiver { queue },
    )
}

/// The producing end of a latest-value feed.
///
/// A connected pair of [`FeedSender`] and [`FeedReceiver`] can be created by calling
/// [`latest`].
pub struct FeedSender<T> {
    queue: Arc<ArrayQueue<T>>,
}

impl<T> FeedSender<T> {
    /// Publishes a new value, replacing any unconsumed one.
    ///
    /// This method does not block or fail. If the connected [`FeedReceiver`] was dropped,
    /// the value is stored and dropped along with the slot.
    pub fn publish(&self, value: T) {
        self.queue.force_push(value);
    }
}

/// The consuming end of a latest-value feed.
///
/// A connected pair of [`FeedSender`] and [`FeedReceiver`] can be created by calling
/// [`latest`].
pub struct FeedReceiver<T> {
    queue: Arc<ArrayQueue<T>>,
}

impl<T> FeedReceiver<T> {
    /// Takes the most recently published value, if one arrived since the last call.
    ///
    /// Returns `None` when nothing new was published. This never blocks; a caller that
    /// wants to wait has to poll.
    pub fn poll(&self) -> Option<T> {
        self.queue.pop()
    }
}
