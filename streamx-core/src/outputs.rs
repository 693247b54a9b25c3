//! Typed output queues.
//!
//! Each queue is a bounded broadcast channel keyed by a client-scoped name
//! such as `linear/default.orderbook`. Watch calls register reference keys
//! (usually symbols) on a queue; the queue closes once every reference has
//! been released. Slow consumers skip the oldest items instead of blocking
//! the reader.

use dashmap::DashMap;
use futures::Stream;
use std::collections::HashSet;
use std::pin::Pin;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::Result;

/// Stream returned by every watch call.
pub type MessageStream<T> = Pin<Box<dyn Stream<Item = Result<T>> + Send>>;

struct Queue<T> {
    tx: broadcast::Sender<T>,
    refs: HashSet<String>,
}

/// Registry of output queues carrying one item type.
pub struct OutputQueues<T> {
    queues: DashMap<String, Queue<T>>,
    capacity: usize,
}

impl<T: Clone + Send + 'static> OutputQueues<T> {
    /// Creates an empty registry whose queues hold `capacity` items each.
    pub fn new(capacity: usize) -> Self {
        Self {
            queues: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Opens a stream on `key`, creating the queue if needed, and registers
    /// `refs` on it.
    pub fn subscribe<I, S>(&self, key: &str, refs: I) -> MessageStream<T>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entry = self.queues.entry(key.to_string()).or_insert_with(|| Queue {
            tx: broadcast::channel(self.capacity).0,
            refs: HashSet::new(),
        });
        entry.refs.extend(refs.into_iter().map(Into::into));
        let rx = entry.tx.subscribe();
        drop(entry);
        into_stream(key.to_string(), rx)
    }

    /// Sends `value` to every open stream on `key`. Returns the number of
    /// receivers reached; 0 when nobody is listening.
    pub fn publish(&self, key: &str, value: T) -> usize {
        match self.queues.get(key) {
            Some(queue) => queue.tx.send(value).unwrap_or(0),
            None => 0,
        }
    }

    /// Returns true if a queue exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.queues.contains_key(key)
    }

    /// Reference keys currently registered on `key`.
    pub fn refs(&self, key: &str) -> Vec<String> {
        let mut refs: Vec<String> = self
            .queues
            .get(key)
            .map(|q| q.refs.iter().cloned().collect())
            .unwrap_or_default();
        refs.sort();
        refs
    }

    /// Releases `refs` from `key`. Drops the queue, ending its streams, when
    /// no references remain. Returns true if the queue was closed.
    pub fn release<I, S>(&self, key: &str, refs: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let empty = match self.queues.get_mut(key) {
            Some(mut queue) => {
                for r in refs {
                    queue.refs.remove(r.as_ref());
                }
                queue.refs.is_empty()
            }
            None => return false,
        };
        if empty {
            debug!(queue = key, "closing output queue");
            self.queues.remove(key);
        }
        empty
    }

    /// Drops every queue.
    pub fn clear(&self) {
        self.queues.clear();
    }
}

fn into_stream<T: Clone + Send + 'static>(
    key: String,
    rx: broadcast::Receiver<T>,
) -> MessageStream<T> {
    Box::pin(futures::stream::unfold(
        (key, rx),
        |(key, mut rx)| async move {
            loop {
                match rx.recv().await {
                    Ok(value) => return Some((Ok(value), (key, rx))),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(queue = %key, skipped, "output consumer lagging");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_publish_reaches_all_streams() {
        let queues: OutputQueues<u32> = OutputQueues::new(8);
        let mut a = queues.subscribe("spot/default.trades", ["BTC/USDT"]);
        let mut b = queues.subscribe("spot/default.trades", ["ETH/USDT"]);
        assert_eq!(queues.publish("spot/default.trades", 5), 2);
        assert_eq!(a.next().await.unwrap().unwrap(), 5);
        assert_eq!(b.next().await.unwrap().unwrap(), 5);
    }

    #[test]
    fn test_publish_without_queue() {
        let queues: OutputQueues<u32> = OutputQueues::new(8);
        assert_eq!(queues.publish("missing", 1), 0);
    }

    #[tokio::test]
    async fn test_release_closes_when_unreferenced() {
        let queues: OutputQueues<u32> = OutputQueues::new(8);
        let mut s = queues.subscribe("k", ["a", "b"]);
        assert!(!queues.release("k", ["a"]));
        assert_eq!(queues.refs("k"), vec!["b".to_string()]);
        assert!(queues.release("k", ["b"]));
        assert!(!queues.contains("k"));
        assert!(s.next().await.is_none());
    }

    #[tokio::test]
    async fn test_lagging_consumer_skips_oldest() {
        let queues: OutputQueues<u32> = OutputQueues::new(2);
        let mut s = queues.subscribe("k", ["a"]);
        for i in 0..5 {
            queues.publish("k", i);
        }
        assert_eq!(s.next().await.unwrap().unwrap(), 3);
        assert_eq!(s.next().await.unwrap().unwrap(), 4);
    }
}
