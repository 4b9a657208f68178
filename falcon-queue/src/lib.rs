use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

/// How a bounded queue behaves once it is full (4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// `send` suspends the caller until a slot frees up.
    Block,
    /// `send` never suspends: the oldest queued item is discarded to make
    /// room for the new one.
    DropOldest,
}

#[derive(thiserror::Error, Debug)]
#[error("falcon-queue: receiver has been dropped")]
pub struct SendError<T>(pub T);

impl<T> std::fmt::Debug for SendError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "falcon_queue::SendError")
    }
}

pub struct Sender<T> {
    tx: mpsc::Sender<T>,
    evict: Option<Arc<Mutex<mpsc::Receiver<T>>>>,
    policy: OverflowPolicy,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Sender {
            tx: self.tx.clone(),
            evict: self.evict.clone(),
            policy: self.policy,
        }
    }
}

impl<T> Sender<T> {
    /// Enqueues `item`. Under `Block`, suspends (an `.await` point, per the
    /// concurrency model's cooperative-suspension requirement) until a slot
    /// is free. Under `DropOldest`, never suspends: it discards the oldest
    /// queued item instead, as many times as needed to make room.
    pub async fn send(&self, item: T) -> Result<(), SendError<T>> {
        match self.policy {
            OverflowPolicy::Block => self.tx.send(item).await.map_err(|e| SendError(e.0)),
            OverflowPolicy::DropOldest => {
                let mut item = item;
                loop {
                    match self.tx.try_send(item) {
                        Ok(()) => return Ok(()),
                        Err(mpsc::error::TrySendError::Closed(back)) => return Err(SendError(back)),
                        Err(mpsc::error::TrySendError::Full(back)) => {
                            item = back;
                            let mut rx = self
                                .evict
                                .as_ref()
                                .expect("DropOldest sender always carries an eviction handle")
                                .lock()
                                .await;
                            let _ = rx.try_recv();
                            drop(rx);
                        }
                    }
                }
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub struct Receiver<T> {
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Receiver<T> {
    /// Awaits the next item, suspending until one is available or every
    /// sender has been dropped (returns `None`).
    pub async fn recv(&self) -> Option<T> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }
}

/// Creates a bounded queue of the given capacity with the given overflow
/// policy.
pub fn bounded<T>(capacity: usize, policy: OverflowPolicy) -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    let rx = Arc::new(Mutex::new(rx));
    let evict = match policy {
        OverflowPolicy::Block => None,
        OverflowPolicy::DropOldest => Some(rx.clone()),
    };
    (Sender { tx, evict, policy }, Receiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn block_policy_round_trips_in_order() {
        let (tx, rx) = bounded::<u32>(4, OverflowPolicy::Block);
        for i in 0..4 {
            tx.send(i).await.unwrap();
        }
        for i in 0..4 {
            assert_eq!(rx.recv().await, Some(i));
        }
    }

    #[tokio::test]
    async fn drop_oldest_never_blocks_and_keeps_newest() {
        let (tx, rx) = bounded::<u32>(2, OverflowPolicy::DropOldest);
        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();
        tx.send(3).await.unwrap(); // should evict 1, not block
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, Some(3));
    }

    #[tokio::test]
    async fn send_after_receiver_dropped_errors() {
        let (tx, rx) = bounded::<u32>(1, OverflowPolicy::Block);
        drop(rx);
        assert!(tx.send(1).await.is_err());
    }
}
