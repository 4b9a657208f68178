mod codec;
mod reconnect;

use tokio::sync::broadcast;

pub use codec::LineCodec;
pub use reconnect::connect_with_backoff;

#[derive(thiserror::Error, Debug)]
pub enum StreamTransportError {
    #[error("malformed stream message")]
    Json(#[from] serde_json::Error),
    #[error("stream I/O error")]
    Io(#[from] std::io::Error),
}

/// A fan-out channel for broadcasting outbound messages to every connected
/// client on one endpoint, grounded in `TCPServer.send_to_client`'s
/// iterate-and-send-to-all-sockets broadcast. Each connection's writer task
/// holds its own `broadcast::Receiver` obtained from `subscribe()`.
#[derive(Clone)]
pub struct Broadcaster<T> {
    tx: broadcast::Sender<T>,
}

impl<T: Clone> Broadcaster<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Broadcaster { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.tx.subscribe()
    }

    /// Sends to every currently-subscribed client. Returns the number of
    /// receivers the message was delivered to; `0` is not an error, it just
    /// means no console is connected right now.
    pub fn send(&self, item: T) -> usize {
        self.tx.send(item).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_all_subscribers() {
        let b = Broadcaster::<u32>::new(8);
        let mut r1 = b.subscribe();
        let mut r2 = b.subscribe();
        let delivered = b.send(42);
        assert_eq!(delivered, 2);
        assert_eq!(r1.recv().await.unwrap(), 42);
        assert_eq!(r2.recv().await.unwrap(), 42);
    }

    #[test]
    fn send_with_no_subscribers_returns_zero() {
        let b = Broadcaster::<u32>::new(8);
        assert_eq!(b.send(1), 0);
    }
}
