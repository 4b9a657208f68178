use std::time::Duration;

use tokio::net::{TcpStream, ToSocketAddrs};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Connects to `addr`, retrying with exponential backoff from 1s up to a 5s
/// cap on failure, matching the camera pipeline's TCP client reconnect loop
/// (4.3/4.9). Only returns `None` if `shutdown` fires while waiting.
pub async fn connect_with_backoff<A>(addr: A, mut shutdown: tokio::sync::watch::Receiver<bool>) -> Option<TcpStream>
where
    A: ToSocketAddrs + Clone,
{
    let mut backoff = INITIAL_BACKOFF;
    loop {
        match TcpStream::connect(addr.clone()).await {
            Ok(stream) => return Some(stream),
            Err(e) => {
                tracing::warn!(error = %e, backoff_secs = backoff.as_secs(), "stream transport connect failed, retrying");
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return None;
                        }
                    }
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connects_immediately_when_listener_is_up() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (_shut_tx, shut_rx) = tokio::sync::watch::channel(false);
        let accept = tokio::spawn(async move {
            let _ = listener.accept().await;
        });
        let stream = connect_with_backoff(addr, shut_rx).await;
        assert!(stream.is_some());
        accept.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_during_backoff_wait_returns_none() {
        // Port 0 bound-then-dropped can still sometimes accept; use an
        // address nothing listens on to force at least one failed attempt.
        let (shut_tx, shut_rx) = tokio::sync::watch::channel(false);
        let addr = "127.0.0.1:1".to_string();
        let handle = tokio::spawn(connect_with_backoff(addr, shut_rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shut_tx.send(true).unwrap();
        let result = handle.await.unwrap();
        assert!(result.is_none());
    }
}
