//! Job cancellation helpers over a `watch` channel.

use tokio::sync::watch;

pub fn is_cancelled(rx: &watch::Receiver<bool>) -> bool {
    *rx.borrow()
}

/// Resolves once cancellation is requested. Never resolves if the sender is
/// dropped without cancelling.
pub async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancelled_resolves_on_send() {
        let (tx, mut rx) = watch::channel(false);
        assert!(!is_cancelled(&rx));
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), cancelled(&mut rx))
            .await
            .unwrap();
        assert!(is_cancelled(&rx));
    }

    #[tokio::test]
    async fn test_dropped_sender_is_not_cancellation() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let waited = tokio::time::timeout(Duration::from_millis(50), cancelled(&mut rx)).await;
        assert!(waited.is_err());
    }
}
