use std::sync::{Arc, Mutex};

use tokio::sync::watch;

/// Process-wide cancellation signal carrying an optional cause.
///
/// Cloning is cheap; all clones observe the same state. The first call that
/// provides a cause wins, later causes are dropped.
#[derive(Debug, Clone)]
pub struct CancelToken {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    sender: watch::Sender<bool>,
    cause: Mutex<Option<String>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        CancelToken { shared: Arc::new(Shared { sender, cause: Mutex::new(None) }) }
    }

    /// Cancel without recording a cause.
    pub fn cancel(&self) {
        self.shared.sender.send_replace(true);
    }

    /// Cancel and record `cause` unless an earlier cause was already set.
    pub fn cancel_with_cause(&self, cause: impl Into<String>) {
        {
            let mut slot = self.shared.cause.lock().expect("cause mutex poisoned");
            if slot.is_none() {
                *slot = Some(cause.into());
            }
        }
        self.shared.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.shared.sender.borrow()
    }

    /// The recorded cause, if any.
    pub fn cause(&self) -> Option<String> {
        self.shared.cause.lock().expect("cause mutex poisoned").clone()
    }

    /// Wait until the token is cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.shared.sender.subscribe();
        while !*receiver.borrow_and_update() {
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        CancelToken::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_cause_wins() {
        let token = CancelToken::new();
        token.cancel_with_cause("first");
        token.cancel_with_cause("second");
        assert!(token.is_cancelled());
        assert_eq!(token.cause().as_deref(), Some("first"));
    }

    #[test]
    fn cancel_without_cause_keeps_slot_empty() {
        let token = CancelToken::new();
        token.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.cause(), None);
    }

    #[tokio::test]
    async fn cancelled_wakes_waiters() {
        let token = CancelToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };
        token.cancel_with_cause("stop");
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_returns_immediately_when_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        token.cancelled().await;
    }
}
