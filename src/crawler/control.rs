//! Cancellation and cooperative pause shared by every unit of work
//!
//! Both signals are checked explicitly at checkpoints (before each fetch and
//! before each download); nothing is pre-empted.

use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// A cooperative pause flag that tasks can wait on without busy-waiting
#[derive(Debug, Clone)]
pub struct PauseToken {
    tx: Arc<watch::Sender<bool>>,
}

impl PauseToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn pause(&self) {
        self.tx.send_replace(true);
    }

    pub fn resume(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.tx.borrow()
    }

    /// Waits until the token is resumed or `cancel` fires
    ///
    /// Returns immediately when not paused.
    pub async fn wait_while_paused(&self, cancel: &CancellationToken) {
        let mut rx = self.tx.subscribe();
        loop {
            if !*rx.borrow_and_update() {
                return;
            }

            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = cancel.cancelled() => return,
            }
        }
    }
}

impl Default for PauseToken {
    fn default() -> Self {
        Self::new()
    }
}

/// The pair of signals every lane and the download executor receive
#[derive(Debug, Clone, Default)]
pub struct CrawlControl {
    cancel: CancellationToken,
    pause: PauseToken,
}

impl CrawlControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a control around an existing cancellation token
    pub fn with_token(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            pause: PauseToken::new(),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn pause(&self) {
        self.pause.pause();
    }

    pub fn resume(&self) {
        self.pause.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    /// Cancellation and pause checkpoint
    ///
    /// Blocks while paused. Returns `false` if the caller must stop because
    /// cancellation was requested before or during the wait.
    pub async fn checkpoint(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.pause.wait_while_paused(&self.cancel).await;
        !self.cancel.is_cancelled()
    }
}
