//! Cooperative cancellation shared by the tasks of one session.

use std::sync::Arc;
use tokio::sync::watch;

/// A cloneable done-signal.
///
/// Every clone observes the same flag. Once cancelled it stays cancelled.
#[derive(Debug, Clone)]
pub struct Cancellation {
    tx: Arc<watch::Sender<bool>>,
}

impl Cancellation {
    /// Create a new, not yet cancelled signal.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signal cancellation to every clone and child.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether `cancel` has been called on this signal (or a parent).
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the signal is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns once set.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Create a child signal.
    ///
    /// The child is cancelled when the parent is; cancelling the child leaves
    /// the parent untouched.
    pub fn child(&self) -> Cancellation {
        let child = Cancellation::new();
        if self.is_cancelled() {
            child.cancel();
            return child;
        }

        // The link holds the child weakly and ends once every child handle
        // is gone or the child is cancelled on its own.
        let parent = self.clone();
        let linked = Arc::downgrade(&child.tx);
        let mut rx = child.tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = parent.cancelled() => {
                    if let Some(tx) = linked.upgrade() {
                        tx.send_replace(true);
                    }
                }
                _ = rx.wait_for(|cancelled| *cancelled) => {}
            }
        });
        child
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn clones_share_state() {
        let cancel = Cancellation::new();
        let other = cancel.clone();
        assert!(!other.is_cancelled());

        cancel.cancel();
        assert!(other.is_cancelled());
        tokio::time::timeout(Duration::from_secs(1), other.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn parent_cancels_child() {
        let parent = Cancellation::new();
        let child = parent.child();

        parent.cancel();
        tokio::time::timeout(Duration::from_secs(1), child.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn child_does_not_cancel_parent() {
        let parent = Cancellation::new();
        let child = parent.child();

        child.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn child_of_cancelled_parent_starts_cancelled() {
        let parent = Cancellation::new();
        parent.cancel();
        assert!(parent.child().is_cancelled());
    }

    #[tokio::test]
    async fn dropped_children_release_their_link_task() {
        let metrics = tokio::runtime::Handle::current().metrics();
        let parent = Cancellation::new();
        let before = metrics.num_alive_tasks();

        for _ in 0..100 {
            drop(parent.child());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(metrics.num_alive_tasks(), before);
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_children_release_their_link_task() {
        let metrics = tokio::runtime::Handle::current().metrics();
        let parent = Cancellation::new();
        let before = metrics.num_alive_tasks();

        let children: Vec<_> = (0..10).map(|_| parent.child()).collect();
        children.iter().for_each(Cancellation::cancel);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(metrics.num_alive_tasks(), before);
    }
}
