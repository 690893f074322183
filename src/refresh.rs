//! Process-wide refresh signal. The coordinator only owns a counter; every
//! increment tells each subscribed view to drop its records and fetch again.

use std::sync::{Arc, OnceLock};

use tokio::sync::watch;
use tracing::info;

pub struct RefreshCoordinator {
    sender: watch::Sender<u64>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(0);
        Self { sender }
    }

    pub fn refresh_key(&self) -> u64 {
        *self.sender.borrow()
    }

    /// Bumps the counter and returns the new key. Never waits on listeners.
    pub fn request_refresh(&self) -> u64 {
        self.sender.send_modify(|key| *key += 1);
        let key = self.refresh_key();
        info!(
            refresh_key = key,
            listeners = self.sender.receiver_count(),
            "refresh requested"
        );
        key
    }

    /// The receiver starts out having seen the current key.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.sender.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_COORDINATOR: OnceLock<Arc<RefreshCoordinator>> = OnceLock::new();

pub fn global() -> &'static Arc<RefreshCoordinator> {
    GLOBAL_COORDINATOR.get_or_init(|| Arc::new(RefreshCoordinator::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero_and_counts_up() {
        let coordinator = RefreshCoordinator::new();
        assert_eq!(coordinator.refresh_key(), 0);
        assert_eq!(coordinator.request_refresh(), 1);
        assert_eq!(coordinator.request_refresh(), 2);
        assert_eq!(coordinator.refresh_key(), 2);
    }

    #[test]
    fn increments_without_listeners() {
        let coordinator = RefreshCoordinator::new();
        assert_eq!(coordinator.listener_count(), 0);
        coordinator.request_refresh();
        assert_eq!(coordinator.refresh_key(), 1);
    }

    #[tokio::test]
    async fn subscribers_see_each_increment() {
        let coordinator = RefreshCoordinator::new();
        let mut first = coordinator.subscribe();
        let mut second = coordinator.subscribe();
        assert_eq!(coordinator.listener_count(), 2);

        coordinator.request_refresh();
        first.changed().await.unwrap();
        second.changed().await.unwrap();
        assert_eq!(*first.borrow_and_update(), 1);
        assert_eq!(*second.borrow_and_update(), 1);
    }

    #[test]
    fn global_coordinator_is_shared() {
        let a = global();
        let b = global();
        assert!(Arc::ptr_eq(a, b));
    }
}
