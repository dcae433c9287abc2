//! Connectivity watcher. The platform side (or the HTTP client, through
//! [`ConnectivityReporter`]) feeds a [`ConnectivityMonitor`]; views hold a
//! [`ConnectivitySubscription`] for as long as they need the signal.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use kaveri_client_core::api::ConnectivityReporter;
use tokio::sync::watch;

pub const OFFLINE_TITLE: &str = "No Internet Connection";
pub const OFFLINE_MESSAGE: &str = "Please check your connection and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Offline,
}

#[derive(Debug)]
struct MonitorInner {
    state: watch::Sender<Connectivity>,
    subscribers: AtomicUsize,
}

#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<MonitorInner>,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(Connectivity::Online)
    }
}

impl ConnectivityMonitor {
    #[must_use]
    pub fn new(initial: Connectivity) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            inner: Arc::new(MonitorInner {
                state,
                subscribers: AtomicUsize::new(0),
            }),
        }
    }

    #[must_use]
    pub fn current(&self) -> Connectivity {
        *self.inner.state.borrow()
    }

    /// Publishes `next`; returns whether it differed from the current state.
    pub fn set(&self, next: Connectivity) -> bool {
        let changed = self.inner.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            tracing::info!(state = ?next, "connectivity changed");
        }
        changed
    }

    pub fn set_online(&self) -> bool {
        self.set(Connectivity::Online)
    }

    pub fn set_offline(&self) -> bool {
        self.set(Connectivity::Offline)
    }

    pub fn subscribe(&self) -> ConnectivitySubscription {
        self.inner.subscribers.fetch_add(1, Ordering::SeqCst);
        ConnectivitySubscription {
            receiver: self.inner.state.subscribe(),
            monitor: Arc::clone(&self.inner),
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.load(Ordering::SeqCst)
    }
}

impl ConnectivityReporter for ConnectivityMonitor {
    fn report_online(&self) {
        self.set_online();
    }

    fn report_offline(&self) {
        self.set_offline();
    }
}

/// Scoped interest in connectivity. Dropping it unsubscribes.
#[derive(Debug)]
pub struct ConnectivitySubscription {
    receiver: watch::Receiver<Connectivity>,
    monitor: Arc<MonitorInner>,
}

impl ConnectivitySubscription {
    #[must_use]
    pub fn current(&self) -> Connectivity {
        *self.receiver.borrow()
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.current() == Connectivity::Online
    }

    /// Returns the new state if it changed since the last call.
    pub fn take_change(&mut self) -> Option<Connectivity> {
        match self.receiver.has_changed() {
            Ok(true) => Some(*self.receiver.borrow_and_update()),
            _ => None,
        }
    }

    /// Waits for the next transition.
    pub async fn changed(&mut self) -> Connectivity {
        // The sender lives in `monitor`, so this cannot observe a closed channel.
        let _ = self.receiver.changed().await;
        *self.receiver.borrow_and_update()
    }
}

impl Drop for ConnectivitySubscription {
    fn drop(&mut self) {
        self.monitor.subscribers.fetch_sub(1, Ordering::SeqCst);
    }
}
