//! One-shot teardown latch.
//!
//! Any number of tasks may race to close a link (reader EOF, liveness
//! timer, explicit close, failed send). Exactly one wins [`Teardown::trigger`]
//! and performs the release; everyone else, and every task waiting on
//! [`Teardown::cancelled`], observes the latch as fired.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

#[derive(Debug)]
pub struct Teardown {
    fired: AtomicBool,
    signal: watch::Sender<bool>,
}

impl Default for Teardown {
    fn default() -> Self {
        Self::new()
    }
}

impl Teardown {
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            fired: AtomicBool::new(false),
            signal,
        }
    }

    /// Fires the latch. Returns `true` for the single caller that fired it.
    pub fn trigger(&self) -> bool {
        let first = self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.signal.send_replace(true);
        }
        first
    }

    pub fn is_triggered(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Completes once the latch has fired, immediately if it already has.
    pub async fn cancelled(&self) {
        let mut rx = self.signal.subscribe();
        // The sender lives as long as `self`, so `wait_for` only errors if
        // the latch is being dropped, which also means "gone".
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn test_trigger_fires_once() {
        let latch = Teardown::new();
        assert!(!latch.is_triggered());
        assert!(latch.trigger());
        assert!(!latch.trigger());
        assert!(latch.is_triggered());
    }

    #[tokio::test]
    async fn test_cancelled_after_fire_returns_immediately() {
        let latch = Teardown::new();
        latch.trigger();
        latch.cancelled().await;
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiters() {
        let latch = Arc::new(Teardown::new());
        let waiter = {
            let latch = Arc::clone(&latch);
            tokio::spawn(async move { latch.cancelled().await })
        };
        tokio::task::yield_now().await;
        latch.trigger();
        waiter.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_triggers_have_one_winner() {
        let latch = Arc::new(Teardown::new());
        let winners = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let latch = Arc::clone(&latch);
                let winners = Arc::clone(&winners);
                tokio::spawn(async move {
                    if latch.trigger() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
