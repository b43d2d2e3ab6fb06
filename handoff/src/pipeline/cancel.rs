//! Cooperative cancellation for consumer workers.
//!
//! The interruptor flips a token; the worker checks it only at checkpoints
//! outside the shared cell's critical section. A request that lands while a
//! worker is draining has no effect until the next checkpoint.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct TokenInner {
    cancelled: AtomicBool,
    requests: AtomicUsize,
    lock: Mutex<()>,
    wakeup: Condvar,
}

/// A cancellation token shared between a worker and whoever may cancel it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Fire-and-forget; repeated requests are counted.
    pub fn cancel(&self) {
        self.inner.requests.fetch_add(1, Ordering::Relaxed);
        self.inner.cancelled.store(true, Ordering::Release);
        // Taking the lock orders the store before a sleeper re-checks the flag.
        let _guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.wakeup.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Number of cancellation requests delivered so far.
    pub fn requests(&self) -> usize {
        self.inner.requests.load(Ordering::Relaxed)
    }

    /// Sleep for up to `duration`, waking early if cancelled.
    ///
    /// Returns `true` when the token is cancelled on return.
    pub fn sleep(&self, duration: Duration) -> bool {
        let guard = self.inner.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (_guard, _timeout) = self
            .inner
            .wakeup
            .wait_timeout_while(guard, duration, |_| !self.is_cancelled())
            .unwrap_or_else(PoisonError::into_inner);
        self.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_token_starts_uncancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert_eq!(token.requests(), 0);
    }

    #[test]
    fn test_cloned_token_shares_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        clone.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.requests(), 2);
    }

    #[test]
    fn test_sleep_runs_to_completion_without_cancel() {
        let token = CancelToken::new();
        let start = Instant::now();
        assert!(!token.sleep(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_sleep_wakes_early_on_cancel() {
        let token = CancelToken::new();
        let canceller = {
            let token = token.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                token.cancel();
            })
        };

        let start = Instant::now();
        assert!(token.sleep(Duration::from_secs(30)));
        assert!(start.elapsed() < Duration::from_secs(30));
        canceller.join().unwrap();
    }

    #[test]
    fn test_sleep_on_cancelled_token_returns_immediately() {
        let token = CancelToken::new();
        token.cancel();
        let start = Instant::now();
        assert!(token.sleep(Duration::from_secs(30)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
