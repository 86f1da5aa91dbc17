//! Cancellation handle passed to every provider, resource and data source call
//!
//! The gRPC service keeps one root context and hands clones to each request.
//! `StopProvider` cancels the root, which every clone and every context
//! derived with `with_timeout` observes.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time;

#[derive(Clone)]
pub struct Context {
    stop: Arc<watch::Sender<bool>>,
    deadline: Option<Instant>,
}

impl Context {
    pub fn new() -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            stop: Arc::new(stop),
            deadline: None,
        }
    }

    /// Same stop signal, with a deadline no later than the current one
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            stop: self.stop.clone(),
            deadline: Some(self.deadline.map_or(deadline, |d| d.min(deadline))),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.stop.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.stop.borrow() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves once the context is cancelled or its deadline passes
    pub async fn cancelled(&self) {
        let mut stop = self.stop.subscribe();
        let stopped = async move {
            // The sender lives as long as `self`, so this only returns on cancel
            let _ = stop.wait_for(|stopped| *stopped).await;
        };

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = stopped => {}
                    _ = time::sleep_until(deadline.into()) => {}
                }
            }
            None => stopped.await,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[tokio::test]
    async fn cancel_reaches_clones() {
        let ctx = Context::new();
        let request = ctx.clone();
        assert!(!request.is_cancelled());

        ctx.cancel();
        assert!(request.is_cancelled());
    }

    #[tokio::test]
    async fn timeout_expires() {
        let ctx = Context::new().with_timeout(Duration::from_millis(50));
        assert!(!ctx.is_cancelled());

        tokio::time::timeout(Duration::from_secs(1), ctx.cancelled())
            .await
            .unwrap();
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn derived_context_sees_root_cancel() {
        let root = Context::new();
        let derived = root.with_timeout(Duration::from_secs(60));
        let handle = tokio::spawn(async move { derived.cancelled().await });

        root.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn cancel_wakes_waiter() {
        let ctx = Context::new();
        let mut waiter = task::spawn(ctx.cancelled());
        assert_pending!(waiter.poll());

        ctx.cancel();
        assert!(waiter.is_woken());
        assert_ready!(waiter.poll());
    }

    #[test]
    fn timeout_never_extends_deadline() {
        let short = Context::new().with_timeout(Duration::from_secs(1));
        let longer = short.with_timeout(Duration::from_secs(600));
        assert_eq!(longer.deadline(), short.deadline());
        assert!(Context::new().deadline().is_none());
    }
}
