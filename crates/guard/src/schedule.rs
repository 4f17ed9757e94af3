//! Scheduled-task handles with cancel-on-supersede semantics.
//!
//! Timers never touch context state directly. A fired timer posts a message
//! carrying its generation into the owning context's mailbox; the context
//! checks [`TaskSlot::is_current`] before acting, so a superseded timer that
//! slipped past `abort` is ignored.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::trace;

/// One reschedulable timer.
#[derive(Debug, Default)]
pub struct TaskSlot {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl TaskSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `make(generation)` to be posted to `tx` after `delay`,
    /// discarding whatever was scheduled before. Returns the new generation.
    pub fn schedule<M, F>(&mut self, delay: Duration, tx: &UnboundedSender<M>, make: F) -> u64
    where
        M: Send + 'static,
        F: FnOnce(u64) -> M + Send + 'static,
    {
        self.abort_pending();
        self.generation += 1;
        let generation = self.generation;
        let tx = tx.clone();
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trace!(generation, "Scheduled task fired");
            let _ = tx.send(make(generation));
        }));
        generation
    }

    /// Cancel without replacement.
    pub fn cancel(&mut self) {
        self.abort_pending();
        self.generation += 1;
    }

    /// Whether a fired message with `generation` is still the live one.
    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        self.task.is_some() && generation == self.generation
    }

    /// Mark the live task as delivered; later duplicates are stale.
    pub fn complete(&mut self, generation: u64) -> bool {
        if self.is_current(generation) {
            self.task = None;
            true
        } else {
            false
        }
    }

    fn abort_pending(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        self.abort_pending();
    }
}

/// Fixed-delay debounce: every trigger restarts the delay.
#[derive(Debug)]
pub struct Debouncer {
    slot: TaskSlot,
    delay: Duration,
}

impl Debouncer {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            slot: TaskSlot::new(),
            delay,
        }
    }

    pub fn trigger<M, F>(&mut self, tx: &UnboundedSender<M>, make: F) -> u64
    where
        M: Send + 'static,
        F: FnOnce(u64) -> M + Send + 'static,
    {
        self.slot.schedule(self.delay, tx, make)
    }

    /// Accept a fired generation; false when it was superseded.
    pub fn fire(&mut self, generation: u64) -> bool {
        self.slot.complete(generation)
    }

    pub fn cancel(&mut self) {
        self.slot.cancel();
    }
}

/// Bounded observation window that detaches itself after `lifetime`.
#[derive(Debug)]
pub struct ObservationWindow {
    slot: TaskSlot,
    lifetime: Duration,
    armed: bool,
}

impl ObservationWindow {
    #[must_use]
    pub fn new(lifetime: Duration) -> Self {
        Self {
            slot: TaskSlot::new(),
            lifetime,
            armed: false,
        }
    }

    /// Arm (or re-arm) the window; the lifetime restarts from now.
    pub fn arm<M, F>(&mut self, tx: &UnboundedSender<M>, make: F) -> u64
    where
        M: Send + 'static,
        F: FnOnce(u64) -> M + Send + 'static,
    {
        self.armed = true;
        self.slot.schedule(self.lifetime, tx, make)
    }

    /// Handle an expiry message; true when the window actually closed.
    pub fn expire(&mut self, generation: u64) -> bool {
        if self.slot.complete(generation) {
            self.armed = false;
            true
        } else {
            false
        }
    }

    pub fn disarm(&mut self) {
        self.slot.cancel();
        self.armed = false;
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_supersedes_previous() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut slot = TaskSlot::new();

        let first = slot.schedule(Duration::from_millis(800), &tx, |g| g);
        tokio::time::sleep(Duration::from_millis(500)).await;
        let second = slot.schedule(Duration::from_millis(800), &tx, |g| g);

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired, second);
        assert!(!slot.is_current(first));
        assert!(slot.complete(second));
        assert!(!slot.complete(second));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_fires_once_after_quiet_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debouncer = Debouncer::new(Duration::from_millis(260));
        let start = tokio::time::Instant::now();

        for _ in 0..5 {
            debouncer.trigger(&tx, |g| g);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let generation = rx.recv().await.unwrap();
        assert!(debouncer.fire(generation));
        // last trigger at 400ms, so the fire lands at 660ms
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(660) && elapsed < Duration::from_millis(670));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_delivery() {
        let (tx, mut rx) = mpsc::unbounded_channel::<u64>();
        let mut debouncer = Debouncer::new(Duration::from_millis(800));
        debouncer.trigger(&tx, |g| g);
        debouncer.cancel();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_observation_window_expires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut window = ObservationWindow::new(Duration::from_secs(30));

        let first = window.arm(&tx, |g| g);
        tokio::time::sleep(Duration::from_secs(20)).await;
        let second = window.arm(&tx, |g| g);
        assert_ne!(first, second);
        assert!(window.is_armed());

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(window.is_armed());
        assert!(rx.try_recv().is_err());

        let generation = rx.recv().await.unwrap();
        assert!(window.expire(generation));
        assert!(!window.is_armed());
    }
}
