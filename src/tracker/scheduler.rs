//! Cancellable fixed-interval polling.
//!
//! A [`PollHandle`] owns the spawned task. Cancelling the handle, or dropping it,
//! stops the task before its next tick; a task that returns
//! [`ControlFlow::Break`] stops itself and hands its result back through the handle.

use async_trait::async_trait;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Work performed on every tick. `attempt` starts at 1.
#[async_trait]
pub trait PollTask: Send + 'static {
    type Output: Send + 'static;

    async fn tick(&mut self, attempt: u32) -> ControlFlow<Self::Output>;
}

pub struct PollHandle<T> {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    result: Option<oneshot::Receiver<T>>,
}

impl<T: Send + 'static> PollHandle<T> {
    /// Starts polling; the first tick fires one `interval` from now.
    pub fn spawn<P>(interval: Duration, task: P) -> Self
    where
        P: PollTask<Output = T>,
    {
        let cancel = CancellationToken::new();
        let (tx, rx) = oneshot::channel();
        let join = tokio::spawn(run(interval, task, cancel.clone(), tx));
        Self { cancel, task: Some(join), result: Some(rx) }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once cancelled or finished.
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits for the task's result. `None` when the poller was cancelled.
    pub async fn wait(&mut self) -> Option<T> {
        match self.result.take() {
            Some(rx) => rx.await.ok(),
            None => None,
        }
    }
}

impl<T> Drop for PollHandle<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run<P: PollTask>(
    interval: Duration,
    mut task: P,
    cancel: CancellationToken,
    result: oneshot::Sender<P::Output>,
) {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(attempt, "Poller cancelled");
                return;
            }
            _ = ticker.tick() => {}
        }

        attempt += 1;
        let flow = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(attempt, "Poller cancelled mid-tick");
                return;
            }
            flow = task.tick(attempt) => flow,
        };

        if let ControlFlow::Break(output) = flow {
            cancel.cancel();
            let _ = result.send(output);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;

    struct Counter {
        ticks: Arc<AtomicU32>,
        stop_at: Option<u32>,
    }

    #[async_trait]
    impl PollTask for Counter {
        type Output = u32;

        async fn tick(&mut self, attempt: u32) -> ControlFlow<u32> {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            match self.stop_at {
                Some(n) if attempt >= n => ControlFlow::Break(attempt),
                _ => ControlFlow::Continue(()),
            }
        }
    }

    fn counter(stop_at: Option<u32>) -> (Counter, Arc<AtomicU32>) {
        let ticks = Arc::new(AtomicU32::new(0));
        (Counter { ticks: ticks.clone(), stop_at }, ticks)
    }

    #[tokio::test(start_paused = true)]
    async fn break_stops_ticking() {
        let (task, ticks) = counter(Some(3));
        let start = Instant::now();
        let mut handle = PollHandle::spawn(Duration::from_secs(1), task);

        assert_eq!(handle.wait().await, Some(3));
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert!(handle.is_stopped());

        sleep(Duration::from_secs(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_before_next_tick() {
        let (task, ticks) = counter(None);
        let mut handle = PollHandle::spawn(Duration::from_secs(1), task);

        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);

        handle.cancel();
        sleep(Duration::from_secs(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
        assert_eq!(handle.wait().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels() {
        let (task, ticks) = counter(None);
        let handle = PollHandle::spawn(Duration::from_secs(1), task);
        sleep(Duration::from_millis(1_500)).await;
        drop(handle);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }
}
