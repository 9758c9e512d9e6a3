use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::tracker::types::{ActionKind, ActionStatus};

/// Receives every status transition synchronously, in order, as it happens.
pub trait StatusObserver: Send + Sync {
    fn on_status(&self, kind: ActionKind, status: &ActionStatus);
}

impl<F> StatusObserver for F
where
    F: Fn(ActionKind, &ActionStatus) + Send + Sync,
{
    fn on_status(&self, kind: ActionKind, status: &ActionStatus) {
        self(kind, status)
    }
}

/// A transition as delivered through [`ChannelObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub kind: ActionKind,
    pub status: ActionStatus,
}

/// Forwards transitions to an unbounded channel, one message per transition.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<StatusUpdate>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StatusObserver for ChannelObserver {
    fn on_status(&self, kind: ActionKind, status: &ActionStatus) {
        // receiver gone means nobody is rendering anymore
        let _ = self.tx.send(StatusUpdate { kind, status: status.clone() });
    }
}

/// Keeps every transition in memory.
#[derive(Default)]
pub struct StatusLog {
    entries: Mutex<Vec<ActionStatus>>,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ActionStatus> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl StatusObserver for StatusLog {
    fn on_status(&self, _kind: ActionKind, status: &ActionStatus) {
        self.entries.lock().push(status.clone());
    }
}
