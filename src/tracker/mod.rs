//! Transaction confirmation tracking.

pub mod classify;
pub mod confirmation;
pub mod observer;
pub mod scheduler;
pub mod types;

pub use confirmation::ConfirmationTracker;
pub use observer::{ChannelObserver, StatusLog, StatusObserver, StatusUpdate};
pub use types::{ActionKind, ActionStatus, ConfirmationOutcome, FailureReason, PendingAction};
