#![allow(clippy::needless_return)]
#![allow(clippy::len_zero)]
// src/lib.rs

pub mod actions;
pub mod blockchain;
pub mod cli;
pub mod core;
pub mod session;
pub mod tracker;
pub mod utils;

pub use crate::core::errors::{DappError, TrackerError};
pub use crate::session::{Session, SessionManager};
pub use crate::tracker::{ConfirmationOutcome, ConfirmationTracker};
