pub mod abi;
pub mod config;
pub mod errors;
pub mod validation;

pub use abi::{ContractAbi, EventFilter, LogEvent, MotivationEvent};
pub use config::{DappConfig, NetworkConfig, TrackerConfig};
pub use errors::{DappError, TrackerError};
