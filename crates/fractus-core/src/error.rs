//! Error types for the viewer core.

use thiserror::Error;

use crate::timeline::FenceFamily;

/// Core error type.
#[derive(Error, Debug, PartialEq)]
pub enum Error {
    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// View config file that is not valid TOML or has unknown values
    #[error("Failed to parse view config: {0}")]
    ConfigParse(String),

    /// Slot index outside the configured ring
    #[error("Slot {slot} out of range (slot count {count})")]
    SlotOutOfRange { slot: usize, count: usize },

    /// A fence value would not advance the counter
    #[error("Fence {family:?}[{slot}] regressed: last {last}, requested {requested}")]
    FenceRegression {
        family: FenceFamily,
        slot: usize,
        last: u64,
        requested: u64,
    },

    /// A frame plan left an image in the wrong state
    #[error("Invalid transition on {0}")]
    InvalidTransition(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
