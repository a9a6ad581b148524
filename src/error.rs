//! Error types for delayq.

use thiserror::Error;

use crate::model::SlotId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid delay: {0}ms (delays must be non-negative)")]
    InvalidDelay(i64),

    #[error("no tokio runtime available to arm slot timers")]
    NoRuntime,

    #[error("slot {0} abandoned before release")]
    Abandoned(SlotId),

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
