use std::time::Duration;
use thiserror::Error;

/// Failures talking to the simulator.
#[derive(Debug, Error)]
pub enum RemoteApiError {
    #[error("could not connect to {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    #[error("no answer from {endpoint} within {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("could not start io runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("could not encode call to {func}: {message}")]
    Encode { func: String, message: String },

    #[error("could not decode reply to {func}: {message}")]
    Decode { func: String, message: String },

    #[error("{func} failed: {message}")]
    Call { func: String, message: String },

    #[error("{func} returned {detail}")]
    UnexpectedReturn { func: String, detail: String },
}

pub type Result<T> = std::result::Result<T, RemoteApiError>;
