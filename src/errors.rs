//! Errors surfaced by the attendance client. None of them are fatal: the
//! controller turns each into a notification and leaves the session as it was.

use thiserror::Error;

use crate::attendance::{AttendanceAction, AttendanceStatus};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttendanceError {
    /// No response was received.
    #[error("network error: {0}")]
    Transport(String),

    /// Non-2xx response. `message` is the server's text when it sent one.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("{action} is not permitted while {status}")]
    NotPermitted {
        action: AttendanceAction,
        status: AttendanceStatus,
    },

    #[error("a checkout is already pending")]
    CheckoutPending,

    #[error("no bearer token configured; run `hr-attendance token set <TOKEN>`")]
    MissingCredential,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("attendance controller has been shut down")]
    ShutDown,
}

impl From<reqwest::Error> for AttendanceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AttendanceError::Malformed(err.to_string())
        } else {
            AttendanceError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AttendanceError {
    fn from(err: serde_json::Error) -> Self {
        AttendanceError::Malformed(err.to_string())
    }
}

pub type AttendanceResult<T> = Result<T, AttendanceError>;
