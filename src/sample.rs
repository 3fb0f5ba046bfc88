//! The record of a single request attempt.
use std::fmt;

use tokio::time::Duration;

use crate::status::Status;

/// What happened to a request attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A response was received and its body fully read.
    Response(Status),
    /// The attempt did not complete within the per-request timeout.
    Timeout,
    /// The request failed below the HTTP layer (connect, reset, body error, ...).
    Transport(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Response(status) => write!(f, "{status}"),
            Self::Timeout => write!(f, "request timed out"),
            Self::Transport(msg) => write!(f, "{msg}"),
        }
    }
}

/// One measured request attempt.
///
/// A sample is immutable once recorded by a sampler and is only consumed by
/// the aggregator.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Time from just before the request was sent until the body was drained.
    pub latency: Duration,
    /// Whether the attempt counts as a success.
    pub success: bool,
    /// What happened to the attempt.
    pub outcome: Outcome,
    /// Number of response body bytes read.
    pub bytes: u64,
}

impl Sample {
    /// Creates a sample for a received response.
    pub fn response(latency: Duration, status: Status, success: bool, bytes: u64) -> Self {
        Self { latency, success, outcome: Outcome::Response(status), bytes }
    }

    /// Creates a failed sample for an attempt that timed out.
    pub fn timeout(latency: Duration) -> Self {
        Self { latency, success: false, outcome: Outcome::Timeout, bytes: 0 }
    }

    /// Creates a failed sample for a transport error.
    pub fn transport(latency: Duration, msg: impl Into<String>) -> Self {
        Self { latency, success: false, outcome: Outcome::Transport(msg.into()), bytes: 0 }
    }
}
