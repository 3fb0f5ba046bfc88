//! HTTP response status classification.
use std::fmt;

/// Represents the kind of status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatusKind {
    /// 2xx responses.
    Success,
    /// 1xx and 3xx responses that were not followed any further.
    Other,
    /// 4xx responses.
    ClientError,
    /// 5xx responses.
    ServerError,
}

/// The status of a response received from the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Status {
    kind: StatusKind,
    code: u16,
}

impl Status {
    /// Creates a status from a raw HTTP status code.
    pub fn from_code(code: u16) -> Self {
        let kind = match code {
            200..=299 => StatusKind::Success,
            400..=499 => StatusKind::ClientError,
            500..=599 => StatusKind::ServerError,
            _ => StatusKind::Other,
        };
        Self { kind, code }
    }

    /// Returns the kind of the status.
    pub fn kind(&self) -> StatusKind {
        self.kind
    }

    /// Returns the code of the status.
    pub fn code(&self) -> u16 {
        self.code
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "Success"),
            Self::Other => write!(f, "Other"),
            Self::ClientError => write!(f, "Client Error"),
            Self::ServerError => write!(f, "Server Error"),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.code)
    }
}

impl From<http::StatusCode> for Status {
    fn from(status: http::StatusCode) -> Self {
        Status::from_code(status.as_u16())
    }
}

/// Decides which response statuses count as a successful request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SuccessPolicy {
    /// Any status below 500 is a success.
    #[default]
    Lenient,
    /// Any status below 400 is a success.
    Strict,
}

impl SuccessPolicy {
    /// Returns true if a response with this status is a success under the policy.
    pub fn is_success(&self, status: Status) -> bool {
        match self {
            Self::Lenient => status.code() < 500,
            Self::Strict => status.code() < 400,
        }
    }
}
