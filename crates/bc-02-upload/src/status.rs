//! # Upload Status
//!
//! Classification of one upload attempt, derived from the HTTP status code
//! or the transport failure.
//!
//! | Outcome | Source | Batch |
//! |---------|--------|-------|
//! | `Success` | 2xx | deleted |
//! | `Redirection` | 3xx | deleted (never followed) |
//! | `ClientError` | 4xx | deleted (retrying cannot help) |
//! | `ServerError` | 5xx | kept, backoff |
//! | `NetworkError` | no response | kept, backoff |
//! | `Unknown` | anything else | kept, backoff |

use bc_01_persistence::BatchOutcome;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Success { code: u16 },
    Redirection { code: u16 },
    ClientError { code: u16 },
    ServerError { code: u16 },
    NetworkError { message: String },
    Unknown { code: Option<u16> },
}

impl UploadStatus {
    pub fn from_response_code(code: u16) -> Self {
        match code {
            200..=299 => UploadStatus::Success { code },
            300..=399 => UploadStatus::Redirection { code },
            400..=499 => UploadStatus::ClientError { code },
            500..=599 => UploadStatus::ServerError { code },
            _ => UploadStatus::Unknown { code: Some(code) },
        }
    }

    /// Whether the batch should be kept for another attempt.
    pub fn needs_retry(&self) -> bool {
        matches!(
            self,
            UploadStatus::ServerError { .. }
                | UploadStatus::NetworkError { .. }
                | UploadStatus::Unknown { .. }
        )
    }

    /// Whether the batch is done with, delivered or not.
    pub fn is_terminal(&self) -> bool {
        !self.needs_retry()
    }

    /// What the reader should do with the batch.
    pub fn batch_outcome(&self) -> BatchOutcome {
        match self {
            UploadStatus::Success { .. } => BatchOutcome::Delivered,
            UploadStatus::Redirection { .. } | UploadStatus::ClientError { .. } => {
                BatchOutcome::Rejected
            }
            _ => BatchOutcome::Retry,
        }
    }

    /// HTTP status code, if a response was received.
    pub fn code(&self) -> Option<u16> {
        match self {
            UploadStatus::Success { code }
            | UploadStatus::Redirection { code }
            | UploadStatus::ClientError { code }
            | UploadStatus::ServerError { code } => Some(*code),
            UploadStatus::NetworkError { .. } => None,
            UploadStatus::Unknown { code } => *code,
        }
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            UploadStatus::Success { .. } => "success",
            UploadStatus::Redirection { .. } => "redirection",
            UploadStatus::ClientError { .. } => "client_error",
            UploadStatus::ServerError { .. } => "server_error",
            UploadStatus::NetworkError { .. } => "network_error",
            UploadStatus::Unknown { .. } => "unknown",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadStatus::NetworkError { message } => write!(f, "network error: {message}"),
            other => match other.code() {
                Some(code) => write!(f, "{} ({code})", other.label()),
                None => f.write_str(other.label()),
            },
        }
    }
}
