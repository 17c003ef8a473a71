//! # Tracking Consent
//!
//! The privacy decision that routes every write to a storage bucket.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The user's tracking consent.
///
/// | Consent | Write routing |
/// |---------|---------------|
/// | `Granted` | authorized directory (eligible for upload) |
/// | `Pending` | pending directory (buffered, never uploaded as-is) |
/// | `NotGranted` | dropped |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingConsent {
    /// Data may be collected and uploaded.
    Granted,
    /// Data may be collected but must stay on device until a decision is made.
    Pending,
    /// No data may be collected.
    NotGranted,
}

impl TrackingConsent {
    /// Stable lowercase label, used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingConsent::Granted => "granted",
            TrackingConsent::Pending => "pending",
            TrackingConsent::NotGranted => "not_granted",
        }
    }
}

impl fmt::Display for TrackingConsent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a consent label cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown tracking consent: {0}")]
pub struct ConsentParseError(pub String);

impl FromStr for TrackingConsent {
    type Err = ConsentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "granted" => Ok(TrackingConsent::Granted),
            "pending" => Ok(TrackingConsent::Pending),
            "not_granted" | "notgranted" | "not-granted" => Ok(TrackingConsent::NotGranted),
            other => Err(ConsentParseError(other.to_string())),
        }
    }
}
