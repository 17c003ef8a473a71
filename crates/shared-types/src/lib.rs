//! # Shared Types Crate
//!
//! Types shared by every Beacon subsystem.
//!
//! ## Design Principles
//!
//! - **Opaque payloads**: an [`Event`] is raw bytes produced by instrumentation.
//!   Nothing below the instrumentation layer interprets them.
//! - **Single consent vocabulary**: [`TrackingConsent`] is the only type used
//!   to express the user's privacy decision.
//! - **Injectable time**: file ages and upload delays are computed from a
//!   [`TimeSource`], never from the wall clock directly.

pub mod consent;
pub mod event;
pub mod time;

pub use consent::{ConsentParseError, TrackingConsent};
pub use event::Event;
pub use time::{ManualTimeSource, SystemTimeSource, TimeSource};
