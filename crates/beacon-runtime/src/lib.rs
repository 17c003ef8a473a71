//! # Beacon Runtime Library
//!
//! Wiring for the `beacon-agent` binary, exposed for embedding and tests.
//!
//! - `config` - [`RuntimeConfig`] loaded from `BEACON_*` environment variables
//! - `pipeline` - [`FeaturePipeline`]: storage, consent and upload for one feature

pub mod config;
pub mod pipeline;

pub use config::{RuntimeConfig, RuntimeError};
pub use pipeline::FeaturePipeline;
