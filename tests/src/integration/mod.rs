//! Cross-crate integration tests.

pub mod support;

mod concurrency;
mod consent;
mod data_store;
mod delivery;
mod rotation;
