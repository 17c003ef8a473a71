//! # Beacon Test Suite
//!
//! Unified test crate for flows that cross crate boundaries.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── support.rs      # Shared fixtures: scripted uploader, storage builders
//!     ├── delivery.rs     # Writer → files → worker → uploader
//!     ├── consent.rs      # Routing and pending-data migration
//!     ├── rotation.rs     # File rotation, purge and obsolescence
//!     ├── concurrency.rs  # Concurrent producers against a live reader
//!     └── data_store.rs   # Versioned key/value persistence
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p bc-tests
//! cargo test -p bc-tests integration::consent::
//! ```

#![allow(dead_code)]

pub mod integration;
