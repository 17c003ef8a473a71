//! # Shared Bus - Consent State Holder
//!
//! The single, injectable owner of the current [`TrackingConsent`].
//!
//! ```text
//! ┌──────────────┐  change_consent()  ┌──────────────────┐
//! │ Host app     │ ─────────────────→ │ ConsentProvider  │
//! └──────────────┘                    │  (current value) │
//!                                     └────────┬─────────┘
//!                         subscribe() observers │ (old, new)
//!                                              ▼
//!                                 ┌─────────────────────────┐
//!                                 │ ConsentAwareDataWriter  │
//!                                 └─────────────────────────┘
//! ```
//!
//! Every writer holds an `Arc<ConsentProvider>` rather than a copy of the
//! consent, so a change is visible to all of them without re-wiring.
//!
//! ## Ordering
//!
//! Observers run on the thread that calls
//! [`ConsentProvider::change_consent`], while the provider's write lock is
//! held. Readers using [`ConsentProvider::with_consent`] therefore either act
//! entirely before a change (and before its observers) or entirely after it.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod consent;

pub use consent::{ConsentObserver, ConsentProvider, ConsentSubscription};
