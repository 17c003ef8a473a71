//! # Consent Provider
//!
//! Holds the live consent and notifies subscribers of every transition.

use parking_lot::RwLock;
use shared_types::TrackingConsent;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Callback invoked with `(previous, new)` on each consent transition.
///
/// Observers run under the provider's write lock and MUST NOT call back
/// into the provider. They are expected to do constant-time work, such as
/// enqueueing a task.
pub type ConsentObserver = dyn Fn(TrackingConsent, TrackingConsent) + Send + Sync;

struct ConsentState {
    consent: TrackingConsent,
    observers: BTreeMap<u64, Arc<ConsentObserver>>,
    next_id: u64,
}

/// Injectable holder of the current tracking consent.
pub struct ConsentProvider {
    state: RwLock<ConsentState>,
}

impl ConsentProvider {
    /// Create a provider with the given initial consent.
    pub fn new(initial: TrackingConsent) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(ConsentState {
                consent: initial,
                observers: BTreeMap::new(),
                next_id: 0,
            }),
        })
    }

    /// The consent in effect right now.
    pub fn current(&self) -> TrackingConsent {
        self.state.read().consent
    }

    /// Run `f` with the current consent while holding the read lock.
    ///
    /// No transition (and no observer) can run until `f` returns, which lets
    /// a writer read the consent and enqueue its work as one step.
    pub fn with_consent<R>(&self, f: impl FnOnce(TrackingConsent) -> R) -> R {
        let state = self.state.read();
        f(state.consent)
    }

    /// Change the consent and notify observers synchronously.
    ///
    /// Returns `false` (and notifies nobody) if `new` equals the current value.
    pub fn change_consent(&self, new: TrackingConsent) -> bool {
        let mut state = self.state.write();
        let previous = state.consent;
        if previous == new {
            return false;
        }
        state.consent = new;

        info!(from = %previous, to = %new, "Tracking consent changed");
        for observer in state.observers.values() {
            observer(previous, new);
        }
        true
    }

    /// Register an observer. It stays registered until the returned
    /// subscription is dropped.
    pub fn subscribe(
        self: &Arc<Self>,
        observer: impl Fn(TrackingConsent, TrackingConsent) + Send + Sync + 'static,
    ) -> ConsentSubscription {
        let mut state = self.state.write();
        let id = state.next_id;
        state.next_id += 1;
        state.observers.insert(id, Arc::new(observer));
        debug!(subscription = id, "Consent observer registered");

        ConsentSubscription {
            id,
            provider: Arc::downgrade(self),
        }
    }

    /// Number of live observers.
    pub fn observer_count(&self) -> usize {
        self.state.read().observers.len()
    }
}

impl std::fmt::Debug for ConsentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("ConsentProvider")
            .field("consent", &state.consent)
            .field("observers", &state.observers.len())
            .finish()
    }
}

/// Handle for a registered observer.
///
/// When dropped, the observer is removed from the provider.
pub struct ConsentSubscription {
    id: u64,
    provider: Weak<ConsentProvider>,
}

impl Drop for ConsentSubscription {
    fn drop(&mut self) {
        let Some(provider) = self.provider.upgrade() else {
            return;
        };
        provider.state.write().observers.remove(&self.id);
        debug!(subscription = self.id, "Consent observer dropped");
    }
}
