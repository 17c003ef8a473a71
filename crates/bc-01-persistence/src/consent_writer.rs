//! # Consent-Aware Writer
//!
//! Routes each event by the consent in effect when `write` is called:
//!
//! | Consent | Destination |
//! |---------|-------------|
//! | `granted` | authorized bucket (uploaded) |
//! | `pending` | pending bucket (held until a decision) |
//! | `not_granted` | dropped |
//!
//! Consent transitions become control tasks on the same read/write queue,
//! so they apply after every write submitted before the transition and
//! before every write submitted after it:
//!
//! | Transition | Migration |
//! |------------|-----------|
//! | `pending → granted` | move pending files into the authorized bucket |
//! | `* → not_granted` | delete pending files |
//! | anything else | none |
//!
//! On creation, pending files left by a previous process are deleted: they
//! cannot be attributed to the current consent decision.

use crate::directory::Directory;
use crate::queue::ReadWriteQueue;
use crate::writer::{FileWriter, Writer};
use beacon_telemetry::EVENTS_DROPPED;
use shared_bus::{ConsentProvider, ConsentSubscription};
use shared_types::{Event, TrackingConsent};
use std::sync::{Arc, Weak};

struct Inner {
    feature: String,
    queue: Arc<ReadWriteQueue>,
    authorized: FileWriter,
    pending: FileWriter,
    consent: Arc<ConsentProvider>,
}

pub struct ConsentAwareDataWriter {
    inner: Arc<Inner>,
    _subscription: ConsentSubscription,
}

impl ConsentAwareDataWriter {
    pub fn new(
        feature: impl Into<String>,
        queue: Arc<ReadWriteQueue>,
        authorized: FileWriter,
        pending: FileWriter,
        consent: Arc<ConsentProvider>,
    ) -> Self {
        let inner = Arc::new(Inner {
            feature: feature.into(),
            queue,
            authorized,
            pending,
            consent: Arc::clone(&consent),
        });

        inner.enqueue_pending_cleanup("leftover from a previous run");

        let weak: Weak<Inner> = Arc::downgrade(&inner);
        let subscription = consent.subscribe(move |previous, new| {
            if let Some(inner) = weak.upgrade() {
                inner.on_consent_change(previous, new);
            }
        });

        Self {
            inner,
            _subscription: subscription,
        }
    }

    /// Consent currently in effect.
    pub fn consent(&self) -> TrackingConsent {
        self.inner.consent.current()
    }
}

impl Writer for ConsentAwareDataWriter {
    fn write(&self, event: Event) {
        let inner = &self.inner;
        // The read lock keeps transitions out until the task is enqueued.
        inner.consent.with_consent(|consent| {
            let writer = match consent {
                TrackingConsent::Granted => inner.authorized.clone(),
                TrackingConsent::Pending => inner.pending.clone(),
                TrackingConsent::NotGranted => {
                    EVENTS_DROPPED
                        .with_label_values(&[inner.feature.as_str(), "consent"])
                        .inc();
                    tracing::trace!(feature = %inner.feature, "Consent not granted, event dropped");
                    return;
                }
            };
            inner.queue.dispatch_write(move || writer.write(event));
        });
    }
}

impl Inner {
    fn on_consent_change(&self, previous: TrackingConsent, new: TrackingConsent) {
        match (previous, new) {
            (TrackingConsent::Pending, TrackingConsent::Granted) => self.enqueue_pending_promotion(),
            (_, TrackingConsent::NotGranted) => self.enqueue_pending_cleanup("consent not granted"),
            _ => {}
        }
    }

    fn enqueue_pending_promotion(&self) {
        let feature = self.feature.clone();
        let pending = self.pending.orchestrator().clone();
        let authorized = self.authorized.orchestrator().clone();

        self.queue.dispatch_control(move || {
            let from: Directory = {
                let mut orchestrator = pending.lock();
                orchestrator.reset();
                orchestrator.directory().clone()
            };
            let to: Directory = {
                let mut orchestrator = authorized.lock();
                orchestrator.reset();
                orchestrator.directory().clone()
            };

            match from.move_all_files(&to) {
                Ok(moved) => {
                    tracing::info!(feature = %feature, files = moved, "Moved pending data to authorized");
                }
                Err(e) => {
                    tracing::error!(feature = %feature, error = %e, "Failed to move pending data");
                }
            }
        });
    }

    fn enqueue_pending_cleanup(&self, why: &'static str) {
        let feature = self.feature.clone();
        let pending = self.pending.orchestrator().clone();

        self.queue.dispatch_control(move || {
            let directory = {
                let mut orchestrator = pending.lock();
                orchestrator.reset();
                orchestrator.directory().clone()
            };

            match directory.delete_all_files() {
                Ok(0) => {}
                Ok(deleted) => {
                    tracing::info!(feature = %feature, files = deleted, reason = why, "Deleted pending data");
                }
                Err(e) => {
                    tracing::error!(feature = %feature, error = %e, "Failed to delete pending data");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_events;
    use crate::config::StorageConfig;
    use crate::orchestrator::FilesOrchestrator;
    use crate::writer::Bucket;
    use shared_types::SystemTimeSource;
    use tempfile::TempDir;

    struct Fixture {
        _root: TempDir,
        authorized: Directory,
        pending: Directory,
        queue: Arc<ReadWriteQueue>,
        consent: Arc<ConsentProvider>,
        writer: ConsentAwareDataWriter,
    }

    fn fixture(initial: TrackingConsent) -> Fixture {
        let root = TempDir::new().unwrap();
        let authorized = Directory::new(root.path().join("authorized"));
        let pending = Directory::new(root.path().join("pending"));
        fixture_in(root, authorized, pending, initial)
    }

    fn fixture_in(
        root: TempDir,
        authorized: Directory,
        pending: Directory,
        initial: TrackingConsent,
    ) -> Fixture {
        let orchestrator = |dir: &Directory| {
            FilesOrchestrator::new(
                "test",
                dir.clone(),
                StorageConfig::default(),
                Arc::new(SystemTimeSource),
            )
            .shared()
        };
        let queue = Arc::new(ReadWriteQueue::new("test", 100).unwrap());
        let consent = ConsentProvider::new(initial);
        let writer = ConsentAwareDataWriter::new(
            "test",
            Arc::clone(&queue),
            FileWriter::new("test", Bucket::Authorized, orchestrator(&authorized)),
            FileWriter::new("test", Bucket::Pending, orchestrator(&pending)),
            Arc::clone(&consent),
        );
        Fixture {
            _root: root,
            authorized,
            pending,
            queue,
            consent,
            writer,
        }
    }

    fn events_in(directory: &Directory) -> Vec<Vec<u8>> {
        directory
            .files()
            .unwrap()
            .iter()
            .flat_map(|f| decode_events(f.reader().unwrap(), 1 << 20).events)
            .map(|e| e.data)
            .collect()
    }

    #[test]
    fn test_routes_by_consent_at_write_time() {
        let f = fixture(TrackingConsent::Granted);
        f.writer.write(Event::new(b"granted".to_vec()));

        f.consent.change_consent(TrackingConsent::NotGranted);
        f.writer.write(Event::new(b"dropped".to_vec()));

        f.consent.change_consent(TrackingConsent::Pending);
        f.writer.write(Event::new(b"pending".to_vec()));
        f.queue.flush_blocking();

        assert_eq!(events_in(&f.authorized), vec![b"granted".to_vec()]);
        assert_eq!(events_in(&f.pending), vec![b"pending".to_vec()]);
    }

    #[test]
    fn test_pending_to_granted_moves_data() {
        let f = fixture(TrackingConsent::Pending);
        f.writer.write(Event::new(b"before".to_vec()));
        f.consent.change_consent(TrackingConsent::Granted);
        f.writer.write(Event::new(b"after".to_vec()));
        f.queue.flush_blocking();

        assert!(events_in(&f.pending).is_empty());
        let mut authorized = events_in(&f.authorized);
        authorized.sort();
        assert_eq!(authorized, vec![b"after".to_vec(), b"before".to_vec()]);
    }

    #[test]
    fn test_pending_to_not_granted_deletes_data() {
        let f = fixture(TrackingConsent::Pending);
        f.writer.write(Event::new(b"secret".to_vec()));
        f.consent.change_consent(TrackingConsent::NotGranted);
        f.queue.flush_blocking();

        assert!(f.pending.files().unwrap().is_empty());
        assert!(f.authorized.files().unwrap().is_empty());
    }

    #[test]
    fn test_granted_to_pending_keeps_authorized_data() {
        let f = fixture(TrackingConsent::Granted);
        f.writer.write(Event::new(b"kept".to_vec()));
        f.consent.change_consent(TrackingConsent::Pending);
        f.queue.flush_blocking();

        assert_eq!(events_in(&f.authorized), vec![b"kept".to_vec()]);
    }

    #[test]
    fn test_leftover_pending_data_deleted_on_creation() {
        let root = TempDir::new().unwrap();
        let authorized = Directory::new(root.path().join("authorized"));
        let pending = Directory::new(root.path().join("pending"));
        pending.create_file(1).unwrap().append(b"stale").unwrap();

        let f = fixture_in(root, authorized, pending, TrackingConsent::Pending);
        f.queue.flush_blocking();

        assert!(f.pending.files().unwrap().is_empty());
    }

    #[test]
    fn test_dropping_writer_unsubscribes() {
        let f = fixture(TrackingConsent::Granted);
        assert_eq!(f.consent.observer_count(), 1);
        drop(f.writer);
        assert_eq!(f.consent.observer_count(), 0);
    }
}
