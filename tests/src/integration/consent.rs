//! # Consent Flows
//!
//! Routing of writes by tracking consent and the fate of pending data when
//! consent is decided.

#[cfg(test)]
mod tests {
    use crate::integration::support::*;
    use shared_types::TrackingConsent;
    use tempfile::TempDir;

    #[test]
    fn test_writes_routed_by_consent() {
        let root = TempDir::new().unwrap();
        let harness = Harness::new(root.path(), TrackingConsent::Granted, test_config());

        harness.write(b"granted".to_vec());
        harness.consent.change_consent(TrackingConsent::Pending);
        harness.write(b"pending".to_vec());
        harness.storage.flush_blocking();

        assert_eq!(harness.authorized_payloads(), vec![b"granted".to_vec()]);
        assert_eq!(harness.pending_payloads(), vec![b"pending".to_vec()]);
    }

    #[test]
    fn test_not_granted_writes_nothing() {
        let root = TempDir::new().unwrap();
        let harness = Harness::new(root.path(), TrackingConsent::NotGranted, test_config());

        for payload in numbered("dropped", 5) {
            harness.write(payload);
        }
        harness.storage.flush_blocking();

        assert!(harness.authorized_payloads().is_empty());
        assert!(harness.pending_payloads().is_empty());
    }

    #[test]
    fn test_granting_consent_promotes_pending_data_in_order() {
        let root = TempDir::new().unwrap();
        let harness = Harness::new(root.path(), TrackingConsent::Pending, test_config());

        harness.write(b"before".to_vec());
        harness.consent.change_consent(TrackingConsent::Granted);
        harness.write(b"after".to_vec());
        harness.storage.flush_blocking();

        assert!(harness.pending_payloads().is_empty());
        assert_eq!(
            harness.authorized_payloads(),
            vec![b"before".to_vec(), b"after".to_vec()]
        );
    }

    #[test]
    fn test_denying_consent_deletes_pending_data() {
        let root = TempDir::new().unwrap();
        let harness = Harness::new(root.path(), TrackingConsent::Pending, test_config());

        harness.write(b"secret".to_vec());
        harness.consent.change_consent(TrackingConsent::NotGranted);
        harness.write(b"ignored".to_vec());
        harness.storage.flush_blocking();

        assert!(harness.pending_payloads().is_empty());
        assert!(harness.authorized_payloads().is_empty());
    }

    #[test]
    fn test_revoking_granted_consent_keeps_authorized_data() {
        let root = TempDir::new().unwrap();
        let harness = Harness::new(root.path(), TrackingConsent::Granted, test_config());

        harness.write(b"kept".to_vec());
        harness.consent.change_consent(TrackingConsent::NotGranted);
        harness.write(b"dropped".to_vec());
        harness.storage.flush_blocking();

        assert_eq!(harness.authorized_payloads(), vec![b"kept".to_vec()]);
    }

    #[test]
    fn test_pending_data_from_previous_run_is_discarded() {
        let root = TempDir::new().unwrap();
        {
            let harness = Harness::new(root.path(), TrackingConsent::Pending, test_config());
            harness.write(b"stale".to_vec());
            harness.storage.flush_blocking();
            assert_eq!(harness.pending_payloads(), vec![b"stale".to_vec()]);
        }

        let harness = Harness::new(root.path(), TrackingConsent::Pending, test_config());
        harness.storage.flush_blocking();
        assert!(harness.pending_payloads().is_empty());
    }

    #[test]
    fn test_observers_released_with_storage() {
        let root = TempDir::new().unwrap();
        let harness = Harness::new(root.path(), TrackingConsent::Pending, test_config());
        let consent = harness.consent.clone();
        assert_eq!(consent.observer_count(), 1);

        drop(harness);
        assert_eq!(consent.observer_count(), 0);
    }
}
