//! # Rotation and Cleanup
//!
//! File limits as seen through the full write path.

#[cfg(test)]
mod tests {
    use crate::integration::support::*;
    use shared_types::TrackingConsent;
    use std::time::Duration;
    use tempfile::TempDir;

    fn file_count(harness: &Harness) -> usize {
        harness.storage.authorized_directory().files().unwrap().len()
    }

    #[test]
    fn test_rotation_on_object_count() {
        let root = TempDir::new().unwrap();
        let harness = Harness::new(
            root.path(),
            TrackingConsent::Granted,
            test_config().with_max_objects_in_file(3),
        );

        for payload in numbered("e", 7) {
            harness.write(payload);
        }
        harness.storage.flush_blocking();

        assert_eq!(file_count(&harness), 3);
        assert_eq!(harness.authorized_payloads(), numbered("e", 7));
    }

    #[test]
    fn test_rotation_on_file_age() {
        let root = TempDir::new().unwrap();
        let harness = Harness::new(root.path(), TrackingConsent::Granted, test_config());

        harness.write(b"first".to_vec());
        harness.storage.flush_blocking();
        harness.clock.advance(Duration::from_millis(1_001));
        harness.write(b"second".to_vec());
        harness.storage.flush_blocking();

        assert_eq!(file_count(&harness), 2);
    }

    #[test]
    fn test_rotation_on_file_size() {
        let root = TempDir::new().unwrap();
        let harness = Harness::new(
            root.path(),
            TrackingConsent::Granted,
            test_config().with_max_file_size(64).with_max_object_size(64),
        );

        // 6-byte header + 21-byte payload per event: two fit in 64 bytes.
        for payload in numbered("twenty-byte-payl", 5) {
            assert_eq!(payload.len(), 21);
            harness.write(payload);
        }
        harness.storage.flush_blocking();

        let files = harness.storage.authorized_directory().files().unwrap();
        assert_eq!(files.len(), 3);
        assert!(files.iter().all(|file| file.size().unwrap() <= 64));
    }

    #[test]
    fn test_oversized_event_dropped_without_file() {
        let root = TempDir::new().unwrap();
        let harness = Harness::new(
            root.path(),
            TrackingConsent::Granted,
            test_config().with_max_object_size(16),
        );

        harness.write(vec![0u8; 64]);
        harness.storage.flush_blocking();

        assert_eq!(file_count(&harness), 0);
    }

    #[test]
    fn test_directory_purged_oldest_first() {
        let root = TempDir::new().unwrap();
        let harness = Harness::new(
            root.path(),
            TrackingConsent::Granted,
            test_config()
                .with_max_objects_in_file(1)
                .with_max_directory_size(100)
                .with_max_file_size(100)
                .with_max_object_size(100),
        );

        // 6 + 40 bytes per file: the third file would exceed 100 bytes.
        for i in 0..4u8 {
            harness.write(vec![b'a' + i; 40]);
        }
        harness.storage.flush_blocking();

        let remaining = harness.authorized_payloads();
        assert!(remaining.len() < 4);
        assert_eq!(remaining.last(), Some(&vec![b'd'; 40]));
        assert!(!remaining.contains(&vec![b'a'; 40]));
    }

    #[test]
    fn test_obsolete_files_never_uploaded() {
        let root = TempDir::new().unwrap();
        let harness = Harness::new(
            root.path(),
            TrackingConsent::Granted,
            test_config().with_max_file_age_for_read(Duration::from_secs(60)),
        );

        harness.write(b"ancient".to_vec());
        harness.storage.flush_blocking();
        harness.clock.advance(Duration::from_secs(61));

        assert!(harness.storage.reader().next_batch().is_none());
        assert_eq!(file_count(&harness), 0);
    }
}
