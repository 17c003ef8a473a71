//! # Delivery Flows
//!
//! Writer → event files → upload worker → uploader, with a scripted
//! uploader standing in for the intake endpoint.

#[cfg(test)]
mod tests {
    use crate::integration::support::*;
    use bc_02_upload::UploadStatus;
    use shared_types::TrackingConsent;
    use std::time::Duration;
    use tempfile::TempDir;

    // =========================================================================
    // FIFO
    // =========================================================================

    #[tokio::test]
    async fn test_events_delivered_in_write_order_across_files() {
        let root = TempDir::new().unwrap();
        let harness = Harness::new(
            root.path(),
            TrackingConsent::Granted,
            test_config().with_max_objects_in_file(3),
        );
        let events = numbered("event", 10);
        for event in &events {
            harness.write(event.clone());
        }
        harness.storage.flush().await;
        harness.age_files();

        let uploader = ScriptedUploader::accepting();
        let mut worker = harness.worker(uploader.clone(), &manual_upload_config());
        let report = worker.run_cycle().await;

        assert_eq!(report.completed, 4);
        assert_eq!(uploader.calls(), 4);
        assert_eq!(uploader.payloads(), events);
        assert!(harness.authorized_payloads().is_empty());
    }

    #[tokio::test]
    async fn test_young_data_waits_until_readable() {
        let root = TempDir::new().unwrap();
        let harness = Harness::new(root.path(), TrackingConsent::Granted, test_config());
        harness.write(b"fresh".to_vec());
        harness.storage.flush().await;

        let uploader = ScriptedUploader::accepting();
        let mut worker = harness.worker(uploader.clone(), &manual_upload_config());

        assert_eq!(worker.run_cycle().await.completed, 0);
        assert_eq!(uploader.calls(), 0);

        harness.age_files();
        assert_eq!(worker.run_cycle().await.completed, 1);
        assert_eq!(uploader.payloads(), vec![b"fresh".to_vec()]);
    }

    // =========================================================================
    // Failure handling
    // =========================================================================

    #[tokio::test]
    async fn test_retryable_failures_keep_data_until_delivered() {
        let root = TempDir::new().unwrap();
        let harness = Harness::new(root.path(), TrackingConsent::Granted, test_config());
        harness.write(b"important".to_vec());
        harness.storage.flush().await;
        harness.age_files();

        let uploader = ScriptedUploader::with_script([
            UploadStatus::ServerError { code: 500 },
            UploadStatus::NetworkError {
                message: "connection reset".into(),
            },
            UploadStatus::Unknown { code: None },
        ]);
        let config = manual_upload_config().with_delays(
            Duration::from_secs(5),
            Duration::from_secs(1),
            Duration::from_secs(6),
        );
        let mut worker = harness.worker(uploader.clone(), &config);

        for _ in 0..3 {
            let report = worker.run_cycle().await;
            assert!(report.backed_off);
            assert_eq!(harness.authorized_payloads(), vec![b"important".to_vec()]);
            assert!(worker.current_delay() <= Duration::from_secs(6));
        }
        assert_eq!(worker.current_delay(), Duration::from_secs(6));

        assert_eq!(worker.run_cycle().await.completed, 1);
        assert_eq!(worker.current_delay(), Duration::from_secs(1));
        assert!(harness.authorized_payloads().is_empty());
        assert_eq!(uploader.calls(), 4);
    }

    #[tokio::test]
    async fn test_rejected_batch_is_dropped_and_next_one_sent() {
        let root = TempDir::new().unwrap();
        let harness = Harness::new(
            root.path(),
            TrackingConsent::Granted,
            test_config().with_max_objects_in_file(1),
        );
        harness.write(b"malformed".to_vec());
        harness.write(b"valid".to_vec());
        harness.storage.flush().await;
        harness.age_files();

        let uploader = ScriptedUploader::with_script([UploadStatus::ClientError { code: 400 }]);
        let mut worker = harness.worker(uploader.clone(), &manual_upload_config());

        assert_eq!(worker.run_cycle().await.completed, 2);
        assert_eq!(uploader.payloads(), vec![b"malformed".to_vec(), b"valid".to_vec()]);
        assert!(harness.authorized_payloads().is_empty());
    }

    // =========================================================================
    // Flush
    // =========================================================================

    #[tokio::test]
    async fn test_flush_all_sends_current_file() {
        let root = TempDir::new().unwrap();
        let harness = Harness::new(root.path(), TrackingConsent::Granted, test_config());
        harness.write(b"a".to_vec());
        harness.write(b"b".to_vec());
        harness.storage.flush().await;

        let uploader = ScriptedUploader::accepting();
        let mut worker = harness.worker(uploader.clone(), &manual_upload_config());

        assert_eq!(worker.flush_all().await, 1);
        assert_eq!(uploader.payloads(), vec![b"a".to_vec(), b"b".to_vec()]);

        // Writes after a flush land in a new file.
        harness.write(b"c".to_vec());
        harness.storage.flush().await;
        assert_eq!(harness.authorized_payloads(), vec![b"c".to_vec()]);
    }
}
