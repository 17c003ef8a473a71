//! # Data Store
//!
//! Feature state that survives pipeline restarts.

#[cfg(test)]
mod tests {
    use crate::integration::support::*;
    use beacon_runtime::FeaturePipeline;
    use bc_02_upload::UploadConditions;
    use shared_bus::ConsentProvider;
    use shared_types::{ManualTimeSource, TrackingConsent};
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    const SESSION_V1: u16 = 1;
    const SESSION_V2: u16 = 2;

    fn start(root: &Path) -> FeaturePipeline {
        FeaturePipeline::start(
            root,
            "logs",
            test_config(),
            &manual_upload_config(),
            ScriptedUploader::accepting(),
            UploadConditions::default(),
            ConsentProvider::new(TrackingConsent::Granted),
            Arc::new(ManualTimeSource::new(START_MILLIS)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_value_survives_restart() {
        let root = TempDir::new().unwrap();

        let pipeline = start(root.path());
        pipeline
            .data_store()
            .set_value("last-session", b"session-42", SESSION_V1)
            .unwrap();
        pipeline.shutdown().await;

        let pipeline = start(root.path());
        let stored = pipeline.data_store().value("last-session").unwrap().unwrap();
        assert_eq!(stored.data_for_version(SESSION_V1), Some(&b"session-42"[..]));
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_version_mismatch_is_not_returned_as_data() {
        let root = TempDir::new().unwrap();
        let pipeline = start(root.path());
        let store = pipeline.data_store();

        store.set_value("last-session", b"old-layout", SESSION_V1).unwrap();
        let stored = store.value("last-session").unwrap().unwrap();

        assert_eq!(stored.version, SESSION_V1);
        assert_eq!(stored.data_for_version(SESSION_V2), None);

        store.set_value("last-session", b"new-layout", SESSION_V2).unwrap();
        let stored = store.value("last-session").unwrap().unwrap();
        assert_eq!(stored.data_for_version(SESSION_V2), Some(&b"new-layout"[..]));
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_stores_are_isolated_from_event_files() {
        let root = TempDir::new().unwrap();
        let pipeline = start(root.path());

        pipeline.data_store().set_value("cursor", b"7", SESSION_V1).unwrap();
        pipeline.flush().await;

        assert!(pipeline.storage().authorized_directory().files().unwrap().is_empty());
        assert!(pipeline
            .data_store()
            .directory()
            .starts_with(root.path().join("data-store-v1")));
        pipeline.shutdown().await;
    }
}
