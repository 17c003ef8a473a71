//! # Upload Worker
//!
//! Polling loop for one feature.
//!
//! ```text
//!         ┌──────────────── timer fires ────────────────┐
//!         ↓                                             │
//!  CheckingConditions ── no batch ──→ Idle (initial delay)
//!         │ ── gate denies ──→ Idle (delay unchanged)
//!         ↓
//!     Uploading ── success / redirection / client error ──→ delete, min delay,
//!         │                                                 next batch (up to
//!         │                                                 max_batches_per_upload)
//!         └── server / network error, unknown ──→ Backoff (delay grows) ──→ Idle
//! ```
//!
//! A cycle always runs to completion: cancellation is observed between
//! cycles, so an upload is never separated from the deletion of its batch.

use crate::config::UploadConfig;
use crate::conditions::UploadConditions;
use crate::delay::UploadDelay;
use crate::status::UploadStatus;
use crate::uploader::DataUploader;
use bc_01_persistence::{Batch, DataReader, DeletionReason};
use beacon_telemetry::{time_histogram, BATCHES_UPLOADED, UPLOAD_DELAY_SECONDS, UPLOAD_DURATION};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    CheckingConditions,
    Uploading,
    Backoff,
}

/// What one cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReport {
    /// Batches that reached a terminal outcome and were deleted.
    pub completed: usize,
    /// The cycle stopped on a retryable outcome.
    pub backed_off: bool,
    /// The gate refused the upload.
    pub blocked: bool,
}

pub struct DataUploadWorker {
    feature: String,
    reader: DataReader,
    uploader: Arc<dyn DataUploader>,
    conditions: UploadConditions,
    max_batches_per_upload: usize,
    delay: UploadDelay,
    state: watch::Sender<WorkerState>,
}

impl DataUploadWorker {
    pub fn new(
        feature: impl Into<String>,
        reader: DataReader,
        uploader: Arc<dyn DataUploader>,
        conditions: UploadConditions,
        config: &UploadConfig,
    ) -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);
        Self {
            feature: feature.into(),
            reader,
            uploader,
            conditions,
            max_batches_per_upload: config.max_batches_per_upload,
            delay: UploadDelay::new(config),
            state,
        }
    }

    /// Subscribe to state changes.
    pub fn state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Delay before the next cycle.
    pub fn current_delay(&self) -> Duration {
        self.delay.current()
    }

    /// Run one polling cycle.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        for _ in 0..self.max_batches_per_upload {
            self.set_state(WorkerState::CheckingConditions);

            let Some(batch) = self.next_batch().await else {
                if report.completed == 0 {
                    self.delay.reset_to_initial();
                }
                break;
            };

            let blockers = self.conditions.blockers();
            if !blockers.is_empty() {
                let reasons: Vec<String> = blockers.iter().map(ToString::to_string).collect();
                tracing::debug!(
                    feature = %self.feature,
                    blockers = %reasons.join(", "),
                    "Upload conditions not met, skipping"
                );
                report.blocked = true;
                break;
            }

            self.set_state(WorkerState::Uploading);
            let status = self.upload(&batch).await;

            if status.needs_retry() {
                self.set_state(WorkerState::Backoff);
                self.delay.back_off();
                tracing::info!(
                    feature = %self.feature,
                    status = %status,
                    next_delay_ms = self.delay.current().as_millis() as u64,
                    "Upload failed, batch kept for retry"
                );
                report.backed_off = true;
                break;
            }

            self.mark_as_read(batch, &status).await;
            self.delay.reset_to_min();
            report.completed += 1;
        }

        UPLOAD_DELAY_SECONDS
            .with_label_values(&[self.feature.as_str()])
            .set(self.delay.current().as_secs_f64());
        self.set_state(WorkerState::Idle);
        report
    }

    /// Upload every remaining file, ignoring conditions and file age. Each
    /// file is deleted after its attempt whatever the outcome. Returns the
    /// number of batches sent.
    pub async fn flush_all(&mut self) -> usize {
        let reader = self.reader.clone();
        let _ = tokio::task::spawn_blocking(move || reader.begin_flush()).await;

        let mut sent = 0;
        while let Some(batch) = self.next_batch().await {
            self.set_state(WorkerState::Uploading);
            self.upload(&batch).await;
            sent += 1;

            let reader = self.reader.clone();
            let discarded = tokio::task::spawn_blocking(move || {
                reader.discard(&batch, DeletionReason::Flushed)
            })
            .await
            .unwrap_or(false);
            if !discarded {
                tracing::warn!(feature = %self.feature, "Flush stopped: batch could not be deleted");
                break;
            }
        }

        let reader = self.reader.clone();
        let _ = tokio::task::spawn_blocking(move || reader.end_flush()).await;
        self.set_state(WorkerState::Idle);

        tracing::info!(feature = %self.feature, batches = sent, "Flushed remaining data");
        sent
    }

    /// Run the polling loop on a tokio task.
    pub fn spawn(self) -> UploadWorkerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (commands_tx, commands_rx) = mpsc::channel(8);
        let state = self.state();
        let join = tokio::spawn(self.run(shutdown_rx, commands_rx));

        UploadWorkerHandle {
            shutdown: shutdown_tx,
            commands: commands_tx,
            state,
            join,
        }
    }

    async fn run(
        mut self,
        mut shutdown: watch::Receiver<bool>,
        mut commands: mpsc::Receiver<Command>,
    ) {
        tracing::info!(
            feature = %self.feature,
            initial_delay_ms = self.delay.current().as_millis() as u64,
            "Upload worker started"
        );

        loop {
            let delay = self.delay.current();
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                Some(command) = commands.recv() => match command {
                    Command::Flush(reply) => {
                        let sent = self.flush_all().await;
                        let _ = reply.send(sent);
                    }
                },
                _ = tokio::time::sleep(delay) => {
                    self.run_cycle().await;
                }
            }
        }

        tracing::info!(feature = %self.feature, "Upload worker stopped");
    }

    async fn next_batch(&self) -> Option<Batch> {
        let reader = self.reader.clone();
        match tokio::task::spawn_blocking(move || reader.next_batch()).await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!(feature = %self.feature, error = %e, "Batch read task failed");
                None
            }
        }
    }

    async fn upload(&self, batch: &Batch) -> UploadStatus {
        let status = {
            let _timer = time_histogram!(UPLOAD_DURATION.with_label_values(&[self.feature.as_str()]));
            self.uploader.upload(&batch.events).await
        };
        BATCHES_UPLOADED
            .with_label_values(&[self.feature.as_str(), status.label()])
            .inc();
        status
    }

    async fn mark_as_read(&self, batch: Batch, status: &UploadStatus) {
        let reader = self.reader.clone();
        let outcome = status.batch_outcome();
        if let Err(e) =
            tokio::task::spawn_blocking(move || reader.mark_as_read(&batch, outcome)).await
        {
            tracing::error!(feature = %self.feature, error = %e, "Batch delete task failed");
        }
    }

    fn set_state(&self, state: WorkerState) {
        self.state.send_replace(state);
    }
}

enum Command {
    Flush(oneshot::Sender<usize>),
}

/// Control handle for a spawned worker. Dropping it stops the worker after
/// its current cycle.
pub struct UploadWorkerHandle {
    shutdown: watch::Sender<bool>,
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<WorkerState>,
    join: JoinHandle<()>,
}

impl UploadWorkerHandle {
    pub fn state(&self) -> watch::Receiver<WorkerState> {
        self.state.clone()
    }

    /// Upload everything left on disk now. Returns the number of batches
    /// sent, or `0` if the worker has stopped.
    pub async fn flush_all(&self) -> usize {
        let (reply, wait) = oneshot::channel();
        if self.commands.send(Command::Flush(reply)).await.is_err() {
            return 0;
        }
        wait.await.unwrap_or(0)
    }

    /// Stop the worker, waiting for an in-flight cycle to complete.
    pub async fn cancel(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "Upload worker task failed");
        }
    }
}
