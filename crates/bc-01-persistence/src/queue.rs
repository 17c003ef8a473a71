//! # Read/Write Queue
//!
//! One dedicated thread per feature performs every file operation of that
//! feature, in submission order:
//!
//! ```text
//! caller threads ──dispatch_write──┐
//! consent observer ─dispatch_control─┼──→ [unbounded FIFO] ──→ "beacon-io-<feature>" thread
//! flush()/flush_blocking() ────────┘
//! ```
//!
//! Dispatching never blocks the caller. Pending *write* tasks are counted
//! against `queue_capacity`; writes above it are dropped and counted.
//! Control tasks (consent migrations) are never dropped.

use crate::error::StorageError;
use beacon_telemetry::{EVENTS_DROPPED, WRITE_QUEUE_DEPTH};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::sync::{mpsc, oneshot};

type Task = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Write(Task),
    Control(Task),
    Flush(oneshot::Sender<()>),
}

pub struct ReadWriteQueue {
    feature: String,
    sender: mpsc::UnboundedSender<Message>,
    pending_writes: Arc<AtomicUsize>,
    dropped_writes: AtomicU64,
    capacity: usize,
}

impl ReadWriteQueue {
    /// Spawn the queue thread.
    pub fn new(feature: impl Into<String>, capacity: usize) -> Result<Self, StorageError> {
        let feature = feature.into();
        let (sender, receiver) = mpsc::unbounded_channel();
        let pending_writes = Arc::new(AtomicUsize::new(0));

        let worker_pending = Arc::clone(&pending_writes);
        let worker_feature = feature.clone();
        thread::Builder::new()
            .name(format!("beacon-io-{feature}"))
            .spawn(move || run(worker_feature, receiver, worker_pending))
            .map_err(StorageError::QueueSpawn)?;

        Ok(Self {
            feature,
            sender,
            pending_writes,
            dropped_writes: AtomicU64::new(0),
            capacity,
        })
    }

    /// Enqueue a write task. Returns `false` if it was dropped because the
    /// queue is full or stopped.
    pub fn dispatch_write(&self, task: impl FnOnce() + Send + 'static) -> bool {
        let depth = self.pending_writes.fetch_add(1, Ordering::AcqRel);
        if depth >= self.capacity {
            self.pending_writes.fetch_sub(1, Ordering::AcqRel);
            self.record_drop("queue_full");
            tracing::warn!(
                feature = %self.feature,
                capacity = self.capacity,
                "Write queue full, dropping event"
            );
            return false;
        }

        if self.sender.send(Message::Write(Box::new(task))).is_err() {
            self.pending_writes.fetch_sub(1, Ordering::AcqRel);
            self.record_drop("queue_stopped");
            tracing::error!(feature = %self.feature, "Write queue stopped, dropping event");
            return false;
        }

        WRITE_QUEUE_DEPTH
            .with_label_values(&[self.feature.as_str()])
            .set((depth + 1) as f64);
        true
    }

    /// Enqueue a control task behind every previously submitted task.
    pub fn dispatch_control(&self, task: impl FnOnce() + Send + 'static) {
        if self.sender.send(Message::Control(Box::new(task))).is_err() {
            tracing::error!(feature = %self.feature, "Write queue stopped, control task lost");
        }
    }

    /// Wait until every task submitted before this call has run.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.sender.send(Message::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    /// Blocking variant of [`flush`](Self::flush).
    ///
    /// Must not be called from inside an async runtime.
    pub fn flush_blocking(&self) {
        let (done, wait) = oneshot::channel();
        if self.sender.send(Message::Flush(done)).is_ok() {
            let _ = wait.blocking_recv();
        }
    }

    /// Write tasks submitted and not yet run.
    pub fn pending_writes(&self) -> usize {
        self.pending_writes.load(Ordering::Acquire)
    }

    /// Write tasks dropped since creation.
    pub fn dropped_writes(&self) -> u64 {
        self.dropped_writes.load(Ordering::Relaxed)
    }

    fn record_drop(&self, reason: &str) {
        self.dropped_writes.fetch_add(1, Ordering::Relaxed);
        EVENTS_DROPPED
            .with_label_values(&[self.feature.as_str(), reason])
            .inc();
    }
}

impl std::fmt::Debug for ReadWriteQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadWriteQueue")
            .field("feature", &self.feature)
            .field("capacity", &self.capacity)
            .field("pending_writes", &self.pending_writes())
            .finish()
    }
}

/// Queue thread body. Exits once every sender is gone and the backlog is
/// drained.
fn run(
    feature: String,
    mut receiver: mpsc::UnboundedReceiver<Message>,
    pending_writes: Arc<AtomicUsize>,
) {
    tracing::debug!(feature = %feature, "Read/write queue started");

    while let Some(message) = receiver.blocking_recv() {
        match message {
            Message::Write(task) => {
                run_task(&feature, task);
                let depth = pending_writes.fetch_sub(1, Ordering::AcqRel) - 1;
                WRITE_QUEUE_DEPTH
                    .with_label_values(&[feature.as_str()])
                    .set(depth as f64);
            }
            Message::Control(task) => run_task(&feature, task),
            Message::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    tracing::debug!(feature = %feature, "Read/write queue stopped");
}

fn run_task(feature: &str, task: Task) {
    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
        tracing::error!(feature = %feature, "Read/write task panicked");
    }
}
