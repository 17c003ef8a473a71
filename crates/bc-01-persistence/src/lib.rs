//! # Event Persistence (bc-01)
//!
//! Durable, consent-aware storage of opaque telemetry events.
//!
//! ## Architecture
//!
//! ```text
//! instrumentation ──write(Event)──→ ConsentAwareDataWriter
//!                                        │ (consent read + enqueue, one step)
//!                                        ↓
//!                                  ReadWriteQueue ("beacon-io-<feature>" thread)
//!                                        │
//!                     ┌──────────────────┴──────────────────┐
//!                     ↓                                     ↓
//!            FileWriter(authorized)                 FileWriter(pending)
//!                     │                                     │
//!            FilesOrchestrator ◄── DataReader      FilesOrchestrator
//!                     │              (upload task)          │
//!              <feature>/v1/authorized/           <feature>/v1/pending/
//! ```
//!
//! ## Guarantees
//!
//! | Guarantee | Mechanism |
//! |-----------|-----------|
//! | Writes never block the caller | unbounded channel + capacity counter |
//! | FIFO per feature | single queue thread, files read oldest first |
//! | One writer per file | the reader never returns the current writable file |
//! | Bounded disk usage | file size/count limits, directory purge, obsolete files |
//! | Consent-safe | transitions are queued behind earlier writes |
//!
//! ## Modules
//!
//! - `codec` - TLV blocks and event encoding
//! - `file`, `directory` - file system primitives that fail explicitly
//! - `orchestrator` - write-side and read-side file selection
//! - `writer`, `queue`, `consent_writer` - the write path
//! - `reader` - batches for the upload worker
//! - `data_store` - versioned per-feature key/value state
//! - `storage` - [`FeatureStorage`], wiring all of the above for one feature

pub mod codec;
pub mod config;
pub mod consent_writer;
pub mod data_store;
pub mod directory;
pub mod error;
pub mod file;
pub mod orchestrator;
pub mod queue;
pub mod reader;
pub mod storage;
pub mod writer;

pub use codec::{
    decode_events, encode_event, Block, BlockError, BlockReader, BlockTag, DataStoreBlockType,
    EventBlockType, DEFAULT_MAX_BLOCK_LENGTH,
};
pub use config::{BatchSize, ConfigError, StorageConfig};
pub use consent_writer::ConsentAwareDataWriter;
pub use data_store::{DataStore, DataStoreError, StoredValue, DEFAULT_DATA_STORE_VERSION};
pub use directory::Directory;
pub use error::{FileError, StorageError};
pub use file::EventFile;
pub use orchestrator::{DeletionReason, FilesOrchestrator, SharedOrchestrator};
pub use queue::ReadWriteQueue;
pub use reader::{Batch, BatchOutcome, DataReader};
pub use storage::FeatureStorage;
pub use writer::{Bucket, FileWriter, Writer};
