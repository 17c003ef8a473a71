//! # Block Codec
//!
//! Every byte the pipeline puts on disk is a sequence of TLV blocks:
//!
//! ```text
//! ┌──────────────┬────────────────┬──────────────────────┐
//! │ type: u16 LE │ length: u32 LE │ payload: length bytes│
//! └──────────────┴────────────────┴──────────────────────┘
//! ```
//!
//! Each file format has its own tag namespace ([`EventBlockType`],
//! [`DataStoreBlockType`]). Readers skip tags they do not know, so newer
//! writers can add block types without breaking older readers.
//!
//! ## Failure Modes
//!
//! | Error | Meaning |
//! |-------|---------|
//! | `TruncatedType` | Stream ended inside the 2-byte type field |
//! | `TruncatedLength` | Stream ended inside the 4-byte length field |
//! | `TruncatedPayload` | Fewer payload bytes than the declared length |
//! | `BlockTooLarge` | Declared length above the configured maximum |
//!
//! A stream that ends exactly on a block boundary is a clean end, not an error.

use shared_types::Event;
use std::io::{self, Read};
use std::marker::PhantomData;
use thiserror::Error;

/// Default upper bound for a single block payload (10 MiB).
pub const DEFAULT_MAX_BLOCK_LENGTH: u32 = 10 * 1024 * 1024;

const TYPE_LEN: usize = 2;
const LENGTH_LEN: usize = 4;

/// Size of the `type || length` header preceding every payload.
pub const BLOCK_HEADER_LEN: usize = TYPE_LEN + LENGTH_LEN;

/// Block encoding and decoding errors.
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("stream ended inside a block type field")]
    TruncatedType,

    #[error("stream ended inside a block length field")]
    TruncatedLength,

    #[error("block payload truncated: expected {expected} bytes, got {actual}")]
    TruncatedPayload { expected: u32, actual: u32 },

    #[error("block length {length} exceeds the maximum of {max} bytes")]
    BlockTooLarge { length: u64, max: u32 },

    #[error("I/O error while reading blocks: {0}")]
    Io(#[from] io::Error),
}

impl BlockError {
    /// Whether the error describes malformed bytes rather than a failed read.
    pub fn is_corruption(&self) -> bool {
        !matches!(self, BlockError::Io(_))
    }
}

/// Maps a typed block kind to and from its on-disk `u16` tag.
pub trait BlockTag: Copy + Sized {
    fn tag(self) -> u16;

    /// `None` for tags this namespace does not know; such blocks are skipped.
    fn from_tag(tag: u16) -> Option<Self>;
}

/// Tags used in event files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventBlockType {
    /// Event payload.
    Event,
    /// Metadata attached to the event block that follows it.
    EventMetadata,
}

impl BlockTag for EventBlockType {
    fn tag(self) -> u16 {
        match self {
            EventBlockType::Event => 0x0000,
            EventBlockType::EventMetadata => 0x0001,
        }
    }

    fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            0x0000 => Some(EventBlockType::Event),
            0x0001 => Some(EventBlockType::EventMetadata),
            _ => None,
        }
    }
}

/// Tags used in data store files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataStoreBlockType {
    /// `u16` little-endian version of the stored value.
    Version,
    /// Stored value bytes.
    Data,
}

impl BlockTag for DataStoreBlockType {
    fn tag(self) -> u16 {
        match self {
            DataStoreBlockType::Version => 0x0000,
            DataStoreBlockType::Data => 0x0001,
        }
    }

    fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            0x0000 => Some(DataStoreBlockType::Version),
            0x0001 => Some(DataStoreBlockType::Data),
            _ => None,
        }
    }
}

/// One TLV record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<T> {
    pub kind: T,
    pub data: Vec<u8>,
}

impl<T: BlockTag> Block<T> {
    pub fn new(kind: T, data: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            data: data.into(),
        }
    }

    /// Number of bytes [`serialize`](Self::serialize) produces.
    pub fn encoded_len(&self) -> usize {
        BLOCK_HEADER_LEN + self.data.len()
    }

    /// Serialize as `type || length || payload`.
    pub fn serialize(&self, max_length: u32) -> Result<Vec<u8>, BlockError> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.serialize_into(&mut out, max_length)?;
        Ok(out)
    }

    fn serialize_into(&self, out: &mut Vec<u8>, max_length: u32) -> Result<(), BlockError> {
        let length = self.data.len() as u64;
        if length > u64::from(max_length) {
            return Err(BlockError::BlockTooLarge {
                length,
                max: max_length,
            });
        }
        out.extend_from_slice(&self.kind.tag().to_le_bytes());
        out.extend_from_slice(&(length as u32).to_le_bytes());
        out.extend_from_slice(&self.data);
        Ok(())
    }
}

/// Sequential block decoder over any byte stream.
pub struct BlockReader<R, T> {
    input: R,
    max_length: u32,
    _kind: PhantomData<T>,
}

impl<R: Read, T: BlockTag> BlockReader<R, T> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            max_length: DEFAULT_MAX_BLOCK_LENGTH,
            _kind: PhantomData,
        }
    }

    /// Override the maximum accepted payload length.
    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = max_length;
        self
    }

    /// Decode the next known block.
    ///
    /// Returns `Ok(None)` when the stream ends on a block boundary. Blocks
    /// with unknown tags are consumed and skipped.
    pub fn next(&mut self) -> Result<Option<Block<T>>, BlockError> {
        loop {
            let mut type_buf = [0u8; TYPE_LEN];
            match self.fill(&mut type_buf)? {
                0 => return Ok(None),
                TYPE_LEN => {}
                _ => return Err(BlockError::TruncatedType),
            }

            let mut length_buf = [0u8; LENGTH_LEN];
            if self.fill(&mut length_buf)? != LENGTH_LEN {
                return Err(BlockError::TruncatedLength);
            }

            let tag = u16::from_le_bytes(type_buf);
            let length = u32::from_le_bytes(length_buf);
            if length > self.max_length {
                return Err(BlockError::BlockTooLarge {
                    length: u64::from(length),
                    max: self.max_length,
                });
            }

            let mut data = Vec::with_capacity(length as usize);
            let actual = (&mut self.input)
                .take(u64::from(length))
                .read_to_end(&mut data)?;
            if actual != length as usize {
                return Err(BlockError::TruncatedPayload {
                    expected: length,
                    actual: actual as u32,
                });
            }

            match T::from_tag(tag) {
                Some(kind) => return Ok(Some(Block { kind, data })),
                None => {
                    tracing::debug!(tag, length, "Skipping block with unknown type");
                }
            }
        }
    }

    /// Decode every remaining block.
    pub fn all(&mut self) -> Result<Vec<Block<T>>, BlockError> {
        let mut blocks = Vec::new();
        while let Some(block) = self.next()? {
            blocks.push(block);
        }
        Ok(blocks)
    }

    /// Read until `buf` is full or the stream ends. Returns bytes read.
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize, BlockError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.input.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(BlockError::Io(e)),
            }
        }
        Ok(filled)
    }
}

// =============================================================================
// EVENT ENCODING
// =============================================================================

/// Encode an event as an optional `EventMetadata` block followed by its
/// `Event` block.
pub fn encode_event(event: &Event, max_length: u32) -> Result<Vec<u8>, BlockError> {
    let metadata_len = event
        .metadata
        .as_ref()
        .map_or(0, |m| BLOCK_HEADER_LEN + m.len());
    let mut out = Vec::with_capacity(metadata_len + BLOCK_HEADER_LEN + event.data.len());

    if let Some(metadata) = &event.metadata {
        Block::new(EventBlockType::EventMetadata, metadata.as_slice())
            .serialize_into(&mut out, max_length)?;
    }
    Block::new(EventBlockType::Event, event.data.as_slice()).serialize_into(&mut out, max_length)?;
    Ok(out)
}

/// Result of decoding an event file.
#[derive(Debug, Default)]
pub struct DecodedEvents {
    /// Events decoded before the stream ended or failed, in file order.
    pub events: Vec<Event>,
    /// The error that stopped decoding, if any.
    pub error: Option<BlockError>,
}

/// Decode events from an event file stream.
///
/// Decoding stops at the first error; events decoded up to that point are
/// kept. A metadata block not followed by an event block is discarded.
pub fn decode_events<R: Read>(input: R, max_length: u32) -> DecodedEvents {
    let mut reader = BlockReader::<R, EventBlockType>::new(input).with_max_length(max_length);
    let mut decoded = DecodedEvents::default();
    let mut pending_metadata: Option<Vec<u8>> = None;

    loop {
        match reader.next() {
            Ok(Some(block)) => match block.kind {
                EventBlockType::EventMetadata => pending_metadata = Some(block.data),
                EventBlockType::Event => decoded.events.push(Event {
                    data: block.data,
                    metadata: pending_metadata.take(),
                }),
            },
            Ok(None) => break,
            Err(e) => {
                decoded.error = Some(e);
                break;
            }
        }
    }

    decoded
}
