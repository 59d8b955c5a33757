//! V2 record payloads.
//!
//! A V2 tree stores one kind of record for its whole life, chosen by the
//! type byte in its header. Every record occupies exactly `record_size`
//! bytes; a record whose fields are shorter than the slot is followed by
//! padding, which is skipped.
//!
//! Field layouts (O = Size of Offsets, L = Size of Lengths):
//!
//! | Kind | Fields |
//! |---|---|
//! | 1 | address(O), length(L), heap id(L) |
//! | 2 | address(O), length(L), filter mask(4), memory size(L), heap id(L) |
//! | 3 | address(O), length(L) |
//! | 4 | address(O), length(L), filter mask(4), memory size(L) |
//! | 5 | name hash(4), heap id(7) |
//! | 6 | creation order(8), heap id(7) |
//! | 7 | location(1), hash(4), then heap or object-header fields |
//! | 8 | heap id(8), message flags(1), creation order(4), name hash(4) |
//! | 9 | heap id(8), message flags(1), creation order(4) |
//! | 10 | address(O), scaled offset(8 x rank) |
//! | 11 | address(O), chunk size(W), filter mask(4), scaled offset(8 x rank) |

use std::io::{Read, Seek};

use serde::Serialize;

use crate::entry::{ChunkDescriptor, check_rank};
use crate::error::{FormatError, Result};
use crate::hash::link_name_hash;
use crate::source::ByteSource;

/// Length of the heap id carried by link-index records.
pub const LINK_HEAP_ID_SIZE: usize = 7;

/// Length of the heap id carried by attribute-index and shared-message records.
pub const HEAP_ID_SIZE: usize = 8;

/// Record kind stored in a V2 tree header and in every node of that tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum RecordKind {
    IndirectHugeObject = 1,
    IndirectFilteredHugeObject = 2,
    DirectHugeObject = 3,
    DirectFilteredHugeObject = 4,
    LinkName = 5,
    LinkCreationOrder = 6,
    SharedMessage = 7,
    AttributeName = 8,
    AttributeCreationOrder = 9,
    Chunk = 10,
    FilteredChunk = 11,
}

impl TryFrom<u8> for RecordKind {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::IndirectHugeObject),
            2 => Ok(Self::IndirectFilteredHugeObject),
            3 => Ok(Self::DirectHugeObject),
            4 => Ok(Self::DirectFilteredHugeObject),
            5 => Ok(Self::LinkName),
            6 => Ok(Self::LinkCreationOrder),
            7 => Ok(Self::SharedMessage),
            8 => Ok(Self::AttributeName),
            9 => Ok(Self::AttributeCreationOrder),
            10 => Ok(Self::Chunk),
            11 => Ok(Self::FilteredChunk),
            _ => Err(value),
        }
    }
}

impl RecordKind {
    /// Whether records of this kind describe dataset chunks.
    #[must_use]
    pub const fn is_chunk(self) -> bool {
        matches!(self, Self::Chunk | Self::FilteredChunk)
    }
}

/// Where a shared message lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SharedMessage {
    /// Stored in the shared-message heap (location 0).
    InHeap {
        hash: u32,
        reference_count: u32,
        heap_id: [u8; HEAP_ID_SIZE],
    },
    /// Stored in an object header (location 1).
    InObjectHeader {
        hash: u32,
        message_type: u8,
        object_header_index: u16,
        object_header_address: u64,
    },
}

/// One decoded V2 record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Record {
    IndirectHugeObject {
        address: u64,
        length: u64,
        heap_id: u64,
    },
    IndirectFilteredHugeObject {
        address: u64,
        length: u64,
        filter_mask: u32,
        memory_size: u64,
        heap_id: u64,
    },
    DirectHugeObject {
        address: u64,
        length: u64,
    },
    DirectFilteredHugeObject {
        address: u64,
        length: u64,
        filter_mask: u32,
        memory_size: u64,
    },
    LinkName {
        hash: u32,
        heap_id: [u8; LINK_HEAP_ID_SIZE],
    },
    LinkCreationOrder {
        creation_order: u64,
        heap_id: [u8; LINK_HEAP_ID_SIZE],
    },
    SharedMessage(SharedMessage),
    AttributeName {
        heap_id: [u8; HEAP_ID_SIZE],
        message_flags: u8,
        creation_order: u32,
        hash: u32,
    },
    AttributeCreationOrder {
        heap_id: [u8; HEAP_ID_SIZE],
        message_flags: u8,
        creation_order: u32,
    },
    Chunk {
        address: u64,
        scaled_offset: Vec<u64>,
    },
    FilteredChunk {
        address: u64,
        chunk_size: u64,
        filter_mask: u32,
        scaled_offset: Vec<u64>,
    },
}

/// Everything needed to decode one record slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordContext {
    kind: RecordKind,
    record_size: u16,
    rank: usize,
    chunk_size_width: u8,
}

impl RecordContext {
    /// Build the context for a tree.
    ///
    /// `rank` is the dataset rank for chunk trees and is ignored otherwise.
    /// For filtered chunk trees the chunk-size width is whatever is left of
    /// the slot after the address, filter mask and scaled offsets.
    ///
    /// # Errors
    ///
    /// Fails for chunk trees given a rank above [`crate::entry::MAX_RANK`],
    /// and for filtered chunk trees whose slot leaves a chunk-size width
    /// outside 1..=8.
    pub fn new(
        kind: RecordKind,
        record_size: u16,
        rank: usize,
        size_of_offsets: u8,
    ) -> Result<Self> {
        if kind.is_chunk() {
            check_rank(rank)?;
        }
        let chunk_size_width = if kind == RecordKind::FilteredChunk {
            let fixed = u64::from(size_of_offsets) + 4 + 8 * rank as u64;
            let width = u64::from(record_size).saturating_sub(fixed);
            u8::try_from(width)
                .ok()
                .filter(|w| (1..=8).contains(w))
                .ok_or_else(|| FormatError::InvalidRecordSize {
                    kind,
                    record_size,
                    reason: format!("leaves a {width}-byte chunk size field for rank {rank}"),
                })?
        } else {
            0
        };
        Ok(Self {
            kind,
            record_size,
            rank,
            chunk_size_width,
        })
    }

    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        self.kind
    }

    #[must_use]
    pub const fn record_size(&self) -> u16 {
        self.record_size
    }

    /// Width of the chunk-size field of filtered chunk records (0 otherwise).
    #[must_use]
    pub const fn chunk_size_width(&self) -> u8 {
        self.chunk_size_width
    }
}

impl Record {
    /// Decode one record slot at the cursor, leaving the cursor after the slot.
    pub fn read<R: Read + Seek>(source: &mut ByteSource<R>, ctx: &RecordContext) -> Result<Self> {
        let start = source.position()?;
        let record = Self::read_fields(source, ctx)?;
        let consumed = source.position()? - start;
        let slot = u64::from(ctx.record_size);
        if consumed > slot {
            return Err(FormatError::RecordOverrun {
                kind: ctx.kind,
                record_size: ctx.record_size,
                consumed,
            }
            .into());
        }
        let padding = slot - consumed;
        if padding > 0 {
            source.skip(padding)?;
        }
        Ok(record)
    }

    fn read_fields<R: Read + Seek>(
        source: &mut ByteSource<R>,
        ctx: &RecordContext,
    ) -> Result<Self> {
        let record = match ctx.kind {
            RecordKind::IndirectHugeObject => Self::IndirectHugeObject {
                address: source.read_offset()?,
                length: source.read_length()?,
                heap_id: source.read_length()?,
            },
            RecordKind::IndirectFilteredHugeObject => Self::IndirectFilteredHugeObject {
                address: source.read_offset()?,
                length: source.read_length()?,
                filter_mask: source.read_u32()?,
                memory_size: source.read_length()?,
                heap_id: source.read_length()?,
            },
            RecordKind::DirectHugeObject => Self::DirectHugeObject {
                address: source.read_offset()?,
                length: source.read_length()?,
            },
            RecordKind::DirectFilteredHugeObject => Self::DirectFilteredHugeObject {
                address: source.read_offset()?,
                length: source.read_length()?,
                filter_mask: source.read_u32()?,
                memory_size: source.read_length()?,
            },
            RecordKind::LinkName => Self::LinkName {
                hash: source.read_u32()?,
                heap_id: source.read_array()?,
            },
            RecordKind::LinkCreationOrder => Self::LinkCreationOrder {
                creation_order: source.read_u64()?,
                heap_id: source.read_array()?,
            },
            RecordKind::SharedMessage => Self::SharedMessage(read_shared_message(source)?),
            RecordKind::AttributeName => Self::AttributeName {
                heap_id: source.read_array()?,
                message_flags: source.read_u8()?,
                creation_order: source.read_u32()?,
                hash: source.read_u32()?,
            },
            RecordKind::AttributeCreationOrder => Self::AttributeCreationOrder {
                heap_id: source.read_array()?,
                message_flags: source.read_u8()?,
                creation_order: source.read_u32()?,
            },
            RecordKind::Chunk => Self::Chunk {
                address: source.read_offset()?,
                scaled_offset: read_scaled_offset(source, ctx.rank)?,
            },
            RecordKind::FilteredChunk => Self::FilteredChunk {
                address: source.read_offset()?,
                chunk_size: source.read_uint(ctx.chunk_size_width)?,
                filter_mask: source.read_u32()?,
                scaled_offset: read_scaled_offset(source, ctx.rank)?,
            },
        };
        Ok(record)
    }

    /// The kind this record was decoded as.
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::IndirectHugeObject { .. } => RecordKind::IndirectHugeObject,
            Self::IndirectFilteredHugeObject { .. } => RecordKind::IndirectFilteredHugeObject,
            Self::DirectHugeObject { .. } => RecordKind::DirectHugeObject,
            Self::DirectFilteredHugeObject { .. } => RecordKind::DirectFilteredHugeObject,
            Self::LinkName { .. } => RecordKind::LinkName,
            Self::LinkCreationOrder { .. } => RecordKind::LinkCreationOrder,
            Self::SharedMessage(_) => RecordKind::SharedMessage,
            Self::AttributeName { .. } => RecordKind::AttributeName,
            Self::AttributeCreationOrder { .. } => RecordKind::AttributeCreationOrder,
            Self::Chunk { .. } => RecordKind::Chunk,
            Self::FilteredChunk { .. } => RecordKind::FilteredChunk,
        }
    }

    /// Project a chunk record onto a [`ChunkDescriptor`].
    ///
    /// Unfiltered chunk records carry no size, so `unfiltered_size` (the
    /// dataset's full chunk size in bytes) is used for them. Returns `None`
    /// for non-chunk records.
    #[must_use]
    pub fn to_chunk(&self, unfiltered_size: u64) -> Option<ChunkDescriptor> {
        match self {
            Self::Chunk {
                address,
                scaled_offset,
            } => Some(ChunkDescriptor {
                address: *address,
                size: unfiltered_size,
                filter_mask: 0,
                offset: scaled_offset.clone(),
            }),
            Self::FilteredChunk {
                address,
                chunk_size,
                filter_mask,
                scaled_offset,
            } => Some(ChunkDescriptor {
                address: *address,
                size: *chunk_size,
                filter_mask: *filter_mask,
                offset: scaled_offset.clone(),
            }),
            _ => None,
        }
    }

    /// Whether this is a link-name record whose hash matches `name`.
    ///
    /// Hash collisions are possible; a match still has to be confirmed
    /// against the name stored in the heap.
    #[must_use]
    pub fn matches_link_name(&self, name: &str) -> bool {
        matches!(self, Self::LinkName { hash, .. } if *hash == link_name_hash(name))
    }
}

fn read_shared_message<R: Read + Seek>(source: &mut ByteSource<R>) -> Result<SharedMessage> {
    let location = source.read_u8()?;
    let hash = source.read_u32()?;
    match location {
        0 => Ok(SharedMessage::InHeap {
            hash,
            reference_count: source.read_u32()?,
            heap_id: source.read_array()?,
        }),
        1 => {
            let _reserved = source.read_u8()?;
            Ok(SharedMessage::InObjectHeader {
                hash,
                message_type: source.read_u8()?,
                object_header_index: source.read_u16()?,
                object_header_address: source.read_offset()?,
            })
        }
        other => Err(FormatError::UnknownMessageLocation(other).into()),
    }
}

fn read_scaled_offset<R: Read + Seek>(source: &mut ByteSource<R>, rank: usize) -> Result<Vec<u64>> {
    (0..rank).map(|_| source.read_u64()).collect()
}
