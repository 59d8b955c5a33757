//! V2 tree header (`BTHD`).
//!
//! Header layout:
//! - signature: 4 bytes (`BTHD`)
//! - version: 1 byte (must be 0)
//! - type: 1 byte (record kind, 1..=11)
//! - node size: 4 bytes
//! - record size: 2 bytes
//! - depth: 2 bytes
//! - split percent: 1 byte
//! - merge percent: 1 byte
//! - root address: Size of Offsets
//! - root record count: 2 bytes
//! - total record count: Size of Lengths
//! - checksum: 4 bytes (read, not verified)

use std::io::{Read, Seek};

use serde::Serialize;

use crate::error::{FormatError, Result};
use crate::source::ByteSource;
use crate::v2::layout::NodeLayout;
use crate::v2::record::{RecordContext, RecordKind};

/// Signature of a V2 tree header.
pub const HEADER_SIGNATURE: [u8; 4] = *b"BTHD";

/// The only header version defined by the format.
pub const HEADER_VERSION: u8 = 0;

/// Decoded V2 tree header. The root node is not read here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct V2Header {
    pub kind: RecordKind,
    pub node_size: u32,
    pub record_size: u16,
    pub depth: u16,
    pub split_percent: u8,
    pub merge_percent: u8,
    /// `None` for an empty tree.
    pub root_address: Option<u64>,
    pub root_record_count: u16,
    pub total_record_count: u64,
    pub checksum: u32,
}

impl V2Header {
    /// Decode a header at the cursor.
    pub fn read<R: Read + Seek>(source: &mut ByteSource<R>) -> Result<Self> {
        source.expect_signature(&HEADER_SIGNATURE)?;

        let version = source.read_u8()?;
        if version != HEADER_VERSION {
            return Err(FormatError::UnsupportedVersion {
                structure: "v2 header",
                version,
            }
            .into());
        }

        let kind = source.read_u8()?;
        let kind = RecordKind::try_from(kind).map_err(FormatError::UnknownRecordType)?;

        let header = Self {
            kind,
            node_size: source.read_u32()?,
            record_size: source.read_u16()?,
            depth: source.read_u16()?,
            split_percent: source.read_u8()?,
            merge_percent: source.read_u8()?,
            root_address: source.read_address()?,
            root_record_count: source.read_u16()?,
            total_record_count: source.read_length()?,
            checksum: source.read_u32()?,
        };
        tracing::trace!(
            kind = ?header.kind,
            depth = header.depth,
            records = header.total_record_count,
            "decoded v2 header"
        );
        Ok(header)
    }

    /// Whether the tree holds no nodes at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.root_address.is_none()
    }

    /// Node capacities and pointer widths for this tree.
    pub fn layout(&self, size_of_offsets: u8) -> std::result::Result<NodeLayout, FormatError> {
        NodeLayout::new(self.node_size, self.record_size, self.depth, size_of_offsets)
    }

    /// Decoding context for this tree's records.
    pub fn record_context(&self, rank: usize, size_of_offsets: u8) -> Result<RecordContext> {
        RecordContext::new(self.kind, self.record_size, rank, size_of_offsets)
    }
}
