//! Error types for index decoding.
//!
//! Three kinds of failure are kept apart so callers can tell a corrupt file
//! from an incomplete decoder from a failing disk:
//! - [`FormatError`]: the bytes violate the container format
//! - [`IndexError::NotImplemented`]: legal input this decoder does not handle
//! - [`IndexError::Io`]: the byte source failed, passed through unchanged
//!
//! Every error aborts the traversal that raised it. Nothing here is retried.

use crate::config::ConfigError;
use crate::v2::RecordKind;

/// A violation of the on-disk format.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// A node did not start with the expected signature.
    #[error("bad signature at {address:#x}: expected {:?}, found {:?}", String::from_utf8_lossy(.expected), String::from_utf8_lossy(.found))]
    BadSignature {
        address: u64,
        expected: [u8; 4],
        found: [u8; 4],
    },
    /// A structure declared a version this decoder does not know.
    #[error("unsupported {structure} version: {version}")]
    UnsupportedVersion {
        structure: &'static str,
        version: u8,
    },
    /// A V1 node type other than group (0) or chunk (1).
    #[error("unknown V1 node type: {0}")]
    UnknownNodeType(u8),
    /// A V2 record type outside 1..=11.
    #[error("unknown V2 record type: {0}")]
    UnknownRecordType(u8),
    /// A V2 node's type byte disagrees with its tree header.
    #[error("record type mismatch at {address:#x}: header says {expected}, node says {found}")]
    RecordTypeMismatch {
        address: u64,
        expected: u8,
        found: u8,
    },
    /// The trailing chunk offset component was not the zero placeholder.
    #[error("non-zero chunk offset placeholder at {address:#x}: {value}")]
    NonZeroPlaceholder { address: u64, value: u64 },
    /// A V1 node had the wrong type or level for its place in the tree.
    #[error("unexpected V1 node at {address:#x}: expected {expected}, found {found}")]
    UnexpectedNode {
        address: u64,
        expected: String,
        found: String,
    },
    /// A shared-message record with an unknown location byte.
    #[error("unknown shared message location: {0}")]
    UnknownMessageLocation(u8),
    /// A record decoded past the end of its fixed-size slot.
    #[error("{kind:?} record overruns its slot: {consumed} bytes read, slot is {record_size}")]
    RecordOverrun {
        kind: RecordKind,
        record_size: u16,
        consumed: u64,
    },
    /// The declared record size cannot hold the record's fixed fields.
    #[error("record size {record_size} is invalid for {kind:?} records: {reason}")]
    InvalidRecordSize {
        kind: RecordKind,
        record_size: u16,
        reason: String,
    },
    /// Node size and record size leave no room for a single record.
    #[error("node size {node_size} cannot hold records of {record_size} bytes at level {level}")]
    NodeTooSmall {
        node_size: u32,
        record_size: u16,
        level: u16,
    },
    /// A node claims more records than its layout allows.
    #[error("node at {address:#x} declares {count} records, capacity is {capacity}")]
    RecordCountOverflow {
        address: u64,
        count: u64,
        capacity: u64,
    },
    /// Capacity arithmetic overflowed 64 bits.
    #[error("tree of depth {depth} exceeds 64-bit record counts")]
    CapacityOverflow { depth: u16 },
}

/// Errors that can occur while decoding a tree.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The underlying byte source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The bytes violate the format.
    #[error("format violation: {0}")]
    Format(#[from] FormatError),
    /// The reader was configured with invalid format parameters.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Input the format allows but this decoder does not support.
    #[error("not implemented: {0}")]
    NotImplemented(String),
    /// Traversal went deeper than the configured limit.
    #[error("recursion depth limit of {limit} exceeded at {address:#x}")]
    DepthLimitExceeded { limit: usize, address: u64 },
    /// A chunk query was given a dataset rank the format cannot describe.
    #[error("dataset rank {rank} exceeds the maximum of {max}")]
    RankTooLarge { rank: usize, max: usize },
    /// A projection was requested from a tree holding a different record kind.
    #[error("tree holds {found:?} records, expected {expected}")]
    WrongRecordKind {
        expected: &'static str,
        found: RecordKind,
    },
}

impl IndexError {
    /// Whether this error means the file itself is corrupt.
    #[must_use]
    pub const fn is_format_violation(&self) -> bool {
        matches!(self, Self::Format(_) | Self::DepthLimitExceeded { .. })
    }

    /// Whether this error means the decoder lacks support for valid input.
    #[must_use]
    pub const fn is_not_implemented(&self) -> bool {
        matches!(self, Self::NotImplemented(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_signature_display() {
        let error = FormatError::BadSignature {
            address: 0x40,
            expected: *b"TREE",
            found: *b"SNOD",
        };
        assert_eq!(
            error.to_string(),
            "bad signature at 0x40: expected \"TREE\", found \"SNOD\""
        );
    }

    #[test]
    fn test_classification() {
        let format = IndexError::from(FormatError::UnknownNodeType(7));
        assert!(format.is_format_violation());
        assert!(!format.is_not_implemented());

        let missing = IndexError::NotImplemented("16-byte offsets".to_string());
        assert!(missing.is_not_implemented());
        assert!(!missing.is_format_violation());

        let io = IndexError::from(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
        assert!(!io.is_format_violation());
        assert!(!io.is_not_implemented());
    }

    #[test]
    fn test_io_source_is_preserved() {
        use std::error::Error;

        let io = IndexError::from(std::io::Error::other("disk gone"));
        let source = io.source().expect("io error has a source");
        assert_eq!(source.to_string(), "disk gone");
    }
}
