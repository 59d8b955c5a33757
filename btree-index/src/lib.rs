// Read side of the block indexes of a hierarchical container file.
//
// Two generations of on-disk B-tree locate things inside a container:
//  - V1 trees ("TREE" nodes) index group members and dataset chunks
//  - V2 trees ("BTHD" header, "BTIN"/"BTLF" nodes) index eleven record
//    kinds, from huge objects to link names to dataset chunks
//
// Life of a query:
// 1. A collaborator that parsed the file's global header builds a
//    `ReaderConfig` (address width, length width, byte order)
// 2. `IndexReader` seeks to the tree's address
// 3. The node decoder reads a node, and for each child seeks there,
//    decodes recursively, then restores the cursor
// 4. The decoded tree is projected onto group entries, chunk descriptors
//    or V2 records
//
// Nothing here writes, caches, decompresses or verifies checksums.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]

pub mod config;
pub mod entry;
pub mod error;
pub mod hash;
pub mod source;
pub mod tree;
pub mod v1;
pub mod v2;

#[cfg(test)]
mod testing;

pub use config::{ByteOrder, ConfigError, ReaderConfig};
pub use entry::{ChunkDescriptor, GroupEntry};
pub use error::{FormatError, IndexError, Result};
pub use source::ByteSource;
pub use tree::IndexReader;
pub use v1::V1Node;
pub use v2::{Record, RecordKind, V2Header, V2Node, V2Tree};
