//! V2 internal (`BTIN`) and leaf (`BTLF`) nodes.
//!
//! A V2 node cannot be decoded on its own: its record kind and record size
//! come from the tree header, its record count from the parent pointer (or
//! the header, for the root), and its pointer widths from the tree's
//! [`NodeLayout`].
//!
//! Node layout:
//! - signature: 4 bytes
//! - version: 1 byte (must be 0)
//! - type: 1 byte (must equal the header's record kind)
//! - records: `record_count` slots of `record_size` bytes
//! - child pointers (internal only): `record_count + 1` of
//!   address, records in child, records in subtree (depth > 1 only)
//! - checksum: 4 bytes

use std::io::{Read, Seek};

use crate::error::{FormatError, IndexError, Result};
use crate::source::ByteSource;
use crate::v2::header::V2Header;
use crate::v2::layout::NodeLayout;
use crate::v2::record::{Record, RecordContext, RecordKind};

/// Signature of a V2 internal node.
pub const INTERNAL_SIGNATURE: [u8; 4] = *b"BTIN";

/// Signature of a V2 leaf node.
pub const LEAF_SIGNATURE: [u8; 4] = *b"BTLF";

/// The only node version defined by the format.
pub const NODE_VERSION: u8 = 0;

/// A pointer from an internal node to one child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildPointer {
    pub address: u64,
    /// Records stored directly in the child node.
    pub record_count: u64,
    /// Records in the child's whole subtree. Absent below depth 2.
    pub total_records: Option<u64>,
}

/// A decoded child together with the pointer that led to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child {
    pub pointer: ChildPointer,
    pub node: V2Node,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalNode {
    pub depth: u16,
    pub records: Vec<Record>,
    /// Always one more than `records`.
    pub children: Vec<Child>,
    pub checksum: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    pub records: Vec<Record>,
    pub checksum: u32,
}

/// A node of a V2 tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum V2Node {
    Internal(InternalNode),
    Leaf(LeafNode),
}

impl V2Node {
    /// Records of this subtree in key order.
    ///
    /// For an internal node that is child 0, record 0, child 1, ... child N.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    fn collect_into(self, out: &mut Vec<Record>) {
        match self {
            Self::Leaf(leaf) => out.extend(leaf.records),
            Self::Internal(internal) => {
                let mut records = internal.records.into_iter();
                for child in internal.children {
                    child.node.collect_into(out);
                    if let Some(record) = records.next() {
                        out.push(record);
                    }
                }
            }
        }
    }

    /// Number of records in this subtree.
    #[must_use]
    pub fn total_records(&self) -> u64 {
        match self {
            Self::Leaf(leaf) => leaf.records.len() as u64,
            Self::Internal(internal) => {
                internal.records.len() as u64
                    + internal
                        .children
                        .iter()
                        .map(|child| child.node.total_records())
                        .sum::<u64>()
            }
        }
    }
}

/// Decodes the nodes of one tree.
#[derive(Debug, Clone)]
pub struct NodeDecoder {
    kind: RecordKind,
    layout: NodeLayout,
    records: RecordContext,
}

impl NodeDecoder {
    /// Prepare a decoder for the tree described by `header`.
    ///
    /// `rank` is the dataset rank for chunk trees and is ignored otherwise.
    pub fn new(header: &V2Header, rank: usize, size_of_offsets: u8) -> Result<Self> {
        Ok(Self {
            kind: header.kind,
            layout: header.layout(size_of_offsets)?,
            records: header.record_context(rank, size_of_offsets)?,
        })
    }

    /// Decode the node at `address`, which sits at `depth` and holds
    /// `record_count` records, along with everything below it.
    ///
    /// The cursor is left where it was.
    pub fn read_node<R: Read + Seek>(
        &self,
        source: &mut ByteSource<R>,
        address: u64,
        depth: u16,
        record_count: u64,
    ) -> Result<V2Node> {
        let limit = source.config().max_depth;
        if usize::from(depth) > limit {
            return Err(IndexError::DepthLimitExceeded { limit, address });
        }
        source.at(address, |source| {
            if depth == 0 {
                self.read_leaf(source, address, record_count).map(V2Node::Leaf)
            } else {
                self.read_internal(source, address, depth, record_count)
                    .map(V2Node::Internal)
            }
        })
    }

    fn read_leaf<R: Read + Seek>(
        &self,
        source: &mut ByteSource<R>,
        address: u64,
        record_count: u64,
    ) -> Result<LeafNode> {
        self.read_prefix(source, &LEAF_SIGNATURE, "v2 leaf node", address)?;
        self.check_capacity(address, 0, record_count)?;
        let records = self.read_records(source, record_count)?;
        let checksum = source.read_u32()?;
        tracing::trace!(address, records = records.len(), "decoded v2 leaf");
        Ok(LeafNode { records, checksum })
    }

    fn read_internal<R: Read + Seek>(
        &self,
        source: &mut ByteSource<R>,
        address: u64,
        depth: u16,
        record_count: u64,
    ) -> Result<InternalNode> {
        self.read_prefix(source, &INTERNAL_SIGNATURE, "v2 internal node", address)?;
        self.check_capacity(address, depth, record_count)?;
        let records = self.read_records(source, record_count)?;

        let subtree_width = self.layout.subtree_count_width(depth);
        let mut pointers = Vec::with_capacity(records.len() + 1);
        for _ in 0..=record_count {
            pointers.push(ChildPointer {
                address: source.read_offset()?,
                record_count: source.read_uint(self.layout.child_count_width())?,
                total_records: subtree_width
                    .map(|width| source.read_uint(width))
                    .transpose()?,
            });
        }
        let checksum = source.read_u32()?;
        tracing::trace!(
            address,
            depth,
            records = records.len(),
            "decoded v2 internal node"
        );

        let mut children = Vec::with_capacity(pointers.len());
        for pointer in pointers {
            let node = self.read_node(source, pointer.address, depth - 1, pointer.record_count)?;
            children.push(Child { pointer, node });
        }

        Ok(InternalNode {
            depth,
            records,
            children,
            checksum,
        })
    }

    fn read_prefix<R: Read + Seek>(
        &self,
        source: &mut ByteSource<R>,
        signature: &[u8; 4],
        structure: &'static str,
        address: u64,
    ) -> Result<()> {
        source.expect_signature(signature)?;
        let version = source.read_u8()?;
        if version != NODE_VERSION {
            return Err(FormatError::UnsupportedVersion { structure, version }.into());
        }
        let found = source.read_u8()?;
        if found != self.kind as u8 {
            return Err(FormatError::RecordTypeMismatch {
                address,
                expected: self.kind as u8,
                found,
            }
            .into());
        }
        Ok(())
    }

    fn check_capacity(&self, address: u64, depth: u16, count: u64) -> Result<()> {
        let capacity = self.layout.max_records(depth).unwrap_or(0);
        if count > capacity {
            return Err(FormatError::RecordCountOverflow {
                address,
                count,
                capacity,
            }
            .into());
        }
        Ok(())
    }

    fn read_records<R: Read + Seek>(
        &self,
        source: &mut ByteSource<R>,
        count: u64,
    ) -> Result<Vec<Record>> {
        (0..count)
            .map(|_| Record::read(source, &self.records))
            .collect()
    }
}

/// A V2 header together with its decoded nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V2Tree {
    pub header: V2Header,
    /// `None` for an empty tree.
    pub root: Option<V2Node>,
}

impl V2Tree {
    /// Decode the header at the cursor and every node of the tree.
    ///
    /// The cursor ends just past the header.
    pub fn read<R: Read + Seek>(source: &mut ByteSource<R>, rank: usize) -> Result<Self> {
        let header = V2Header::read(source)?;
        let Some(root_address) = header.root_address else {
            tracing::debug!(kind = ?header.kind, "empty v2 tree");
            return Ok(Self { header, root: None });
        };
        let decoder = NodeDecoder::new(&header, rank, source.config().size_of_offsets)?;
        let root = decoder.read_node(
            source,
            root_address,
            header.depth,
            u64::from(header.root_record_count),
        )?;
        Ok(Self {
            header,
            root: Some(root),
        })
    }

    /// All records in key order.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.root.map(V2Node::into_records).unwrap_or_default()
    }
}
