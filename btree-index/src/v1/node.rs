//! V1 B-tree nodes.
//!
//! Every V1 node starts with the same header:
//! - signature: 4 bytes (`TREE`)
//! - node type: 1 byte (0 = group, 1 = chunk)
//! - level: 1 byte (0 = leaf)
//! - entries used: 2 bytes
//! - left sibling: Size of Offsets (undefined if none)
//! - right sibling: Size of Offsets (undefined if none)
//!
//! Then `entries used` (key, child) pairs and one terminal key.
//!
//! Group keys are heap offsets (Size of Lengths). Chunk keys are:
//! - chunk size: 4 bytes
//! - filter mask: 4 bytes
//! - offset: `rank + 1` components of 8 bytes, the last always 0
//!
//! In a leaf chunk node each child is the chunk's data address. In a parent
//! chunk node each child is another chunk node one level down.

use std::io::{Read, Seek};

use crate::entry::{ChunkDescriptor, GroupEntry, check_rank};
use crate::error::{FormatError, IndexError, Result};
use crate::source::ByteSource;

/// Signature of every V1 node.
pub const SIGNATURE: [u8; 4] = *b"TREE";

/// What the keys and children of a V1 node describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeType {
    Group = 0,
    Chunk = 1,
}

impl TryFrom<u8> for NodeType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Group),
            1 => Ok(Self::Chunk),
            _ => Err(value),
        }
    }
}

/// Header shared by every V1 node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHeader {
    /// Where the node's signature was read.
    pub address: u64,
    pub node_type: NodeType,
    pub level: u8,
    pub entries_used: u16,
    pub left_sibling: Option<u64>,
    pub right_sibling: Option<u64>,
}

impl NodeHeader {
    /// Read a node header at the cursor.
    pub fn read<R: Read + Seek>(source: &mut ByteSource<R>) -> Result<Self> {
        let address = source.position()?;
        source.expect_signature(&SIGNATURE)?;
        let node_type =
            NodeType::try_from(source.read_u8()?).map_err(FormatError::UnknownNodeType)?;
        Ok(Self {
            address,
            node_type,
            level: source.read_u8()?,
            entries_used: source.read_u16()?,
            left_sibling: source.read_address()?,
            right_sibling: source.read_address()?,
        })
    }

    /// Whether the node's children are data rather than tree nodes.
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        self.level == 0
    }

    fn describe(&self) -> String {
        format!("{:?} node at level {}", self.node_type, self.level)
    }
}

/// Key of a chunk node entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkKey {
    /// Stored size of the chunk in bytes.
    pub size: u32,
    pub filter_mask: u32,
    /// Element offset, without the trailing zero component.
    pub offset: Vec<u64>,
}

impl ChunkKey {
    fn read<R: Read + Seek>(source: &mut ByteSource<R>, rank: usize) -> Result<Self> {
        let size = source.read_u32()?;
        let filter_mask = source.read_u32()?;
        let offset = (0..rank)
            .map(|_| source.read_u64())
            .collect::<Result<Vec<_>>>()?;

        let address = source.position()?;
        let placeholder = source.read_u64()?;
        if placeholder != 0 {
            return Err(FormatError::NonZeroPlaceholder {
                address,
                value: placeholder,
            }
            .into());
        }

        Ok(Self {
            size,
            filter_mask,
            offset,
        })
    }

    /// Encoded length of a chunk key of the given rank.
    #[must_use]
    pub const fn encoded_len(rank: usize) -> u64 {
        (rank as u64).saturating_add(1).saturating_mul(8).saturating_add(8)
    }

    fn into_descriptor(self, address: u64) -> ChunkDescriptor {
        ChunkDescriptor {
            address,
            size: u64::from(self.size),
            filter_mask: self.filter_mask,
            offset: self.offset,
        }
    }
}

/// A node of a group tree.
///
/// Holds `entries_used + 1` keys and `entries_used` children, interleaved
/// on disk as key, child, key, ... key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupNode {
    pub header: NodeHeader,
    pub keys: Vec<u64>,
    pub children: Vec<u64>,
}

impl GroupNode {
    fn read_body<R: Read + Seek>(source: &mut ByteSource<R>, header: NodeHeader) -> Result<Self> {
        let entries = usize::from(header.entries_used);
        let mut keys = Vec::with_capacity(entries + 1);
        let mut children = Vec::with_capacity(entries);
        for _ in 0..entries {
            keys.push(source.read_length()?);
            children.push(source.read_offset()?);
        }
        keys.push(source.read_length()?);
        Ok(Self {
            header,
            keys,
            children,
        })
    }

    /// Each child paired with the key to its left.
    #[must_use]
    pub fn entries(&self) -> Vec<GroupEntry> {
        self.keys
            .iter()
            .zip(&self.children)
            .map(|(&heap_offset, &child_address)| GroupEntry {
                heap_offset,
                child_address,
            })
            .collect()
    }
}

/// A level-0 chunk node. Each entry points at chunk data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafChunksNode {
    pub header: NodeHeader,
    pub chunks: Vec<ChunkDescriptor>,
}

/// One entry of a parent chunk node and the subtree it leads to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentEntry {
    pub key: ChunkKey,
    pub child_address: u64,
    pub child: V1Node,
}

/// A chunk node above level 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentChunksNode {
    pub header: NodeHeader,
    pub entries: Vec<ParentEntry>,
}

/// A decoded V1 node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum V1Node {
    Group(GroupNode),
    LeafChunks(LeafChunksNode),
    ParentChunks(ParentChunksNode),
}

impl V1Node {
    /// Decode the node at the cursor and, for parent chunk nodes, every
    /// subtree below it.
    ///
    /// `rank` is the dataset rank and only matters for chunk nodes. The
    /// cursor ends just past the node's terminal key.
    pub fn read<R: Read + Seek>(source: &mut ByteSource<R>, rank: usize) -> Result<Self> {
        Self::read_at_depth(source, rank, 0)
    }

    /// Like [`V1Node::read`], for a node `depth` levels below where the
    /// traversal started.
    pub fn read_at_depth<R: Read + Seek>(
        source: &mut ByteSource<R>,
        rank: usize,
        depth: usize,
    ) -> Result<Self> {
        let header = NodeHeader::read(source)?;
        Self::read_body(source, header, rank, depth)
    }

    fn read_body<R: Read + Seek>(
        source: &mut ByteSource<R>,
        header: NodeHeader,
        rank: usize,
        depth: usize,
    ) -> Result<Self> {
        let limit = source.config().max_depth;
        if depth > limit {
            return Err(IndexError::DepthLimitExceeded {
                limit,
                address: header.address,
            });
        }
        tracing::trace!(
            address = header.address,
            node_type = ?header.node_type,
            level = header.level,
            entries = header.entries_used,
            "decoding v1 node"
        );
        if header.node_type == NodeType::Chunk {
            check_rank(rank)?;
        }

        let node = match header.node_type {
            NodeType::Group => Self::Group(GroupNode::read_body(source, header)?),
            NodeType::Chunk if header.is_leaf() => {
                let mut chunks = Vec::with_capacity(usize::from(header.entries_used));
                for _ in 0..header.entries_used {
                    let key = ChunkKey::read(source, rank)?;
                    chunks.push(key.into_descriptor(source.read_offset()?));
                }
                source.skip(ChunkKey::encoded_len(rank))?;
                Self::LeafChunks(LeafChunksNode { header, chunks })
            }
            NodeType::Chunk => {
                let mut entries = Vec::with_capacity(usize::from(header.entries_used));
                for _ in 0..header.entries_used {
                    let key = ChunkKey::read(source, rank)?;
                    let child_address = source.read_offset()?;
                    let child = source.at(child_address, |source| {
                        Self::read_chunk_child(source, rank, depth + 1, header.level - 1)
                    })?;
                    entries.push(ParentEntry {
                        key,
                        child_address,
                        child,
                    });
                }
                source.skip(ChunkKey::encoded_len(rank))?;
                Self::ParentChunks(ParentChunksNode { header, entries })
            }
        };
        Ok(node)
    }

    fn read_chunk_child<R: Read + Seek>(
        source: &mut ByteSource<R>,
        rank: usize,
        depth: usize,
        level: u8,
    ) -> Result<Self> {
        let header = NodeHeader::read(source)?;
        if header.node_type != NodeType::Chunk || header.level != level {
            return Err(FormatError::UnexpectedNode {
                address: header.address,
                expected: format!("{:?} node at level {level}", NodeType::Chunk),
                found: header.describe(),
            }
            .into());
        }
        Self::read_body(source, header, rank, depth)
    }

    #[must_use]
    pub const fn header(&self) -> &NodeHeader {
        match self {
            Self::Group(node) => &node.header,
            Self::LeafChunks(node) => &node.header,
            Self::ParentChunks(node) => &node.header,
        }
    }

    /// Every chunk below this node, depth-first in entry order.
    ///
    /// Empty for group nodes.
    #[must_use]
    pub fn chunks(&self) -> Vec<ChunkDescriptor> {
        match self {
            Self::Group(_) => Vec::new(),
            Self::LeafChunks(node) => node.chunks.clone(),
            Self::ParentChunks(node) => node
                .entries
                .iter()
                .flat_map(|entry| entry.child.chunks())
                .collect(),
        }
    }
}

/// Walk a group tree from the node at the cursor down to its leaves and
/// return the children of every leaf, in key order.
///
/// Leaf group nodes point at symbol table nodes; nodes above them point at
/// group nodes one level down.
pub fn symbol_table_addresses<R: Read + Seek>(source: &mut ByteSource<R>) -> Result<Vec<u64>> {
    let mut out = Vec::new();
    let header = NodeHeader::read(source)?;
    if header.node_type != NodeType::Group {
        return Err(FormatError::UnexpectedNode {
            address: header.address,
            expected: "Group node".to_string(),
            found: header.describe(),
        }
        .into());
    }
    collect_symbol_tables(source, header, 0, &mut out)?;
    Ok(out)
}

fn collect_symbol_tables<R: Read + Seek>(
    source: &mut ByteSource<R>,
    header: NodeHeader,
    depth: usize,
    out: &mut Vec<u64>,
) -> Result<()> {
    let limit = source.config().max_depth;
    if depth > limit {
        return Err(IndexError::DepthLimitExceeded {
            limit,
            address: header.address,
        });
    }
    let node = GroupNode::read_body(source, header)?;
    if header.is_leaf() {
        out.extend_from_slice(&node.children);
        return Ok(());
    }
    for &child in &node.children {
        source.at(child, |source| {
            let child_header = NodeHeader::read(source)?;
            let level = header.level - 1;
            if child_header.node_type != NodeType::Group || child_header.level != level {
                return Err(FormatError::UnexpectedNode {
                    address: child_header.address,
                    expected: format!("{:?} node at level {level}", NodeType::Group),
                    found: child_header.describe(),
                }
                .into());
            }
            collect_symbol_tables(source, child_header, depth + 1, out)
        })?;
    }
    Ok(())
}
