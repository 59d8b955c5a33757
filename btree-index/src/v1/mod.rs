//! Version 1 B-trees.
//!
//! V1 trees index either the members of a group (node type 0) or the chunks
//! of a dataset (node type 1). Nodes are self-describing: the header carries
//! the node type, level and entry count, so any node can be decoded without
//! context apart from the dataset rank.

pub mod node;

pub use node::{
    ChunkKey, GroupNode, LeafChunksNode, NodeHeader, NodeType, ParentChunksNode, ParentEntry,
    SIGNATURE, V1Node, symbol_table_addresses,
};
