//! Version 2 B-trees.
//!
//! A V2 tree starts with a `BTHD` header naming the record kind, node size,
//! record size and depth. Nodes below it are `BTIN` (internal) or `BTLF`
//! (leaf). Unlike V1 nodes they carry no level or entry count of their own:
//! both come from the header and from the pointer in the parent.

pub mod header;
pub mod layout;
pub mod node;
pub mod record;

pub use header::V2Header;
pub use layout::{LevelInfo, NodeLayout, encoded_width};
pub use node::{Child, ChildPointer, InternalNode, LeafNode, NodeDecoder, V2Node, V2Tree};
pub use record::{Record, RecordContext, RecordKind, SharedMessage};
