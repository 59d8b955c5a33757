//! Values handed to collaborators outside the index.

use serde::Serialize;

use crate::error::{IndexError, Result};

/// Most dimensions a dataset can have.
pub const MAX_RANK: usize = 32;

/// Reject a dataset rank above [`MAX_RANK`].
pub fn check_rank(rank: usize) -> Result<()> {
    if rank > MAX_RANK {
        return Err(IndexError::RankTooLarge {
            rank,
            max: MAX_RANK,
        });
    }
    Ok(())
}

/// One member of a group directory as indexed by a V1 group tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GroupEntry {
    /// Offset of the member's name in the group's name heap.
    pub heap_offset: u64,
    /// Address of the child (a symbol table node, or a deeper tree node).
    pub child_address: u64,
}

/// Location and shape of one stored chunk of a dataset.
///
/// For V1 trees `offset` holds element offsets with the trailing
/// placeholder component removed; for V2 trees it holds scaled offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkDescriptor {
    /// File address of the chunk's bytes.
    pub address: u64,
    /// Stored size of the chunk in bytes.
    pub size: u64,
    /// Bit set of filters skipped for this chunk.
    pub filter_mask: u32,
    /// Multi-dimensional offset of the chunk, one component per dimension.
    pub offset: Vec<u64>,
}

impl ChunkDescriptor {
    /// Number of dimensions the offset covers.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.offset.len()
    }
}
