//! Capacity and field-width arithmetic for V2 nodes.
//!
//! Internal nodes store per-child record counts in variable-width integers.
//! The widths are not written anywhere in the file; both writer and reader
//! derive them from the tree header's node size, record size and depth:
//!
//! - leaf capacity: `(node_size - 10) / record_size`
//! - internal capacity at level `u`:
//!   `(node_size - (10 + pointer(u))) / (record_size + pointer(u))`
//! - pointer size at level `u`:
//!   `offset + child_count_width + (u > 1 ? subtree_width(u - 1) : 0)`
//! - records reachable below level `u`:
//!   `(capacity(u) + 1) * reachable(u - 1) + capacity(u)`
//!
//! The count of records in a child is always encoded with the width of the
//! leaf capacity, at every level. Internal nodes one level above the leaves
//! ("twigs") do not store the subtree total at all.

#![allow(clippy::cast_possible_truncation)]

use crate::error::FormatError;

/// Signature (4) + version (1) + type (1) + checksum (4).
pub const NODE_PREFIX_SIZE: u32 = 10;

/// Bytes needed to encode any value up to `max`.
#[must_use]
pub const fn encoded_width(max: u64) -> u8 {
    if max == 0 {
        1
    } else {
        ((63 - max.leading_zeros()) / 8 + 1) as u8
    }
}

/// Capacity of nodes at one level of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelInfo {
    /// Most records a node at this level can hold.
    pub max_records: u64,
    /// Most records a subtree rooted at this level can hold.
    pub max_in_subtree: u64,
    /// Width of a field able to hold `max_in_subtree`.
    pub subtree_width: u8,
}

/// Derived layout of every level of one V2 tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLayout {
    size_of_offsets: u8,
    child_count_width: u8,
    levels: Vec<LevelInfo>,
}

impl NodeLayout {
    /// Compute the layout for a tree of the given shape.
    ///
    /// # Errors
    ///
    /// Fails if a node at some level cannot hold a single record, or if the
    /// record counts overflow 64 bits.
    pub fn new(
        node_size: u32,
        record_size: u16,
        depth: u16,
        size_of_offsets: u8,
    ) -> Result<Self, FormatError> {
        let too_small = |level| FormatError::NodeTooSmall {
            node_size,
            record_size,
            level,
        };
        if record_size == 0 {
            return Err(too_small(0));
        }

        let leaf_capacity =
            u64::from(node_size.saturating_sub(NODE_PREFIX_SIZE)) / u64::from(record_size);
        if leaf_capacity == 0 {
            return Err(too_small(0));
        }

        let child_count_width = encoded_width(leaf_capacity);
        let mut levels = Vec::with_capacity(usize::from(depth) + 1);
        levels.push(LevelInfo {
            max_records: leaf_capacity,
            max_in_subtree: leaf_capacity,
            subtree_width: child_count_width,
        });

        for level in 1..=depth {
            let below = levels[usize::from(level) - 1];
            let subtree_field = if level > 1 { below.subtree_width } else { 0 };
            let pointer = u64::from(size_of_offsets)
                + u64::from(child_count_width)
                + u64::from(subtree_field);

            let available = u64::from(node_size)
                .checked_sub(u64::from(NODE_PREFIX_SIZE) + pointer)
                .ok_or_else(|| too_small(level))?;
            let max_records = available / (u64::from(record_size) + pointer);
            if max_records == 0 {
                return Err(too_small(level));
            }

            let max_in_subtree = (max_records + 1)
                .checked_mul(below.max_in_subtree)
                .and_then(|n| n.checked_add(max_records))
                .ok_or(FormatError::CapacityOverflow { depth })?;

            levels.push(LevelInfo {
                max_records,
                max_in_subtree,
                subtree_width: encoded_width(max_in_subtree),
            });
        }

        Ok(Self {
            size_of_offsets,
            child_count_width,
            levels,
        })
    }

    /// Depth of the tree this layout was computed for.
    #[must_use]
    pub fn depth(&self) -> u16 {
        (self.levels.len() - 1) as u16
    }

    #[must_use]
    pub fn level(&self, level: u16) -> Option<&LevelInfo> {
        self.levels.get(usize::from(level))
    }

    #[must_use]
    pub fn max_records_in_leaf(&self) -> u64 {
        self.levels[0].max_records
    }

    /// Capacity of a node at `level`, or `None` above the tree's depth.
    #[must_use]
    pub fn max_records(&self, level: u16) -> Option<u64> {
        self.level(level).map(|info| info.max_records)
    }

    /// Width of the "records in child" field of every child pointer.
    #[must_use]
    pub const fn child_count_width(&self) -> u8 {
        self.child_count_width
    }

    /// Width of the "records in subtree" field of an internal node at `depth`.
    ///
    /// `None` for twig nodes (`depth <= 1`), which omit the field.
    #[must_use]
    pub fn subtree_count_width(&self, depth: u16) -> Option<u8> {
        if depth <= 1 {
            return None;
        }
        self.level(depth - 1).map(|below| below.subtree_width)
    }

    /// Encoded size of one child pointer in an internal node at `depth`.
    #[must_use]
    pub fn pointer_size(&self, depth: u16) -> u64 {
        u64::from(self.size_of_offsets)
            + u64::from(self.child_count_width)
            + u64::from(self.subtree_count_width(depth).unwrap_or(0))
    }
}
