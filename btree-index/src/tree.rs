//! Entry point for reading the indexes of one container file.
//!
//! [`IndexReader`] owns the byte source and exposes one method per query a
//! collaborator needs: group members, chunk locations, and V2 records. Each
//! method takes the absolute address of the tree it reads and leaves the
//! reader's cursor where it found it.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use crate::config::ReaderConfig;
use crate::entry::{ChunkDescriptor, GroupEntry};
use crate::error::{FormatError, IndexError, Result};
use crate::source::ByteSource;
use crate::v1::{self, NodeType, V1Node};
use crate::v2::{Record, RecordKind, V2Header, V2Tree};

/// Reads V1 and V2 trees from a single byte source.
#[derive(Debug)]
pub struct IndexReader<R> {
    source: ByteSource<R>,
}

impl IndexReader<BufReader<File>> {
    /// Open a container file for reading.
    pub fn open(path: impl AsRef<Path>, config: ReaderConfig) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "opened container file");
        Self::new(BufReader::new(file), config)
    }
}

impl<R: Read + Seek> IndexReader<R> {
    /// Wrap a reader positioned anywhere; every query seeks on its own.
    pub fn new(inner: R, config: ReaderConfig) -> Result<Self> {
        Ok(Self {
            source: ByteSource::new(inner, config)?,
        })
    }

    #[must_use]
    pub const fn from_source(source: ByteSource<R>) -> Self {
        Self { source }
    }

    #[must_use]
    pub const fn config(&self) -> &ReaderConfig {
        self.source.config()
    }

    pub fn into_inner(self) -> R {
        self.source.into_inner()
    }

    // ========== V1 ==========

    /// Decode the V1 node at `address`, including every subtree of a parent
    /// chunk node.
    pub fn read_v1_node(&mut self, address: u64, rank: usize) -> Result<V1Node> {
        tracing::debug!(address, rank, "reading v1 node");
        self.source.at(address, |source| V1Node::read(source, rank))
    }

    /// Members listed directly in the group node at `address`.
    ///
    /// For a group node above level 0 the children are lower group nodes,
    /// not symbol tables; see [`IndexReader::list_symbol_table_addresses`].
    pub fn list_group_entries(&mut self, address: u64) -> Result<Vec<GroupEntry>> {
        tracing::debug!(address, "listing group entries");
        match self.read_v1_node(address, 0)? {
            V1Node::Group(node) => Ok(node.entries()),
            other => Err(unexpected(other.header(), NodeType::Group)),
        }
    }

    /// Addresses of every symbol table node indexed by the group tree
    /// rooted at `address`, in key order.
    pub fn list_symbol_table_addresses(&mut self, address: u64) -> Result<Vec<u64>> {
        tracing::debug!(address, "walking group tree");
        self.source.at(address, v1::symbol_table_addresses)
    }

    /// Every chunk of the V1 chunk tree rooted at `address`, depth-first in
    /// entry order.
    pub fn list_chunks(&mut self, address: u64, rank: usize) -> Result<Vec<ChunkDescriptor>> {
        tracing::debug!(address, rank, "listing v1 chunks");
        let node = self.read_v1_node(address, rank)?;
        if node.header().node_type != NodeType::Chunk {
            return Err(unexpected(node.header(), NodeType::Chunk));
        }
        let chunks = node.chunks();
        tracing::debug!(address, chunks = chunks.len(), "listed v1 chunks");
        Ok(chunks)
    }

    // ========== V2 ==========

    /// Decode the V2 header at `address` without reading any node.
    pub fn read_v2_header(&mut self, address: u64) -> Result<V2Header> {
        tracing::debug!(address, "reading v2 header");
        self.source.at(address, V2Header::read)
    }

    /// Decode the V2 header at `address` and every node of its tree.
    ///
    /// `rank` is the dataset rank for chunk trees and is ignored otherwise.
    pub fn read_v2_tree(&mut self, address: u64, rank: usize) -> Result<V2Tree> {
        tracing::debug!(address, rank, "reading v2 tree");
        self.source.at(address, |source| V2Tree::read(source, rank))
    }

    /// Every record of the V2 tree at `address` in key order.
    pub fn list_v2_records(&mut self, address: u64, rank: usize) -> Result<Vec<Record>> {
        let records = self.read_v2_tree(address, rank)?.into_records();
        tracing::debug!(address, records = records.len(), "listed v2 records");
        Ok(records)
    }

    /// Every chunk of the V2 chunk tree at `address`.
    ///
    /// Unfiltered chunk records do not store a size; `unfiltered_chunk_size`
    /// (the dataset's chunk size in bytes) is reported for them.
    pub fn list_v2_chunks(
        &mut self,
        address: u64,
        rank: usize,
        unfiltered_chunk_size: u64,
    ) -> Result<Vec<ChunkDescriptor>> {
        self.expect_kind(address, "chunk", RecordKind::is_chunk)?;
        let chunks = self
            .list_v2_records(address, rank)?
            .iter()
            .filter_map(|record| record.to_chunk(unfiltered_chunk_size))
            .collect();
        Ok(chunks)
    }

    /// Link-name records of the V2 tree at `address` whose hash matches
    /// `name`.
    ///
    /// Distinct names can share a hash, so callers still compare the name
    /// stored under each record's heap id.
    pub fn find_link_name_records(&mut self, address: u64, name: &str) -> Result<Vec<Record>> {
        self.expect_kind(address, "link name", |kind| kind == RecordKind::LinkName)?;
        let records: Vec<_> = self
            .list_v2_records(address, 0)?
            .into_iter()
            .filter(|record| record.matches_link_name(name))
            .collect();
        tracing::debug!(address, name, matches = records.len(), "searched link names");
        Ok(records)
    }

    fn expect_kind(
        &mut self,
        address: u64,
        expected: &'static str,
        accepts: impl Fn(RecordKind) -> bool,
    ) -> Result<()> {
        let header = self.read_v2_header(address)?;
        if accepts(header.kind) {
            Ok(())
        } else {
            Err(IndexError::WrongRecordKind {
                expected,
                found: header.kind,
            })
        }
    }
}

fn unexpected(header: &v1::NodeHeader, expected: NodeType) -> IndexError {
    FormatError::UnexpectedNode {
        address: header.address,
        expected: format!("{expected:?} node"),
        found: format!("{:?} node at level {}", header.node_type, header.level),
    }
    .into()
}
