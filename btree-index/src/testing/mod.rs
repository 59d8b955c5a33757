//! Builders for synthetic container images used by unit tests.
//!
//! Nodes are encoded with the same field widths and byte order the reader
//! is configured with, then placed at chosen addresses in a byte vector.
//! Trees are assembled bottom-up: write the children, take their
//! addresses, then write the parent that points at them.

use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::config::{ByteOrder, ReaderConfig};
use crate::source::ByteSource;
use crate::v2::{NodeLayout, RecordKind};

/// Scalar encoder matching a reader configuration.
pub struct Encoder {
    config: ReaderConfig,
    buf: Vec<u8>,
}

impl Encoder {
    pub const fn new(config: ReaderConfig) -> Self {
        Self {
            config,
            buf: Vec::new(),
        }
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.uint(u64::from(value), 2)
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.uint(u64::from(value), 4)
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.uint(value, 8)
    }

    pub fn uint(&mut self, value: u64, width: u8) -> &mut Self {
        let width = usize::from(width);
        let le = value.to_le_bytes();
        match self.config.byte_order {
            ByteOrder::Little => self.buf.extend_from_slice(&le[..width]),
            ByteOrder::Big => self.buf.extend(le[..width].iter().rev()),
        }
        self
    }

    pub fn offset(&mut self, value: u64) -> &mut Self {
        self.uint(value, self.config.size_of_offsets)
    }

    pub fn length(&mut self, value: u64) -> &mut Self {
        self.uint(value, self.config.size_of_lengths)
    }

    pub fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

/// One entry of a synthetic V1 chunk node.
#[derive(Debug, Clone)]
pub struct V1ChunkEntry {
    pub size: u32,
    pub filter_mask: u32,
    pub offset: Vec<u64>,
    pub placeholder: u64,
    pub address: u64,
}

impl V1ChunkEntry {
    pub const fn new(size: u32, offset: Vec<u64>, address: u64) -> Self {
        Self {
            size,
            filter_mask: 0,
            offset,
            placeholder: 0,
            address,
        }
    }
}

/// Description of a synthetic V2 header.
#[derive(Debug, Clone, Copy)]
pub struct V2HeaderSpec {
    pub kind: RecordKind,
    pub node_size: u32,
    pub record_size: u16,
    pub depth: u16,
    pub root_address: u64,
    pub root_record_count: u16,
    pub total_record_count: u64,
}

/// A child pointer in a synthetic V2 internal node.
#[derive(Debug, Clone, Copy)]
pub struct V2Pointer {
    pub address: u64,
    pub record_count: u64,
    pub total_records: u64,
}

/// A growable container image.
pub struct ImageBuilder {
    config: ReaderConfig,
    bytes: Vec<u8>,
}

impl ImageBuilder {
    /// Start an image with `preamble` zero bytes so no node sits at address 0.
    pub fn new(config: ReaderConfig, preamble: usize) -> Self {
        Self {
            config,
            bytes: vec![0u8; preamble],
        }
    }

    pub const fn encoder(&self) -> Encoder {
        Encoder::new(self.config)
    }

    /// Current end of the image.
    pub fn end(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Append bytes and return the address they start at.
    pub fn append(&mut self, bytes: &[u8]) -> u64 {
        let address = self.end();
        self.bytes.extend_from_slice(bytes);
        address
    }

    /// Append `count` zero bytes.
    pub fn pad(&mut self, count: usize) {
        self.bytes.resize(self.bytes.len() + count, 0);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn into_source(self) -> ByteSource<Cursor<Vec<u8>>> {
        let config = self.config;
        ByteSource::from_bytes(self.bytes, config).expect("valid test config")
    }

    // ========== V1 ==========

    fn v1_prefix(&self, node_type: u8, level: u8, entries: usize) -> Encoder {
        let undefined = self.config.undefined_address();
        let mut enc = self.encoder();
        enc.bytes(b"TREE")
            .u8(node_type)
            .u8(level)
            .u16(u16::try_from(entries).expect("entry count fits u16"))
            .offset(undefined)
            .offset(undefined);
        enc
    }

    /// Encode a V1 group node.
    pub fn v1_group_node(&self, level: u8, keys: &[u64], children: &[u64]) -> Vec<u8> {
        assert_eq!(keys.len(), children.len() + 1, "k children need k+1 keys");
        let mut enc = self.v1_prefix(0, level, children.len());
        for (key, child) in keys.iter().zip(children) {
            enc.length(*key).offset(*child);
        }
        enc.length(keys[children.len()]);
        enc.finish()
    }

    /// Encode a V1 chunk node, including the unused terminal key.
    pub fn v1_chunk_node(&self, level: u8, rank: usize, entries: &[V1ChunkEntry]) -> Vec<u8> {
        let mut enc = self.v1_prefix(1, level, entries.len());
        for entry in entries {
            assert_eq!(entry.offset.len(), rank);
            enc.u32(entry.size).u32(entry.filter_mask);
            for component in &entry.offset {
                enc.u64(*component);
            }
            enc.u64(entry.placeholder).offset(entry.address);
        }
        enc.u32(0).u32(0);
        for _ in 0..=rank {
            enc.u64(0);
        }
        enc.finish()
    }

    // ========== V2 ==========

    /// Encode a V2 header.
    pub fn v2_header(&self, spec: &V2HeaderSpec) -> Vec<u8> {
        let mut enc = self.encoder();
        enc.bytes(b"BTHD")
            .u8(0)
            .u8(spec.kind as u8)
            .u32(spec.node_size)
            .u16(spec.record_size)
            .u16(spec.depth)
            .u8(100)
            .u8(40)
            .offset(spec.root_address)
            .u16(spec.root_record_count)
            .length(spec.total_record_count)
            .u32(0xC0FF_EE00);
        enc.finish()
    }

    /// Encode a V2 leaf node from pre-encoded record slots.
    pub fn v2_leaf(&self, kind: RecordKind, records: &[Vec<u8>]) -> Vec<u8> {
        let mut enc = self.encoder();
        enc.bytes(b"BTLF").u8(0).u8(kind as u8);
        for record in records {
            enc.bytes(record);
        }
        enc.u32(0x1234_5678);
        enc.finish()
    }

    /// Encode a V2 internal node at `depth` using the tree's layout widths.
    pub fn v2_internal(
        &self,
        kind: RecordKind,
        layout: &NodeLayout,
        depth: u16,
        records: &[Vec<u8>],
        pointers: &[V2Pointer],
    ) -> Vec<u8> {
        assert_eq!(pointers.len(), records.len() + 1);
        let mut enc = self.encoder();
        enc.bytes(b"BTIN").u8(0).u8(kind as u8);
        for record in records {
            enc.bytes(record);
        }
        for pointer in pointers {
            enc.offset(pointer.address)
                .uint(pointer.record_count, layout.child_count_width());
            if let Some(width) = layout.subtree_count_width(depth) {
                enc.uint(pointer.total_records, width);
            }
        }
        enc.u32(0x8765_4321);
        enc.finish()
    }

    /// Encode a kind-10 (unfiltered chunk) record.
    pub fn chunk_record(&self, address: u64, scaled: &[u64]) -> Vec<u8> {
        let mut enc = self.encoder();
        enc.offset(address);
        for component in scaled {
            enc.u64(*component);
        }
        enc.finish()
    }
}

/// A reader that fails every read touching bytes at or past `fail_at`.
///
/// Seeks always succeed, so the failure surfaces from the first read that
/// crosses the cutoff.
pub struct FaultyReader {
    inner: Cursor<Vec<u8>>,
    fail_at: u64,
}

impl FaultyReader {
    pub const fn new(bytes: Vec<u8>, fail_at: u64) -> Self {
        Self {
            inner: Cursor::new(bytes),
            fail_at,
        }
    }
}

impl Read for FaultyReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let end = self.inner.position() + buf.len() as u64;
        if end > self.fail_at {
            return Err(std::io::Error::other("injected read fault"));
        }
        self.inner.read(buf)
    }
}

impl Seek for FaultyReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.inner.seek(pos)
    }
}

/// A reader that counts the seeks it is asked to perform.
///
/// Reporting the current position is not counted, matching readers such as
/// `BufReader` that answer it without dropping buffered bytes.
pub struct SeekCounter {
    inner: Cursor<Vec<u8>>,
    pub seeks: usize,
}

impl SeekCounter {
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self {
            inner: Cursor::new(bytes),
            seeks: 0,
        }
    }
}

impl Read for SeekCounter {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for SeekCounter {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.seeks += 1;
        self.inner.seek(pos)
    }

    fn stream_position(&mut self) -> std::io::Result<u64> {
        Ok(self.inner.position())
    }
}
