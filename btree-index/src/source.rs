//! Seekable byte source with the container format's typed reads.
//!
//! Wraps any `Read + Seek` and adds the reads every node decoder needs:
//! fixed-width scalars in the configured byte order, address- and
//! length-sized integers, signatures, and variable-width counts.
//!
//! Recursion into a child node goes through [`ByteSource::at`], which saves
//! the cursor, seeks to the child, runs the decode, and restores the cursor
//! before returning. The restore happens on the error path as well, so a
//! failed child decode never leaves the cursor inside the child.

use std::io::{Cursor, Read, Seek, SeekFrom};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};

use crate::config::{ByteOrder, ReaderConfig};
use crate::error::{FormatError, IndexError, Result};

/// A single logical cursor over the container's bytes.
///
/// Not safe to share between traversals: each traversal needs its own
/// `ByteSource` (for example over separate file handles).
#[derive(Debug)]
pub struct ByteSource<R> {
    inner: R,
    config: ReaderConfig,
}

impl ByteSource<Cursor<Vec<u8>>> {
    /// Create a source over an in-memory image.
    pub fn from_bytes(bytes: Vec<u8>, config: ReaderConfig) -> Result<Self> {
        Self::new(Cursor::new(bytes), config)
    }
}

impl<R: Read + Seek> ByteSource<R> {
    /// Wrap a reader.
    ///
    /// # Errors
    ///
    /// Returns a config error for widths the format does not allow, and
    /// `NotImplemented` for 16-byte widths, which the format allows but a
    /// `u64` cannot hold.
    pub fn new(inner: R, config: ReaderConfig) -> Result<Self> {
        config.validate()?;
        for (name, width) in [
            ("Size of Offsets", config.size_of_offsets),
            ("Size of Lengths", config.size_of_lengths),
        ] {
            if width > 8 {
                return Err(IndexError::NotImplemented(format!(
                    "{width}-byte {name} field"
                )));
            }
        }
        Ok(Self { inner, config })
    }

    #[must_use]
    pub const fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Consume the source and return the wrapped reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Current cursor position.
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Move the cursor to an absolute address.
    pub fn seek(&mut self, address: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(address))?;
        Ok(())
    }

    /// Move the cursor forward without reading.
    pub fn skip(&mut self, count: u64) -> Result<()> {
        let delta = i64::try_from(count).map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("cannot skip {count} bytes"),
            )
        })?;
        self.inner.seek(SeekFrom::Current(delta))?;
        Ok(())
    }

    /// Run `decode` with the cursor at `address`, then put the cursor back.
    ///
    /// The saved position is restored whether or not `decode` succeeds. If
    /// both the decode and the restore fail, the decode error is returned.
    pub fn at<T, F>(&mut self, address: u64, decode: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let saved = self.position()?;
        tracing::trace!(from = saved, to = address, "detour");
        let result = self.seek(address).and_then(|()| decode(self));
        let restored = self.seek(saved);
        let value = result?;
        restored?;
        Ok(value)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.inner.read_u8()?)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let value = match self.config.byte_order {
            ByteOrder::Little => self.inner.read_u16::<LittleEndian>()?,
            ByteOrder::Big => self.inner.read_u16::<BigEndian>()?,
        };
        Ok(value)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let value = match self.config.byte_order {
            ByteOrder::Little => self.inner.read_u32::<LittleEndian>()?,
            ByteOrder::Big => self.inner.read_u32::<BigEndian>()?,
        };
        Ok(value)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let value = match self.config.byte_order {
            ByteOrder::Little => self.inner.read_u64::<LittleEndian>()?,
            ByteOrder::Big => self.inner.read_u64::<BigEndian>()?,
        };
        Ok(value)
    }

    /// Read an unsigned integer `width` bytes wide (0..=8).
    ///
    /// A zero width reads nothing and yields 0.
    pub fn read_uint(&mut self, width: u8) -> Result<u64> {
        let nbytes = usize::from(width);
        let value = match (width, self.config.byte_order) {
            (0, _) => 0,
            (9.., _) => {
                return Err(IndexError::NotImplemented(format!(
                    "{width}-byte integer field"
                )));
            }
            (_, ByteOrder::Little) => self.inner.read_uint::<LittleEndian>(nbytes)?,
            (_, ByteOrder::Big) => self.inner.read_uint::<BigEndian>(nbytes)?,
        };
        Ok(value)
    }

    /// Read a raw "Size of Offsets" field.
    pub fn read_offset(&mut self) -> Result<u64> {
        self.read_uint(self.config.size_of_offsets)
    }

    /// Read an address, mapping the undefined address to `None`.
    pub fn read_address(&mut self) -> Result<Option<u64>> {
        let raw = self.read_offset()?;
        Ok((raw != self.config.undefined_address()).then_some(raw))
    }

    /// Read a "Size of Lengths" field.
    pub fn read_length(&mut self) -> Result<u64> {
        self.read_uint(self.config.size_of_lengths)
    }

    /// Read `N` raw bytes.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read a 4-byte signature and check it.
    pub fn expect_signature(&mut self, expected: &[u8; 4]) -> Result<()> {
        let address = self.position()?;
        let found = self.read_array::<4>()?;
        if &found != expected {
            return Err(FormatError::BadSignature {
                address,
                expected: *expected,
                found,
            }
            .into());
        }
        Ok(())
    }
}
