//! Reader configuration.
//!
//! The container's global header decides how wide addresses and lengths are
//! and which byte order multi-byte scalars use. None of that can be learned
//! from a B-tree node itself, so the collaborator that parsed the global
//! header passes it in through a [`ReaderConfig`].
//!
//! # Environment Variables
//!
//! - `BTREE_INDEX_SIZE_OF_OFFSETS`: width of file addresses in bytes (default: `8`)
//! - `BTREE_INDEX_SIZE_OF_LENGTHS`: width of lengths in bytes (default: `8`)
//! - `BTREE_INDEX_BYTE_ORDER`: `little` or `big` (default: `little`)
//! - `BTREE_INDEX_MAX_DEPTH`: recursion cap for tree traversal (default: `64`)
//!
//! # Invariants
//!
//! - `size_of_offsets` and `size_of_lengths` are 1..=8 or 16
//! - `max_depth` is at least 1

use std::str::FromStr;

/// Byte order of multi-byte scalar fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl FromStr for ByteOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "little" | "le" => Ok(Self::Little),
            "big" | "be" => Ok(Self::Big),
            _ => Err(format!(
                "'{s}' is not a byte order (expected 'little' or 'big')"
            )),
        }
    }
}

/// Format parameters and limits for one traversal.
///
/// # Post-conditions
///
/// When constructed via `from_env()` or checked with `validate()`:
/// - both field widths are ones the container format allows
/// - `max_depth` is non-zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Width of a file address ("Size of Offsets").
    pub size_of_offsets: u8,
    /// Width of a length field ("Size of Lengths").
    pub size_of_lengths: u8,
    /// Byte order for every multi-byte scalar.
    pub byte_order: ByteOrder,
    /// Maximum nesting of tree nodes before traversal gives up.
    pub max_depth: usize,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
}

impl ReaderConfig {
    /// Default address width.
    pub const DEFAULT_SIZE_OF_OFFSETS: u8 = 8;
    /// Default length width.
    pub const DEFAULT_SIZE_OF_LENGTHS: u8 = 8;
    /// Default recursion cap.
    pub const DEFAULT_MAX_DEPTH: usize = 64;

    /// Create a configuration with the given field widths and default limits.
    #[must_use]
    pub const fn new(size_of_offsets: u8, size_of_lengths: u8) -> Self {
        Self {
            size_of_offsets,
            size_of_lengths,
            byte_order: ByteOrder::Little,
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }

    #[must_use]
    pub const fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// The address value the format uses for "no address".
    #[must_use]
    pub const fn undefined_address(&self) -> u64 {
        if self.size_of_offsets >= 8 {
            u64::MAX
        } else {
            (1u64 << (self.size_of_offsets as u32 * 8)) - 1
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Every variable is optional; unset variables take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but does not parse, or if the
    /// resulting configuration fails `validate()`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let size_of_offsets =
            Self::load_parsed("BTREE_INDEX_SIZE_OF_OFFSETS", Self::DEFAULT_SIZE_OF_OFFSETS)?;
        let size_of_lengths =
            Self::load_parsed("BTREE_INDEX_SIZE_OF_LENGTHS", Self::DEFAULT_SIZE_OF_LENGTHS)?;
        let byte_order = Self::load_parsed("BTREE_INDEX_BYTE_ORDER", ByteOrder::Little)?;
        let max_depth = Self::load_parsed("BTREE_INDEX_MAX_DEPTH", Self::DEFAULT_MAX_DEPTH)?;

        let config = Self {
            size_of_offsets,
            size_of_lengths,
            byte_order,
            max_depth,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that the widths are ones the format allows.
    ///
    /// 16-byte widths are legal in the format and pass here; the byte source
    /// rejects them separately as unsupported.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::validate_width("BTREE_INDEX_SIZE_OF_OFFSETS", self.size_of_offsets)?;
        Self::validate_width("BTREE_INDEX_SIZE_OF_LENGTHS", self.size_of_lengths)?;
        if self.max_depth == 0 {
            return Err(ConfigError::InvalidValue {
                name: "BTREE_INDEX_MAX_DEPTH".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    fn validate_width(name: &str, width: u8) -> Result<(), ConfigError> {
        if matches!(width, 1..=8 | 16) {
            Ok(())
        } else {
            Err(ConfigError::InvalidValue {
                name: name.to_string(),
                message: format!("{width} is not a valid field width (must be 1-8 or 16)"),
            })
        }
    }

    /// Load and parse an optional variable.
    ///
    /// Returns the default if not set.
    fn load_parsed<T>(name: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match std::env::var(name) {
            Ok(value) => value
                .trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidValue {
                    name: name.to_string(),
                    message: format!("'{value}': {e}"),
                }),
            Err(_) => Ok(default),
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SIZE_OF_OFFSETS, Self::DEFAULT_SIZE_OF_LENGTHS)
    }
}
