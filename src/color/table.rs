use bytemuck::{Pod, Zeroable};

use crate::error::TableError;
use crate::{Result, TABLE_MAGIC, TABLE_VERSION};

/// The header of a serialized color table.
///
/// This is stored identically in memory and on disk. It is followed by `count` color sets,
/// each written as `ceil(universe_size / 64)` little-endian words in id order.
#[derive(Debug, Clone, Copy, Zeroable, Pod)]
#[repr(C)]
pub struct TableHeader {
    /// Magic number identifying the table format
    magic: [u8; 8],

    /// Format version
    pub(crate) version: u8,

    reserved: [u8; 7],

    /// Width of every stored color set
    pub(crate) universe_size: u64,

    /// Number of stored color sets, including the pre-seeded ones
    pub(crate) count: u64,

    /// Maximum number of color sets, 0 if unbounded
    pub(crate) max_color_count: u64,
}

impl TableHeader {
    #[must_use]
    pub fn new(universe_size: u64, count: u64, max_color_count: u64) -> Self {
        Self {
            magic: *TABLE_MAGIC,
            version: TABLE_VERSION,
            reserved: [0; 7],
            universe_size,
            count,
            max_color_count,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header: Self = bytemuck::pod_read_unaligned(bytes);
        if header.magic != *TABLE_MAGIC {
            return Err(TableError::InvalidMagic.into());
        }
        if header.version != TABLE_VERSION {
            return Err(TableError::InvalidVersion(header.version).into());
        }
        Ok(header)
    }

    /// Number of 64 bit words per stored color set
    #[must_use]
    pub fn words_per_set(&self) -> usize {
        (self.universe_size as usize).div_ceil(64)
    }
}

pub const TABLE_HEADER_SIZE: usize = std::mem::size_of::<TableHeader>();
