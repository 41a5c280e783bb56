use serde::{Deserialize, Serialize};

use crate::error::{Result, SsfsError};

use super::block::{Block, BlockNumber, EMPTY_BLOCK};
use super::inode::INODES_PER_BLOCK;

/// The 16-byte magic that identifies an SSFS image.
pub const MAGIC: [u8; 16] = *b"\xf0ULIEGEINFO0940\x0f";

/// The number of bytes occupied by the superblock fields.
pub const SUPERBLOCK_SIZE: usize = 28;
const_assert!(MAGIC.len() + 3 * 4 == SUPERBLOCK_SIZE);

/// The superblock, stored in the first [`SUPERBLOCK_SIZE`] bytes of block 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Superblock {
    /// The filesystem magic. Must equal [`MAGIC`] byte-for-byte.
    pub magic: [u8; 16],
    /// The number of blocks in the underlying image.
    pub num_blocks: u32,
    /// The number of blocks occupied by inodes.
    pub num_inode_blocks: u32,
    /// The block size the image was formatted with.
    pub block_size: u32,
}

impl Superblock {
    /// Constructs a new [`Superblock`] instance for an image of `num_blocks`
    /// blocks with `num_inode_blocks` inode blocks.
    #[must_use]
    pub fn new(num_blocks: u32, num_inode_blocks: u32) -> Self {
        Self {
            magic: MAGIC,
            num_blocks,
            num_inode_blocks,
            block_size: super::block::BLOCK_SIZE as u32,
        }
    }

    /// Serializes the superblock into a zero-padded block.
    #[must_use]
    pub fn encode(&self) -> Block {
        let bytes = bincode::serialize(self).expect("superblock fields are fixed-width");

        let mut block = EMPTY_BLOCK;
        block[..SUPERBLOCK_SIZE].copy_from_slice(&bytes);
        block
    }

    /// Deserializes a superblock from block 0 of an image.
    ///
    /// Fails with [`SsfsError::CorruptImage`] when the magic does not match.
    /// The stored `block_size` is read but not validated.
    pub fn decode(block: &Block) -> Result<Self> {
        let superblock: Superblock = bincode::deserialize(&block[..SUPERBLOCK_SIZE])?;

        if superblock.magic != MAGIC {
            return Err(SsfsError::CorruptImage);
        }

        Ok(superblock)
    }

    /// The number of inode slots addressed by the image.
    #[must_use]
    pub fn inode_count(&self) -> u32 {
        self.num_inode_blocks * INODES_PER_BLOCK as u32
    }

    /// The first block number available for data and indirect blocks.
    #[must_use]
    pub fn first_data_block(&self) -> BlockNumber {
        self.num_inode_blocks + 1
    }
}
