use std::io;
use std::sync::{Arc, Mutex};

use crate::disk_format::block::{Block, BlockNumber, BLOCK_SIZE, EMPTY_BLOCK};
use crate::error::Result;

use super::BlockStorage;

/// An SSFS image held entirely in memory.
///
/// Clones share the same backing buffer, so a "remounted" clone observes
/// everything written before the previous volume was torn down.
#[derive(Clone)]
pub struct MemoryDisk {
    /// The backing buffer, one 1024-byte stride per block.
    blocks: Arc<Mutex<Vec<u8>>>,
    /// The image size in blocks.
    block_count: u32,
}

impl MemoryDisk {
    /// Constructs a zero-filled image of `block_count` blocks.
    #[must_use]
    pub fn new(block_count: u32) -> Self {
        Self {
            blocks: Arc::new(Mutex::new(vec![0; block_count as usize * BLOCK_SIZE])),
            block_count,
        }
    }

    /// Fails with an I/O error when `number` lies beyond the image.
    fn check_bounds(&self, number: BlockNumber) -> Result<()> {
        if number >= self.block_count {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("block {number} beyond image of {} blocks", self.block_count),
            )
            .into());
        }

        Ok(())
    }
}

impl BlockStorage for MemoryDisk {
    fn block_count(&self) -> u32 {
        self.block_count
    }

    fn read_block(&self, number: BlockNumber) -> Result<Block> {
        self.check_bounds(number)?;

        let blocks = self.blocks.lock().expect("no poisoned locks");
        let start = number as usize * BLOCK_SIZE;

        let mut block = EMPTY_BLOCK;
        block.copy_from_slice(&blocks[start..start + BLOCK_SIZE]);
        Ok(block)
    }

    fn write_block(&self, number: BlockNumber, block: &Block) -> Result<()> {
        self.check_bounds(number)?;

        let mut blocks = self.blocks.lock().expect("no poisoned locks");
        let start = number as usize * BLOCK_SIZE;

        blocks[start..start + BLOCK_SIZE].copy_from_slice(block);
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}
