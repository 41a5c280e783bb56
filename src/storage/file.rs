use std::fs::File;
use std::io;
use std::os::unix::prelude::FileExt;
use std::path::Path;

use crate::disk_format::block::{Block, BlockNumber, BLOCK_SIZE, EMPTY_BLOCK};
use crate::error::Result;

use super::BlockStorage;

/// An SSFS image backed by a regular file, one block per 1024-byte stride.
pub struct FileBackedDisk {
    /// The backing image file.
    file: File,
    /// The image size in whole blocks, fixed at open time.
    block_count: u32,
}

impl FileBackedDisk {
    /// Opens the image at `path`, creating an empty file if none exists.
    ///
    /// The block count is the file's current length in whole blocks; opening
    /// never grows the file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let block_count = (file.metadata()?.len() / BLOCK_SIZE as u64) as u32;

        Ok(Self { file, block_count })
    }

    /// Creates (or truncates) an image file sized to `block_count` blocks.
    pub fn create(path: impl AsRef<Path>, block_count: u32) -> Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(block_count as u64 * BLOCK_SIZE as u64)?;

        Ok(Self { file, block_count })
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

impl BlockStorage for FileBackedDisk {
    fn block_count(&self) -> u32 {
        self.block_count
    }

    fn read_block(&self, number: BlockNumber) -> Result<Block> {
        self.check_bounds(number)?;

        let mut block = EMPTY_BLOCK;
        self.file
            .read_exact_at(&mut block, number as u64 * BLOCK_SIZE as u64)?;

        Ok(block)
    }

    fn write_block(&self, number: BlockNumber, block: &Block) -> Result<()> {
        self.check_bounds(number)?;

        self.file
            .write_all_at(block, number as u64 * BLOCK_SIZE as u64)?;

        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.file.sync_all()?;

        Ok(())
    }
}
