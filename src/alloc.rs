use log::{debug, warn};

use crate::disk_format::block::BlockNumber;
use crate::error::{Result, SsfsError};

/// The in-memory bitmap of block usage.
///
/// The bitmap is never persisted: it is rebuilt at mount time by walking the
/// pointer trees of every valid inode.
pub(crate) struct BlockAllocator {
    /// One in-use flag per block of the image.
    bitmap: Vec<bool>,
    /// The first block number eligible for allocation (just past the
    /// superblock and the inode blocks).
    first_data_block: BlockNumber,
}

impl BlockAllocator {
    /// Constructs a bitmap for an image of `num_blocks` blocks with the
    /// superblock and all `num_inode_blocks` inode blocks marked used.
    pub fn new(num_blocks: u32, num_inode_blocks: u32) -> Self {
        let mut bitmap = vec![false; num_blocks as usize];

        for flag in bitmap.iter_mut().take(num_inode_blocks as usize + 1) {
            *flag = true;
        }

        Self {
            bitmap,
            first_data_block: num_inode_blocks + 1,
        }
    }

    /// Claims the smallest free block, strictly first-available.
    ///
    /// Fails with [`SsfsError::OutOfSpace`] when every data block is in use.
    pub fn allocate(&mut self) -> Result<BlockNumber> {
        let first = self.first_data_block as usize;

        for (number, used) in self.bitmap.iter_mut().enumerate().skip(first) {
            if !*used {
                *used = true;
                debug!("allocated block {number}");
                return Ok(number as BlockNumber);
            }
        }

        Err(SsfsError::OutOfSpace)
    }

    /// Releases a block back to the pool.
    ///
    /// Zero (the "no block" sentinel), metadata blocks, and out-of-range
    /// numbers are silently ignored.
    pub fn free(&mut self, number: BlockNumber) {
        let number = number as usize;

        if number >= self.first_data_block as usize && number < self.bitmap.len() {
            self.bitmap[number] = false;
            debug!("freed block {number}");
        }
    }

    /// Marks a block as used without searching. Used while rebuilding the
    /// bitmap at mount time.
    pub fn reserve(&mut self, number: BlockNumber) {
        match self.bitmap.get_mut(number as usize) {
            Some(used) => *used = true,
            None => warn!("ignoring out-of-range block pointer {number}"),
        }
    }

    /// Whether the block at `number` is currently marked used.
    pub fn is_used(&self, number: BlockNumber) -> bool {
        self.bitmap.get(number as usize).copied().unwrap_or(false)
    }

    /// The number of blocks currently marked used, metadata included.
    pub fn used_count(&self) -> usize {
        self.bitmap.iter().filter(|&&used| used).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_blocks_start_used() {
        let allocator = BlockAllocator::new(10, 1);

        assert!(allocator.is_used(0));
        assert!(allocator.is_used(1));
        assert!(!allocator.is_used(2));
        assert_eq!(allocator.used_count(), 2);
    }

    #[test]
    fn test_allocation_is_first_available_ascending() {
        let mut allocator = BlockAllocator::new(10, 1);

        for expected in 2..10 {
            assert_eq!(allocator.allocate().unwrap(), expected);
        }

        assert!(matches!(allocator.allocate(), Err(SsfsError::OutOfSpace)));
    }

    #[test]
    fn test_freed_block_is_reused_first() {
        let mut allocator = BlockAllocator::new(10, 1);

        for _ in 2..10 {
            allocator.allocate().unwrap();
        }

        allocator.free(5);
        allocator.free(3);

        assert_eq!(allocator.allocate().unwrap(), 3);
        assert_eq!(allocator.allocate().unwrap(), 5);
    }

    #[test]
    fn test_free_ignores_sentinel_metadata_and_out_of_range() {
        let mut allocator = BlockAllocator::new(10, 1);

        allocator.free(0);
        allocator.free(1);
        allocator.free(99);

        assert!(allocator.is_used(0));
        assert!(allocator.is_used(1));
        assert_eq!(allocator.used_count(), 2);
    }

    #[test]
    fn test_reserve_skips_the_search() {
        let mut allocator = BlockAllocator::new(10, 1);

        allocator.reserve(5);

        assert_eq!(allocator.allocate().unwrap(), 2);
        assert_eq!(allocator.allocate().unwrap(), 3);
        assert_eq!(allocator.allocate().unwrap(), 4);
        assert_eq!(allocator.allocate().unwrap(), 6);
    }
}
