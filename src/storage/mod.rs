/// File-backed SSFS storage.
mod file;
/// Memory-backed SSFS storage.
mod memory;

pub use file::FileBackedDisk;
pub use memory::MemoryDisk;

use crate::disk_format::block::{Block, BlockNumber};
use crate::error::Result;

/// A block-addressable storage backend for SSFS images.
///
/// Backends are free to buffer writes; durability is guaranteed only after
/// [`BlockStorage::sync`] returns.
pub trait BlockStorage {
    /// The number of blocks the backend can address.
    fn block_count(&self) -> u32;

    /// Reads the block at `number`.
    fn read_block(&self, number: BlockNumber) -> Result<Block>;

    /// Writes the block at `number`.
    fn write_block(&self, number: BlockNumber, block: &Block) -> Result<()>;

    /// Flushes buffered writes to durable media.
    fn sync(&self) -> Result<()>;
}
