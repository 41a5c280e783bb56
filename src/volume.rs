use log::{debug, info};

use crate::alloc::BlockAllocator;
use crate::disk_format::block::{
    decode_pointer_table, BlockNumber, BLOCK_SIZE, EMPTY_BLOCK, SUPERBLOCK_NUMBER,
};
use crate::disk_format::inode::{Inode, FREE_INODE, INODES_PER_BLOCK, INODE_SIZE, MAX_FILE_BLOCKS};
use crate::disk_format::superblock::Superblock;
use crate::error::{Result, SsfsError};
use crate::mapper::map_offset;
use crate::storage::BlockStorage;

/// A mounted SSFS volume.
///
/// The handle owns the storage backend, the decoded superblock, and the
/// in-memory block bitmap; it exists only between a successful
/// [`Volume::mount`] and [`Volume::unmount`], so every file operation runs
/// against a mounted image by construction.
pub struct Volume<S: BlockStorage> {
    /// The storage backend the image lives on.
    storage: S,
    /// The superblock decoded at mount time.
    superblock: Superblock,
    /// Block usage, rebuilt at mount time from the inode trees.
    allocator: BlockAllocator,
}

impl<S: BlockStorage> Volume<S> {
    /// Writes a fresh filesystem onto `storage`: a superblock and enough
    /// zeroed inode blocks for `inodes` slots (at least one block). Data
    /// blocks are left untouched.
    ///
    /// Fails with [`SsfsError::OutOfSpace`] when the backend is too small to
    /// hold the metadata plus at least one data block.
    pub fn format(storage: &S, inodes: u32) -> Result<()> {
        let inodes = inodes.max(1);
        let num_inode_blocks = inodes.div_ceil(INODES_PER_BLOCK as u32);

        let num_blocks = storage.block_count();
        if num_blocks <= num_inode_blocks + 1 {
            return Err(SsfsError::OutOfSpace);
        }

        let superblock = Superblock::new(num_blocks, num_inode_blocks);
        storage.write_block(SUPERBLOCK_NUMBER, &superblock.encode())?;

        for number in 1..=num_inode_blocks {
            storage.write_block(number, &EMPTY_BLOCK)?;
        }

        storage.sync()?;
        info!("formatted image: {num_blocks} blocks, {num_inode_blocks} inode blocks");

        Ok(())
    }

    /// Mounts the image on `storage`: verifies the magic and rebuilds the
    /// block bitmap by walking the pointer tree of every valid inode.
    pub fn mount(storage: S) -> Result<Self> {
        let superblock = Superblock::decode(&storage.read_block(SUPERBLOCK_NUMBER)?)?;
        let allocator = BlockAllocator::new(superblock.num_blocks, superblock.num_inode_blocks);

        let mut volume = Self {
            storage,
            superblock,
            allocator,
        };
        volume.rebuild_bitmap()?;

        info!(
            "mounted image: {} blocks, {} in use",
            volume.superblock.num_blocks,
            volume.allocator.used_count()
        );

        Ok(volume)
    }

    /// Unmounts the volume, flushing the backend.
    ///
    /// State is torn down whether or not the flush succeeds; a flush failure
    /// is reported after the fact.
    pub fn unmount(self) -> Result<()> {
        let result = self.storage.sync();
        info!("unmounted image");

        result
    }

    /// Reserves every block reachable from the valid inodes.
    fn rebuild_bitmap(&mut self) -> Result<()> {
        for inum in 0..self.superblock.inode_count() {
            let inode = self.read_inode(inum)?;
            if !inode.is_allocated() {
                continue;
            }

            for &number in &inode.direct {
                if number != 0 {
                    self.allocator.reserve(number);
                }
            }

            if inode.indirect != 0 {
                self.reserve_table(inode.indirect)?;
            }

            if inode.double_indirect != 0 {
                self.allocator.reserve(inode.double_indirect);
                let outer = decode_pointer_table(&self.storage.read_block(inode.double_indirect)?);

                for &inner in outer.iter().filter(|&&number| number != 0) {
                    self.reserve_table(inner)?;
                }
            }
        }

        Ok(())
    }

    /// Reserves an indirect table and every block it points at.
    fn reserve_table(&mut self, table_number: BlockNumber) -> Result<()> {
        self.allocator.reserve(table_number);

        let table = decode_pointer_table(&self.storage.read_block(table_number)?);
        for &number in table.iter().filter(|&&number| number != 0) {
            self.allocator.reserve(number);
        }

        Ok(())
    }

    /// Reads the inode record at `inum`.
    fn read_inode(&self, inum: u32) -> Result<Inode> {
        if inum >= self.superblock.inode_count() {
            return Err(SsfsError::InvalidInode);
        }

        let block = self.storage.read_block(Inode::containing_block(inum))?;
        let offset = Inode::offset_within_block(inum);

        Inode::decode(&block[offset..offset + INODE_SIZE])
    }

    /// Writes the inode record at `inum`, preserving the other 31 records of
    /// its containing block.
    fn write_inode(&self, inum: u32, inode: &Inode) -> Result<()> {
        if inum >= self.superblock.inode_count() {
            return Err(SsfsError::InvalidInode);
        }

        let number = Inode::containing_block(inum);
        let offset = Inode::offset_within_block(inum);

        let mut block = self.storage.read_block(number)?;
        block[offset..offset + INODE_SIZE].copy_from_slice(&inode.encode());

        self.storage.write_block(number, &block)
    }

    /// Creates an empty file in the first free inode slot, in numerical
    /// order, and returns its inode number.
    ///
    /// Fails with [`SsfsError::OutOfInodes`] when every slot is in use.
    pub fn create(&mut self) -> Result<u32> {
        for inum in 0..self.superblock.inode_count() {
            if self.read_inode(inum)?.is_allocated() {
                continue;
            }

            self.write_inode(inum, &Inode::allocated())?;
            debug!("created inode {inum}");

            return Ok(inum);
        }

        Err(SsfsError::OutOfInodes)
    }

    /// The size in bytes of the file at `inum`.
    pub fn stat(&self, inum: u32) -> Result<u32> {
        let inode = self.read_inode(inum)?;
        if !inode.is_allocated() {
            return Err(SsfsError::InvalidInode);
        }

        Ok(inode.size)
    }

    /// Deletes the file at `inum`, returning every block reachable from its
    /// pointer tree to the pool and freeing the inode slot.
    pub fn delete(&mut self, inum: u32) -> Result<()> {
        let inode = self.read_inode(inum)?;
        if !inode.is_allocated() {
            return Err(SsfsError::InvalidInode);
        }

        for &number in &inode.direct {
            self.allocator.free(number);
        }

        if inode.indirect != 0 {
            self.free_table(inode.indirect)?;
        }

        if inode.double_indirect != 0 {
            let outer = decode_pointer_table(&self.storage.read_block(inode.double_indirect)?);

            for &inner in outer.iter().filter(|&&number| number != 0) {
                self.free_table(inner)?;
            }

            self.allocator.free(inode.double_indirect);
        }

        self.write_inode(inum, &FREE_INODE)?;
        debug!("deleted inode {inum}");

        Ok(())
    }

    /// Frees every block an indirect table points at, then the table itself.
    fn free_table(&mut self, table_number: BlockNumber) -> Result<()> {
        let table = decode_pointer_table(&self.storage.read_block(table_number)?);

        for &number in table.iter() {
            self.allocator.free(number);
        }

        self.allocator.free(table_number);

        Ok(())
    }

    /// Reads from the file at `inum` starting at byte `offset`, filling as
    /// much of `buf` as the file's size allows. Holes read as zero bytes.
    ///
    /// Returns the number of bytes read. A backend failure after partial
    /// progress yields the short count instead of an error.
    pub fn read(&mut self, inum: u32, buf: &mut [u8], offset: u64) -> Result<usize> {
        let mut inode = self.read_inode(inum)?;
        if !inode.is_allocated() {
            return Err(SsfsError::InvalidInode);
        }

        let size = inode.size as u64;
        if offset >= size || buf.is_empty() {
            return Ok(0);
        }

        let len = buf.len().min((size - offset) as usize);
        let mut transferred = 0;

        while transferred < len {
            let position = offset + transferred as u64;
            let within = (position % BLOCK_SIZE as u64) as usize;
            let chunk = (BLOCK_SIZE - within).min(len - transferred);

            let resolved = map_offset(&self.storage, &mut self.allocator, &mut inode, position, false);
            let block = match resolved {
                Ok(mapping) => mapping.block,
                Err(_) if transferred > 0 => return Ok(transferred),
                Err(err) => return Err(err),
            };

            match block {
                None => buf[transferred..transferred + chunk].fill(0),
                Some(number) => match self.storage.read_block(number) {
                    Ok(block) => {
                        buf[transferred..transferred + chunk]
                            .copy_from_slice(&block[within..within + chunk]);
                    }
                    Err(_) if transferred > 0 => return Ok(transferred),
                    Err(err) => return Err(err),
                },
            }

            transferred += chunk;
        }

        Ok(len)
    }

    /// Writes `buf` into the file at `inum` starting at byte `offset`,
    /// allocating blocks as needed. Writing past the current end first
    /// zero-fills the region between the old size and `offset`.
    ///
    /// Returns the number of bytes written. When space or the backend runs
    /// out partway, the inode is persisted to reflect the bytes actually
    /// written and the short count is returned; an error is returned when
    /// nothing was written, or when the copy completed but the inode record
    /// itself could not be written back.
    pub fn write(&mut self, inum: u32, buf: &[u8], offset: u64) -> Result<usize> {
        let mut inode = self.read_inode(inum)?;
        if !inode.is_allocated() {
            return Err(SsfsError::InvalidInode);
        }

        if offset / BLOCK_SIZE as u64 >= MAX_FILE_BLOCKS as u64 {
            return Err(SsfsError::InvalidOffset);
        }

        let mut inode_dirty = false;

        if offset > inode.size as u64 {
            if let Err(err) = self.zero_fill(&mut inode, offset, &mut inode_dirty) {
                if inode_dirty {
                    // Keep any pointer slots that already committed
                    // reachable from the inode.
                    let _ = self.write_inode(inum, &inode);
                }
                return Err(err);
            }
        }

        let mut written = 0;
        let outcome = self.write_payload(&mut inode, buf, offset, &mut written, &mut inode_dirty);

        let persisted = if inode_dirty {
            self.write_inode(inum, &inode)
        } else {
            Ok(())
        };

        // A stride failure after partial progress is the short-count case;
        // a failure to persist the inode after a complete copy is not, since
        // the bytes the caller was promised are unreachable through the
        // stale on-disk size.
        match (outcome, persisted, written) {
            (Err(_), _, written) if written > 0 => Ok(written),
            (Err(err), _, _) => Err(err),
            (Ok(()), Err(err), _) => Err(err),
            (Ok(()), Ok(()), written) => Ok(written),
        }
    }

    /// Zero-fills the region between the inode's current size and `target`,
    /// allocating the blocks that fall in the gap. Freshly allocated blocks
    /// are already zero on disk and are not rewritten; only the covered
    /// suffix of the last pre-existing block is.
    fn zero_fill(&mut self, inode: &mut Inode, target: u64, inode_dirty: &mut bool) -> Result<()> {
        let mut position = inode.size as u64;

        while position < target {
            let within = (position % BLOCK_SIZE as u64) as usize;
            let chunk = ((BLOCK_SIZE - within) as u64).min(target - position) as usize;

            let mapping =
                map_offset(&self.storage, &mut self.allocator, inode, position, true)?;
            *inode_dirty |= mapping.inode_dirty;

            if !mapping.fresh {
                let number = mapping.block.expect("mapping with allocate resolves a block");
                let mut block = self.storage.read_block(number)?;
                block[within..within + chunk].fill(0);
                self.storage.write_block(number, &block)?;
            }

            position += chunk as u64;
        }

        inode.size = target as u32;
        *inode_dirty = true;

        Ok(())
    }

    /// The block-strided copy loop behind [`Volume::write`]. Progress is
    /// reported through `written` and `inode_dirty` so the caller can
    /// persist partial progress when a stride fails.
    fn write_payload(
        &mut self,
        inode: &mut Inode,
        buf: &[u8],
        offset: u64,
        written: &mut usize,
        inode_dirty: &mut bool,
    ) -> Result<()> {
        while *written < buf.len() {
            let position = offset + *written as u64;
            let within = (position % BLOCK_SIZE as u64) as usize;
            let chunk = (BLOCK_SIZE - within).min(buf.len() - *written);

            let mapping = map_offset(&self.storage, &mut self.allocator, inode, position, true)?;
            *inode_dirty |= mapping.inode_dirty;

            let number = mapping.block.expect("mapping with allocate resolves a block");

            // Read-modify-write, skipped when the stride covers the whole
            // block or the block is known to be zero.
            let mut block = if mapping.fresh || chunk == BLOCK_SIZE {
                EMPTY_BLOCK
            } else {
                self.storage.read_block(number)?
            };

            block[within..within + chunk].copy_from_slice(&buf[*written..*written + chunk]);
            self.storage.write_block(number, &block)?;

            *written += chunk;

            let end = offset + *written as u64;
            if end > inode.size as u64 {
                inode.size = end as u32;
                *inode_dirty = true;
            }
        }

        Ok(())
    }

    /// The superblock decoded at mount time.
    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    /// The number of blocks currently marked used, metadata included.
    pub fn allocated_block_count(&self) -> usize {
        self.allocator.used_count()
    }

    /// Whether the block at `number` is currently marked used.
    pub fn is_block_allocated(&self, number: BlockNumber) -> bool {
        self.allocator.is_used(number)
    }
}
