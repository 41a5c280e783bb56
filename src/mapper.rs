//! Translation of file-relative byte offsets to physical blocks.
//!
//! An offset resolves through the inode's direct slots, then its
//! single-indirect table, then its double-indirect table of tables. With
//! allocation enabled, missing blocks along the path are created lazily:
//! every fresh block is zero-filled on disk before being linked, and a
//! modified table is persisted before its parent pointer commits.

use crate::alloc::BlockAllocator;
use crate::disk_format::block::{
    decode_pointer_table, encode_pointer_table, BlockNumber, BLOCK_SIZE, EMPTY_BLOCK,
    POINTERS_PER_BLOCK,
};
use crate::disk_format::inode::{Inode, NUM_DIRECT};
use crate::error::{Result, SsfsError};
use crate::storage::BlockStorage;

/// The result of resolving an offset.
pub(crate) struct Mapping {
    /// The physical block holding the offset, or `None` for a hole.
    pub block: Option<BlockNumber>,
    /// Whether the inode's own pointer fields were modified. The caller is
    /// responsible for writing the inode back.
    pub inode_dirty: bool,
    /// Whether the resolved data block was freshly allocated by this call
    /// (and is therefore known to be zero on disk).
    pub fresh: bool,
}

impl Mapping {
    /// A resolution that found no block and changed nothing.
    fn hole() -> Self {
        Mapping {
            block: None,
            inode_dirty: false,
            fresh: false,
        }
    }
}

/// Resolves `offset` within the file described by `inode`.
///
/// Without `allocate`, a missing block anywhere along the path yields a
/// hole. With `allocate`, the path is materialized; if any allocation or
/// backend write fails partway, every block reserved by this call is
/// returned to the allocator and the inode's own pointer fields are left
/// untouched (a fresh table commits to its field only after everything
/// beneath it succeeded). Pointer slots already committed to disk inside
/// table blocks are not rolled back.
///
/// Fails with [`SsfsError::InvalidOffset`] when `offset` lies beyond the
/// double-indirect capacity.
pub(crate) fn map_offset<S: BlockStorage>(
    storage: &S,
    allocator: &mut BlockAllocator,
    inode: &mut Inode,
    offset: u64,
    allocate: bool,
) -> Result<Mapping> {
    let mut reserved = Vec::new();
    let outcome = resolve(storage, allocator, inode, offset, allocate, &mut reserved);

    if outcome.is_err() {
        for number in reserved {
            allocator.free(number);
        }
    }

    outcome
}

/// The resolution walk behind [`map_offset`], recording every block it
/// reserves into `reserved` so the caller can roll the bitmap back.
fn resolve<S: BlockStorage>(
    storage: &S,
    allocator: &mut BlockAllocator,
    inode: &mut Inode,
    offset: u64,
    allocate: bool,
    reserved: &mut Vec<BlockNumber>,
) -> Result<Mapping> {
    let mut index = (offset / BLOCK_SIZE as u64) as usize;

    // Direct slots.
    if index < NUM_DIRECT {
        return match inode.direct[index] {
            0 if allocate => {
                let number = allocate_zeroed(storage, allocator, reserved)?;
                inode.direct[index] = number;

                Ok(Mapping {
                    block: Some(number),
                    inode_dirty: true,
                    fresh: true,
                })
            }
            0 => Ok(Mapping::hole()),
            number => Ok(Mapping {
                block: Some(number),
                inode_dirty: false,
                fresh: false,
            }),
        };
    }

    // The single-indirect table.
    index -= NUM_DIRECT;
    if index < POINTERS_PER_BLOCK {
        let (table_number, table_fresh) = match inode.indirect {
            0 if allocate => (allocate_zeroed(storage, allocator, reserved)?, true),
            0 => return Ok(Mapping::hole()),
            number => (number, false),
        };

        let block = resolve_slot(storage, allocator, table_number, index, allocate, reserved)?;

        // A fresh table commits to the inode only once the chain beneath it
        // has succeeded; on failure the field stays 0 and the rollback in
        // map_offset releases the table.
        if table_fresh {
            inode.indirect = table_number;
        }

        return Ok(Mapping {
            block: block.number,
            inode_dirty: table_fresh,
            fresh: block.fresh,
        });
    }

    // The double-indirect table of tables.
    index -= POINTERS_PER_BLOCK;
    if index < POINTERS_PER_BLOCK * POINTERS_PER_BLOCK {
        let (outer_number, outer_fresh) = match inode.double_indirect {
            0 if allocate => (allocate_zeroed(storage, allocator, reserved)?, true),
            0 => return Ok(Mapping::hole()),
            number => (number, false),
        };

        let outer_slot = index / POINTERS_PER_BLOCK;
        let inner_slot = index % POINTERS_PER_BLOCK;

        let inner = resolve_slot(storage, allocator, outer_number, outer_slot, allocate, reserved)?;
        let mapping = match inner.number {
            Some(inner_number) => {
                let block =
                    resolve_slot(storage, allocator, inner_number, inner_slot, allocate, reserved)?;

                Mapping {
                    block: block.number,
                    inode_dirty: outer_fresh,
                    fresh: block.fresh,
                }
            }
            None => Mapping {
                block: None,
                inode_dirty: outer_fresh,
                fresh: false,
            },
        };

        // As above: the field commits only after the whole chain resolved.
        if outer_fresh {
            inode.double_indirect = outer_number;
        }

        return Ok(mapping);
    }

    Err(SsfsError::InvalidOffset)
}

/// The outcome of inspecting one slot of a pointer table.
struct SlotOutcome {
    /// The block the slot refers to, or `None` for a hole.
    number: Option<BlockNumber>,
    /// Whether the block was freshly allocated into the slot.
    fresh: bool,
}

/// Inspects slot `slot` of the pointer table stored at `table_number`,
/// allocating a fresh block into it (and persisting the table) on demand.
fn resolve_slot<S: BlockStorage>(
    storage: &S,
    allocator: &mut BlockAllocator,
    table_number: BlockNumber,
    slot: usize,
    allocate: bool,
    reserved: &mut Vec<BlockNumber>,
) -> Result<SlotOutcome> {
    let mut table = decode_pointer_table(&storage.read_block(table_number)?);

    match table[slot] {
        0 if allocate => {
            let number = allocate_zeroed(storage, allocator, reserved)?;
            table[slot] = number;
            storage.write_block(table_number, &encode_pointer_table(&table))?;

            Ok(SlotOutcome {
                number: Some(number),
                fresh: true,
            })
        }
        0 => Ok(SlotOutcome {
            number: None,
            fresh: false,
        }),
        number => Ok(SlotOutcome {
            number: Some(number),
            fresh: false,
        }),
    }
}

/// Claims a free block and zero-fills it on disk before anything links to
/// it. The claim is recorded in `reserved` ahead of the write so a failed
/// write still rolls back.
fn allocate_zeroed<S: BlockStorage>(
    storage: &S,
    allocator: &mut BlockAllocator,
    reserved: &mut Vec<BlockNumber>,
) -> Result<BlockNumber> {
    let number = allocator.allocate()?;
    reserved.push(number);

    storage.write_block(number, &EMPTY_BLOCK)?;

    Ok(number)
}
