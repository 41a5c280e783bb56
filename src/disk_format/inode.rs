use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::error::Result;

use super::block::{BlockNumber, BLOCK_SIZE, POINTERS_PER_BLOCK};

/// The number of bytes occupied by an inode.
pub const INODE_SIZE: usize = 32;

const_assert!(BLOCK_SIZE % INODE_SIZE == 0);
/// The number of inodes that fit in a block.
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;

/// The number of direct block pointers held by an inode.
pub const NUM_DIRECT: usize = 4;

/// Zero bytes at the tail of the record, bringing it up to [`INODE_SIZE`].
const INODE_PADDING: usize = 3;
const_assert!(1 + 4 + NUM_DIRECT * 4 + 4 + 4 + INODE_PADDING == INODE_SIZE);

/// The largest file-relative block index addressable through an inode: the
/// direct slots, one indirect table, and a double-indirect table of tables.
pub const MAX_FILE_BLOCKS: usize =
    NUM_DIRECT + POINTERS_PER_BLOCK + POINTERS_PER_BLOCK * POINTERS_PER_BLOCK;

/// A free inode.
pub const FREE_INODE: Inode = Inode {
    state: InodeState::Free,
    size: 0,
    direct: [0; NUM_DIRECT],
    indirect: 0,
    double_indirect: 0,
    padding: [0; INODE_PADDING],
};

/// An inode, packed little-endian. Pointer value zero means "no block".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inode {
    /// Whether the inode describes a file or is free.
    pub state: InodeState,
    /// File size in bytes.
    pub size: u32,
    /// The block numbers of the first [`NUM_DIRECT`] blocks of the file.
    pub direct: [BlockNumber; NUM_DIRECT],
    /// The block number of the single-indirect table (or zero, if none).
    pub indirect: BlockNumber,
    /// The block number of the double-indirect table (or zero, if none).
    pub double_indirect: BlockNumber,
    /// Tail padding, always zero on disk.
    padding: [u8; INODE_PADDING],
}

/// The one-byte validity tag of an inode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum InodeState {
    /// Not in use for any file.
    Free = 0,
    /// Describes an existing file.
    Allocated = 1,
}

impl Inode {
    /// Constructs the record of a freshly created, empty file.
    #[must_use]
    pub fn allocated() -> Self {
        Inode {
            state: InodeState::Allocated,
            ..FREE_INODE
        }
    }

    /// Whether the inode describes an existing file.
    #[must_use]
    pub fn is_allocated(&self) -> bool {
        self.state == InodeState::Allocated
    }

    /// The block number of the inode block containing inode `inum`.
    #[must_use]
    pub fn containing_block(inum: u32) -> BlockNumber {
        // +1 because block 0 is the superblock
        1 + inum / INODES_PER_BLOCK as u32
    }

    /// The byte offset of inode `inum` within its containing block.
    #[must_use]
    pub fn offset_within_block(inum: u32) -> usize {
        (inum as usize % INODES_PER_BLOCK) * INODE_SIZE
    }

    /// Decodes an inode from its [`INODE_SIZE`]-byte on-disk record.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Serializes the inode into its on-disk record.
    #[must_use]
    pub fn encode(&self) -> [u8; INODE_SIZE] {
        bincode::serialize(self)
            .expect("inode fields are fixed-width")
            .try_into()
            .expect("an encoded inode is INODE_SIZE bytes")
    }
}
