#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! An implementation of the SSFS on-disk format and the operations over it.
//!
//! An SSFS image is a flat, block-structured file: block 0 holds the
//! superblock, the next `num_inode_blocks` blocks hold a dense array of
//! 32-byte inodes, and everything after that is handed out on demand to file
//! data and indirect pointer tables. Files are identified by integer inode
//! numbers; there are no directories or paths.

/// The in-memory block usage bitmap and its allocation policy.
mod alloc;
/// Constants and structures that define the SSFS disk format.
pub mod disk_format;
/// The error surface shared by every operation.
mod error;
/// Resolution of file offsets to physical blocks.
mod mapper;
/// Implementations of storage backends that support SSFS block I/O.
pub mod storage;
/// The mounted-volume handle and the file operations over it.
mod volume;

pub use error::{Result, SsfsError};
pub use volume::Volume;
