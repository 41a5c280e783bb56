use std::io;

use thiserror::Error;

/// A specialized result type for SSFS operations.
pub type Result<T> = std::result::Result<T, SsfsError>;

/// The errors surfaced by SSFS operations.
///
/// Every kind carries a stable negative code (see [`SsfsError::code`]) for
/// surfaces that report errors numerically.
#[derive(Debug, Error)]
pub enum SsfsError {
    /// A mount or format was attempted while an image is mounted.
    #[error("an image is already mounted")]
    DiskAlreadyMounted,
    /// A file operation or unmount was attempted with no image mounted.
    #[error("no image is mounted")]
    DiskNotMounted,
    /// The image's magic (or an on-disk record) failed to decode.
    #[error("the image is not a valid SSFS filesystem")]
    CorruptImage,
    /// An inode number is out of range or refers to a free slot.
    #[error("invalid inode number")]
    InvalidInode,
    /// An offset lies outside the range addressable through an inode.
    #[error("offset outside the addressable range")]
    InvalidOffset,
    /// No free data block, or too few blocks to format the image.
    #[error("no space left on the image")]
    OutOfSpace,
    /// Every inode slot is in use.
    #[error("no free inode slots")]
    OutOfInodes,
    /// A failure reported by the storage backend, passed through.
    #[error("storage backend failure: {0}")]
    Backend(#[from] io::Error),
}

impl SsfsError {
    /// The stable negative code identifying this error kind.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            SsfsError::DiskAlreadyMounted => -1,
            SsfsError::DiskNotMounted => -2,
            SsfsError::CorruptImage => -3,
            SsfsError::InvalidInode => -4,
            SsfsError::InvalidOffset => -5,
            SsfsError::OutOfSpace => -6,
            SsfsError::OutOfInodes => -7,
            SsfsError::Backend(_) => -8,
        }
    }
}

impl From<bincode::Error> for SsfsError {
    fn from(_: bincode::Error) -> Self {
        SsfsError::CorruptImage
    }
}
