//! Shared helpers for the integration tests.
#![allow(unused)]

use ssfs::storage::MemoryDisk;
use ssfs::Volume;

/// Formats a fresh in-memory image and mounts it, handing back a clone of
/// the disk so tests can inspect raw blocks or remount later.
pub fn memory_volume(blocks: u32, inodes: u32) -> (MemoryDisk, Volume<MemoryDisk>) {
    let disk = MemoryDisk::new(blocks);
    Volume::format(&disk, inodes).expect("formatting a fresh image");
    let volume = Volume::mount(disk.clone()).expect("mounting a fresh image");

    (disk, volume)
}

/// The per-block usage flags of a mounted volume.
pub fn bitmap_snapshot(volume: &Volume<MemoryDisk>) -> Vec<bool> {
    (0..volume.superblock().num_blocks)
        .map(|number| volume.is_block_allocated(number))
        .collect()
}
