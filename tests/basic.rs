//! File operations over freshly formatted in-memory images.

mod common;

use common::memory_volume;

use ssfs::disk_format::block::{BLOCK_SIZE, EMPTY_BLOCK};
use ssfs::disk_format::superblock::MAGIC;
use ssfs::storage::{BlockStorage, MemoryDisk};
use ssfs::{SsfsError, Volume};

#[test]
fn test_format_writes_magic_and_clears_inodes() {
    let disk = MemoryDisk::new(10);
    Volume::format(&disk, 2).unwrap();

    let superblock = disk.read_block(0).unwrap();
    assert_eq!(&superblock[..16], &MAGIC);
    assert_eq!(disk.read_block(1).unwrap(), EMPTY_BLOCK);

    let volume = Volume::mount(disk).unwrap();
    assert_eq!(volume.superblock().num_blocks, 10);
    assert_eq!(volume.superblock().num_inode_blocks, 1);
}

#[test]
fn test_format_requires_room_for_a_data_block() {
    let disk = MemoryDisk::new(2);
    assert!(matches!(
        Volume::format(&disk, 1),
        Err(SsfsError::OutOfSpace)
    ));
}

#[test]
fn test_mount_rejects_an_unformatted_image() {
    let disk = MemoryDisk::new(10);
    assert!(matches!(
        Volume::mount(disk),
        Err(SsfsError::CorruptImage)
    ));
}

#[test]
fn test_hello_world_round_trip() {
    let (_, mut volume) = memory_volume(100, 10);
    let inum = volume.create().unwrap();
    assert_eq!(inum, 0);

    let data = b"Hello, world!";
    assert_eq!(volume.write(inum, data, 0).unwrap(), 13);
    assert_eq!(volume.stat(inum).unwrap(), 13);

    let mut buf = [0; 13];
    assert_eq!(volume.read(inum, &mut buf, 0).unwrap(), 13);
    assert_eq!(&buf, data);
}

#[test]
fn test_sparse_writes() {
    let (_, mut volume) = memory_volume(100, 10);
    let inum = volume.create().unwrap();

    assert_eq!(volume.write(inum, b"Start of file", 0).unwrap(), 13);
    assert_eq!(volume.write(inum, b"Middle of file", 10000).unwrap(), 14);
    assert_eq!(volume.write(inum, b"End of file", 20000).unwrap(), 11);
    assert_eq!(volume.stat(inum).unwrap(), 20011);

    let mut buf = [0xff; 14];
    assert_eq!(volume.read(inum, &mut buf[..13], 0).unwrap(), 13);
    assert_eq!(&buf[..13], b"Start of file");

    assert_eq!(volume.read(inum, &mut buf, 10000).unwrap(), 14);
    assert_eq!(&buf, b"Middle of file");

    assert_eq!(volume.read(inum, &mut buf[..11], 20000).unwrap(), 11);
    assert_eq!(&buf[..11], b"End of file");

    // The gap between writes reads as zeroes.
    let mut gap = [0xff; 10];
    assert_eq!(volume.read(inum, &mut gap, 100).unwrap(), 10);
    assert_eq!(gap, [0; 10]);
}

#[test]
fn test_gap_before_first_write_reads_as_zeroes() {
    let (_, mut volume) = memory_volume(100, 10);
    let inum = volume.create().unwrap();

    assert_eq!(volume.write(inum, b"data", 5000).unwrap(), 4);
    assert_eq!(volume.stat(inum).unwrap(), 5004);

    let mut gap = vec![0xff; 5000];
    assert_eq!(volume.read(inum, &mut gap, 0).unwrap(), 5000);
    assert!(gap.iter().all(|&byte| byte == 0));
}

#[test]
fn test_partial_block_overwrite() {
    let (_, mut volume) = memory_volume(100, 10);
    let inum = volume.create().unwrap();

    let initial = b"Initial content that will be partially overwritten";
    let patch = b"content which overwrites";
    assert_eq!(volume.write(inum, initial, 0).unwrap(), initial.len());
    assert_eq!(volume.write(inum, patch, 8).unwrap(), patch.len());

    // Only the patched range changes; the file keeps its original length.
    let mut expected = initial.to_vec();
    expected[8..8 + patch.len()].copy_from_slice(patch);

    let mut buf = vec![0; initial.len()];
    assert_eq!(volume.read(inum, &mut buf, 0).unwrap(), initial.len());
    assert_eq!(buf, expected);
    assert_eq!(volume.stat(inum).unwrap(), initial.len() as u32);
}

#[test]
fn test_write_spanning_the_indirect_boundary() {
    let (_, mut volume) = memory_volume(100, 10);
    let inum = volume.create().unwrap();

    // Crosses from the last direct block into the indirect table.
    let data: Vec<u8> = (0..3 * BLOCK_SIZE).map(|i| i as u8).collect();
    let offset = 3 * BLOCK_SIZE as u64 - 100;
    assert_eq!(volume.write(inum, &data, offset).unwrap(), data.len());

    let mut buf = vec![0; data.len()];
    assert_eq!(volume.read(inum, &mut buf, offset).unwrap(), data.len());
    assert_eq!(buf, data);
}

#[test]
fn test_write_through_the_double_indirect_tree() {
    let (_, mut volume) = memory_volume(1024, 10);
    let inum = volume.create().unwrap();

    // The first file block served by the double-indirect tree.
    let offset = (4 + 256) * BLOCK_SIZE as u64;
    assert_eq!(volume.write(inum, b"far out", offset).unwrap(), 7);
    assert_eq!(volume.stat(inum).unwrap(), offset as u32 + 7);

    let mut buf = [0; 7];
    assert_eq!(volume.read(inum, &mut buf, offset).unwrap(), 7);
    assert_eq!(&buf, b"far out");
}

#[test]
fn test_write_beyond_the_addressable_range() {
    let (_, mut volume) = memory_volume(100, 10);
    let inum = volume.create().unwrap();

    let offset = 65796 * BLOCK_SIZE as u64;
    assert!(matches!(
        volume.write(inum, b"x", offset),
        Err(SsfsError::InvalidOffset)
    ));
}

#[test]
fn test_full_image_yields_a_short_count() {
    // One inode block leaves eight data blocks.
    let (_, mut volume) = memory_volume(10, 2);
    let inum = volume.create().unwrap();

    // Four direct blocks, then the indirect table and three leaves exhaust
    // the image: 7 KiB of the 9 KiB fit.
    let buf = vec![0xbb; 9 * BLOCK_SIZE];
    assert_eq!(volume.write(inum, &buf, 0).unwrap(), 7 * BLOCK_SIZE);
    assert_eq!(volume.stat(inum).unwrap(), 7 * BLOCK_SIZE as u32);

    // With nothing persisted, the failure surfaces as an error instead.
    assert!(matches!(
        volume.write(inum, &buf, 7 * BLOCK_SIZE as u64),
        Err(SsfsError::OutOfSpace)
    ));
}

#[test]
fn test_deleted_blocks_are_recycled_first_available() {
    let (_, mut volume) = memory_volume(64, 1);

    let first = volume.create().unwrap();
    volume.write(first, &[1], 0).unwrap();
    assert!(volume.is_block_allocated(2));

    let second = volume.create().unwrap();
    volume.write(second, &[2], 0).unwrap();
    assert!(volume.is_block_allocated(3));

    volume.delete(first).unwrap();
    assert!(!volume.is_block_allocated(2));

    // The freed inode slot and the freed block both come back first.
    let third = volume.create().unwrap();
    assert_eq!(third, first);
    volume.write(third, &[3], 0).unwrap();
    assert!(volume.is_block_allocated(2));
}

#[test]
fn test_files_do_not_share_blocks() {
    let (_, mut volume) = memory_volume(100, 10);

    let first = volume.create().unwrap();
    let second = volume.create().unwrap();

    let ones = vec![0x11; 3 * BLOCK_SIZE];
    let twos = vec![0x22; 3 * BLOCK_SIZE];
    volume.write(first, &ones, 0).unwrap();
    volume.write(second, &twos, 0).unwrap();

    // Deleting one file and filling its blocks with new data must leave the
    // other file untouched.
    volume.delete(first).unwrap();
    let third = volume.create().unwrap();
    volume.write(third, &vec![0x33; 4 * BLOCK_SIZE], 0).unwrap();

    let mut buf = vec![0; twos.len()];
    assert_eq!(volume.read(second, &mut buf, 0).unwrap(), twos.len());
    assert_eq!(buf, twos);
}
