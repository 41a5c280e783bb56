/// Size of a block in bytes.
pub const BLOCK_SIZE: usize = 1024;

/// An SSFS block.
pub type Block = [u8; BLOCK_SIZE];

/// A physical block index within the image.
pub type BlockNumber = u32;

/// The block number of the superblock.
pub const SUPERBLOCK_NUMBER: BlockNumber = 0;

/// A block of all zeroes.
pub const EMPTY_BLOCK: Block = [0; BLOCK_SIZE];

const_assert!(BLOCK_SIZE % 4 == 0);
/// The number of block pointers held by an indirect block.
pub const POINTERS_PER_BLOCK: usize = BLOCK_SIZE / 4;

/// The pointer slots of an indirect or double-indirect block. A slot value
/// of zero means "no block".
pub type PointerTable = [BlockNumber; POINTERS_PER_BLOCK];

/// Decodes a block into its 256 little-endian pointer slots.
pub fn decode_pointer_table(block: &Block) -> PointerTable {
    let mut table = [0; POINTERS_PER_BLOCK];

    for (slot, bytes) in table.iter_mut().zip(block.chunks_exact(4)) {
        *slot = u32::from_le_bytes(bytes.try_into().expect("chunks are four bytes"));
    }

    table
}

/// Encodes 256 pointer slots back into a block, little-endian.
pub fn encode_pointer_table(table: &PointerTable) -> Block {
    let mut block = EMPTY_BLOCK;

    for (bytes, slot) in block.chunks_exact_mut(4).zip(table.iter()) {
        bytes.copy_from_slice(&slot.to_le_bytes());
    }

    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_table_round_trip() {
        let mut table = [0; POINTERS_PER_BLOCK];
        table[0] = 7;
        table[1] = 0x0102_0304;
        table[255] = u32::MAX;

        assert_eq!(decode_pointer_table(&encode_pointer_table(&table)), table);
    }

    #[test]
    fn test_pointer_table_layout_is_little_endian() {
        let mut table = [0; POINTERS_PER_BLOCK];
        table[1] = 0x0102_0304;

        let block = encode_pointer_table(&table);
        assert_eq!(&block[4..8], &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_empty_block_decodes_to_holes() {
        assert!(decode_pointer_table(&EMPTY_BLOCK).iter().all(|&slot| slot == 0));
    }
}
