/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains memory map and geometry constants for the embedded flash
    and its controller.

--*/

/// Origin of the flash controller register window.
pub const FLASH_CTRL_ORG: u32 = 0x4100_0000;
/// Size of the flash controller register window.
pub const FLASH_CTRL_SIZE: u32 = 0x1000;

/// Absolute address of the first byte of the data partition.
pub const FLASH_MEM_ORG: u32 = 0x2000_0000;

pub const FLASH_NUM_BANKS: usize = 2;
pub const FLASH_PAGES_PER_BANK: usize = 256;
pub const FLASH_WORDS_PER_PAGE: usize = 256;
/// Size of a flash word. Register accesses are 32 bits wide regardless.
pub const FLASH_BYTES_PER_WORD: usize = 8;
pub const FLASH_BYTES_PER_PAGE: usize = FLASH_WORDS_PER_PAGE * FLASH_BYTES_PER_WORD;
pub const FLASH_BYTES_PER_BANK: usize = FLASH_PAGES_PER_BANK * FLASH_BYTES_PER_PAGE;
/// Capacity of the data partition; the info partition is sized identically.
pub const FLASH_SIZE: usize = FLASH_NUM_BANKS * FLASH_BYTES_PER_BANK;

/// Depth of both the program and the read FIFO, in 32-bit words.
pub const FLASH_FIFO_DEPTH: usize = 16;
/// Number of configurable memory protection regions.
pub const FLASH_NUM_REGIONS: usize = 8;
/// Number of info partition types with page configuration registers.
pub const FLASH_NUM_INFO_TYPES: usize = 2;
/// Number of configurable info pages per bank and info type.
pub const FLASH_NUM_INFO_PAGES: usize = 4;
/// Largest word count a single operation may request (NUM + 1).
pub const FLASH_MAX_OP_WORDS: usize = 4096;
