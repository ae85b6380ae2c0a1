/*++

Licensed under the Apache-2.0 license.

File Name:

    flash_storage.rs

Abstract:

    Backing stores for the flash partitions: in-memory RAM and a file backed
    image that survives emulator restarts.

--*/

use caliptra_emu_bus::Ram;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("access of {len} bytes at offset 0x{offset:x} is outside the storage")]
    OutOfRange { offset: usize, len: usize },
    #[error("flash image I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

fn check_range(capacity: usize, offset: usize, len: usize) -> Result<(), StorageError> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(StorageError::OutOfRange { offset, len }),
    }
}

/// Byte addressable linear memory behind one flash partition.
///
/// Words are little endian.
pub trait FlashStorage {
    /// Size of the storage in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_word(&self, offset: usize) -> Result<u32, StorageError>;

    fn write_word(&mut self, offset: usize, word: u32) -> Result<(), StorageError>;

    fn write_byte(&mut self, offset: usize, byte: u8) -> Result<(), StorageError>;

    /// Sets `len` bytes starting at `offset` to `byte`.
    fn fill(&mut self, offset: usize, len: usize, byte: u8) -> Result<(), StorageError> {
        check_range(self.len(), offset, len)?;
        for i in 0..len {
            self.write_byte(offset + i, byte)?;
        }
        Ok(())
    }
}

impl FlashStorage for Ram {
    fn len(&self) -> usize {
        self.data().len()
    }

    fn read_word(&self, offset: usize) -> Result<u32, StorageError> {
        check_range(self.data().len(), offset, 4)?;
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.data()[offset..offset + 4]);
        Ok(u32::from_le_bytes(word))
    }

    fn write_word(&mut self, offset: usize, word: u32) -> Result<(), StorageError> {
        check_range(self.data().len(), offset, 4)?;
        self.data_mut()[offset..offset + 4].copy_from_slice(&word.to_le_bytes());
        Ok(())
    }

    fn write_byte(&mut self, offset: usize, byte: u8) -> Result<(), StorageError> {
        check_range(self.data().len(), offset, 1)?;
        self.data_mut()[offset] = byte;
        Ok(())
    }

    fn fill(&mut self, offset: usize, len: usize, byte: u8) -> Result<(), StorageError> {
        check_range(self.data().len(), offset, len)?;
        self.data_mut()[offset..offset + len].fill(byte);
        Ok(())
    }
}

/// Flash partition image kept in memory and written through to a file.
pub struct FileFlashStorage {
    file: File,
    image: Vec<u8>,
}

impl FileFlashStorage {
    /// Opens (or creates) the image at `path`.
    ///
    /// A file shorter than `capacity`, or any file when `initial_content` is
    /// given, is rewritten: the content first, erased (`0xFF`) bytes after it.
    pub fn open(
        path: &Path,
        capacity: usize,
        initial_content: Option<&[u8]>,
    ) -> std::io::Result<Self> {
        let mut file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if file.metadata()?.len() < capacity as u64 || initial_content.is_some() {
            file.seek(SeekFrom::Start(0))?;
            Self::initialize_image(&mut file, capacity, initial_content)?;
        }

        let mut image = vec![0u8; capacity];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut image)?;
        Ok(Self { file, image })
    }

    fn initialize_image(
        file: &mut File,
        capacity: usize,
        initial_content: Option<&[u8]>,
    ) -> std::io::Result<()> {
        let mut remaining = capacity;
        if let Some(content) = initial_content {
            let write_size = std::cmp::min(capacity, content.len());
            file.write_all(&content[..write_size])?;
            remaining -= write_size;
        }
        let chunk = vec![0xff; 64 * 1024];
        while remaining > 0 {
            let write_size = std::cmp::min(remaining, chunk.len());
            file.write_all(&chunk[..write_size])?;
            remaining -= write_size;
        }
        file.flush()
    }

    fn write_through(&mut self, offset: usize, len: usize) -> Result<(), StorageError> {
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.write_all(&self.image[offset..offset + len])?;
        Ok(())
    }

    pub fn data(&self) -> &[u8] {
        &self.image
    }
}

impl FlashStorage for FileFlashStorage {
    fn len(&self) -> usize {
        self.image.len()
    }

    fn read_word(&self, offset: usize) -> Result<u32, StorageError> {
        check_range(self.image.len(), offset, 4)?;
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.image[offset..offset + 4]);
        Ok(u32::from_le_bytes(word))
    }

    fn write_word(&mut self, offset: usize, word: u32) -> Result<(), StorageError> {
        check_range(self.image.len(), offset, 4)?;
        self.image[offset..offset + 4].copy_from_slice(&word.to_le_bytes());
        self.write_through(offset, 4)
    }

    fn write_byte(&mut self, offset: usize, byte: u8) -> Result<(), StorageError> {
        check_range(self.image.len(), offset, 1)?;
        self.image[offset] = byte;
        self.write_through(offset, 1)
    }

    fn fill(&mut self, offset: usize, len: usize, byte: u8) -> Result<(), StorageError> {
        check_range(self.image.len(), offset, len)?;
        self.image[offset..offset + len].fill(byte);
        self.write_through(offset, len)
    }
}
