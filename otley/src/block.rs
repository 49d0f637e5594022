//! Block Device
//!
//! Owns a read/write file handle and provides fixed-size block I/O. Knows
//! nothing about headers, nodes, or B-trees: every block is just 512 bytes
//! at a given offset.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::Result;
use thiserror::Error;

use crate::BLOCK_SIZE;

/// Errors specific to block-level I/O.
#[derive(Error, Debug)]
pub enum BlockError {
    /// Wraps any underlying OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A read returned fewer than `BLOCK_SIZE` bytes.
    #[error("short read of block {0}")]
    ShortRead(u64),

    /// A write committed fewer than `BLOCK_SIZE` bytes.
    #[error("short write of block {0}")]
    ShortWrite(u64),

    /// An operation was attempted without an open file handle.
    #[error("block device is not open")]
    NotOpen,
}

/// A single fixed-size block, read from or destined for the index file.
pub type Block = [u8; BLOCK_SIZE];

/// Owns the index file's handle and provides fixed-size block read/write.
///
/// [`BlockDevice::create`] is a one-shot associated function: it creates
/// the file, writes the caller-supplied first block, flushes, and closes;
/// it never leaves a handle open. Everything else operates on an open
/// instance created with [`BlockDevice::open`].
#[derive(Debug, Default)]
pub struct BlockDevice {
    file: Option<File>,
}

impl BlockDevice {
    /// A block device with no file open yet.
    pub fn new() -> Self {
        Self { file: None }
    }

    /// Create or truncate `path`, write `first_block` to block 0, flush, and close.
    pub fn create(path: &Path, first_block: &Block) -> Result<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.seek(SeekFrom::Start(0))?;
        let written = file.write(first_block)?;
        if written != BLOCK_SIZE {
            return Err(BlockError::ShortWrite(0).into());
        }
        file.sync_all()?;
        tracing::debug!(path = %path.display(), "created block device file");
        Ok(())
    }

    /// Open an existing file at `path` for reading and writing.
    pub fn open(&mut self, path: &Path) -> Result<()> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        self.file = Some(file);
        Ok(())
    }

    /// Release the underlying handle. Idempotent.
    pub fn close(&mut self) {
        self.file = None;
    }

    /// Is there an open handle?
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Read exactly one block at `id`.
    pub fn read_block(&mut self, id: u64) -> Result<Block> {
        let file = self.file.as_mut().ok_or(BlockError::NotOpen)?;
        file.seek(SeekFrom::Start(id * BLOCK_SIZE as u64))?;
        let mut buf = [0u8; BLOCK_SIZE];
        let read = file.read(&mut buf)?;
        if read != BLOCK_SIZE {
            tracing::debug!(block_id = id, read, "short read");
            return Err(BlockError::ShortRead(id).into());
        }
        Ok(buf)
    }

    /// Write exactly one block at `id`, then flush to the OS.
    pub fn write_block(&mut self, id: u64, data: &Block) -> Result<()> {
        let file = self.file.as_mut().ok_or(BlockError::NotOpen)?;
        file.seek(SeekFrom::Start(id * BLOCK_SIZE as u64))?;
        let written = file.write(data)?;
        if written != BLOCK_SIZE {
            return Err(BlockError::ShortWrite(id).into());
        }
        file.sync_all()?;
        Ok(())
    }
}
