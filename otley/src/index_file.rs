//! Index File
//!
//! Layers the header-block format on top of [`BlockDevice`]: creates new
//! index files with a magic-stamped header, opens and validates existing
//! ones, and maintains the two mutable header fields (root block id, next
//! free block id) that every other layer reads through this type.

use std::path::Path;

use anyhow::Result;
use thiserror::Error;

use crate::block::{Block, BlockDevice};
use crate::BLOCK_SIZE;

/// The 8-byte literal that identifies a file as an Otley index.
pub const MAGIC: &[u8; 8] = b"4337PRJ3";

const HEADER_BLOCK_ID: u64 = 0;
const FIRST_NODE_BLOCK_ID: u64 = 1;

/// Errors specific to the index file's header handling.
#[derive(Error, Debug)]
pub enum IndexFileError {
    /// Magic bytes at the head of the file did not match [`MAGIC`].
    #[error("bad magic number: not an Otley index file")]
    BadMagic,

    /// An operation that requires an open index file was attempted on a closed one.
    #[error("index file is not open")]
    NotOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    root_block_id: u64,
    next_block_id: u64,
}

impl Header {
    fn empty() -> Self {
        Self {
            root_block_id: 0,
            next_block_id: FIRST_NODE_BLOCK_ID,
        }
    }

    fn to_block(self) -> Block {
        let mut block = [0u8; BLOCK_SIZE];
        block[0..8].copy_from_slice(MAGIC);
        block[8..16].copy_from_slice(&self.root_block_id.to_be_bytes());
        block[16..24].copy_from_slice(&self.next_block_id.to_be_bytes());
        block
    }

    /// Parse header fields out of a block, then independently gate on the
    /// magic number: the check happens after the fields are read, but it
    /// still gates whether the parse is considered to have succeeded.
    fn from_block(block: &Block) -> Result<Self> {
        let root_block_id = u64::from_be_bytes(block[8..16].try_into().unwrap());
        let next_block_id = u64::from_be_bytes(block[16..24].try_into().unwrap());
        if &block[0..8] != MAGIC {
            return Err(IndexFileError::BadMagic.into());
        }
        Ok(Self {
            root_block_id,
            next_block_id,
        })
    }
}

/// An open (or not-yet-opened) Otley index file: a [`BlockDevice`] plus the
/// two mutable allocator fields cached from its header.
#[derive(Debug, Default)]
pub struct IndexFile {
    device: BlockDevice,
    header: Option<Header>,
}

impl IndexFile {
    /// A closed index file, ready to [`IndexFile::create`] or [`IndexFile::open`].
    pub fn new() -> Self {
        Self {
            device: BlockDevice::new(),
            header: None,
        }
    }

    /// Pure query: does a file exist at `path`?
    pub fn file_exists(path: &Path) -> bool {
        path.exists()
    }

    /// Create (or unconditionally truncate) the file at `path` with a fresh
    /// header: `root_block_id = 0`, `next_block_id = 1`. Does not leave a
    /// handle open; call [`IndexFile::open`] afterwards to use it.
    ///
    /// The caller is expected to have already obtained overwrite
    /// confirmation if `path` existed; this call does not ask.
    pub fn create(path: &Path) -> Result<()> {
        tracing::info!(path = %path.display(), "creating index file");
        BlockDevice::create(path, &Header::empty().to_block())
    }

    /// Open the index file at `path`, validating its header.
    ///
    /// On any failure (missing file, short read, bad magic) no partial
    /// state is retained: the device is closed and the error propagated.
    pub fn open(&mut self, path: &Path) -> Result<()> {
        tracing::info!(path = %path.display(), "opening index file");
        let mut device = BlockDevice::new();
        device.open(path)?;
        let block = device.read_block(HEADER_BLOCK_ID);
        let header = match block.and_then(|b| Header::from_block(&b)) {
            Ok(header) => header,
            Err(e) => {
                device.close();
                return Err(e);
            }
        };
        self.device = device;
        self.header = Some(header);
        Ok(())
    }

    /// Release the underlying handle. Idempotent.
    pub fn close(&mut self) {
        self.device.close();
        self.header = None;
    }

    /// Is there an open handle backing this index file?
    pub fn is_open(&self) -> bool {
        self.device.is_open() && self.header.is_some()
    }

    fn header(&self) -> Result<&Header> {
        self.header.as_ref().ok_or_else(|| IndexFileError::NotOpen.into())
    }

    /// The current root block id; `0` means the tree has never been populated.
    pub fn root_block_id(&self) -> Result<u64> {
        Ok(self.header()?.root_block_id)
    }

    /// The next block id that allocation will hand out.
    pub fn next_block_id(&self) -> Result<u64> {
        Ok(self.header()?.next_block_id)
    }

    /// Re-serialize the header (magic + current root/next) and write it to block 0.
    pub fn write_header(&mut self) -> Result<()> {
        let header = *self.header()?;
        self.device.write_block(HEADER_BLOCK_ID, &header.to_block())
    }

    /// Set the root block id and immediately persist the header.
    pub fn set_root_block_id(&mut self, root_block_id: u64) -> Result<()> {
        self.header.as_mut().ok_or(IndexFileError::NotOpen)?.root_block_id = root_block_id;
        self.write_header()
    }

    /// Consume the next free block id, incrementing the counter, and
    /// immediately persist the header so the allocation is never reused
    /// even if the process dies before the allocated block itself is written.
    pub fn alloc_block_id(&mut self) -> Result<u64> {
        let header = self.header.as_mut().ok_or(IndexFileError::NotOpen)?;
        let id = header.next_block_id;
        header.next_block_id += 1;
        self.write_header()?;
        Ok(id)
    }

    /// Read block `id` (delegates to the underlying [`BlockDevice`]).
    pub fn read_block(&mut self, id: u64) -> Result<Block> {
        self.device.read_block(id)
    }

    /// Write block `id` (delegates to the underlying [`BlockDevice`]).
    pub fn write_block(&mut self, id: u64, data: &Block) -> Result<()> {
        self.device.write_block(id, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_creates_an_index_file_with_correct_header() {
        let path = Path::new("index_create.db");
        IndexFile::create(path).expect("creates index file");

        let bytes = std::fs::read(path).expect("reads file");
        assert_eq!(bytes.len(), BLOCK_SIZE);
        assert_eq!(&bytes[0..8], MAGIC);
        assert_eq!(&bytes[8..16], &[0u8; 8]);
        let mut expect_next = [0u8; 8];
        expect_next[7] = 1;
        assert_eq!(&bytes[16..24], &expect_next);
        assert!(bytes[24..].iter().all(|&b| b == 0));

        std::fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn it_opens_a_created_index_file() {
        let path = Path::new("index_open.db");
        IndexFile::create(path).expect("creates index file");

        let mut idx = IndexFile::new();
        idx.open(path).expect("opens index file");
        assert_eq!(idx.root_block_id().unwrap(), 0);
        assert_eq!(idx.next_block_id().unwrap(), 1);

        std::fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn it_rejects_a_bad_magic_number() {
        let path = Path::new("index_bad_magic.db");
        let mut block = [0u8; BLOCK_SIZE];
        block[0..8].copy_from_slice(b"GARBAGE!");
        BlockDevice::create(path, &block).expect("creates file");

        let mut idx = IndexFile::new();
        let err = idx.open(path).expect_err("bad magic must fail open");
        assert!(err.downcast_ref::<IndexFileError>().is_some());
        assert!(!idx.is_open());
        // Subsequent operations on the uninitialized index must also fail.
        assert!(idx.root_block_id().is_err());

        std::fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn it_fails_to_open_a_missing_file() {
        let mut idx = IndexFile::new();
        assert!(idx.open(Path::new("does_not_exist.db")).is_err());
    }

    #[test]
    fn it_allocates_monotonic_block_ids_and_persists_them() {
        let path = Path::new("index_alloc.db");
        IndexFile::create(path).expect("creates index file");
        let mut idx = IndexFile::new();
        idx.open(path).expect("opens index file");

        assert_eq!(idx.alloc_block_id().unwrap(), 1);
        assert_eq!(idx.alloc_block_id().unwrap(), 2);
        assert_eq!(idx.next_block_id().unwrap(), 3);

        idx.close();
        let mut reopened = IndexFile::new();
        reopened.open(path).expect("reopens index file");
        assert_eq!(reopened.next_block_id().unwrap(), 3);

        std::fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn it_writes_header_then_reads_back_same_fields() {
        let path = Path::new("index_header_roundtrip.db");
        IndexFile::create(path).expect("creates index file");
        let mut idx = IndexFile::new();
        idx.open(path).expect("opens index file");

        idx.set_root_block_id(7).unwrap();
        let _ = idx.alloc_block_id().unwrap();

        idx.close();
        let mut reopened = IndexFile::new();
        reopened.open(path).expect("reopens index file");
        assert_eq!(reopened.root_block_id().unwrap(), 7);
        assert_eq!(reopened.next_block_id().unwrap(), 2);

        std::fs::remove_file(path).expect("cleanup");
    }
}
