use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

/// Size of an integer on a page, in bytes. Integers are stored as
/// little-endian i64.
pub const INT_SIZE: usize = std::mem::size_of::<i64>();

#[derive(Error, Debug)]
pub enum PageError {
    #[error("offset {offset} with payload of {size} bytes exceeds page size {page_size}")]
    OutOfBounds {
        offset: usize,
        size: usize,
        page_size: usize,
    },
    #[error("string at offset {0} is not valid UTF-8")]
    InvalidUtf8(usize),
}

pub type Result<T> = std::result::Result<T, PageError>;

/// A fixed-size in-memory byte buffer holding the contents of one disk
/// block, with typed offset-based accessors.
///
/// Byte sequences and strings are stored with an integer length prefix
/// followed by the raw bytes, so a value of length n occupies
/// `n + INT_SIZE` bytes on the page.
#[derive(Debug, Clone)]
pub struct Page {
    data: Vec<u8>,
}

impl Page {
    /// Create a zeroed page of the given block size.
    pub fn new(block_size: usize) -> Self {
        Self {
            data: vec![0; block_size],
        }
    }

    /// Wrap an existing byte buffer, e.g. a log record being decoded.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Number of page bytes a string of `strlen` bytes occupies.
    pub fn max_length(strlen: usize) -> usize {
        strlen + INT_SIZE
    }

    pub fn get_int(&self, offset: usize) -> Result<i64> {
        self.check_bounds(offset, INT_SIZE)?;
        Ok(LittleEndian::read_i64(&self.data[offset..offset + INT_SIZE]))
    }

    pub fn set_int(&mut self, offset: usize, val: i64) -> Result<()> {
        self.check_bounds(offset, INT_SIZE)?;
        LittleEndian::write_i64(&mut self.data[offset..offset + INT_SIZE], val);
        Ok(())
    }

    pub fn get_bytes(&self, offset: usize) -> Result<&[u8]> {
        let len = self.get_int(offset)? as usize;
        let start = offset + INT_SIZE;
        self.check_bounds(start, len)?;
        Ok(&self.data[start..start + len])
    }

    pub fn set_bytes(&mut self, offset: usize, val: &[u8]) -> Result<()> {
        self.check_bounds(offset, INT_SIZE + val.len())?;
        LittleEndian::write_i64(&mut self.data[offset..offset + INT_SIZE], val.len() as i64);
        let start = offset + INT_SIZE;
        self.data[start..start + val.len()].copy_from_slice(val);
        Ok(())
    }

    pub fn get_string(&self, offset: usize) -> Result<String> {
        let bytes = self.get_bytes(offset)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| PageError::InvalidUtf8(offset))
    }

    pub fn set_string(&mut self, offset: usize, val: &str) -> Result<()> {
        self.set_bytes(offset, val.as_bytes())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn check_bounds(&self, offset: usize, size: usize) -> Result<()> {
        if offset.checked_add(size).is_none_or(|end| end > self.data.len()) {
            return Err(PageError::OutOfBounds {
                offset,
                size,
                page_size: self.data.len(),
            });
        }
        Ok(())
    }
}
