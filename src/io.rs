//! Volume image access
//!
//! Abstraction over the raw byte source backing a volume: a memory-mapped
//! image file, a plain file read at explicit offsets, or an owned in-memory
//! buffer. All reads are positioned; no cursor state is kept between calls
//! and the source is never written to.

use crate::error::{MftScopeError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

/// Read-only byte-addressable volume source.
pub enum VolumeImage {
    /// Memory-mapped image file
    Mapped(Mmap),
    /// Plain file, read with seek + read under a lock
    File { file: Mutex<File>, size: u64 },
    /// Owned in-memory buffer
    Buffer(Vec<u8>),
}

impl VolumeImage {
    /// Open an image file, preferring a memory map and falling back to
    /// positioned file reads when mapping fails (e.g. block devices that
    /// refuse mmap).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;

        // Safety: the image is opened read-only and treated as immutable for
        // the lifetime of the map.
        match unsafe { Mmap::map(&file) } {
            Ok(map) => Ok(VolumeImage::Mapped(map)),
            Err(error) => {
                log::debug!(
                    "memory map of {} failed ({}), using file reads",
                    path.as_ref().display(),
                    error
                );
                let size = file.metadata()?.len();
                Ok(VolumeImage::File {
                    file: Mutex::new(file),
                    size,
                })
            }
        }
    }

    /// Wrap an in-memory buffer
    pub fn from_bytes(data: Vec<u8>) -> Self {
        VolumeImage::Buffer(data)
    }

    /// Total size of the image in bytes
    pub fn size(&self) -> u64 {
        match self {
            VolumeImage::Mapped(map) => map.len() as u64,
            VolumeImage::File { size, .. } => *size,
            VolumeImage::Buffer(data) => data.len() as u64,
        }
    }

    /// Read bytes at an absolute offset. Returns the number of bytes read,
    /// which is less than `buf.len()` at end of image.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        match self {
            VolumeImage::Mapped(map) => Ok(copy_from_slice_at(map, offset, buf)),
            VolumeImage::Buffer(data) => Ok(copy_from_slice_at(data, offset, buf)),
            VolumeImage::File { file, size } => {
                if offset >= *size {
                    return Ok(0);
                }
                let mut file = file
                    .lock()
                    .map_err(|_| MftScopeError::InvalidArgument("volume image lock poisoned".into()))?;
                file.seek(SeekFrom::Start(offset))?;

                let mut total = 0;
                while total < buf.len() {
                    let count = file.read(&mut buf[total..])?;
                    if count == 0 {
                        break;
                    }
                    total += count;
                }
                Ok(total)
            }
        }
    }

    /// Read exactly `buf.len()` bytes at `offset`, failing with
    /// [`MftScopeError::ShortRead`] otherwise.
    pub fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let count = self.read_at(offset, buf)?;
        if count < buf.len() {
            return Err(MftScopeError::ShortRead {
                offset,
                requested: buf.len(),
                got: count,
            });
        }
        Ok(())
    }
}

fn copy_from_slice_at(data: &[u8], offset: u64, buf: &mut [u8]) -> usize {
    if offset >= data.len() as u64 {
        return 0;
    }
    let start = offset as usize;
    let count = buf.len().min(data.len() - start);
    buf[..count].copy_from_slice(&data[start..start + count]);
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_read_at() {
        let image = VolumeImage::from_bytes((0u8..=255).collect());

        let mut buf = [0u8; 4];
        assert_eq!(image.read_at(10, &mut buf).unwrap(), 4);
        assert_eq!(buf, [10, 11, 12, 13]);

        assert_eq!(image.size(), 256);
    }

    #[test]
    fn test_buffer_read_at_end_is_short() {
        let image = VolumeImage::from_bytes(vec![0xaa; 16]);

        let mut buf = [0u8; 8];
        assert_eq!(image.read_at(12, &mut buf).unwrap(), 4);
        assert_eq!(image.read_at(16, &mut buf).unwrap(), 0);
        assert_eq!(image.read_at(1000, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_read_exact_at_short_read_fails() {
        let image = VolumeImage::from_bytes(vec![0u8; 16]);

        let mut buf = [0u8; 8];
        assert!(image.read_exact_at(8, &mut buf).is_ok());

        let result = image.read_exact_at(12, &mut buf);
        assert!(matches!(
            result,
            Err(MftScopeError::ShortRead {
                offset: 12,
                requested: 8,
                got: 4
            })
        ));
    }
}
