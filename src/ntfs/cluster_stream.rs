//! Cluster-run stream
//!
//! Exposes the content of a non-resident attribute as a linear byte stream:
//! logical offsets are mapped through the attribute's data runs to absolute
//! volume offsets. Sparse extents read as zero bytes. Reads clip at the
//! attribute's logical data size.

use crate::error::{MftScopeError, Result};
use crate::io::VolumeImage;
use crate::ntfs::attribute::{DataRun, MftAttribute};
use crate::ntfs::MAXIMUM_ALLOCATION_SIZE;
use std::sync::Arc;

/// One mapped extent: a cluster range of the stream and where it lives
struct StreamExtent {
    /// First logical cluster of the extent
    start_cluster: u64,
    /// Length in clusters
    cluster_count: u64,
    /// Absolute volume cluster, `None` for sparse
    lcn: Option<u64>,
}

/// Linear byte stream over an attribute's data runs
pub struct ClusterStream {
    image: Arc<VolumeImage>,
    cluster_block_size: u32,
    extents: Vec<StreamExtent>,
    data_size: u64,
}

impl ClusterStream {
    /// Build a stream from an explicit run list
    pub fn new(
        image: Arc<VolumeImage>,
        cluster_block_size: u32,
        runs: &[DataRun],
        data_size: u64,
    ) -> Self {
        let mut extents = Vec::with_capacity(runs.len());
        let mut start_cluster = 0;
        for run in runs {
            extents.push(StreamExtent {
                start_cluster,
                cluster_count: run.cluster_count,
                lcn: run.lcn,
            });
            start_cluster += run.cluster_count;
        }
        Self {
            image,
            cluster_block_size,
            extents,
            data_size,
        }
    }

    /// Build a stream over a non-resident attribute, following its chain
    pub fn from_attribute(
        attribute: &MftAttribute,
        image: Arc<VolumeImage>,
        cluster_block_size: u32,
    ) -> Result<Self> {
        if attribute.is_resident() {
            return Err(MftScopeError::UnsupportedValue(
                "cannot build a cluster stream over a resident attribute".to_string(),
            ));
        }
        Ok(Self::new(
            image,
            cluster_block_size,
            &attribute.data_runs(),
            attribute.data_size(),
        ))
    }

    /// Logical size of the stream in bytes
    pub fn data_size(&self) -> u64 {
        self.data_size
    }

    /// Read bytes at a logical offset. Returns the number of bytes read,
    /// which is less than `buf.len()` at end of stream.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.data_size {
            return Ok(0);
        }
        let wanted = buf.len().min((self.data_size - offset) as usize);
        let cluster_size = self.cluster_block_size as u64;

        let mut total = 0;
        while total < wanted {
            let stream_offset = offset + total as u64;
            let cluster = stream_offset / cluster_size;
            let offset_in_cluster = stream_offset % cluster_size;

            let extent = match self.find_extent(cluster) {
                Some(extent) => extent,
                // Offset beyond the mapped runs: the allocation does not
                // cover the logical size, treat the tail as sparse
                None => {
                    for byte in buf[total..wanted].iter_mut() {
                        *byte = 0;
                    }
                    total = wanted;
                    break;
                }
            };

            let extent_remaining = (extent.cluster_count - (cluster - extent.start_cluster))
                * cluster_size
                - offset_in_cluster;
            let count = (wanted - total).min(extent_remaining as usize);

            match extent.lcn {
                Some(lcn) => {
                    let volume_offset = (lcn + (cluster - extent.start_cluster)) * cluster_size
                        + offset_in_cluster;
                    self.image
                        .read_exact_at(volume_offset, &mut buf[total..total + count])?;
                }
                None => {
                    for byte in buf[total..total + count].iter_mut() {
                        *byte = 0;
                    }
                }
            }
            total += count;
        }
        Ok(total)
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

    /// Read the entire stream content
    pub fn read_to_vec(&self) -> Result<Vec<u8>> {
        if self.data_size > MAXIMUM_ALLOCATION_SIZE {
            return Err(MftScopeError::ValueOutOfBounds(format!(
                "stream of {} bytes exceeds the allocation guard",
                self.data_size
            )));
        }
        let mut data = vec![0u8; self.data_size as usize];
        self.read_exact_at(0, &mut data)?;
        Ok(data)
    }

    fn find_extent(&self, cluster: u64) -> Option<&StreamExtent> {
        self.extents.iter().find(|extent| {
            cluster >= extent.start_cluster && cluster < extent.start_cluster + extent.cluster_count
        })
    }
}
