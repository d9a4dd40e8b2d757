//! NTFS volume handle
//!
//! Opens a raw volume image, decodes the boot sector and bootstraps the MFT
//! from record 0: the `$MFT` record's own unnamed `$DATA` attribute carries
//! the data runs locating every other record, so a fragmented MFT resolves
//! without any help from the operating system.
//!
//! Accessors take shared references; the entry reader behind the handle is
//! guarded by a write lock because first-time parsing mutates the cache.

use crate::error::{MftScopeError, Result};
use crate::io::VolumeImage;
use crate::ntfs::cache::MftEntryReader;
use crate::ntfs::cluster_stream::ClusterStream;
use crate::ntfs::entry::MftEntry;
use crate::ntfs::values::{
    AttributeValue, DecodeContext, VolumeInformationValues, VolumeNameValues,
};
use crate::ntfs::volume_header::VolumeHeader;
use crate::ntfs::MftAttribute;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;

/// MFT entry of the `$Volume` metadata file
pub const VOLUME_METADATA_ENTRY: u64 = 3;

/// Read-only handle on an NTFS volume image
pub struct NtfsVolume {
    image: Arc<VolumeImage>,
    header: VolumeHeader,
    reader: RwLock<MftEntryReader>,
}

impl NtfsVolume {
    /// Open a volume image file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_image(VolumeImage::open(path)?)
    }

    /// Open an already constructed volume image
    pub fn from_image(image: VolumeImage) -> Result<Self> {
        let image = Arc::new(image);
        let header = VolumeHeader::read_at(&image, 0)?;
        log::debug!(
            "NTFS volume: {} bytes per sector, {} bytes per cluster, {} byte MFT entries, MFT at {:#x}",
            header.bytes_per_sector,
            header.cluster_block_size,
            header.mft_entry_size,
            header.mft_offset
        );

        let mft_entry = Self::read_mft_metadata_entry(&image, &header)?;
        let reader = Self::reader_for_mft_entry(&image, &header, &mft_entry)?;
        let volume = Self {
            image,
            header,
            reader: RwLock::new(reader),
        };

        // When the $MFT record itself overflows into extension records, the
        // bootstrap runs cover only the first piece. Resolve the full entry
        // through the reader and rebuild the stream over the whole chain.
        if mft_entry.list_attribute().is_some() {
            let full_entry = volume.reader.write().get(0)?;
            let reader =
                Self::reader_for_mft_entry(&volume.image, &volume.header, &full_entry)?;
            *volume.reader.write() = reader;
        }
        Ok(volume)
    }

    /// Read and parse MFT record 0 directly at the MFT offset
    fn read_mft_metadata_entry(
        image: &Arc<VolumeImage>,
        header: &VolumeHeader,
    ) -> Result<MftEntry> {
        let mut data = vec![0u8; header.mft_entry_size as usize];
        image.read_exact_at(header.mft_offset, &mut data)?;

        let mut entry = MftEntry::read_data(data, 0)
            .map_err(|error| MftScopeError::InvalidRecord(0, error.to_string()))?;
        if entry.is_empty() {
            return Err(MftScopeError::InvalidRecord(
                0,
                "$MFT metadata record is empty".to_string(),
            ));
        }
        entry.read_attributes()?;
        Ok(entry)
    }

    fn reader_for_mft_entry(
        image: &Arc<VolumeImage>,
        header: &VolumeHeader,
        entry: &MftEntry,
    ) -> Result<MftEntryReader> {
        let data_attribute = entry.data_attribute().ok_or(MftScopeError::ValueMissing(
            "$DATA attribute of the $MFT metadata record",
        ))?;
        let stream = ClusterStream::from_attribute(
            data_attribute,
            image.clone(),
            header.cluster_block_size,
        )?;
        Ok(MftEntryReader::new(
            image.clone(),
            stream,
            header.mft_entry_size,
            header.cluster_block_size,
        ))
    }

    /// Decoded volume header
    pub fn header(&self) -> &VolumeHeader {
        &self.header
    }

    /// Number of MFT entries the volume holds
    pub fn number_of_entries(&self) -> u64 {
        self.reader.read().number_of_entries()
    }

    /// Get the fully parsed MFT entry at `index`
    pub fn entry(&self, index: u64) -> Result<Arc<MftEntry>> {
        self.reader.write().get(index)
    }

    /// Decode the typed value of an attribute of this volume
    pub fn read_attribute_value(&self, attribute: &MftAttribute) -> Result<AttributeValue> {
        AttributeValue::read(attribute, &self.decode_context())
    }

    /// Byte stream over a non-resident attribute's content
    pub fn attribute_stream(&self, attribute: &MftAttribute) -> Result<ClusterStream> {
        ClusterStream::from_attribute(
            attribute,
            self.image.clone(),
            self.header.cluster_block_size,
        )
    }

    /// Decode context carrying the image and cluster size, for typed
    /// decoders that accept non-resident payloads
    pub fn decode_context(&self) -> DecodeContext {
        DecodeContext::new(self.image.clone(), self.header.cluster_block_size)
    }

    /// Volume label from the `$Volume` metadata file, when present
    pub fn volume_name(&self) -> Result<Option<String>> {
        let entry = self.entry(VOLUME_METADATA_ENTRY)?;
        match entry.volume_name_attribute() {
            Some(attribute) => {
                let values = VolumeNameValues::read_from_mft_attribute(attribute)?;
                Ok(Some(values.name()))
            }
            None => Ok(None),
        }
    }

    /// NTFS version and flags from the `$Volume` metadata file, when present
    pub fn volume_information(&self) -> Result<Option<VolumeInformationValues>> {
        let entry = self.entry(VOLUME_METADATA_ENTRY)?;
        match entry.volume_information_attribute() {
            Some(attribute) => Ok(Some(VolumeInformationValues::read_from_mft_attribute(
                attribute,
            )?)),
            None => Ok(None),
        }
    }
}
