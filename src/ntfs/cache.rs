//! MFT entry cache and on-demand entry reader
//!
//! [`MftEntryReader`] presents the MFT as an array of parsed entries,
//! materialised on demand: a lookup reads the record bytes through the
//! MFT's own cluster-run stream, parses them, resolves extension records
//! and keeps the result in a small LRU cache. Entries are handed out as
//! `Arc`s, so a cached entry stays valid for holders after eviction.

use crate::error::{MftScopeError, Result};
use crate::io::VolumeImage;
use crate::ntfs::attribute_list::AttributeList;
use crate::ntfs::cluster_stream::ClusterStream;
use crate::ntfs::entry::MftEntry;
use std::sync::Arc;

/// Default capacity of the global entry cache
pub const DEFAULT_CACHE_SIZE: usize = 16;

// ============================================================================
// LRU cache
// ============================================================================

/// Fixed-capacity least-recently-used cache of parsed MFT entries
pub struct MftEntryCache {
    capacity: usize,
    /// Most recently used first
    entries: Vec<(u64, Arc<MftEntry>)>,
}

impl MftEntryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Vec::new(),
        }
    }

    /// Look up an entry by MFT index, marking it most recently used
    pub fn get(&mut self, index: u64) -> Option<Arc<MftEntry>> {
        let position = self
            .entries
            .iter()
            .position(|(cached_index, _)| *cached_index == index)?;
        let cached = self.entries.remove(position);
        let entry = cached.1.clone();
        self.entries.insert(0, cached);
        Some(entry)
    }

    /// Insert an entry, evicting the least recently used when full
    pub fn insert(&mut self, index: u64, entry: Arc<MftEntry>) {
        if let Some(position) = self
            .entries
            .iter()
            .position(|(cached_index, _)| *cached_index == index)
        {
            self.entries.remove(position);
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop();
        }
        self.entries.insert(0, (index, entry));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Entry reader
// ============================================================================

/// On-demand array view of the MFT
pub struct MftEntryReader {
    image: Arc<VolumeImage>,
    /// Linear byte space of the `$MFT` data stream
    mft_stream: ClusterStream,
    mft_entry_size: u32,
    cluster_block_size: u32,
    number_of_entries: u64,
    cache: MftEntryCache,
}

impl MftEntryReader {
    pub fn new(
        image: Arc<VolumeImage>,
        mft_stream: ClusterStream,
        mft_entry_size: u32,
        cluster_block_size: u32,
    ) -> Self {
        let number_of_entries = mft_stream.data_size() / mft_entry_size as u64;
        Self {
            image,
            mft_stream,
            mft_entry_size,
            cluster_block_size,
            number_of_entries,
            cache: MftEntryCache::new(DEFAULT_CACHE_SIZE),
        }
    }

    /// Number of records the MFT data stream holds
    pub fn number_of_entries(&self) -> u64 {
        self.number_of_entries
    }

    /// Get the fully parsed entry at `index`, from cache or disk.
    ///
    /// Extension records named by the entry's `$ATTRIBUTE_LIST` are resolved
    /// and their attributes merged into the returned entry.
    pub fn get(&mut self, index: u64) -> Result<Arc<MftEntry>> {
        if let Some(entry) = self.cache.get(index) {
            return Ok(entry);
        }
        let mut entry = self.load(index)?;
        if entry.list_attribute().is_some() {
            self.read_attribute_list_data_mft_entries(&mut entry)?;
        }
        let entry = Arc::new(entry);
        self.cache.insert(index, entry.clone());
        Ok(entry)
    }

    /// Get the entry at `index` without resolving extension records
    pub fn get_mft_only(&mut self, index: u64) -> Result<Arc<MftEntry>> {
        Ok(Arc::new(self.load(index)?))
    }

    /// Read raw record bytes and run the base parse
    fn load(&self, index: u64) -> Result<MftEntry> {
        let data = self.read_record_data(index)?;
        let mut entry = MftEntry::read_data(data, index)
            .map_err(|error| MftScopeError::InvalidRecord(index, error.to_string()))?;
        entry.read_attributes()?;
        Ok(entry)
    }

    /// Read the raw bytes of one record out of the MFT data stream
    fn read_record_data(&self, index: u64) -> Result<Vec<u8>> {
        if index >= self.number_of_entries {
            return Err(MftScopeError::InvalidArgument(format!(
                "MFT entry index {} outside MFT of {} entries",
                index, self.number_of_entries
            )));
        }
        let offset = index * self.mft_entry_size as u64;
        let mut data = vec![0u8; self.mft_entry_size as usize];
        self.mft_stream.read_exact_at(offset, &mut data)?;
        Ok(data)
    }

    /// Resolve the extension records named by the entry's `$ATTRIBUTE_LIST`
    /// and merge their attributes into the base record.
    ///
    /// Extension entries are parsed without further list resolution and
    /// never enter the global cache, so the walk cannot evict its own base
    /// record. A failing extension marks the base corrupted and the walk
    /// continues with the remaining references.
    fn read_attribute_list_data_mft_entries(&mut self, entry: &mut MftEntry) -> Result<()> {
        let list_attribute = entry.list_attribute().expect("caller checked the list");
        let list = AttributeList::read_from_attribute(
            list_attribute,
            self.image.clone(),
            self.cluster_block_size,
        )?;

        let base_reference = entry.file_reference();
        // Local cache of the extension record being merged; references are
        // already deduplicated by 48-bit entry index
        let mut local_slot: Option<(u64, Arc<MftEntry>)> = None;

        for reference in list.file_references() {
            let extension_index = reference.entry();
            if extension_index == base_reference.entry() {
                continue;
            }

            let extension = match &local_slot {
                Some((cached_index, cached)) if *cached_index == extension_index => cached.clone(),
                _ => match self.get_mft_only(extension_index) {
                    Ok(loaded) => {
                        local_slot = Some((extension_index, loaded.clone()));
                        loaded
                    }
                    Err(error) => {
                        log::warn!(
                            "MFT entry {}: extension record {} failed to load: {}",
                            base_reference.entry(),
                            extension_index,
                            error
                        );
                        entry.mark_corrupted();
                        continue;
                    }
                },
            };

            if extension.header().is_none()
                || !extension.is_allocated()
                || extension.base_record_file_reference() != base_reference
            {
                log::warn!(
                    "MFT entry {}: extension record {} is not a valid extension",
                    base_reference.entry(),
                    extension_index
                );
                entry.mark_corrupted();
                continue;
            }

            for attribute in extension.attributes() {
                entry.merge_extension_attribute(attribute.clone())?;
            }
        }

        entry.set_attribute_list(list);
        entry.mark_attributes_read();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_entry(index: u64) -> Arc<MftEntry> {
        Arc::new(MftEntry::read_data(vec![0u8; 1024], index).unwrap())
    }

    #[test]
    fn test_cache_hit_and_miss() {
        let mut cache = MftEntryCache::new(4);
        assert!(cache.get(1).is_none());

        cache.insert(1, empty_entry(1));
        let entry = cache.get(1).unwrap();
        assert_eq!(entry.index(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_evicts_least_recently_used() {
        let mut cache = MftEntryCache::new(2);
        cache.insert(1, empty_entry(1));
        cache.insert(2, empty_entry(2));

        // Touch 1 so 2 becomes the eviction candidate
        cache.get(1).unwrap();
        cache.insert(3, empty_entry(3));

        assert!(cache.get(1).is_some());
        assert!(cache.get(2).is_none());
        assert!(cache.get(3).is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cache_reinsert_replaces() {
        let mut cache = MftEntryCache::new(2);
        cache.insert(1, empty_entry(1));
        cache.insert(1, empty_entry(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_reader_reads_entries_from_stream() {
        // An MFT of four zeroed records in a contiguous run at cluster 0
        let image = Arc::new(VolumeImage::from_bytes(vec![0u8; 4096]));
        let runs = [crate::ntfs::attribute::DataRun {
            cluster_count: 8,
            lcn: Some(0),
        }];
        let stream = ClusterStream::new(image.clone(), 512, &runs, 4096);
        let mut reader = MftEntryReader::new(image, stream, 1024, 512);

        assert_eq!(reader.number_of_entries(), 4);
        let entry = reader.get(2).unwrap();
        assert!(entry.is_empty());

        let result = reader.get(4);
        assert!(matches!(result, Err(MftScopeError::InvalidArgument(_))));
    }
}
