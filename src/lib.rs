//! MftScope - Read-only NTFS volume and MFT parser
//!
//! Reconstructs the logical structure of an NTFS volume from a raw image:
//! boot-sector geometry, MFT records with fix-up verification, attributes
//! (resident and non-resident), `$ATTRIBUTE_LIST` resolution across
//! extension records, alternate data streams and typed attribute values.
//! The volume is never written to and never mounted.
//!
//! # Example
//!
//! ```no_run
//! use mftscope::{NtfsVolume, Result};
//!
//! fn main() -> Result<()> {
//!     let volume = NtfsVolume::open("volume.img")?;
//!
//!     println!("label: {:?}", volume.volume_name()?);
//!     println!("entries: {}", volume.number_of_entries());
//!
//!     let entry = volume.entry(5)?;
//!     for attribute in entry.attributes() {
//!         println!(
//!             "{} {} bytes",
//!             mftscope::ntfs::attribute_type_name(attribute.attribute_type),
//!             attribute.data_size(),
//!         );
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod io;
pub mod ntfs;

// Re-export main types
pub use error::{MftScopeError, Result};
pub use io::VolumeImage;
pub use ntfs::{
    AttributeList, AttributeListEntry, AttributeObject, AttributeType, AttributeValue, FileReference,
    MftAttribute, MftEntry, MftEntryHeader, MftEntryReader, NtfsVolume, VolumeHeader,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
