//! Typed attribute value decoders
//!
//! Each decoder turns the payload of one attribute into a typed value
//! struct. All decoders require resident payloads except `$BITMAP` and
//! `$SECURITY_DESCRIPTOR`, which also accept non-resident payloads read
//! through the cluster-run stream. [`AttributeValue`] is the tagged sum over
//! the known kinds and [`AttributeObject`] adds the decode-on-first-access
//! behaviour used by file-entry level callers.

pub mod bitmap;
pub mod file_name;
pub mod logged_utility_stream;
pub mod object_identifier;
pub mod reparse_point;
pub mod security_descriptor;
pub mod standard_information;
pub mod txf_data;
pub mod volume_information;
pub mod volume_name;

pub use bitmap::BitmapValues;
pub use file_name::{FileNameValues, FilenameNamespace};
pub use logged_utility_stream::LoggedUtilityStreamValues;
pub use object_identifier::{Guid, ObjectIdentifierValues};
pub use reparse_point::ReparsePointValues;
pub use security_descriptor::SecurityDescriptorValues;
pub use standard_information::StandardInformationValues;
pub use txf_data::TxfDataValues;
pub use volume_information::VolumeInformationValues;
pub use volume_name::VolumeNameValues;

use crate::error::{MftScopeError, Result};
use crate::io::VolumeImage;
use crate::ntfs::attribute::MftAttribute;
use crate::ntfs::{attribute_type_name, AttributeType};
use std::sync::Arc;

/// Name of the transactional-NTFS logged utility stream
pub const TXF_DATA_STREAM_NAME: &str = "$TXF_DATA";

/// What a value decoder needs besides the attribute itself: an image and the
/// cluster size, for the decoders that accept non-resident payloads.
#[derive(Clone)]
pub struct DecodeContext {
    pub image: Option<Arc<VolumeImage>>,
    pub cluster_block_size: u32,
}

impl DecodeContext {
    /// Context for resident-only decoding
    pub fn resident_only() -> Self {
        Self {
            image: None,
            cluster_block_size: 0,
        }
    }

    pub fn new(image: Arc<VolumeImage>, cluster_block_size: u32) -> Self {
        Self {
            image: Some(image),
            cluster_block_size,
        }
    }
}

/// Guard that an attribute has the type a decoder expects
pub(crate) fn check_attribute_type(
    attribute: &MftAttribute,
    expected: AttributeType,
) -> Result<()> {
    if attribute.attribute_type != expected as u32 {
        return Err(MftScopeError::UnsupportedValue(format!(
            "attribute type {} where {} was expected",
            attribute_type_name(attribute.attribute_type),
            expected.name()
        )));
    }
    Ok(())
}

/// Payload of an attribute that may be resident or non-resident: resident
/// bytes are copied, non-resident content is read through the cluster-run
/// stream.
pub(crate) fn read_attribute_content(
    attribute: &MftAttribute,
    context: &DecodeContext,
) -> Result<Vec<u8>> {
    if attribute.is_resident() {
        return Ok(attribute.resident_data()?.to_vec());
    }
    let image = context
        .image
        .clone()
        .ok_or(MftScopeError::ValueMissing("volume image for non-resident attribute"))?;
    let stream = crate::ntfs::cluster_stream::ClusterStream::from_attribute(
        attribute,
        image,
        context.cluster_block_size,
    )?;
    stream.read_to_vec()
}

// ============================================================================
// Attribute value sum type
// ============================================================================

/// Decoded value of one attribute
#[derive(Debug, Clone)]
pub enum AttributeValue {
    Bitmap(BitmapValues),
    FileName(FileNameValues),
    LoggedUtilityStream(LoggedUtilityStreamValues),
    ObjectIdentifier(ObjectIdentifierValues),
    ReparsePoint(ReparsePointValues),
    SecurityDescriptor(SecurityDescriptorValues),
    StandardInformation(StandardInformationValues),
    TxfData(TxfDataValues),
    VolumeInformation(VolumeInformationValues),
    VolumeName(VolumeNameValues),
}

impl AttributeValue {
    /// Decode the value of `attribute`, dispatching on its type.
    ///
    /// A `$LOGGED_UTILITY_STREAM` named `$TXF_DATA` decodes as
    /// [`TxfDataValues`]; any other name stays an opaque stream value.
    /// `$INDEX_ROOT`, `$INDEX_ALLOCATION`, `$DATA` and `$ATTRIBUTE_LIST` are
    /// consumed by other subsystems and refuse to decode here.
    pub fn read(attribute: &MftAttribute, context: &DecodeContext) -> Result<Self> {
        let attribute_type = AttributeType::from_u32(attribute.attribute_type).ok_or_else(|| {
            MftScopeError::UnsupportedValue(format!(
                "unknown attribute type 0x{:08x}",
                attribute.attribute_type
            ))
        })?;

        match attribute_type {
            AttributeType::Bitmap => Ok(AttributeValue::Bitmap(
                BitmapValues::read_from_mft_attribute(attribute, context)?,
            )),
            AttributeType::FileName => Ok(AttributeValue::FileName(
                FileNameValues::read_from_mft_attribute(attribute)?,
            )),
            AttributeType::LoggedUtilityStream => {
                if attribute.compare_name_with_utf8(TXF_DATA_STREAM_NAME) {
                    Ok(AttributeValue::TxfData(
                        TxfDataValues::read_from_mft_attribute(attribute)?,
                    ))
                } else {
                    Ok(AttributeValue::LoggedUtilityStream(
                        LoggedUtilityStreamValues::read_from_mft_attribute(attribute)?,
                    ))
                }
            }
            AttributeType::ObjectIdentifier => Ok(AttributeValue::ObjectIdentifier(
                ObjectIdentifierValues::read_from_mft_attribute(attribute)?,
            )),
            AttributeType::ReparsePoint => Ok(AttributeValue::ReparsePoint(
                ReparsePointValues::read_from_mft_attribute(attribute)?,
            )),
            AttributeType::SecurityDescriptor => Ok(AttributeValue::SecurityDescriptor(
                SecurityDescriptorValues::read_from_mft_attribute(attribute, context)?,
            )),
            AttributeType::StandardInformation => Ok(AttributeValue::StandardInformation(
                StandardInformationValues::read_from_mft_attribute(attribute)?,
            )),
            AttributeType::VolumeInformation => Ok(AttributeValue::VolumeInformation(
                VolumeInformationValues::read_from_mft_attribute(attribute)?,
            )),
            AttributeType::VolumeName => Ok(AttributeValue::VolumeName(
                VolumeNameValues::read_from_mft_attribute(attribute)?,
            )),
            other => Err(MftScopeError::UnsupportedValue(format!(
                "no value decoder for {}",
                other.name()
            ))),
        }
    }
}

// ============================================================================
// Attribute object
// ============================================================================

/// Pairs an attribute with its lazily decoded value.
///
/// `read_value` may be called once; further calls are rejected so callers
/// notice accidental re-initialisation. Header accessors forward to the
/// underlying attribute and work before the value is decoded.
pub struct AttributeObject<'a> {
    attribute: &'a MftAttribute,
    value: Option<AttributeValue>,
}

impl<'a> AttributeObject<'a> {
    pub fn new(attribute: &'a MftAttribute) -> Self {
        Self {
            attribute,
            value: None,
        }
    }

    /// Decode the attribute's value; fails with
    /// [`MftScopeError::ValueAlreadySet`] when called twice.
    pub fn read_value(&mut self, context: &DecodeContext) -> Result<()> {
        if self.value.is_some() {
            return Err(MftScopeError::ValueAlreadySet("attribute value"));
        }
        self.value = Some(AttributeValue::read(self.attribute, context)?);
        Ok(())
    }

    /// The decoded value; fails until `read_value` has run
    pub fn value(&self) -> Result<&AttributeValue> {
        self.value
            .as_ref()
            .ok_or(MftScopeError::ValueMissing("attribute value"))
    }

    pub fn attribute(&self) -> &MftAttribute {
        self.attribute
    }

    // Forwarded header accessors

    pub fn name(&self) -> Option<String> {
        self.attribute.name()
    }

    pub fn data_flags(&self) -> u16 {
        self.attribute.data_flags
    }

    pub fn data_size(&self) -> u64 {
        self.attribute.data_size()
    }

    pub fn valid_data_size(&self) -> u64 {
        self.attribute.valid_data_size()
    }

    pub fn vcn_range(&self) -> (u64, u64) {
        self.attribute.vcn_range()
    }
}
