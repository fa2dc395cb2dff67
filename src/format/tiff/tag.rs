//! Directory entries with lazily resolved values.
//!
//! A value small enough for the entry's value field is decoded while the
//! directory is parsed. Anything larger stays at its file offset until asked
//! for, and is decoded and cached on first access.

use tokio::sync::OnceCell;

use super::tags::{tag_name, FieldType};
use super::values::{decode_value, TagValue};
use crate::error::IoError;
use crate::io::{ByteOrder, ChunkedSource};

/// Where a tag's value lives.
#[derive(Debug)]
pub enum TagData {
    /// Decoded from the directory entry itself
    Inline(TagValue),
    /// Stored at `offset`; decoded on first access
    Offset {
        offset: u64,
        value: OnceCell<TagValue>,
    },
}

/// One IFD entry.
#[derive(Debug)]
pub struct Tag {
    /// Tag id
    pub id: u16,
    /// Field type code as stored in the file
    pub field_type_raw: u16,
    /// Decoded field type, `None` when the code is unknown
    pub field_type: Option<FieldType>,
    /// Number of values
    pub count: u64,
    byte_order: ByteOrder,
    data: TagData,
}

impl Tag {
    /// Tag whose value was decoded from the entry.
    pub fn inline(
        id: u16,
        field_type_raw: u16,
        count: u64,
        byte_order: ByteOrder,
        value: TagValue,
    ) -> Self {
        Self {
            id,
            field_type_raw,
            field_type: FieldType::from_u16(field_type_raw),
            count,
            byte_order,
            data: TagData::Inline(value),
        }
    }

    /// Tag whose value lives at `offset` and has not been read yet.
    pub fn offset(
        id: u16,
        field_type: FieldType,
        count: u64,
        byte_order: ByteOrder,
        offset: u64,
    ) -> Self {
        Self {
            id,
            field_type_raw: field_type.as_u16(),
            field_type: Some(field_type),
            count,
            byte_order,
            data: TagData::Offset {
                offset,
                value: OnceCell::new(),
            },
        }
    }

    /// Display name of the tag.
    pub fn name(&self) -> String {
        tag_name(self.id)
    }

    /// Display name of the field type.
    pub fn type_name(&self) -> String {
        match self.field_type {
            Some(field_type) => field_type.name().to_string(),
            None => format!("UNKNOWN({})", self.field_type_raw),
        }
    }

    /// Whether the value was stored in the entry.
    pub fn is_inline(&self) -> bool {
        matches!(self.data, TagData::Inline(_))
    }

    /// File offset of an out-of-line value.
    pub fn value_offset(&self) -> Option<u64> {
        match self.data {
            TagData::Offset { offset, .. } => Some(offset),
            TagData::Inline(_) => None,
        }
    }

    /// Size of the value in bytes.
    pub fn byte_size(&self) -> u64 {
        self.field_type
            .and_then(|field_type| field_type.byte_size(self.count))
            .unwrap_or(0)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded_value().is_some()
    }

    /// The value if it is available without I/O.
    ///
    /// `None` means an out-of-line value that has not been fetched yet.
    pub fn loaded_value(&self) -> Option<&TagValue> {
        match &self.data {
            TagData::Inline(value) => Some(value),
            TagData::Offset { value, .. } => value.get(),
        }
    }

    /// The value, fetching and decoding it on first access.
    ///
    /// Concurrent callers share one fetch; later calls return the cached value.
    pub async fn value(&self, source: &ChunkedSource) -> Result<&TagValue, IoError> {
        match &self.data {
            TagData::Inline(value) => Ok(value),
            TagData::Offset { offset, value } => {
                value
                    .get_or_try_init(|| async {
                        let bytes = source.read(*offset, self.byte_size()).await?;
                        Ok::<_, IoError>(self.decode(&bytes))
                    })
                    .await
            }
        }
    }

    /// Element `index` of the value.
    ///
    /// An unloaded out-of-line array is not materialized: only the bytes of
    /// that element are read. Returns `None` past the end of the array.
    pub async fn value_at(
        &self,
        index: u64,
        source: &ChunkedSource,
    ) -> Result<Option<TagValue>, IoError> {
        if index >= self.count {
            return Ok(None);
        }
        if let Some(value) = self.loaded_value() {
            return Ok(usize::try_from(index).ok().and_then(|i| value.element(i)));
        }
        let (Some(field_type), Some(offset)) = (self.field_type, self.value_offset()) else {
            return Ok(None);
        };

        let size = field_type.size_in_bytes() as u64;
        let element_offset = index
            .checked_mul(size)
            .and_then(|start| offset.checked_add(start))
            .ok_or(IoError::RangeOutOfBounds {
                offset,
                requested: size,
                size: source.size().unwrap_or(u64::MAX),
            })?;
        let bytes = source.read(element_offset, size).await?;
        Ok(Some(decode_value(&bytes, field_type, self.byte_order)))
    }

    /// Element `index` as an unsigned integer.
    pub async fn u64_at(&self, index: u64, source: &ChunkedSource) -> Result<Option<u64>, IoError> {
        Ok(self
            .value_at(index, source)
            .await?
            .and_then(|value| value.as_u64()))
    }

    fn decode(&self, bytes: &bytes::Bytes) -> TagValue {
        match self.field_type {
            Some(field_type) => decode_value(bytes, field_type, self.byte_order),
            None => super::values::decode_unknown(self.field_type_raw, bytes.clone()),
        }
    }
}
