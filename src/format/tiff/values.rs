//! TIFF tag value decoding.
//!
//! Values are decoded from their raw bytes according to the entry's field
//! type and the file's byte order. Numeric arrays keep their native signedness;
//! rationals keep their numerator/denominator pairs. Field types this reader
//! does not know are kept as raw bytes so a private tag never aborts a parse.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use super::tags::FieldType;
use crate::io::ByteOrder;

/// Longest array printed in full by `Display`.
const DISPLAY_LIMIT: usize = 16;

/// A decoded tag value.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// BYTE, SHORT, LONG, IFD, LONG8, IFD8
    Unsigned(Vec<u64>),
    /// SBYTE, SSHORT, SLONG, SLONG8
    Signed(Vec<i64>),
    /// FLOAT, DOUBLE
    Float(Vec<f64>),
    /// RATIONAL
    Rational(Vec<(u32, u32)>),
    /// SRATIONAL
    SRational(Vec<(i32, i32)>),
    /// ASCII with the trailing NUL removed
    Ascii(String),
    /// UNDEFINED bytes
    Undefined(Bytes),
    /// Field type this reader does not understand, kept raw
    Unknown { field_type: u16, bytes: Bytes },
}

impl TagValue {
    /// Number of elements (characters for ASCII, bytes for raw values).
    pub fn len(&self) -> usize {
        match self {
            TagValue::Unsigned(v) => v.len(),
            TagValue::Signed(v) => v.len(),
            TagValue::Float(v) => v.len(),
            TagValue::Rational(v) => v.len(),
            TagValue::SRational(v) => v.len(),
            TagValue::Ascii(s) => s.len(),
            TagValue::Undefined(b) => b.len(),
            TagValue::Unknown { bytes, .. } => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A one-element value holding element `index`.
    pub fn element(&self, index: usize) -> Option<TagValue> {
        match self {
            TagValue::Unsigned(v) => v.get(index).map(|&x| TagValue::Unsigned(vec![x])),
            TagValue::Signed(v) => v.get(index).map(|&x| TagValue::Signed(vec![x])),
            TagValue::Float(v) => v.get(index).map(|&x| TagValue::Float(vec![x])),
            TagValue::Rational(v) => v.get(index).map(|&x| TagValue::Rational(vec![x])),
            TagValue::SRational(v) => v.get(index).map(|&x| TagValue::SRational(vec![x])),
            TagValue::Ascii(s) => s
                .as_bytes()
                .get(index)
                .map(|&b| TagValue::Ascii((b as char).to_string())),
            TagValue::Undefined(b) => b
                .get(index)
                .map(|&x| TagValue::Undefined(Bytes::copy_from_slice(&[x]))),
            TagValue::Unknown { .. } => None,
        }
    }

    /// Element `index` as an unsigned integer.
    pub fn get_u64(&self, index: usize) -> Option<u64> {
        match self {
            TagValue::Unsigned(v) => v.get(index).copied(),
            TagValue::Signed(v) => v.get(index).and_then(|&x| u64::try_from(x).ok()),
            TagValue::Undefined(b) => b.get(index).map(|&x| x as u64),
            _ => None,
        }
    }

    /// First element as an unsigned integer.
    pub fn as_u64(&self) -> Option<u64> {
        self.get_u64(0)
    }

    /// Element `index` as a float, with rationals reduced.
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        match self {
            TagValue::Unsigned(v) => v.get(index).map(|&x| x as f64),
            TagValue::Signed(v) => v.get(index).map(|&x| x as f64),
            TagValue::Float(v) => v.get(index).copied(),
            TagValue::Rational(v) => v.get(index).map(|&(n, d)| n as f64 / d as f64),
            TagValue::SRational(v) => v.get(index).map(|&(n, d)| n as f64 / d as f64),
            _ => None,
        }
    }

    /// All elements as floats, or `None` for non-numeric values.
    pub fn as_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            TagValue::Ascii(_) | TagValue::Undefined(_) | TagValue::Unknown { .. } => None,
            _ => Some((0..self.len()).filter_map(|i| self.get_f64(i)).collect()),
        }
    }

    /// The string of an ASCII value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Ascii(s) => Some(s),
            _ => None,
        }
    }

    /// Raw bytes of an UNDEFINED value, or of a BYTE array.
    pub fn to_bytes(&self) -> Option<Bytes> {
        match self {
            TagValue::Undefined(b) => Some(b.clone()),
            TagValue::Unknown { bytes, .. } => Some(bytes.clone()),
            TagValue::Unsigned(v) if v.iter().all(|&x| x <= u8::MAX as u64) => {
                Some(v.iter().map(|&x| x as u8).collect())
            }
            _ => None,
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    if items.len() == 1 {
        return write!(f, "{}", items[0]);
    }
    write!(f, "[")?;
    for (i, item) in items.iter().take(DISPLAY_LIMIT).enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    if items.len() > DISPLAY_LIMIT {
        write!(f, ", ... {} values", items.len())?;
    }
    write!(f, "]")
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Unsigned(v) => write_list(f, v),
            TagValue::Signed(v) => write_list(f, v),
            TagValue::Float(v) => write_list(f, v),
            TagValue::Rational(v) => {
                let v: Vec<String> = v.iter().map(|(n, d)| format!("{n}/{d}")).collect();
                write_list(f, &v)
            }
            TagValue::SRational(v) => {
                let v: Vec<String> = v.iter().map(|(n, d)| format!("{n}/{d}")).collect();
                write_list(f, &v)
            }
            TagValue::Ascii(s) => write!(f, "{s}"),
            TagValue::Undefined(b) => write!(f, "<{} bytes>", b.len()),
            TagValue::Unknown { field_type, bytes } => {
                write!(f, "<type {field_type}: {} bytes>", bytes.len())
            }
        }
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode the raw bytes of a tag value.
///
/// Only whole elements are decoded; trailing bytes that do not form a full
/// element are ignored.
pub fn decode_value(bytes: &Bytes, field_type: FieldType, byte_order: ByteOrder) -> TagValue {
    let size = field_type.size_in_bytes();
    let elements = bytes.chunks_exact(size);

    match field_type {
        FieldType::Byte => TagValue::Unsigned(bytes.iter().map(|&b| b as u64).collect()),
        FieldType::Short => {
            TagValue::Unsigned(elements.map(|e| byte_order.read_u16(e) as u64).collect())
        }
        FieldType::Long | FieldType::Ifd => {
            TagValue::Unsigned(elements.map(|e| byte_order.read_u32(e) as u64).collect())
        }
        FieldType::Long8 | FieldType::Ifd8 => {
            TagValue::Unsigned(elements.map(|e| byte_order.read_u64(e)).collect())
        }
        FieldType::SByte => TagValue::Signed(bytes.iter().map(|&b| b as i8 as i64).collect()),
        FieldType::SShort => {
            TagValue::Signed(elements.map(|e| byte_order.read_u16(e) as i16 as i64).collect())
        }
        FieldType::SLong => {
            TagValue::Signed(elements.map(|e| byte_order.read_u32(e) as i32 as i64).collect())
        }
        FieldType::SLong8 => {
            TagValue::Signed(elements.map(|e| byte_order.read_u64(e) as i64).collect())
        }
        FieldType::Float => TagValue::Float(
            elements
                .map(|e| f32::from_bits(byte_order.read_u32(e)) as f64)
                .collect(),
        ),
        FieldType::Double => TagValue::Float(
            elements
                .map(|e| f64::from_bits(byte_order.read_u64(e)))
                .collect(),
        ),
        FieldType::Rational => TagValue::Rational(
            elements
                .map(|e| (byte_order.read_u32(&e[..4]), byte_order.read_u32(&e[4..])))
                .collect(),
        ),
        FieldType::SRational => TagValue::SRational(
            elements
                .map(|e| {
                    (
                        byte_order.read_u32(&e[..4]) as i32,
                        byte_order.read_u32(&e[4..]) as i32,
                    )
                })
                .collect(),
        ),
        FieldType::Ascii => {
            let end = bytes
                .iter()
                .rposition(|&b| b != 0)
                .map(|p| p + 1)
                .unwrap_or(0);
            TagValue::Ascii(String::from_utf8_lossy(&bytes[..end]).into_owned())
        }
        FieldType::Undefined => TagValue::Undefined(bytes.clone()),
    }
}

/// Decode a tag whose field type code is not one this reader knows.
pub fn decode_unknown(field_type: u16, bytes: Bytes) -> TagValue {
    TagValue::Unknown { field_type, bytes }
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a value back into raw bytes for `field_type`.
///
/// ASCII values are written with a single terminating NUL. Values whose
/// variant does not match the field type encode as empty.
pub fn encode_value(value: &TagValue, field_type: FieldType, byte_order: ByteOrder) -> Bytes {
    let mut out = BytesMut::new();
    let le = byte_order == ByteOrder::LittleEndian;

    macro_rules! put {
        ($value:expr, $le:ident, $be:ident) => {
            if le {
                out.$le($value)
            } else {
                out.$be($value)
            }
        };
    }

    match (value, field_type) {
        (TagValue::Unsigned(v), FieldType::Byte) => v.iter().for_each(|&x| out.put_u8(x as u8)),
        (TagValue::Unsigned(v), FieldType::Short) => {
            v.iter().for_each(|&x| put!(x as u16, put_u16_le, put_u16))
        }
        (TagValue::Unsigned(v), FieldType::Long | FieldType::Ifd) => {
            v.iter().for_each(|&x| put!(x as u32, put_u32_le, put_u32))
        }
        (TagValue::Unsigned(v), FieldType::Long8 | FieldType::Ifd8) => {
            v.iter().for_each(|&x| put!(x, put_u64_le, put_u64))
        }
        (TagValue::Signed(v), FieldType::SByte) => v.iter().for_each(|&x| out.put_i8(x as i8)),
        (TagValue::Signed(v), FieldType::SShort) => {
            v.iter().for_each(|&x| put!(x as i16, put_i16_le, put_i16))
        }
        (TagValue::Signed(v), FieldType::SLong) => {
            v.iter().for_each(|&x| put!(x as i32, put_i32_le, put_i32))
        }
        (TagValue::Signed(v), FieldType::SLong8) => {
            v.iter().for_each(|&x| put!(x, put_i64_le, put_i64))
        }
        (TagValue::Float(v), FieldType::Float) => {
            v.iter().for_each(|&x| put!(x as f32, put_f32_le, put_f32))
        }
        (TagValue::Float(v), FieldType::Double) => {
            v.iter().for_each(|&x| put!(x, put_f64_le, put_f64))
        }
        (TagValue::Rational(v), FieldType::Rational) => v.iter().for_each(|&(n, d)| {
            put!(n, put_u32_le, put_u32);
            put!(d, put_u32_le, put_u32);
        }),
        (TagValue::SRational(v), FieldType::SRational) => v.iter().for_each(|&(n, d)| {
            put!(n, put_i32_le, put_i32);
            put!(d, put_i32_le, put_i32);
        }),
        (TagValue::Ascii(s), FieldType::Ascii) => {
            out.extend_from_slice(s.as_bytes());
            out.put_u8(0);
        }
        (TagValue::Undefined(b), FieldType::Undefined) => out.extend_from_slice(b),
        (TagValue::Unknown { bytes, .. }, _) => out.extend_from_slice(bytes),
        _ => {}
    }

    out.freeze()
}
