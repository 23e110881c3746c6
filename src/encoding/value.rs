//! Leaf values and their tagged byte encoding.
//!
//! A value field is one type tag byte followed by a payload:
//!
//! | Tag | Type | Payload |
//! |-----|------|---------|
//! | 0 | Null | none |
//! | 1 | Bool | 1 byte |
//! | 2 | Int | little-endian, 2/4/8 bytes |
//! | 3 | Float | IEEE-754 little-endian, 4/8 bytes |
//! | 4 | String | raw UTF-8 |
//! | 5 | Raw bytes / numeric block | raw; blocks are packed LE `f64` |
//! | 6 | Array marker | none |
//! | 7 | Object marker | none |

use super::error::{CodecError, CodecResult};
use std::fmt;

pub const TAG_NULL: u8 = 0x00;
pub const TAG_BOOL: u8 = 0x01;
pub const TAG_INT: u8 = 0x02;
pub const TAG_FLOAT: u8 = 0x03;
pub const TAG_STRING: u8 = 0x04;
pub const TAG_BYTES: u8 = 0x05;
pub const TAG_ARRAY: u8 = 0x06;
pub const TAG_OBJECT: u8 = 0x07;

/// Display sentinel for a decoded array marker.
pub const ARRAY_SENTINEL: &str = "<ARRAY>";
/// Display sentinel for a decoded object marker.
pub const OBJECT_SENTINEL: &str = "<OBJECT>";

/// A single transmissible value.
///
/// `NumericBlock` and `RawBytes` share tag 5 on the wire. The encoder only
/// emits a `NumericBlock` when one was built from floats; the decoder always
/// reads tag 5 back as a `NumericBlock`.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueNode {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    RawBytes(Vec<u8>),
    NumericBlock(Vec<f64>),
    ArrayMarker,
    ObjectMarker,
}

impl ValueNode {
    /// Wire tag for this value.
    pub fn tag(&self) -> u8 {
        match self {
            ValueNode::Null => TAG_NULL,
            ValueNode::Bool(_) => TAG_BOOL,
            ValueNode::Int16(_) | ValueNode::Int32(_) | ValueNode::Int64(_) => TAG_INT,
            ValueNode::Float32(_) | ValueNode::Float64(_) => TAG_FLOAT,
            ValueNode::String(_) => TAG_STRING,
            ValueNode::RawBytes(_) | ValueNode::NumericBlock(_) => TAG_BYTES,
            ValueNode::ArrayMarker => TAG_ARRAY,
            ValueNode::ObjectMarker => TAG_OBJECT,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ValueNode::Null => "Null",
            ValueNode::Bool(_) => "Bool",
            ValueNode::Int16(_) => "Int16",
            ValueNode::Int32(_) => "Int32",
            ValueNode::Int64(_) => "Int64",
            ValueNode::Float32(_) => "Float32",
            ValueNode::Float64(_) => "Float64",
            ValueNode::String(_) => "String",
            ValueNode::RawBytes(_) => "RawBytes",
            ValueNode::NumericBlock(_) => "NumericBlock",
            ValueNode::ArrayMarker => "ArrayMarker",
            ValueNode::ObjectMarker => "ObjectMarker",
        }
    }

    pub fn is_marker(&self) -> bool {
        matches!(self, ValueNode::ArrayMarker | ValueNode::ObjectMarker)
    }

    /// Integer value widened to i64, if this is an int.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ValueNode::Int16(v) => Some(*v as i64),
            ValueNode::Int32(v) => Some(*v as i64),
            ValueNode::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Float value widened to f64, if this is a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ValueNode::Float32(v) => Some(*v as f64),
            ValueNode::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ValueNode::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&[f64]> {
        match self {
            ValueNode::NumericBlock(v) => Some(v),
            _ => None,
        }
    }

    /// Append tag and payload to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.tag());
        match self {
            ValueNode::Null | ValueNode::ArrayMarker | ValueNode::ObjectMarker => {}
            ValueNode::Bool(v) => out.push(u8::from(*v)),
            ValueNode::Int16(v) => out.extend_from_slice(&v.to_le_bytes()),
            ValueNode::Int32(v) => out.extend_from_slice(&v.to_le_bytes()),
            ValueNode::Int64(v) => out.extend_from_slice(&v.to_le_bytes()),
            ValueNode::Float32(v) => out.extend_from_slice(&v.to_le_bytes()),
            ValueNode::Float64(v) => out.extend_from_slice(&v.to_le_bytes()),
            ValueNode::String(s) => out.extend_from_slice(s.as_bytes()),
            ValueNode::RawBytes(b) => out.extend_from_slice(b),
            ValueNode::NumericBlock(values) => {
                out.reserve(values.len() * 8);
                for v in values {
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
        }
    }

    /// Decode a complete value field (tag byte plus payload).
    pub fn decode(field: &[u8]) -> CodecResult<Self> {
        let (&tag, payload) = field.split_first().ok_or(CodecError::EmptyValue)?;

        let value = match tag {
            TAG_NULL => ValueNode::Null,
            TAG_BOOL => match payload {
                [b] => ValueNode::Bool(*b != 0),
                _ => return Err(CodecError::InvalidBoolLength(payload.len())),
            },
            TAG_INT => match payload.len() {
                2 => ValueNode::Int16(i16::from_le_bytes([payload[0], payload[1]])),
                4 => ValueNode::Int32(i32::from_le_bytes(fixed(payload))),
                8 => ValueNode::Int64(i64::from_le_bytes(fixed(payload))),
                n => return Err(CodecError::InvalidIntWidth(n)),
            },
            TAG_FLOAT => match payload.len() {
                4 => ValueNode::Float32(f32::from_le_bytes(fixed(payload))),
                8 => ValueNode::Float64(f64::from_le_bytes(fixed(payload))),
                n => return Err(CodecError::InvalidFloatWidth(n)),
            },
            TAG_STRING => ValueNode::String(
                String::from_utf8(payload.to_vec()).map_err(CodecError::InvalidUtf8)?,
            ),
            TAG_BYTES => ValueNode::NumericBlock(unpack_f64s(payload)?),
            TAG_ARRAY => ValueNode::ArrayMarker,
            TAG_OBJECT => ValueNode::ObjectMarker,
            other => return Err(CodecError::UnknownTag(other)),
        };

        Ok(value)
    }

    /// JSON rendering used by the CLI. Non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            ValueNode::Null => Value::Null,
            ValueNode::Bool(v) => Value::Bool(*v),
            ValueNode::Int16(_) | ValueNode::Int32(_) | ValueNode::Int64(_) => {
                Value::from(self.as_i64().unwrap_or_default())
            }
            ValueNode::Float32(_) | ValueNode::Float64(_) => {
                float_json(self.as_f64().unwrap_or(f64::NAN))
            }
            ValueNode::String(s) => Value::String(s.clone()),
            ValueNode::RawBytes(b) => Value::Array(b.iter().map(|&x| Value::from(x)).collect()),
            ValueNode::NumericBlock(values) => {
                Value::Array(values.iter().map(|&v| float_json(v)).collect())
            }
            ValueNode::ArrayMarker => Value::String(ARRAY_SENTINEL.to_string()),
            ValueNode::ObjectMarker => Value::String(OBJECT_SENTINEL.to_string()),
        }
    }
}

fn fixed<const N: usize>(payload: &[u8]) -> [u8; N] {
    let mut raw = [0u8; N];
    raw.copy_from_slice(&payload[..N]);
    raw
}

fn float_json(v: f64) -> serde_json::Value {
    serde_json::Number::from_f64(v)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// Interpret a payload as packed little-endian doubles.
pub fn unpack_f64s(payload: &[u8]) -> CodecResult<Vec<f64>> {
    if payload.len() % 8 != 0 {
        return Err(CodecError::InvalidBlockLength(payload.len()));
    }
    Ok(payload
        .chunks_exact(8)
        .map(|chunk| f64::from_le_bytes(fixed(chunk)))
        .collect())
}

impl fmt::Display for ValueNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueNode::Null => f.write_str("null"),
            ValueNode::Bool(v) => write!(f, "{}", v),
            ValueNode::Int16(v) => write!(f, "{}", v),
            ValueNode::Int32(v) => write!(f, "{}", v),
            ValueNode::Int64(v) => write!(f, "{}", v),
            ValueNode::Float32(v) => write!(f, "{}", v),
            ValueNode::Float64(v) => write!(f, "{}", v),
            ValueNode::String(s) => write!(f, "{:?}", s),
            ValueNode::RawBytes(b) => write!(f, "{:?}", b),
            ValueNode::NumericBlock(values) => write!(f, "{:?}", values),
            ValueNode::ArrayMarker => f.write_str(ARRAY_SENTINEL),
            ValueNode::ObjectMarker => f.write_str(OBJECT_SENTINEL),
        }
    }
}

impl From<bool> for ValueNode {
    fn from(value: bool) -> Self {
        ValueNode::Bool(value)
    }
}

impl From<i64> for ValueNode {
    fn from(value: i64) -> Self {
        ValueNode::Int64(value)
    }
}

impl From<f64> for ValueNode {
    fn from(value: f64) -> Self {
        ValueNode::Float64(value)
    }
}

impl From<String> for ValueNode {
    fn from(value: String) -> Self {
        ValueNode::String(value)
    }
}

impl From<&str> for ValueNode {
    fn from(value: &str) -> Self {
        ValueNode::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(value: &ValueNode) -> Vec<u8> {
        let mut out = Vec::new();
        value.encode_into(&mut out);
        out
    }

    #[test]
    fn test_scalar_layouts() {
        assert_eq!(encoded(&ValueNode::Null), vec![0]);
        assert_eq!(encoded(&ValueNode::Bool(true)), vec![1, 1]);
        assert_eq!(encoded(&ValueNode::Int16(-1)), vec![2, 0xFF, 0xFF]);
        assert_eq!(encoded(&ValueNode::Int64(1)), vec![2, 1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(encoded(&ValueNode::from("hi")), vec![4, b'h', b'i']);
        assert_eq!(encoded(&ValueNode::ArrayMarker), vec![6]);
        assert_eq!(encoded(&ValueNode::ObjectMarker), vec![7]);
    }

    #[test]
    fn test_decode_widths() {
        assert_eq!(
            ValueNode::decode(&encoded(&ValueNode::Int32(-7))).unwrap(),
            ValueNode::Int32(-7)
        );
        assert_eq!(
            ValueNode::decode(&encoded(&ValueNode::Float32(1.5))).unwrap(),
            ValueNode::Float32(1.5)
        );
        assert!(matches!(
            ValueNode::decode(&[TAG_INT, 1, 2, 3]),
            Err(CodecError::InvalidIntWidth(3))
        ));
        assert!(matches!(
            ValueNode::decode(&[TAG_FLOAT, 1, 2]),
            Err(CodecError::InvalidFloatWidth(2))
        ));
    }

    #[test]
    fn test_decode_rejects_bad_bool_and_string_payloads() {
        assert_eq!(ValueNode::decode(&[TAG_BOOL, 0]).unwrap(), ValueNode::Bool(false));
        assert!(matches!(
            ValueNode::decode(&[TAG_BOOL]),
            Err(CodecError::InvalidBoolLength(0))
        ));
        assert!(matches!(
            ValueNode::decode(&[TAG_BOOL, 1, 1]),
            Err(CodecError::InvalidBoolLength(2))
        ));

        let err = ValueNode::decode(&[TAG_STRING, b'o', 0xFF, b'k']).unwrap_err();
        assert!(matches!(err, CodecError::InvalidUtf8(_)));
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_decode_rejects_unknown_tag_and_empty_field() {
        assert!(matches!(ValueNode::decode(&[0x08]), Err(CodecError::UnknownTag(8))));
        assert!(matches!(ValueNode::decode(&[]), Err(CodecError::EmptyValue)));
    }

    #[test]
    fn test_raw_bytes_decode_as_block() {
        let mut payload = vec![TAG_BYTES];
        payload.extend_from_slice(&2.5f64.to_le_bytes());
        assert_eq!(
            ValueNode::decode(&payload).unwrap(),
            ValueNode::NumericBlock(vec![2.5])
        );
        assert!(matches!(
            ValueNode::decode(&[TAG_BYTES, 1, 2, 3]),
            Err(CodecError::InvalidBlockLength(3))
        ));
    }

    #[test]
    fn test_display_sentinels() {
        assert_eq!(ValueNode::ArrayMarker.to_string(), "<ARRAY>");
        assert_eq!(ValueNode::ObjectMarker.to_string(), "<OBJECT>");
    }

    #[test]
    fn test_json_rendering_of_nan() {
        let block = ValueNode::NumericBlock(vec![1.0, f64::NAN]);
        assert_eq!(block.to_json(), serde_json::json!([1.0, null]));
    }
}
