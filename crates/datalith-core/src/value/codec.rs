//! Module: value::codec
//! Responsibility: canonical `[type_tag][payload]` byte layout per value
//! type, order-preserving for every variant.
//! Does not own: composite key framing.
//! Boundary: every encoded value is prefix-free, so values embed in
//! composite keys without a length prefix and the concatenated key order
//! equals the componentwise order.

use crate::{
    datom::{Identity, Keyword},
    error::CoreError,
    value::{Value, ValueTag},
};
use thiserror::Error as ThisError;

const SEGMENT_TERMINATOR: [u8; 2] = [0x00, 0x00];
const SEGMENT_ESCAPE: [u8; 2] = [0x00, 0xFF];

///
/// ValueDecodeError
///

#[derive(Debug, ThisError)]
pub enum ValueDecodeError {
    #[error("empty value bytes")]
    Empty,

    #[error("unknown value type tag {tag:#04x}")]
    UnknownTag { tag: u8 },

    #[error("truncated {kind} payload: need {need} bytes, have {have}")]
    Truncated {
        kind: &'static str,
        need: usize,
        have: usize,
    },

    #[error("unterminated byte segment")]
    UnterminatedSegment,

    #[error("invalid escape byte {byte:#04x} after 0x00")]
    InvalidEscape { byte: u8 },

    #[error("string payload is not valid utf-8")]
    InvalidUtf8,

    #[error("invalid bool payload byte {byte:#04x}")]
    InvalidBool { byte: u8 },
}

impl From<ValueDecodeError> for CoreError {
    fn from(err: ValueDecodeError) -> Self {
        Self::decode(format!("value bytes are not decodable: {err}"))
    }
}

/// Encode a value into its canonical wire form.
#[must_use]
pub fn encode_value(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_value_into(&mut out, value);
    out
}

pub fn encode_value_into(out: &mut Vec<u8>, value: &Value) {
    out.push(value.tag().to_u8());

    match value {
        Value::Str(v) => push_terminated_bytes(out, v.as_bytes()),
        Value::Int(v) | Value::Inst(v) => out.extend_from_slice(&ordered_i64_bytes(*v)),
        Value::Float(v) => out.extend_from_slice(&ordered_f64_bytes(*v)),
        Value::Bool(v) => out.push(u8::from(*v)),
        Value::Bytes(v) => push_terminated_bytes(out, v),
        Value::Ref(v) => out.extend_from_slice(v.as_bytes()),
        Value::Keyword(v) => out.extend_from_slice(v.field()),
    }
}

/// Decode one value from the front of `bytes`, returning it together with
/// the number of bytes consumed.
pub fn decode_value(bytes: &[u8]) -> Result<(Value, usize), ValueDecodeError> {
    let (&tag_byte, payload) = bytes.split_first().ok_or(ValueDecodeError::Empty)?;
    let tag = ValueTag::from_u8(tag_byte).ok_or(ValueDecodeError::UnknownTag { tag: tag_byte })?;

    let (value, payload_len) = match tag {
        ValueTag::Str => {
            let (raw, consumed) = read_terminated_bytes(payload)?;
            let text = String::from_utf8(raw).map_err(|_| ValueDecodeError::InvalidUtf8)?;
            (Value::Str(text), consumed)
        }
        ValueTag::Int => {
            let raw = fixed_payload::<8>(payload, "int")?;
            (Value::Int(restore_i64(raw)), 8)
        }
        ValueTag::Float => {
            let raw = fixed_payload::<8>(payload, "float")?;
            (Value::Float(restore_f64(raw)), 8)
        }
        ValueTag::Bool => {
            let byte = *payload.first().ok_or(ValueDecodeError::Truncated {
                kind: "bool",
                need: 1,
                have: 0,
            })?;
            let flag = match byte {
                0 => false,
                1 => true,
                other => return Err(ValueDecodeError::InvalidBool { byte: other }),
            };
            (Value::Bool(flag), 1)
        }
        ValueTag::Inst => {
            let raw = fixed_payload::<8>(payload, "inst")?;
            (Value::Inst(restore_i64(raw)), 8)
        }
        ValueTag::Bytes => {
            let (raw, consumed) = read_terminated_bytes(payload)?;
            (Value::Bytes(raw), consumed)
        }
        ValueTag::Ref => {
            let raw = fixed_payload::<{ Identity::LEN }>(payload, "ref")?;
            (Value::Ref(Identity::intern(raw)), Identity::LEN)
        }
        ValueTag::Keyword => {
            let raw = fixed_payload::<{ Keyword::FIELD_LEN }>(payload, "keyword")?;
            (Value::Keyword(Keyword::from_field(&raw)), Keyword::FIELD_LEN)
        }
    };

    Ok((value, 1 + payload_len))
}

fn fixed_payload<const N: usize>(
    payload: &[u8],
    kind: &'static str,
) -> Result<[u8; N], ValueDecodeError> {
    let slice = payload.get(..N).ok_or(ValueDecodeError::Truncated {
        kind,
        need: N,
        have: payload.len(),
    })?;

    Ok(slice.try_into().expect("slice length checked above"))
}

// Byte strings are escaped so segment boundaries remain unambiguous and
// the escaped form preserves raw byte order.
pub(crate) fn push_terminated_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    for &byte in bytes {
        if byte == 0 {
            out.extend_from_slice(&SEGMENT_ESCAPE);
        } else {
            out.push(byte);
        }
    }

    out.extend_from_slice(&SEGMENT_TERMINATOR);
}

pub(crate) fn read_terminated_bytes(bytes: &[u8]) -> Result<(Vec<u8>, usize), ValueDecodeError> {
    let mut out = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        let byte = bytes[offset];
        if byte != 0 {
            out.push(byte);
            offset += 1;
            continue;
        }

        let next = *bytes
            .get(offset + 1)
            .ok_or(ValueDecodeError::UnterminatedSegment)?;
        match next {
            0x00 => return Ok((out, offset + 2)),
            0xFF => {
                out.push(0);
                offset += 2;
            }
            other => return Err(ValueDecodeError::InvalidEscape { byte: other }),
        }
    }

    Err(ValueDecodeError::UnterminatedSegment)
}

// Bias the sign bit so lexicographic byte order matches signed order.
pub(crate) const fn ordered_i64_bytes(value: i64) -> [u8; 8] {
    let biased = value.cast_unsigned() ^ (1u64 << 63);
    biased.to_be_bytes()
}

pub(crate) const fn restore_i64(bytes: [u8; 8]) -> i64 {
    (u64::from_be_bytes(bytes) ^ (1u64 << 63)).cast_signed()
}

// IEEE-754 sign-flip transform: positive floats get the sign bit set,
// negative floats are fully inverted, so byte order matches numeric order
// (with -0.0 < 0.0 and NaN payloads at the extremes).
pub(crate) const fn ordered_f64_bytes(value: f64) -> [u8; 8] {
    let bits = value.to_bits();
    let ordered = if bits & 0x8000_0000_0000_0000 == 0 {
        bits ^ 0x8000_0000_0000_0000
    } else {
        !bits
    };

    ordered.to_be_bytes()
}

pub(crate) const fn restore_f64(bytes: [u8; 8]) -> f64 {
    let ordered = u64::from_be_bytes(bytes);
    let bits = if ordered & 0x8000_0000_0000_0000 != 0 {
        ordered ^ 0x8000_0000_0000_0000
    } else {
        !ordered
    };

    f64::from_bits(bits)
}

///
/// TESTS
///
