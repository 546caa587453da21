//! Module: key::printable
//! Responsibility: the debuggable on-disk key strategy.
//! Does not own: range construction or value payload layout.
//! Boundary: lowercase-hex components behind `/` separators. Hex is
//! order-preserving per byte and the value wire form is prefix-free, so
//! relative key order matches the binary strategy exactly.

use crate::{
    config::EncoderKind,
    datom::{Datom, DatomPosition},
    key::{
        ATTR_LEN, ENTITY_LEN, IndexKind, KeyDecodeError, KeyEncoder, KeyParts, KeyPrefix,
        MIN_VALUE_LEN, TX_LEN,
    },
    value::encode_value,
};

const SEPARATOR: u8 = b'/';
const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

///
/// PrintableKeyEncoder
///
/// Reference values in value position come out as fixed-width hex (40
/// characters for the 20-byte hash), keeping the whole value field
/// printable; the decoder reverses the wrapping along with every other
/// component.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct PrintableKeyEncoder;

impl PrintableKeyEncoder {
    fn push_hex(out: &mut Vec<u8>, bytes: &[u8]) {
        for &byte in bytes {
            out.push(HEX_DIGITS[usize::from(byte >> 4)]);
            out.push(HEX_DIGITS[usize::from(byte & 0x0F)]);
        }
    }

    fn push_component(out: &mut Vec<u8>, datom: &Datom, position: DatomPosition) {
        out.push(SEPARATOR);
        match position {
            DatomPosition::Entity => Self::push_hex(out, datom.e.as_bytes()),
            DatomPosition::Attribute => Self::push_hex(out, datom.a.field()),
            DatomPosition::Value => Self::push_hex(out, &encode_value(&datom.v)),
            DatomPosition::Tx => Self::push_hex(out, datom.t.as_bytes()),
        }
    }

    // Hex width of a fixed component plus its separator.
    const fn framed_width(position: DatomPosition) -> usize {
        match position {
            DatomPosition::Entity => 1 + ENTITY_LEN * 2,
            DatomPosition::Attribute => 1 + ATTR_LEN * 2,
            DatomPosition::Tx => 1 + TX_LEN * 2,
            DatomPosition::Value => 0,
        }
    }

    fn decode_hex(hex: &[u8]) -> Result<Vec<u8>, KeyDecodeError> {
        if hex.len() % 2 != 0 {
            return Err(KeyDecodeError::Malformed {
                message: "odd-length hex component",
            });
        }

        let mut out = Vec::with_capacity(hex.len() / 2);
        for pair in hex.chunks_exact(2) {
            let high = Self::nibble(pair[0])?;
            let low = Self::nibble(pair[1])?;
            out.push((high << 4) | low);
        }

        Ok(out)
    }

    const fn nibble(byte: u8) -> Result<u8, KeyDecodeError> {
        match byte {
            b'0'..=b'9' => Ok(byte - b'0'),
            b'a'..=b'f' => Ok(byte - b'a' + 10),
            _ => Err(KeyDecodeError::Malformed {
                message: "non-hex character in component",
            }),
        }
    }

    fn read_fixed<const N: usize>(
        body: &[u8],
        offset: &mut usize,
        index: IndexKind,
    ) -> Result<[u8; N], KeyDecodeError> {
        if body.get(*offset) != Some(&SEPARATOR) {
            return Err(KeyDecodeError::Malformed {
                message: "missing component separator",
            });
        }
        *offset += 1;

        let end = *offset + N * 2;
        let hex = body.get(*offset..end).ok_or(KeyDecodeError::TooShort {
            index: index.label(),
            len: body.len(),
        })?;
        *offset = end;

        let raw = Self::decode_hex(hex)?;
        Ok(raw.try_into().expect("hex width fixed above"))
    }
}

impl KeyEncoder for PrintableKeyEncoder {
    fn kind(&self) -> EncoderKind {
        EncoderKind::Printable
    }

    fn encode_key(&self, index: IndexKind, datom: &Datom) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + (ENTITY_LEN + ATTR_LEN + TX_LEN + 16) * 2 + 4);
        out.push(index.printable_tag());
        for position in index.composite() {
            Self::push_component(&mut out, datom, position);
        }

        out
    }

    fn decode_key(&self, index: IndexKind, bytes: &[u8]) -> Result<KeyParts, KeyDecodeError> {
        let (&tag, body) = bytes.split_first().ok_or(KeyDecodeError::TooShort {
            index: index.label(),
            len: bytes.len(),
        })?;
        if tag != index.printable_tag() {
            return Err(KeyDecodeError::WrongNamespace {
                index: index.label(),
                got: tag,
            });
        }

        let composite = index.composite();
        let value_slot = composite
            .iter()
            .position(|&position| position == DatomPosition::Value)
            .expect("every composite includes the value position");
        let trailing: usize = composite[value_slot + 1..]
            .iter()
            .map(|&position| Self::framed_width(position))
            .sum();

        let mut parts = KeyParts {
            e: [0u8; ENTITY_LEN],
            a: [0u8; ATTR_LEN],
            v: Vec::new(),
            t: [0u8; TX_LEN],
        };

        let mut offset = 0;
        for &position in &composite {
            match position {
                DatomPosition::Entity => {
                    parts.e = Self::read_fixed::<ENTITY_LEN>(body, &mut offset, index)?;
                }
                DatomPosition::Attribute => {
                    parts.a = Self::read_fixed::<ATTR_LEN>(body, &mut offset, index)?;
                }
                DatomPosition::Tx => {
                    parts.t = Self::read_fixed::<TX_LEN>(body, &mut offset, index)?;
                }
                DatomPosition::Value => {
                    if body.get(offset) != Some(&SEPARATOR) {
                        return Err(KeyDecodeError::Malformed {
                            message: "missing value separator",
                        });
                    }
                    offset += 1;

                    let end = body.len().checked_sub(trailing).filter(|&end| end >= offset)
                        .ok_or(KeyDecodeError::TooShort {
                            index: index.label(),
                            len: bytes.len(),
                        })?;
                    let value_bytes = Self::decode_hex(&body[offset..end])?;
                    if value_bytes.len() < MIN_VALUE_LEN {
                        return Err(KeyDecodeError::TooShort {
                            index: index.label(),
                            len: bytes.len(),
                        });
                    }
                    parts.v = value_bytes;
                    offset = end;
                }
            }
        }

        if offset != body.len() {
            return Err(KeyDecodeError::Malformed {
                message: "trailing bytes after final component",
            });
        }

        Ok(parts)
    }

    fn encode_prefix(&self, index: IndexKind, prefix: &KeyPrefix<'_>) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + (ENTITY_LEN + ATTR_LEN + TX_LEN + 16) * 2 + 4);
        out.push(index.printable_tag());

        for position in index.composite() {
            if !prefix.has(position) {
                break;
            }

            out.push(SEPARATOR);
            match position {
                DatomPosition::Entity => {
                    Self::push_hex(&mut out, prefix.e.expect("presence checked").as_bytes());
                }
                DatomPosition::Attribute => {
                    Self::push_hex(&mut out, prefix.a.expect("presence checked").field());
                }
                DatomPosition::Value => {
                    let wire = encode_value(prefix.v.expect("presence checked"));
                    Self::push_hex(&mut out, &wire);
                }
                DatomPosition::Tx => {
                    Self::push_hex(&mut out, prefix.t.expect("presence checked").as_bytes());
                }
            }
        }

        out
    }
}
