//! Module: key::binary
//! Responsibility: the compact on-disk key strategy.
//! Does not own: range construction (key::range) or value payload layout.
//! Boundary: fixed-width components raw, value component in wire form;
//! the value's prefix-free wire form is what lets the decoder split a key
//! without a length prefix.

use crate::{
    config::EncoderKind,
    datom::{Datom, DatomPosition},
    key::{
        ATTR_LEN, ENTITY_LEN, IndexKind, KeyDecodeError, KeyEncoder, KeyParts, KeyPrefix,
        MIN_VALUE_LEN, TX_LEN,
    },
    value::encode_value_into,
};

///
/// BinaryKeyEncoder
///

#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryKeyEncoder;

impl BinaryKeyEncoder {
    fn push_component(out: &mut Vec<u8>, datom: &Datom, position: DatomPosition) {
        match position {
            DatomPosition::Entity => out.extend_from_slice(datom.e.as_bytes()),
            DatomPosition::Attribute => out.extend_from_slice(datom.a.field()),
            DatomPosition::Value => encode_value_into(out, &datom.v),
            DatomPosition::Tx => out.extend_from_slice(datom.t.as_bytes()),
        }
    }

    const fn fixed_width(position: DatomPosition) -> usize {
        match position {
            DatomPosition::Entity => ENTITY_LEN,
            DatomPosition::Attribute => ATTR_LEN,
            DatomPosition::Tx => TX_LEN,
            DatomPosition::Value => 0,
        }
    }
}

impl KeyEncoder for BinaryKeyEncoder {
    fn kind(&self) -> EncoderKind {
        EncoderKind::Binary
    }

    fn encode_key(&self, index: IndexKind, datom: &Datom) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + ENTITY_LEN + ATTR_LEN + TX_LEN + 16);
        out.push(index.tag());
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
        if tag != index.tag() {
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

        let leading: usize = composite[..value_slot]
            .iter()
            .map(|&position| Self::fixed_width(position))
            .sum();
        let trailing: usize = composite[value_slot + 1..]
            .iter()
            .map(|&position| Self::fixed_width(position))
            .sum();

        if body.len() < leading + trailing + MIN_VALUE_LEN {
            return Err(KeyDecodeError::TooShort {
                index: index.label(),
                len: bytes.len(),
            });
        }

        let mut parts = KeyParts {
            e: [0u8; ENTITY_LEN],
            a: [0u8; ATTR_LEN],
            v: body[leading..body.len() - trailing].to_vec(),
            t: [0u8; TX_LEN],
        };

        let mut offset = 0;
        for &position in &composite {
            match position {
                DatomPosition::Entity => {
                    parts.e.copy_from_slice(&body[offset..offset + ENTITY_LEN]);
                    offset += ENTITY_LEN;
                }
                DatomPosition::Attribute => {
                    parts.a.copy_from_slice(&body[offset..offset + ATTR_LEN]);
                    offset += ATTR_LEN;
                }
                DatomPosition::Tx => {
                    parts.t.copy_from_slice(&body[offset..offset + TX_LEN]);
                    offset += TX_LEN;
                }
                DatomPosition::Value => {
                    offset = body.len() - trailing;
                }
            }
        }

        Ok(parts)
    }

    fn encode_prefix(&self, index: IndexKind, prefix: &KeyPrefix<'_>) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + ENTITY_LEN + ATTR_LEN + TX_LEN + 16);
        out.push(index.tag());

        for position in index.composite() {
            match position {
                DatomPosition::Entity => match prefix.e {
                    Some(e) => out.extend_from_slice(e.as_bytes()),
                    None => break,
                },
                DatomPosition::Attribute => match prefix.a {
                    Some(a) => out.extend_from_slice(a.field()),
                    None => break,
                },
                DatomPosition::Value => match prefix.v {
                    Some(v) => encode_value_into(&mut out, v),
                    None => break,
                },
                DatomPosition::Tx => match prefix.t {
                    Some(t) => out.extend_from_slice(t.as_bytes()),
                    None => break,
                },
            }
        }

        out
    }
}
