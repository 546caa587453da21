//! Datom payload serialization. Every index key is written with the
//! CBOR-serialized datom as its value so non-key-only consumers can read
//! it back; the core's own scans never fetch it.

use crate::{
    datom::{Datom, Identity, Keyword, TxId},
    error::CoreError,
    value::Value,
};
use serde::{Deserialize, Serialize};

///
/// DatomWire
///

#[derive(Debug, Deserialize, Serialize)]
struct DatomWire {
    e: [u8; Identity::LEN],
    a: String,
    v: ValueWire,
    t: [u8; TxId::LEN],
}

#[derive(Debug, Deserialize, Serialize)]
enum ValueWire {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Inst(i64),
    Bytes(Vec<u8>),
    Ref([u8; Identity::LEN]),
    Keyword(String),
}

impl From<&Value> for ValueWire {
    fn from(value: &Value) -> Self {
        match value {
            Value::Str(v) => Self::Str(v.clone()),
            Value::Int(v) => Self::Int(*v),
            Value::Float(v) => Self::Float(*v),
            Value::Bool(v) => Self::Bool(*v),
            Value::Inst(v) => Self::Inst(*v),
            Value::Bytes(v) => Self::Bytes(v.clone()),
            Value::Ref(v) => Self::Ref(*v.as_bytes()),
            Value::Keyword(v) => Self::Keyword(v.name().to_string()),
        }
    }
}

impl From<ValueWire> for Value {
    fn from(wire: ValueWire) -> Self {
        match wire {
            ValueWire::Str(v) => Self::Str(v),
            ValueWire::Int(v) => Self::Int(v),
            ValueWire::Float(v) => Self::Float(v),
            ValueWire::Bool(v) => Self::Bool(v),
            ValueWire::Inst(v) => Self::Inst(v),
            ValueWire::Bytes(v) => Self::Bytes(v),
            ValueWire::Ref(v) => Self::Ref(Identity::intern(v)),
            ValueWire::Keyword(v) => Self::Keyword(Keyword::intern(&v)),
        }
    }
}

pub fn datom_payload(datom: &Datom) -> Result<Vec<u8>, CoreError> {
    let wire = DatomWire {
        e: *datom.e.as_bytes(),
        a: datom.a.name().to_string(),
        v: ValueWire::from(&datom.v),
        t: *datom.t.as_bytes(),
    };

    serde_cbor::to_vec(&wire)
        .map_err(|err| CoreError::storage(format!("datom payload serialization failed: {err}")))
}

pub fn datom_from_payload(bytes: &[u8]) -> Result<Datom, CoreError> {
    let wire: DatomWire = serde_cbor::from_slice(bytes)
        .map_err(|err| CoreError::decode(format!("datom payload is not decodable: {err}")))?;

    Ok(Datom::new(
        Identity::intern(wire.e),
        Keyword::intern(&wire.a),
        Value::from(wire.v),
        TxId::from_bytes(wire.t),
    ))
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::{datom_from_payload, datom_payload};
    use crate::{
        datom::{Datom, Identity, Keyword, TxId},
        value::Value,
    };

    #[test]
    fn payload_round_trips_every_variant() {
        let samples = vec![
            Value::Str("text".into()),
            Value::Int(-9),
            Value::Float(2.25),
            Value::Bool(true),
            Value::Inst(1_700_000_000_000_000_000),
            Value::Bytes(vec![0, 1, 2]),
            Value::Ref(Identity::of_str("bob")),
            Value::Keyword(Keyword::intern(":k/w")),
        ];

        for value in samples {
            let datom = Datom::new(
                Identity::of_str("alice"),
                Keyword::intern(":person/attr"),
                value,
                TxId::from_sequence(7),
            );
            let payload = datom_payload(&datom).expect("datom should serialize");
            let rebuilt = datom_from_payload(&payload).expect("payload should deserialize");
            assert_eq!(rebuilt, datom);
        }
    }

    #[test]
    fn garbage_payload_is_a_decode_error() {
        let err = datom_from_payload(&[0xDE, 0xAD, 0xBE, 0xEF]).expect_err("should fail");
        assert!(err.is_decode());
    }
}
