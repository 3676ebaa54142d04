// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use serde::de::{Error as SerdeError, Visitor};
use serde::{Deserialize, Serialize};
use serde_bytes::{ByteBuf as SerdeByteBuf, Bytes as SerdeBytes};

use crate::invid::{Invid, InvidError};

/// Serializes an Invid as its `type:num` string when using a human readable encoding (JSON),
/// otherwise as its 6-byte binary representation (CBOR).
impl Serialize for Invid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            SerdeBytes::new(&self.to_bytes()).serialize(serializer)
        }
    }
}

/// Deserialized Invids go through the registered allocator, so a received Invid is the canonical
/// instance when pooling is enabled.
impl<'de> Deserialize<'de> for Invid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            deserializer.deserialize_str(InvidVisitor)
        } else {
            let bytes = <SerdeByteBuf>::deserialize(deserializer)?;
            Invid::read(&bytes).map_err(|err: InvidError| SerdeError::custom(err.to_string()))
        }
    }
}

struct InvidVisitor;

impl Visitor<'_> for InvidVisitor {
    type Value = Invid;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("invid string in 'type:num' form")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: SerdeError,
    {
        Invid::parse(value).map_err(|err| E::custom(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use crate::invid::{Invid, InvidFactory};

    #[test]
    fn serialize_human_readable() {
        let invid = InvidFactory::new().create(5, 134);
        let json = serde_json::to_string(&invid).unwrap();
        assert_eq!(json, "\"5:134\"");

        let invid_again: Invid = serde_json::from_str(&json).unwrap();
        assert_eq!(invid, invid_again);
    }

    #[test]
    fn serialize_binary() {
        let invid = InvidFactory::new().create(3, 258);

        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&invid, &mut bytes).unwrap();

        // CBOR byte string of length 6.
        assert_eq!(bytes, vec![0x46, 0, 3, 0, 0, 1, 2]);

        let invid_again: Invid = ciborium::de::from_reader(&bytes[..]).unwrap();
        assert_eq!(invid, invid_again);
    }

    #[test]
    fn invalid_values() {
        assert!(serde_json::from_str::<Invid>("\"5134\"").is_err());
        assert!(serde_json::from_str::<Invid>("\"x:1\"").is_err());
        assert!(serde_json::from_str::<Invid>("12").is_err());

        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&ciborium::Value::Bytes(vec![0, 1, 2]), &mut bytes).unwrap();
        assert!(ciborium::de::from_reader::<Invid, _>(&bytes[..]).is_err());
    }
}
