pub mod cbor;
pub mod json;
pub mod msgpack;

use crate::error::Error;
use crate::message::Message;

/// Numeric ids match the rawsocket handshake's serializer nibble (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializerType {
    Json = 1,
    MsgPack = 2,
    Cbor = 3,
}

impl SerializerType {
    pub fn build(self) -> Box<dyn Serializer> {
        match self {
            SerializerType::Json => Box::new(json::JsonSerializer),
            SerializerType::MsgPack => Box::new(msgpack::MsgPackSerializer),
            SerializerType::Cbor => Box::new(cbor::CborSerializer),
        }
    }
}

/// Encodes/decodes whole `Message`s to/from the bytes carried by a rawsocket
/// frame payload.
pub trait Serializer: Send + Sync {
    fn serializer_type(&self) -> SerializerType;
    fn encode(&self, message: &Message) -> Result<Vec<u8>, Error>;
    fn decode(&self, bytes: &[u8]) -> Result<Message, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Dict;

    #[test]
    fn every_serializer_round_trips_a_message() {
        let message = Message::Hello("realm1".to_string(), Dict::new());
        for ty in [SerializerType::Json, SerializerType::MsgPack, SerializerType::Cbor] {
            let ser = ty.build();
            assert_eq!(ser.serializer_type(), ty);
            let bytes = ser.encode(&message).unwrap();
            let decoded = ser.decode(&bytes).unwrap();
            assert_eq!(decoded, message);
        }
    }
}
