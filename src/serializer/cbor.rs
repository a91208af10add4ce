use crate::error::Error;
use crate::message::Message;

use super::{Serializer, SerializerType};

pub struct CborSerializer;

impl Serializer for CborSerializer {
    fn serializer_type(&self) -> SerializerType {
        SerializerType::Cbor
    }

    fn encode(&self, message: &Message) -> Result<Vec<u8>, Error> {
        Ok(serde_cbor::to_vec(message)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Message, Error> {
        Ok(serde_cbor::from_slice(bytes)?)
    }
}
