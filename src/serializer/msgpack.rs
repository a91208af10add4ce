use serde::Serialize;

use crate::error::Error;
use crate::message::Message;

use super::{Serializer, SerializerType};

pub struct MsgPackSerializer;

impl Serializer for MsgPackSerializer {
    fn serializer_type(&self) -> SerializerType {
        SerializerType::MsgPack
    }

    fn encode(&self, message: &Message) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::new();
        message.serialize(&mut rmp_serde::Serializer::new(&mut buf))?;
        Ok(buf)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Message, Error> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
