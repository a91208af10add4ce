use crate::error::Error;
use crate::message::Message;

use super::{Serializer, SerializerType};

pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serializer_type(&self) -> SerializerType {
        SerializerType::Json
    }

    fn encode(&self, message: &Message) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(message)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Message, Error> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
