use std::fmt;

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::value::{Dict, List};

pub const HELLO: u64 = 1;
pub const WELCOME: u64 = 2;
pub const ABORT: u64 = 3;
pub const CHALLENGE: u64 = 4;
pub const AUTHENTICATE: u64 = 5;
pub const GOODBYE: u64 = 6;
pub const ERROR: u64 = 8;
pub const PUBLISH: u64 = 16;
pub const PUBLISHED: u64 = 17;
pub const SUBSCRIBE: u64 = 32;
pub const SUBSCRIBED: u64 = 33;
pub const UNSUBSCRIBE: u64 = 34;
pub const UNSUBSCRIBED: u64 = 35;
pub const EVENT: u64 = 36;
pub const CALL: u64 = 48;
pub const RESULT: u64 = 50;
pub const REGISTER: u64 = 64;
pub const REGISTERED: u64 = 65;
pub const UNREGISTER: u64 = 66;
pub const UNREGISTERED: u64 = 67;
pub const INVOCATION: u64 = 68;
pub const YIELD: u64 = 70;

/// The WAMP message set this client speaks: the basic profile plus
/// `Challenge`/`Authenticate` for authenticated joins.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Hello(String, Dict),
    Welcome(u64, Dict),
    Abort(Dict, String),
    Challenge(String, Dict),
    Authenticate(String, Dict),
    Goodbye(Dict, String),
    Error(u64, u64, Dict, String, Option<List>, Option<Dict>),
    Subscribe(u64, Dict, String),
    Subscribed(u64, u64),
    Unsubscribe(u64, u64),
    Unsubscribed(u64),
    Publish(u64, Dict, String, Option<List>, Option<Dict>),
    Published(u64, u64),
    Event(u64, u64, Dict, Option<List>, Option<Dict>),
    Register(u64, Dict, String),
    Registered(u64, u64),
    Unregister(u64, u64),
    Unregistered(u64),
    Call(u64, Dict, String, Option<List>, Option<Dict>),
    Invocation(u64, u64, Dict, Option<List>, Option<Dict>),
    Yield(u64, Dict, Option<List>, Option<Dict>),
    Result(u64, Dict, Option<List>, Option<Dict>),
}

impl Message {
    /// The numeric code naming this message's kind on the wire.
    pub fn code(&self) -> u64 {
        match self {
            Message::Hello(..) => HELLO,
            Message::Welcome(..) => WELCOME,
            Message::Abort(..) => ABORT,
            Message::Challenge(..) => CHALLENGE,
            Message::Authenticate(..) => AUTHENTICATE,
            Message::Goodbye(..) => GOODBYE,
            Message::Error(..) => ERROR,
            Message::Subscribe(..) => SUBSCRIBE,
            Message::Subscribed(..) => SUBSCRIBED,
            Message::Unsubscribe(..) => UNSUBSCRIBE,
            Message::Unsubscribed(..) => UNSUBSCRIBED,
            Message::Publish(..) => PUBLISH,
            Message::Published(..) => PUBLISHED,
            Message::Event(..) => EVENT,
            Message::Register(..) => REGISTER,
            Message::Registered(..) => REGISTERED,
            Message::Unregister(..) => UNREGISTER,
            Message::Unregistered(..) => UNREGISTERED,
            Message::Call(..) => CALL,
            Message::Invocation(..) => INVOCATION,
            Message::Yield(..) => YIELD,
            Message::Result(..) => RESULT,
        }
    }
}

macro_rules! ser_tail {
    ($seq:expr, $args:expr, $kwargs:expr) => {{
        match ($args, $kwargs) {
            (Some(args), Some(kwargs)) => {
                $seq.serialize_element(args)?;
                $seq.serialize_element(kwargs)?;
            }
            (Some(args), None) => {
                $seq.serialize_element(args)?;
            }
            (None, Some(kwargs)) => {
                $seq.serialize_element(&List::new())?;
                $seq.serialize_element(kwargs)?;
            }
            (None, None) => {}
        }
    }};
}

impl Serialize for Message {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Message::Hello(realm, details) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&HELLO)?;
                seq.serialize_element(realm)?;
                seq.serialize_element(details)?;
                seq.end()
            }
            Message::Welcome(session, details) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&WELCOME)?;
                seq.serialize_element(session)?;
                seq.serialize_element(details)?;
                seq.end()
            }
            Message::Abort(details, reason) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&ABORT)?;
                seq.serialize_element(details)?;
                seq.serialize_element(reason)?;
                seq.end()
            }
            Message::Challenge(method, extra) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&CHALLENGE)?;
                seq.serialize_element(method)?;
                seq.serialize_element(extra)?;
                seq.end()
            }
            Message::Authenticate(signature, extra) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&AUTHENTICATE)?;
                seq.serialize_element(signature)?;
                seq.serialize_element(extra)?;
                seq.end()
            }
            Message::Goodbye(details, reason) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&GOODBYE)?;
                seq.serialize_element(details)?;
                seq.serialize_element(reason)?;
                seq.end()
            }
            Message::Error(request_type, request_id, details, uri, args, kwargs) => {
                let mut seq = serializer.serialize_seq(None)?;
                seq.serialize_element(&ERROR)?;
                seq.serialize_element(request_type)?;
                seq.serialize_element(request_id)?;
                seq.serialize_element(details)?;
                seq.serialize_element(uri)?;
                ser_tail!(seq, args, kwargs);
                seq.end()
            }
            Message::Subscribe(request_id, options, topic) => {
                let mut seq = serializer.serialize_seq(Some(4))?;
                seq.serialize_element(&SUBSCRIBE)?;
                seq.serialize_element(request_id)?;
                seq.serialize_element(options)?;
                seq.serialize_element(topic)?;
                seq.end()
            }
            Message::Subscribed(request_id, subscription_id) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&SUBSCRIBED)?;
                seq.serialize_element(request_id)?;
                seq.serialize_element(subscription_id)?;
                seq.end()
            }
            Message::Unsubscribe(request_id, subscription_id) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&UNSUBSCRIBE)?;
                seq.serialize_element(request_id)?;
                seq.serialize_element(subscription_id)?;
                seq.end()
            }
            Message::Unsubscribed(request_id) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&UNSUBSCRIBED)?;
                seq.serialize_element(request_id)?;
                seq.end()
            }
            Message::Publish(request_id, options, topic, args, kwargs) => {
                let mut seq = serializer.serialize_seq(None)?;
                seq.serialize_element(&PUBLISH)?;
                seq.serialize_element(request_id)?;
                seq.serialize_element(options)?;
                seq.serialize_element(topic)?;
                ser_tail!(seq, args, kwargs);
                seq.end()
            }
            Message::Published(request_id, publication_id) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&PUBLISHED)?;
                seq.serialize_element(request_id)?;
                seq.serialize_element(publication_id)?;
                seq.end()
            }
            Message::Event(subscription_id, publication_id, details, args, kwargs) => {
                let mut seq = serializer.serialize_seq(None)?;
                seq.serialize_element(&EVENT)?;
                seq.serialize_element(subscription_id)?;
                seq.serialize_element(publication_id)?;
                seq.serialize_element(details)?;
                ser_tail!(seq, args, kwargs);
                seq.end()
            }
            Message::Register(request_id, options, procedure) => {
                let mut seq = serializer.serialize_seq(Some(4))?;
                seq.serialize_element(&REGISTER)?;
                seq.serialize_element(request_id)?;
                seq.serialize_element(options)?;
                seq.serialize_element(procedure)?;
                seq.end()
            }
            Message::Registered(request_id, registration_id) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&REGISTERED)?;
                seq.serialize_element(request_id)?;
                seq.serialize_element(registration_id)?;
                seq.end()
            }
            Message::Unregister(request_id, registration_id) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&UNREGISTER)?;
                seq.serialize_element(request_id)?;
                seq.serialize_element(registration_id)?;
                seq.end()
            }
            Message::Unregistered(request_id) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&UNREGISTERED)?;
                seq.serialize_element(request_id)?;
                seq.end()
            }
            Message::Call(request_id, options, procedure, args, kwargs) => {
                let mut seq = serializer.serialize_seq(None)?;
                seq.serialize_element(&CALL)?;
                seq.serialize_element(request_id)?;
                seq.serialize_element(options)?;
                seq.serialize_element(procedure)?;
                ser_tail!(seq, args, kwargs);
                seq.end()
            }
            Message::Invocation(request_id, registration_id, details, args, kwargs) => {
                let mut seq = serializer.serialize_seq(None)?;
                seq.serialize_element(&INVOCATION)?;
                seq.serialize_element(request_id)?;
                seq.serialize_element(registration_id)?;
                seq.serialize_element(details)?;
                ser_tail!(seq, args, kwargs);
                seq.end()
            }
            Message::Yield(request_id, options, args, kwargs) => {
                let mut seq = serializer.serialize_seq(None)?;
                seq.serialize_element(&YIELD)?;
                seq.serialize_element(request_id)?;
                seq.serialize_element(options)?;
                ser_tail!(seq, args, kwargs);
                seq.end()
            }
            Message::Result(request_id, details, args, kwargs) => {
                let mut seq = serializer.serialize_seq(None)?;
                seq.serialize_element(&RESULT)?;
                seq.serialize_element(request_id)?;
                seq.serialize_element(details)?;
                ser_tail!(seq, args, kwargs);
                seq.end()
            }
        }
    }
}

macro_rules! next {
    ($seq:expr, $what:expr) => {
        match $seq.next_element()? {
            Some(v) => v,
            None => return Err(de::Error::custom(concat!($what, " missing from message"))),
        }
    };
}

struct MessageVisitor;

impl MessageVisitor {
    fn hello<'de, A: SeqAccess<'de>>(&self, mut seq: A) -> Result<Message, A::Error> {
        let realm = next!(seq, "realm");
        let details = next!(seq, "details");
        Ok(Message::Hello(realm, details))
    }

    fn welcome<'de, A: SeqAccess<'de>>(&self, mut seq: A) -> Result<Message, A::Error> {
        let session = next!(seq, "session id");
        let details = next!(seq, "details");
        Ok(Message::Welcome(session, details))
    }

    fn abort<'de, A: SeqAccess<'de>>(&self, mut seq: A) -> Result<Message, A::Error> {
        let details = next!(seq, "details");
        let reason = next!(seq, "reason");
        Ok(Message::Abort(details, reason))
    }

    fn challenge<'de, A: SeqAccess<'de>>(&self, mut seq: A) -> Result<Message, A::Error> {
        let method = next!(seq, "auth method");
        let extra = next!(seq, "extra");
        Ok(Message::Challenge(method, extra))
    }

    fn authenticate<'de, A: SeqAccess<'de>>(&self, mut seq: A) -> Result<Message, A::Error> {
        let signature = next!(seq, "signature");
        let extra = next!(seq, "extra");
        Ok(Message::Authenticate(signature, extra))
    }

    fn goodbye<'de, A: SeqAccess<'de>>(&self, mut seq: A) -> Result<Message, A::Error> {
        let details = next!(seq, "details");
        let reason = next!(seq, "reason");
        Ok(Message::Goodbye(details, reason))
    }

    fn error<'de, A: SeqAccess<'de>>(&self, mut seq: A) -> Result<Message, A::Error> {
        let request_type = next!(seq, "request type");
        let request_id = next!(seq, "request id");
        let details = next!(seq, "details");
        let uri = next!(seq, "error uri");
        let args = seq.next_element()?;
        let kwargs = seq.next_element()?;
        Ok(Message::Error(
            request_type,
            request_id,
            details,
            uri,
            args,
            kwargs,
        ))
    }

    fn subscribe<'de, A: SeqAccess<'de>>(&self, mut seq: A) -> Result<Message, A::Error> {
        let request_id = next!(seq, "request id");
        let options = next!(seq, "options");
        let topic = next!(seq, "topic");
        Ok(Message::Subscribe(request_id, options, topic))
    }

    fn subscribed<'de, A: SeqAccess<'de>>(&self, mut seq: A) -> Result<Message, A::Error> {
        let request_id = next!(seq, "request id");
        let subscription_id = next!(seq, "subscription id");
        Ok(Message::Subscribed(request_id, subscription_id))
    }

    fn unsubscribe<'de, A: SeqAccess<'de>>(&self, mut seq: A) -> Result<Message, A::Error> {
        let request_id = next!(seq, "request id");
        let subscription_id = next!(seq, "subscription id");
        Ok(Message::Unsubscribe(request_id, subscription_id))
    }

    fn unsubscribed<'de, A: SeqAccess<'de>>(&self, mut seq: A) -> Result<Message, A::Error> {
        let request_id = next!(seq, "request id");
        Ok(Message::Unsubscribed(request_id))
    }

    fn publish<'de, A: SeqAccess<'de>>(&self, mut seq: A) -> Result<Message, A::Error> {
        let request_id = next!(seq, "request id");
        let options = next!(seq, "options");
        let topic = next!(seq, "topic");
        let args = seq.next_element()?;
        let kwargs = seq.next_element()?;
        Ok(Message::Publish(request_id, options, topic, args, kwargs))
    }

    fn published<'de, A: SeqAccess<'de>>(&self, mut seq: A) -> Result<Message, A::Error> {
        let request_id = next!(seq, "request id");
        let publication_id = next!(seq, "publication id");
        Ok(Message::Published(request_id, publication_id))
    }

    fn event<'de, A: SeqAccess<'de>>(&self, mut seq: A) -> Result<Message, A::Error> {
        let subscription_id = next!(seq, "subscription id");
        let publication_id = next!(seq, "publication id");
        let details = next!(seq, "details");
        let args = seq.next_element()?;
        let kwargs = seq.next_element()?;
        Ok(Message::Event(
            subscription_id,
            publication_id,
            details,
            args,
            kwargs,
        ))
    }

    fn register<'de, A: SeqAccess<'de>>(&self, mut seq: A) -> Result<Message, A::Error> {
        let request_id = next!(seq, "request id");
        let options = next!(seq, "options");
        let procedure = next!(seq, "procedure");
        Ok(Message::Register(request_id, options, procedure))
    }

    fn registered<'de, A: SeqAccess<'de>>(&self, mut seq: A) -> Result<Message, A::Error> {
        let request_id = next!(seq, "request id");
        let registration_id = next!(seq, "registration id");
        Ok(Message::Registered(request_id, registration_id))
    }

    fn unregister<'de, A: SeqAccess<'de>>(&self, mut seq: A) -> Result<Message, A::Error> {
        let request_id = next!(seq, "request id");
        let registration_id = next!(seq, "registration id");
        Ok(Message::Unregister(request_id, registration_id))
    }

    fn unregistered<'de, A: SeqAccess<'de>>(&self, mut seq: A) -> Result<Message, A::Error> {
        let request_id = next!(seq, "request id");
        Ok(Message::Unregistered(request_id))
    }

    fn call<'de, A: SeqAccess<'de>>(&self, mut seq: A) -> Result<Message, A::Error> {
        let request_id = next!(seq, "request id");
        let options = next!(seq, "options");
        let procedure = next!(seq, "procedure");
        let args = seq.next_element()?;
        let kwargs = seq.next_element()?;
        Ok(Message::Call(request_id, options, procedure, args, kwargs))
    }

    fn invocation<'de, A: SeqAccess<'de>>(&self, mut seq: A) -> Result<Message, A::Error> {
        let request_id = next!(seq, "request id");
        let registration_id = next!(seq, "registration id");
        let details = next!(seq, "details");
        let args = seq.next_element()?;
        let kwargs = seq.next_element()?;
        Ok(Message::Invocation(
            request_id,
            registration_id,
            details,
            args,
            kwargs,
        ))
    }

    fn do_yield<'de, A: SeqAccess<'de>>(&self, mut seq: A) -> Result<Message, A::Error> {
        let request_id = next!(seq, "request id");
        let options = next!(seq, "options");
        let args = seq.next_element()?;
        let kwargs = seq.next_element()?;
        Ok(Message::Yield(request_id, options, args, kwargs))
    }

    fn result<'de, A: SeqAccess<'de>>(&self, mut seq: A) -> Result<Message, A::Error> {
        let request_id = next!(seq, "request id");
        let details = next!(seq, "details");
        let args = seq.next_element()?;
        let kwargs = seq.next_element()?;
        Ok(Message::Result(request_id, details, args, kwargs))
    }
}

impl<'de> Visitor<'de> for MessageVisitor {
    type Value = Message;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a WAMP message array")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Message, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let code: u64 = next!(seq, "message code");
        match code {
            HELLO => self.hello(seq),
            WELCOME => self.welcome(seq),
            ABORT => self.abort(seq),
            CHALLENGE => self.challenge(seq),
            AUTHENTICATE => self.authenticate(seq),
            GOODBYE => self.goodbye(seq),
            ERROR => self.error(seq),
            SUBSCRIBE => self.subscribe(seq),
            SUBSCRIBED => self.subscribed(seq),
            UNSUBSCRIBE => self.unsubscribe(seq),
            UNSUBSCRIBED => self.unsubscribed(seq),
            PUBLISH => self.publish(seq),
            PUBLISHED => self.published(seq),
            EVENT => self.event(seq),
            REGISTER => self.register(seq),
            REGISTERED => self.registered(seq),
            UNREGISTER => self.unregister(seq),
            UNREGISTERED => self.unregistered(seq),
            CALL => self.call(seq),
            INVOCATION => self.invocation(seq),
            YIELD => self.do_yield(seq),
            RESULT => self.result(seq),
            other => Err(de::Error::custom(format!("unknown message code {}", other))),
        }
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Message, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(MessageVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_way(message: Message, json: &str) {
        assert_eq!(serde_json::to_string(&message).unwrap(), json);
        assert_eq!(serde_json::from_str::<Message>(json).unwrap(), message);

        let mut buf = Vec::new();
        message
            .serialize(&mut rmp_serde::Serializer::new(&mut buf))
            .unwrap();
        let decoded: Message = rmp_serde::from_slice(&buf).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn hello_round_trips() {
        two_way(
            Message::Hello("realm1".to_string(), Dict::new()),
            r#"[1,"realm1",{}]"#,
        );
    }

    #[test]
    fn welcome_round_trips() {
        two_way(Message::Welcome(9129137332, Dict::new()), r#"[2,9129137332,{}]"#);
    }

    #[test]
    fn abort_round_trips() {
        two_way(
            Message::Abort(Dict::new(), "wamp.error.no_such_realm".to_string()),
            r#"[3,{},"wamp.error.no_such_realm"]"#,
        );
    }

    #[test]
    fn challenge_round_trips() {
        let mut extra = Dict::new();
        extra.insert("challenge".to_string(), "abc123".into());
        two_way(
            Message::Challenge("wampcra".to_string(), extra),
            r#"[4,"wampcra",{"challenge":"abc123"}]"#,
        );
    }

    #[test]
    fn call_without_args_omits_trailing_fields() {
        two_way(
            Message::Call(7814135, Dict::new(), "com.myapp.ping".to_string(), None, None),
            r#"[48,7814135,{},"com.myapp.ping"]"#,
        );
    }

    #[test]
    fn call_with_kwargs_fills_empty_args() {
        let mut kwargs = Dict::new();
        kwargs.insert("key1".to_string(), 5u64.into());
        two_way(
            Message::Call(
                764346,
                Dict::new(),
                "com.myapp.compute".to_string(),
                None,
                Some(kwargs),
            ),
            r#"[48,764346,{},"com.myapp.compute",[],{"key1":5}]"#,
        );
    }

    #[test]
    fn error_round_trips_with_args() {
        two_way(
            Message::Error(
                SUBSCRIBE,
                713845233,
                Dict::new(),
                "wamp.error.not_authorized".to_string(),
                None,
                None,
            ),
            r#"[8,32,713845233,{},"wamp.error.not_authorized"]"#,
        );
    }

    #[test]
    fn unknown_code_is_rejected() {
        let err = serde_json::from_str::<Message>("[999]").unwrap_err();
        assert!(err.to_string().contains("unknown message code"));
    }
}
