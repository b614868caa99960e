//! The RPC message layer carried inside AMF3 bodies.
//!
//! Clients wrap calls in typed messages; the gateway answers every message
//! with an acknowledge or error message correlated to the request id.

use crate::errors::Fault;
use crate::types::{ClassDefinition, Element, ObjectId, Value};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Wire alias of a remote procedure call message
pub const REMOTING_MESSAGE: &str = "flex.messaging.messages.RemotingMessage";
/// Wire alias of a command message
pub const COMMAND_MESSAGE: &str = "flex.messaging.messages.CommandMessage";
/// Wire alias of a successful response message
pub const ACKNOWLEDGE_MESSAGE: &str = "flex.messaging.messages.AcknowledgeMessage";
/// Wire alias of a failed response message
pub const ERROR_MESSAGE: &str = "flex.messaging.messages.ErrorMessage";
/// Wire alias of the base asynchronous message
pub const ASYNC_MESSAGE: &str = "flex.messaging.messages.AsyncMessage";

/// Command operation: connectivity probe
pub const COMMAND_CLIENT_PING: u32 = 5;
/// Command operation: authenticate with base64 credentials
pub const COMMAND_LOGIN: u32 = 8;
/// Command operation: discard the current identity
pub const COMMAND_LOGOUT: u32 = 9;
/// Command operation: orderly shutdown of the logical connection
pub const COMMAND_DISCONNECT: u32 = 12;

/// Whether a class name (wire alias or server name) is one of the message
/// types.
pub fn is_message_class(name: &str) -> bool {
    matches!(
        name,
        REMOTING_MESSAGE
            | COMMAND_MESSAGE
            | ACKNOWLEDGE_MESSAGE
            | ERROR_MESSAGE
            | ASYNC_MESSAGE
            | "RemotingMessage"
            | "CommandMessage"
            | "AcknowledgeMessage"
            | "ErrorMessage"
            | "AsyncMessage"
    )
}

/// Extract the message from an AMF3 call body.
///
/// An AMF3 call arrives as an array whose first element is the message; the
/// body payload is replaced by that element.
pub(crate) fn unwrap_body(value: &Rc<Value>) -> Option<Rc<Value>> {
    let inner = match &**value {
        Value::Amf3(inner) => inner,
        _ => value,
    };
    if let Value::StrictArray(items) = &**inner {
        if let Some(first) = items.first() {
            if first.class_name().map(is_message_class).unwrap_or(false) {
                return Some(Rc::clone(first));
            }
        }
    }
    None
}

fn now_millis() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as f64)
        .unwrap_or(0.0)
}

/// A remote procedure call: `operation` on `source` with `body` as the
/// argument list.
#[derive(Debug, Clone)]
pub struct RemotingMessage {
    /// The service the call targets
    pub source: String,

    /// The method name
    pub operation: String,

    /// The caller's arguments
    pub body: Vec<Rc<Value>>,

    /// The caller's message id; acknowledged responses correlate to it
    pub message_id: String,
}

impl RemotingMessage {
    /// Read a remoting message out of a decoded value.
    pub fn from_value(value: &Value) -> Option<Self> {
        let class = value.class_name()?;
        if class != REMOTING_MESSAGE && class != "RemotingMessage" {
            return None;
        }

        let operation = value.field("operation")?.as_str()?.to_string();
        let source = value
            .field("source")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let message_id = value
            .field("messageId")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let body = match value.field("body") {
            Some(v) => match &**v {
                Value::StrictArray(items) => items.clone(),
                Value::Null | Value::Undefined => Vec::new(),
                _ => vec![Rc::clone(v)],
            },
            None => Vec::new(),
        };

        Some(Self {
            source,
            operation,
            body,
            message_id,
        })
    }
}

/// A connectivity or session command.
#[derive(Debug, Clone)]
pub struct CommandMessage {
    /// The operation code; see the `COMMAND_*` constants
    pub operation: u32,

    /// The operation payload; base64 credentials for login
    pub body: Rc<Value>,

    /// The caller's message id
    pub message_id: String,
}

impl CommandMessage {
    /// Read a command message out of a decoded value.
    pub fn from_value(value: &Value) -> Option<Self> {
        let class = value.class_name()?;
        if class != COMMAND_MESSAGE && class != "CommandMessage" {
            return None;
        }

        let operation = value.field("operation")?.as_f64()? as u32;
        let message_id = value
            .field("messageId")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let body = value
            .field("body")
            .cloned()
            .unwrap_or_else(|| Rc::new(Value::Null));

        Some(Self {
            operation,
            body,
            message_id,
        })
    }
}

const ACKNOWLEDGE_MEMBERS: [&str; 8] = [
    "body",
    "clientId",
    "correlationId",
    "destination",
    "headers",
    "messageId",
    "timeToLive",
    "timestamp",
];

const ERROR_MEMBERS: [&str; 13] = [
    "body",
    "clientId",
    "correlationId",
    "destination",
    "extendedData",
    "faultCode",
    "faultDetail",
    "faultString",
    "headers",
    "messageId",
    "rootCause",
    "timeToLive",
    "timestamp",
];

fn base_members(correlation_id: &str, body: Rc<Value>) -> Vec<Element> {
    vec![
        Element::shared("body", body),
        Element::new("clientId", Value::String(Uuid::new_v4().to_string())),
        Element::new("correlationId", Value::String(correlation_id.to_string())),
        Element::new("destination", Value::String(String::new())),
        Element::new("headers", Value::object(vec![])),
        Element::new("messageId", Value::String(Uuid::new_v4().to_string())),
        Element::new("timeToLive", Value::Number(0.0)),
        Element::new("timestamp", Value::Number(now_millis())),
    ]
}

/// A successful response to one request message.
#[derive(Debug, Clone)]
pub struct AcknowledgeMessage {
    /// The id of the request being answered
    pub correlation_id: String,

    /// The return value
    pub body: Rc<Value>,
}

impl AcknowledgeMessage {
    /// An acknowledge for the given request id carrying `body`.
    pub fn new(correlation_id: impl Into<String>, body: Rc<Value>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            body,
        }
    }

    /// Render as a sealed typed object.
    pub fn into_value(self) -> Rc<Value> {
        let members = base_members(&self.correlation_id, self.body);
        Rc::new(Value::Object(
            ObjectId::INVALID,
            members,
            Some(ClassDefinition {
                name: "AcknowledgeMessage".to_string(),
                attributes: Default::default(),
                static_properties: ACKNOWLEDGE_MEMBERS.map(String::from).to_vec(),
            }),
        ))
    }
}

/// A failed response to one request message.
#[derive(Debug, Clone)]
pub struct ErrorMessage {
    /// The id of the request being answered
    pub correlation_id: String,

    /// The failure being reported
    pub fault: Fault,
}

impl ErrorMessage {
    /// An error response for the given request id.
    pub fn new(correlation_id: impl Into<String>, fault: Fault) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            fault,
        }
    }

    /// Render as a sealed typed object.
    pub fn into_value(self) -> Rc<Value> {
        let mut members = base_members(&self.correlation_id, Rc::new(Value::Null));
        members.push(Element::new("extendedData", Value::Null));
        members.push(Element::new(
            "faultCode",
            Value::String(self.fault.code.clone()),
        ));
        members.push(Element::new(
            "faultDetail",
            Value::String(self.fault.detail.clone()),
        ));
        members.push(Element::new(
            "faultString",
            Value::String(self.fault.description.clone()),
        ));
        members.push(Element::new("rootCause", Value::Null));

        Rc::new(Value::Object(
            ObjectId::INVALID,
            members,
            Some(ClassDefinition {
                name: "ErrorMessage".to_string(),
                attributes: Default::default(),
                static_properties: ERROR_MEMBERS.map(String::from).to_vec(),
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwrap_replaces_body_with_first_message() {
        let message = Rc::new(Value::typed_object(
            REMOTING_MESSAGE,
            vec![
                Element::new("operation", "echo"),
                Element::new("source", "Svc"),
            ],
        ));
        let body = Rc::new(Value::Amf3(Rc::new(Value::StrictArray(vec![Rc::clone(
            &message,
        )]))));

        let unwrapped = unwrap_body(&body).expect("message should unwrap");
        assert!(Rc::ptr_eq(&unwrapped, &message));
    }

    #[test]
    fn plain_arrays_stay_wrapped() {
        let body = Rc::new(Value::StrictArray(vec![Rc::new(Value::Number(1.0))]));
        assert!(unwrap_body(&body).is_none());
    }

    #[test]
    fn remoting_message_reads_arguments() {
        let value = Value::typed_object(
            "RemotingMessage",
            vec![
                Element::new("operation", "add"),
                Element::new("source", "Calc"),
                Element::new("messageId", "m-1"),
                Element::shared(
                    "body",
                    Rc::new(Value::StrictArray(vec![
                        Rc::new(Value::Integer(1)),
                        Rc::new(Value::Integer(2)),
                    ])),
                ),
            ],
        );

        let message = RemotingMessage::from_value(&value).expect("should parse");
        assert_eq!(message.source, "Calc");
        assert_eq!(message.operation, "add");
        assert_eq!(message.message_id, "m-1");
        assert_eq!(message.body.len(), 2);
    }
}
