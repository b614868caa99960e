//! AMF envelope framing.

/// Reading of envelopes
pub mod read;

/// Writing of envelopes
pub mod write;

use crate::types::{AmfVersion, Value};
use std::rc::Rc;

/// An envelope header
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Header {
    /// The name of this header
    pub name: String,

    /// If true, the endpoint must abort when it does not understand this
    /// header
    pub must_understand: bool,

    /// The value of this header
    pub value: Rc<Value>,
}

/// One body of an envelope
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Body {
    /// The target this body is addressed to.
    ///
    /// For requests this is `Source.method`; for responses it is the
    /// request's response URI suffixed with `/onResult` or `/onStatus`.
    pub target_uri: String,

    /// The response URI for this body; a unique marker such as `/1` on
    /// requests, empty on responses
    pub response_uri: String,

    /// The payload of this body
    pub value: Rc<Value>,
}

/// An AMF envelope
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Packet {
    /// The encoding variant announced by the envelope
    pub version: AmfVersion,

    /// Headers that apply to every body in this envelope
    pub headers: Vec<Header>,

    /// All bodies in this envelope
    pub bodies: Vec<Body>,
}
