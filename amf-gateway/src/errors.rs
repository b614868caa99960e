//! Error types for the codec, dispatch and policy layers.

use nom::error::{ErrorKind, FromExternalError, ParseError};
use thiserror::Error;

/// Errors raised while decoding AMF data.
///
/// Any decode error is fatal for the packet being read.
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum DecodeError<'a> {
    /// Out of bounds decoding
    #[error("Out of bounds")]
    OutOfBounds,

    /// An unknown type marker was read
    #[error("Unsupported type marker {0}")]
    UnsupportedType(u8),

    /// The envelope carried a version this gateway does not speak
    #[error("Unsupported envelope version {0}")]
    UnsupportedVersion(u16),

    /// A reference index pointed outside the reference table
    #[error("Invalid reference index {0}")]
    BadReference(u32),

    /// A reference resolved to a value that is still being decoded
    #[error("Unresolvable circular reference")]
    CircularReference,

    /// A string was not valid UTF-8
    #[error("Invalid UTF-8 string")]
    InvalidUtf8,

    /// An externalizable class had no registered decoder
    #[error("No decoder registered for an external class")]
    MissingExternalDecoder,

    /// A nom internal error
    #[error("Nom internal error")]
    Nom(&'a [u8], ErrorKind),
}

impl<'a> ParseError<&'a [u8]> for DecodeError<'a> {
    fn from_error_kind(input: &'a [u8], kind: ErrorKind) -> Self {
        DecodeError::Nom(input, kind)
    }

    fn append(_: &[u8], _: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<'a, E> FromExternalError<&'a [u8], E> for DecodeError<'a> {
    fn from_external_error(input: &'a [u8], kind: ErrorKind, _e: E) -> Self {
        DecodeError::Nom(input, kind)
    }
}

/// Errors raised while encoding AMF data.
#[derive(Error, Debug)]
pub enum EncodeError {
    /// The underlying writer failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A length field overflowed its wire width
    #[error("Envelope field too large")]
    PacketTooLarge,

    /// A reference node pointed at an object that was never written
    #[error("Reference to unknown object id {0}")]
    DanglingReference(i64),

    /// An externalizable value had no registered encoder
    #[error("No encoder registered for external class \"{0}\"")]
    MissingExternalEncoder(String),
}

/// Configuration errors raised while building the dispatch table.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum DispatchError {
    /// The qualified name is already taken
    #[error("Duplicate registration of method \"{0}\"")]
    DuplicateMethod(String),
}

/// Configuration errors raised while building an ACL.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum AclError {
    /// A role id was registered twice
    #[error("Role \"{0}\" is already registered")]
    DuplicateRole(String),

    /// A parent role does not exist
    #[error("Unknown parent role \"{0}\"")]
    UnknownRole(String),

    /// A resource id was registered twice
    #[error("Resource \"{0}\" is already registered")]
    DuplicateResource(String),

    /// A parent resource does not exist
    #[error("Unknown parent resource \"{0}\"")]
    UnknownResource(String),
}

/// Fatal gateway errors.
///
/// Everything that can be answered with an error *body* is reported through
/// [`Fault`] instead; a `GatewayError` means no response envelope could be
/// produced at all.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The request envelope could not be decoded
    #[error("Malformed request envelope: {0}")]
    MalformedRequest(String),

    /// The response envelope could not be encoded
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// The error payload sent back to a client for one failed body.
///
/// Carries the fields of both wire renderings: the AMF0 error record and the
/// AMF3 error message.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Fault {
    /// Stable machine-readable code, e.g. `Server.Processing`
    pub code: String,

    /// Human-readable one-line description
    pub description: String,

    /// Longer detail, typically a location or backtrace fragment
    pub detail: String,

    /// Source line, when known
    pub line: u32,
}

impl Fault {
    /// A fault for a failure inside an invoked method.
    pub fn processing(description: impl Into<String>) -> Self {
        Self {
            code: "Server.Processing".to_string(),
            description: description.into(),
            detail: String::new(),
            line: 0,
        }
    }

    /// A fault for a method that could not be resolved.
    pub fn method_missing(method: &str) -> Self {
        Self {
            code: "Server.ResourceUnavailable".to_string(),
            description: format!("Method \"{method}\" does not exist"),
            detail: String::new(),
            line: 0,
        }
    }

    /// A fault for rejected credentials.
    pub fn auth(description: impl Into<String>) -> Self {
        Self {
            code: "Client.Authentication".to_string(),
            description: description.into(),
            detail: String::new(),
            line: 0,
        }
    }

    /// A fault for a denied call.
    pub fn authorization(source: &str, method: &str) -> Self {
        Self {
            code: "Client.Authorization".to_string(),
            description: format!("Access to {source}.{method} is denied"),
            detail: String::new(),
            line: 0,
        }
    }

    /// A fault for a response value that could not be encoded.
    pub fn encoding(err: &EncodeError) -> Self {
        Self {
            code: "Server.Encoding".to_string(),
            description: err.to_string(),
            detail: String::new(),
            line: 0,
        }
    }

    /// Strip fields that must not leak to clients in production mode.
    pub fn scrubbed(mut self) -> Self {
        self.description.clear();
        self.detail.clear();
        self.line = 0;
        self
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.description)
    }
}
