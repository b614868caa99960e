use super::{ClassDefinition, Element, ObjectId};
use std::rc::Rc;

/// A single or compound AMF value
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The number type (AMF0) and double type (AMF3)
    Number(f64),

    /// The 29-bit integer type (AMF3 only)
    Integer(i32),

    /// The boolean type (AMF0) and the true/false markers (AMF3)
    Bool(bool),

    /// The string (AMF0/AMF3) and long string (AMF0) types
    String(String),

    /// An object: anonymous when the class definition is `None`, typed
    /// otherwise.
    ///
    /// The id is packet-local and only meaningful for decoded graphs that
    /// contain back-references; see [`ObjectId`].
    Object(ObjectId, Vec<Element>, Option<ClassDefinition>),

    /// A back-reference to an object decoded earlier in the same packet
    Reference(ObjectId),

    /// The null type
    Null,

    /// The undefined type
    Undefined,

    /// An ECMA array (AMF0) or an array with an associative part (AMF3).
    ///
    /// The final value is the nominal length from the wire, which may
    /// differ from the element count in AMF0.
    EcmaArray(Vec<Rc<Value>>, Vec<Element>, u32),

    /// A strict array (AMF0) or dense-only array (AMF3)
    StrictArray(Vec<Rc<Value>>),

    /// Milliseconds since epoch, with a timezone only in AMF0 (always
    /// written as zero; AMF3 dates are UTC)
    Date(f64, Option<u16>),

    /// The XML types; the flag distinguishes the AMF3 xml-string marker
    Xml(String, bool),

    /// The byte array type (AMF3)
    ByteArray(Vec<u8>),

    /// A fixed-type int vector; the flag marks a fixed-length vector
    VectorInt(Vec<i32>, bool),

    /// A fixed-type uint vector; the flag marks a fixed-length vector
    VectorUInt(Vec<u32>, bool),

    /// A fixed-type double vector; the flag marks a fixed-length vector
    VectorDouble(Vec<f64>, bool),

    /// An object vector: elements, element type name (may be `*`), fixed flag
    VectorObject(Vec<Rc<Value>>, String, bool),

    /// Key/value pairs; the flag carries the weak-keys bit (not enforced)
    Dictionary(Vec<(Rc<Value>, Rc<Value>)>, bool),

    /// An externalizable object: decoded members, extra dynamic members,
    /// class definition. The class owns the body encoding.
    External(Vec<Element>, Vec<Element>, Option<ClassDefinition>),

    /// An AMF3 value embedded in an AMF0 stream via the escape marker
    Amf3(Rc<Value>),
}

impl Value {
    /// An anonymous object built from elements.
    pub fn object(elements: Vec<Element>) -> Self {
        Value::Object(ObjectId::INVALID, elements, None)
    }

    /// A typed object built from elements; the element names become the
    /// sealed member list of its trait.
    pub fn typed_object(class_name: impl Into<String>, elements: Vec<Element>) -> Self {
        let def = ClassDefinition {
            name: class_name.into(),
            attributes: enumset::EnumSet::empty(),
            static_properties: elements.iter().map(|e| e.name.clone()).collect(),
        };
        Value::Object(ObjectId::INVALID, elements, Some(def))
    }

    /// Look up a member by name on an object or the associative part of an
    /// array.
    pub fn field(&self, name: &str) -> Option<&Rc<Value>> {
        let elements = match self {
            Value::Object(_, elements, _) => elements,
            Value::EcmaArray(_, elements, _) => elements,
            Value::External(elements, _, _) => elements,
            _ => return None,
        };
        elements.iter().find(|e| e.name == name).map(|e| &e.value)
    }

    /// The class alias of a typed object, if any.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Value::Object(_, _, Some(def)) | Value::External(_, _, Some(def)) => {
                Some(def.name.as_str())
            }
            _ => None,
        }
    }

    /// The string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The numeric payload, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Integer(i) => Some(f64::from(*i)),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
