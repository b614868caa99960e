//! The in-memory value model shared by both codecs.

mod amf_version;
mod attribute;
mod class_definition;
mod element;
mod object_id;
mod value;

pub use amf_version::AmfVersion;
pub use attribute::Attribute;
pub use class_definition::ClassDefinition;
pub use element::Element;
pub use object_id::ObjectId;
pub use value::Value;
