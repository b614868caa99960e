//! The AMF3 codec.

/// Reference caches for the three AMF3 tables
pub(crate) mod cache;
/// Support for externalizable classes
pub mod custom_encoder;
/// Abstraction over the AMF3 length and reference header
pub(crate) mod length;
/// Reading of AMF3 data
pub mod read;
/// AMF3 type markers
mod type_marker;
/// Writing of AMF3 data
pub mod write;
