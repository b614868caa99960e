//! Support for encoding AMF0

use crate::amf0::type_marker::TypeMarker;
use crate::amf3::cache::ObjectCache;
use crate::amf3::custom_encoder::ExternalEncoder;
use crate::amf3::write::Amf3Encoder;
use crate::errors::EncodeError;
use crate::nom_utils::{write_long_string, write_short_string};
use crate::registry::ClassRegistry;
use crate::types::{ClassDefinition, Element, ObjectId, Value};
use byteorder::{BigEndian, WriteBytesExt};
use std::collections::HashMap;
use std::io::Write;
use std::ops::Deref;
use std::rc::Rc;

/// The longest string the short-string form can carry, in UTF-8 bytes
const SHORT_STRING_MAX: usize = 65535;

/// Handles encoding AMF0
///
/// Holds the single object reference table; one encoder serves one packet.
pub struct Amf0Encoder {
    /// The table used to deduplicate repeated objects, keyed by handle
    /// identity
    reference_table: ObjectCache,

    /// Resolves server class names to wire aliases
    registry: ClassRegistry,

    /// Encoders handed to the AMF3 codec when a value escapes to AMF3
    pub external_encoders: HashMap<String, Rc<dyn ExternalEncoder>>,
}

impl Default for Amf0Encoder {
    fn default() -> Self {
        Self::new(ClassRegistry::default())
    }
}

impl Amf0Encoder {
    /// An encoder with a fresh reference table resolving aliases through
    /// `registry`.
    pub fn new(registry: ClassRegistry) -> Self {
        Self {
            reference_table: ObjectCache::default(),
            registry,
            external_encoders: HashMap::new(),
        }
    }

    fn write_type_marker<W: Write>(
        &mut self,
        writer: &mut W,
        marker: TypeMarker,
    ) -> Result<(), EncodeError> {
        writer.write_u8(marker as u8)?;
        Ok(())
    }

    fn write_number_element<W: Write>(&mut self, writer: &mut W, n: f64) -> Result<(), EncodeError> {
        self.write_type_marker(writer, TypeMarker::Number)?;
        writer.write_f64::<BigEndian>(n)?;
        Ok(())
    }

    fn write_bool_element<W: Write>(&mut self, writer: &mut W, b: bool) -> Result<(), EncodeError> {
        self.write_type_marker(writer, TypeMarker::Boolean)?;
        writer.write_u8(u8::from(b))?;
        Ok(())
    }

    fn write_string_element<W: Write>(&mut self, writer: &mut W, s: &str) -> Result<(), EncodeError> {
        // The long-string form takes over beyond the u16 length range
        if s.len() > SHORT_STRING_MAX {
            self.write_type_marker(writer, TypeMarker::LongString)?;
            write_long_string(writer, s)?;
        } else {
            self.write_type_marker(writer, TypeMarker::String)?;
            write_short_string(writer, s)?;
        }
        Ok(())
    }

    fn write_object_end<W: Write>(&mut self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u16::<BigEndian>(0)?;
        self.write_type_marker(writer, TypeMarker::ObjectEnd)
    }

    /// Write object members, withholding the private ones
    fn write_object_body<W: Write>(
        &mut self,
        writer: &mut W,
        elements: &[Element],
    ) -> Result<(), EncodeError> {
        for element in elements.iter().filter(|e| !e.is_private()) {
            write_short_string(writer, &element.name)?;
            self.write_value(writer, &element.value)?;
        }
        self.write_object_end(writer)
    }

    fn write_reference<W: Write>(&mut self, writer: &mut W, index: usize) -> Result<(), EncodeError> {
        let index = u16::try_from(index).map_err(|_| EncodeError::PacketTooLarge)?;
        self.write_type_marker(writer, TypeMarker::Reference)?;
        writer.write_u16::<BigEndian>(index)?;
        Ok(())
    }

    fn write_object_element<W: Write>(
        &mut self,
        writer: &mut W,
        value: &Rc<Value>,
        id: ObjectId,
        elements: &[Element],
        class_def: &Option<ClassDefinition>,
    ) -> Result<(), EncodeError> {
        if let Some(index) = self.reference_table.get_index(value) {
            return self.write_reference(writer, index);
        }
        self.reference_table.store(value, id);

        match class_def {
            Some(def) if !def.name.is_empty() => {
                self.write_type_marker(writer, TypeMarker::TypedObject)?;
                let alias = self.registry.resolve_outgoing(&def.name).to_string();
                write_short_string(writer, &alias)?;
            }
            _ => {
                self.write_type_marker(writer, TypeMarker::Object)?;
            }
        }
        self.write_object_body(writer, elements)
    }

    fn write_strict_array_element<W: Write>(
        &mut self,
        writer: &mut W,
        value: &Rc<Value>,
        items: &[Rc<Value>],
    ) -> Result<(), EncodeError> {
        if let Some(index) = self.reference_table.get_index(value) {
            return self.write_reference(writer, index);
        }
        self.reference_table.store(value, ObjectId::INVALID);

        self.write_type_marker(writer, TypeMarker::StrictArray)?;
        writer.write_u32::<BigEndian>(items.len() as u32)?;
        for item in items {
            self.write_value(writer, item)?;
        }
        Ok(())
    }

    /// Whether the associative member names are exactly `0..n-1` in order
    fn is_dense_keyed(assoc: &[Element]) -> bool {
        assoc
            .iter()
            .enumerate()
            .all(|(index, e)| e.name == index.to_string())
    }

    fn write_ecma_array_element<W: Write>(
        &mut self,
        writer: &mut W,
        value: &Rc<Value>,
        dense: &[Rc<Value>],
        assoc: &[Element],
    ) -> Result<(), EncodeError> {
        if let Some(index) = self.reference_table.get_index(value) {
            return self.write_reference(writer, index);
        }

        // Contiguous numeric keys collapse to a strict array
        if dense.is_empty() && Self::is_dense_keyed(assoc) {
            self.reference_table.store(value, ObjectId::INVALID);
            self.write_type_marker(writer, TypeMarker::StrictArray)?;
            writer.write_u32::<BigEndian>(assoc.len() as u32)?;
            for element in assoc {
                self.write_value(writer, &element.value)?;
            }
            return Ok(());
        }

        // A non-numeric key degrades the array to a plain object
        if assoc.iter().any(|e| e.name.parse::<u32>().is_err()) {
            self.reference_table.store(value, ObjectId::INVALID);
            self.write_type_marker(writer, TypeMarker::Object)?;
            for (index, item) in dense.iter().enumerate() {
                write_short_string(writer, &index.to_string())?;
                self.write_value(writer, item)?;
            }
            return self.write_object_body(writer, assoc);
        }

        self.reference_table.store(value, ObjectId::INVALID);
        self.write_type_marker(writer, TypeMarker::EcmaArray)?;
        writer.write_u32::<BigEndian>((dense.len() + assoc.len()) as u32)?;
        for (index, item) in dense.iter().enumerate() {
            write_short_string(writer, &index.to_string())?;
            self.write_value(writer, item)?;
        }
        self.write_object_body(writer, assoc)
    }

    fn write_date_element<W: Write>(
        &mut self,
        writer: &mut W,
        millis: f64,
        time_zone: Option<u16>,
    ) -> Result<(), EncodeError> {
        self.write_type_marker(writer, TypeMarker::Date)?;
        writer.write_f64::<BigEndian>(millis)?;
        writer.write_u16::<BigEndian>(time_zone.unwrap_or(0))?;
        Ok(())
    }

    fn write_reference_element<W: Write>(
        &mut self,
        writer: &mut W,
        id: ObjectId,
    ) -> Result<(), EncodeError> {
        let index = self
            .reference_table
            .get_id_index(id)
            .ok_or(EncodeError::DanglingReference(id.0))?;
        self.write_reference(writer, index)
    }

    /// Escape to AMF3 for one value; the AMF3 tables start fresh
    fn write_avm_plus<W: Write>(&mut self, writer: &mut W, value: &Rc<Value>) -> Result<(), EncodeError> {
        self.write_type_marker(writer, TypeMarker::AvmPlus)?;
        let mut amf3 = Amf3Encoder::new(self.registry.clone());
        amf3.external_encoders = self.external_encoders.clone();
        amf3.write_value_element(writer, value)
    }

    /// Write a single AMF0 value to the writer
    pub fn write_value<W: Write>(&mut self, writer: &mut W, value: &Rc<Value>) -> Result<(), EncodeError> {
        match value.deref() {
            Value::Number(n) => self.write_number_element(writer, *n),
            // AMF0 has no integer form
            Value::Integer(i) => self.write_number_element(writer, f64::from(*i)),
            Value::Bool(b) => self.write_bool_element(writer, *b),
            Value::String(s) => self.write_string_element(writer, s),
            Value::Null => self.write_type_marker(writer, TypeMarker::Null),
            Value::Undefined => self.write_type_marker(writer, TypeMarker::Undefined),
            Value::Object(id, elements, class_def) => {
                self.write_object_element(writer, value, *id, elements, class_def)
            }
            Value::Reference(id) => self.write_reference_element(writer, *id),
            Value::StrictArray(items) => self.write_strict_array_element(writer, value, items),
            Value::EcmaArray(dense, assoc, _) => {
                self.write_ecma_array_element(writer, value, dense, assoc)
            }
            Value::Date(millis, time_zone) => self.write_date_element(writer, *millis, *time_zone),
            Value::Xml(content, _) => {
                self.write_type_marker(writer, TypeMarker::Xml)?;
                write_long_string(writer, content)?;
                Ok(())
            }
            Value::Amf3(inner) => self.write_avm_plus(writer, inner),
            // No AMF0 form; carried through the AMF3 escape
            Value::ByteArray(_)
            | Value::VectorInt(_, _)
            | Value::VectorUInt(_, _)
            | Value::VectorDouble(_, _)
            | Value::VectorObject(_, _, _)
            | Value::Dictionary(_, _)
            | Value::External(_, _, _) => self.write_avm_plus(writer, value),
        }
    }
}
