//! Handles encoding AMF3

use crate::amf3::cache::{ObjectCache, StringCache};
use crate::amf3::custom_encoder::ExternalEncoder;
use crate::amf3::length::Length;
use crate::amf3::type_marker::TypeMarker;
use crate::errors::EncodeError;
use crate::registry::ClassRegistry;
use crate::types::{Attribute, ClassDefinition, Element, ObjectId, Value};
use byteorder::{BigEndian, WriteBytesExt};
use std::collections::HashMap;
use std::io::Write;
use std::ops::Deref;
use std::rc::Rc;

/// The inclusive bounds of the AMF3 integer marker; values outside are
/// widened to doubles on write.
pub(crate) const INTEGER_MIN: i32 = -0x1000_0000;
pub(crate) const INTEGER_MAX: i32 = 0x0FFF_FFFF;

/// Write a U29: 1 to 4 bytes depending on magnitude, negative values
/// wrapped into the 29-bit space first.
pub(crate) fn write_u29<W: Write>(writer: &mut W, i: i32) -> std::io::Result<()> {
    let n = if i < 0 { i + 0x2000_0000 } else { i };

    if n > 0x1F_FFFF {
        writer.write_u8(((n >> (7 * 3 + 1)) | 0b1000_0000) as u8)?;
        writer.write_u8(((n >> (7 * 2 + 1)) | 0b1000_0000) as u8)?;
        writer.write_u8(((n >> (7 + 1)) | 0b1000_0000) as u8)?;
        writer.write_u8((n & 0b1111_1111) as u8)?;
    } else if n > 0x3FFF {
        writer.write_u8(((n >> (7 * 2)) | 0b1000_0000) as u8)?;
        writer.write_u8(((n >> 7) | 0b1000_0000) as u8)?;
        writer.write_u8((n & 0b0111_1111) as u8)?;
    } else if n > 0x7F {
        writer.write_u8(((n >> 7) | 0b1000_0000) as u8)?;
        writer.write_u8((n & 0b0111_1111) as u8)?;
    } else {
        writer.write_u8((n & 0b0111_1111) as u8)?;
    }

    Ok(())
}

fn write_length<W: Write>(writer: &mut W, length: Length) -> std::io::Result<()> {
    write_u29(writer, length.to_header())
}

/// Handles encoding AMF3
pub struct Amf3Encoder {
    /// The table used to cache repeated byte strings
    string_reference_table: StringCache,

    /// The table used to cache repeated trait definitions
    trait_reference_table: Vec<ClassDefinition>,

    /// The table used to cache repeated objects, keyed by handle identity
    object_reference_table: ObjectCache,

    /// Encoders for externalizable classes, keyed by server class name
    pub external_encoders: HashMap<String, Rc<dyn ExternalEncoder>>,

    /// Resolves server class names to wire aliases
    registry: ClassRegistry,
}

impl Default for Amf3Encoder {
    fn default() -> Self {
        Self::new(ClassRegistry::default())
    }
}

impl Amf3Encoder {
    /// An encoder with fresh reference tables resolving aliases through
    /// `registry`.
    pub fn new(registry: ClassRegistry) -> Self {
        Self {
            string_reference_table: StringCache::default(),
            trait_reference_table: Vec::new(),
            object_reference_table: ObjectCache::default(),
            external_encoders: HashMap::new(),
            registry,
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

    fn write_byte_string<W: Write>(&mut self, writer: &mut W, s: &[u8]) -> Result<(), EncodeError> {
        // The empty string is always written inline and never interned
        if s.is_empty() {
            write_length(writer, Length::Size(0))?;
            return Ok(());
        }

        match self.string_reference_table.get_index(s) {
            Some(index) => write_length(writer, Length::Reference(index))?,
            None => {
                self.string_reference_table.store(s);
                write_length(writer, Length::Size(s.len() as u32))?;
                writer.write_all(s)?;
            }
        }

        Ok(())
    }

    fn write_string<W: Write>(&mut self, writer: &mut W, s: &str) -> Result<(), EncodeError> {
        self.write_byte_string(writer, s.as_bytes())
    }

    fn write_number_element<W: Write>(&mut self, writer: &mut W, n: f64) -> Result<(), EncodeError> {
        self.write_type_marker(writer, TypeMarker::Number)?;
        writer.write_f64::<BigEndian>(n)?;
        Ok(())
    }

    fn write_boolean_element<W: Write>(&mut self, writer: &mut W, b: bool) -> Result<(), EncodeError> {
        if b {
            self.write_type_marker(writer, TypeMarker::True)
        } else {
            self.write_type_marker(writer, TypeMarker::False)
        }
    }

    fn write_string_element<W: Write>(&mut self, writer: &mut W, s: &str) -> Result<(), EncodeError> {
        self.write_type_marker(writer, TypeMarker::String)?;
        self.write_byte_string(writer, s.as_bytes())
    }

    fn write_integer_element<W: Write>(&mut self, writer: &mut W, i: i32) -> Result<(), EncodeError> {
        if !(INTEGER_MIN..=INTEGER_MAX).contains(&i) {
            return self.write_number_element(writer, f64::from(i));
        }
        self.write_type_marker(writer, TypeMarker::Integer)?;
        write_u29(writer, i)?;
        Ok(())
    }

    fn write_date_element<W: Write>(
        &mut self,
        writer: &mut W,
        value: &Rc<Value>,
        millis: f64,
    ) -> Result<(), EncodeError> {
        self.write_type_marker(writer, TypeMarker::Date)?;
        match self.object_reference_table.get_index(value) {
            Some(index) => write_length(writer, Length::Reference(index))?,
            None => {
                self.object_reference_table.store(value, ObjectId::INVALID);
                write_length(writer, Length::Size(0))?;
                writer.write_f64::<BigEndian>(millis)?;
            }
        }
        Ok(())
    }

    fn write_byte_array_element<W: Write>(
        &mut self,
        writer: &mut W,
        value: &Rc<Value>,
        bytes: &[u8],
    ) -> Result<(), EncodeError> {
        self.write_type_marker(writer, TypeMarker::ByteArray)?;
        match self.object_reference_table.get_index(value) {
            Some(index) => write_length(writer, Length::Reference(index))?,
            None => {
                self.object_reference_table.store(value, ObjectId::INVALID);
                write_length(writer, Length::Size(bytes.len() as u32))?;
                writer.write_all(bytes)?;
            }
        }
        Ok(())
    }

    fn write_xml_element<W: Write>(
        &mut self,
        writer: &mut W,
        value: &Rc<Value>,
        content: &str,
        string: bool,
    ) -> Result<(), EncodeError> {
        let marker = if string {
            TypeMarker::XmlString
        } else {
            TypeMarker::Xml
        };
        self.write_type_marker(writer, marker)?;
        match self.object_reference_table.get_index(value) {
            Some(index) => write_length(writer, Length::Reference(index))?,
            None => {
                self.object_reference_table.store(value, ObjectId::INVALID);
                write_length(writer, Length::Size(content.len() as u32))?;
                writer.write_all(content.as_bytes())?;
            }
        }
        Ok(())
    }

    fn write_int_vector<W: Write>(
        &mut self,
        writer: &mut W,
        value: &Rc<Value>,
        items: &[i32],
        fixed_length: bool,
    ) -> Result<(), EncodeError> {
        self.write_type_marker(writer, TypeMarker::VectorInt)?;
        match self.object_reference_table.get_index(value) {
            Some(index) => write_length(writer, Length::Reference(index))?,
            None => {
                self.object_reference_table.store(value, ObjectId::INVALID);
                write_length(writer, Length::Size(items.len() as u32))?;
                writer.write_u8(fixed_length as u8)?;
                for item in items {
                    writer.write_i32::<BigEndian>(*item)?;
                }
            }
        }
        Ok(())
    }

    fn write_uint_vector<W: Write>(
        &mut self,
        writer: &mut W,
        value: &Rc<Value>,
        items: &[u32],
        fixed_length: bool,
    ) -> Result<(), EncodeError> {
        self.write_type_marker(writer, TypeMarker::VectorUInt)?;
        match self.object_reference_table.get_index(value) {
            Some(index) => write_length(writer, Length::Reference(index))?,
            None => {
                self.object_reference_table.store(value, ObjectId::INVALID);
                write_length(writer, Length::Size(items.len() as u32))?;
                writer.write_u8(fixed_length as u8)?;
                for item in items {
                    writer.write_u32::<BigEndian>(*item)?;
                }
            }
        }
        Ok(())
    }

    fn write_number_vector<W: Write>(
        &mut self,
        writer: &mut W,
        value: &Rc<Value>,
        items: &[f64],
        fixed_length: bool,
    ) -> Result<(), EncodeError> {
        self.write_type_marker(writer, TypeMarker::VectorDouble)?;
        match self.object_reference_table.get_index(value) {
            Some(index) => write_length(writer, Length::Reference(index))?,
            None => {
                self.object_reference_table.store(value, ObjectId::INVALID);
                write_length(writer, Length::Size(items.len() as u32))?;
                writer.write_u8(fixed_length as u8)?;
                for item in items {
                    writer.write_f64::<BigEndian>(*item)?;
                }
            }
        }
        Ok(())
    }

    fn write_object_vector_element<W: Write>(
        &mut self,
        writer: &mut W,
        value: &Rc<Value>,
        items: &[Rc<Value>],
        type_name: &str,
        fixed_length: bool,
    ) -> Result<(), EncodeError> {
        self.write_type_marker(writer, TypeMarker::VectorObject)?;
        match self.object_reference_table.get_index(value) {
            Some(index) => write_length(writer, Length::Reference(index))?,
            None => {
                self.object_reference_table.store(value, ObjectId::INVALID);
                write_length(writer, Length::Size(items.len() as u32))?;
                writer.write_u8(fixed_length as u8)?;
                self.write_string(writer, type_name)?;
                for item in items {
                    self.write_value_element(writer, item)?;
                }
            }
        }
        Ok(())
    }

    fn write_dictionary_element<W: Write>(
        &mut self,
        writer: &mut W,
        value: &Rc<Value>,
        items: &[(Rc<Value>, Rc<Value>)],
        weak_keys: bool,
    ) -> Result<(), EncodeError> {
        self.write_type_marker(writer, TypeMarker::Dictionary)?;
        match self.object_reference_table.get_index(value) {
            Some(index) => write_length(writer, Length::Reference(index))?,
            None => {
                self.object_reference_table.store(value, ObjectId::INVALID);
                write_length(writer, Length::Size(items.len() as u32))?;
                writer.write_u8(weak_keys as u8)?;
                for (key, entry) in items {
                    self.write_value_element(writer, key)?;
                    self.write_value_element(writer, entry)?;
                }
            }
        }
        Ok(())
    }

    fn write_element<W: Write>(&mut self, writer: &mut W, element: &Element) -> Result<(), EncodeError> {
        self.write_byte_string(writer, element.name.as_bytes())?;
        self.write_value_element(writer, &element.value)
    }

    fn write_strict_array_element<W: Write>(
        &mut self,
        writer: &mut W,
        value: &Rc<Value>,
        items: &[Rc<Value>],
    ) -> Result<(), EncodeError> {
        self.write_type_marker(writer, TypeMarker::Array)?;
        match self.object_reference_table.get_index(value) {
            Some(index) => write_length(writer, Length::Reference(index))?,
            None => {
                self.object_reference_table.store(value, ObjectId::INVALID);
                write_length(writer, Length::Size(items.len() as u32))?;
                self.write_byte_string(writer, &[])?;
                for item in items {
                    self.write_value_element(writer, item)?;
                }
            }
        }
        Ok(())
    }

    fn write_ecma_array_element<W: Write>(
        &mut self,
        writer: &mut W,
        value: &Rc<Value>,
        dense: &[Rc<Value>],
        assoc: &[Element],
    ) -> Result<(), EncodeError> {
        self.write_type_marker(writer, TypeMarker::Array)?;
        match self.object_reference_table.get_index(value) {
            Some(index) => write_length(writer, Length::Reference(index))?,
            None => {
                self.object_reference_table.store(value, ObjectId::INVALID);
                write_length(writer, Length::Size(dense.len() as u32))?;
                for element in assoc {
                    self.write_element(writer, element)?;
                }
                self.write_byte_string(writer, &[])?;
                for item in dense {
                    self.write_value_element(writer, item)?;
                }
            }
        }
        Ok(())
    }

    fn write_object_body<W: Write>(
        &mut self,
        writer: &mut W,
        def: &ClassDefinition,
        members: &[Element],
    ) -> Result<(), EncodeError> {
        if def.is_external() {
            let encoder = self
                .external_encoders
                .get(&def.name)
                .cloned()
                .ok_or_else(|| EncodeError::MissingExternalEncoder(def.name.clone()))?;
            let bytes = encoder.encode(members, &Some(def.clone()), self)?;
            writer.write_all(&bytes)?;
            return Ok(());
        }

        // Sealed members in declared order; a missing member is undefined
        for name in &def.static_properties {
            match members.iter().find(|e| e.name == *name) {
                Some(element) => self.write_value_element(writer, &element.value)?,
                None => self.write_type_marker(writer, TypeMarker::Undefined)?,
            }
        }

        if def.is_dynamic() {
            for element in members
                .iter()
                .filter(|e| !def.static_properties.contains(&e.name))
            {
                self.write_byte_string(writer, element.name.as_bytes())?;
                self.write_value_element(writer, &element.value)?;
            }
            self.write_byte_string(writer, &[])?;
        }

        Ok(())
    }

    fn write_object_element<W: Write>(
        &mut self,
        writer: &mut W,
        value: &Rc<Value>,
        id: ObjectId,
        members: &[Element],
        class_def: &Option<ClassDefinition>,
    ) -> Result<(), EncodeError> {
        self.write_type_marker(writer, TypeMarker::Object)?;

        if let Some(index) = self.object_reference_table.get_index(value) {
            write_u29(writer, (index << 1) as i32)?;
            return Ok(());
        }
        // Claimed before the body so self-referential graphs terminate
        self.object_reference_table.store(value, id);

        let def = class_def.clone().unwrap_or_default();

        if let Some(trait_index) = self.trait_reference_table.iter().position(|d| *d == def) {
            write_u29(writer, ((trait_index << 2) | 0b01) as i32)?;
            return self.write_object_body(writer, &def, members);
        }
        self.trait_reference_table.push(def.clone());

        let encoding = u32::from(Attribute::encoding_bits(def.attributes));
        let header =
            ((def.static_properties.len() as u32) << 4) | (encoding << 2) | 0b11;
        write_u29(writer, header as i32)?;

        let alias = self.registry.resolve_outgoing(&def.name).to_string();
        self.write_string(writer, &alias)?;
        for name in &def.static_properties {
            self.write_string(writer, name)?;
        }

        self.write_object_body(writer, &def, members)
    }

    fn write_reference_element<W: Write>(
        &mut self,
        writer: &mut W,
        id: ObjectId,
    ) -> Result<(), EncodeError> {
        let index = self
            .object_reference_table
            .get_id_index(id)
            .ok_or(EncodeError::DanglingReference(id.0))?;
        self.write_type_marker(writer, TypeMarker::Object)?;
        write_u29(writer, (index << 1) as i32)?;
        Ok(())
    }

    /// Write a single AMF3 value to the writer
    pub fn write_value_element<W: Write>(
        &mut self,
        writer: &mut W,
        value: &Rc<Value>,
    ) -> Result<(), EncodeError> {
        match value.deref() {
            Value::Number(n) => self.write_number_element(writer, *n),
            Value::Integer(i) => self.write_integer_element(writer, *i),
            Value::Bool(b) => self.write_boolean_element(writer, *b),
            Value::String(s) => self.write_string_element(writer, s),
            Value::Null => self.write_type_marker(writer, TypeMarker::Null),
            Value::Undefined => self.write_type_marker(writer, TypeMarker::Undefined),
            Value::Object(id, members, class_def) => {
                self.write_object_element(writer, value, *id, members, class_def)
            }
            Value::Reference(id) => self.write_reference_element(writer, *id),
            Value::StrictArray(items) => self.write_strict_array_element(writer, value, items),
            Value::EcmaArray(dense, assoc, _) => {
                self.write_ecma_array_element(writer, value, dense, assoc)
            }
            Value::Date(millis, _) => self.write_date_element(writer, value, *millis),
            Value::Xml(content, string) => self.write_xml_element(writer, value, content, *string),
            Value::ByteArray(bytes) => self.write_byte_array_element(writer, value, bytes),
            Value::VectorInt(items, fixed) => self.write_int_vector(writer, value, items, *fixed),
            Value::VectorUInt(items, fixed) => self.write_uint_vector(writer, value, items, *fixed),
            Value::VectorDouble(items, fixed) => {
                self.write_number_vector(writer, value, items, *fixed)
            }
            Value::VectorObject(items, type_name, fixed) => {
                self.write_object_vector_element(writer, value, items, type_name, *fixed)
            }
            Value::Dictionary(items, weak_keys) => {
                self.write_dictionary_element(writer, value, items, *weak_keys)
            }
            Value::External(members, _, class_def) => {
                self.write_object_element(writer, value, ObjectId::INVALID, members, class_def)
            }
            Value::Amf3(inner) => self.write_value_element(writer, inner),
        }
    }
}

#[cfg(test)]
mod write_number_tests {
    use super::write_u29;
    use crate::amf3::read::read_u29;

    #[test]
    fn write_1byte_number() {
        let mut v = vec![];
        write_u29(&mut v, 0b0010_1011).unwrap();
        assert_eq!(v, &[0b0010_1011]);
    }

    #[test]
    fn write_4byte_number() {
        let mut v = vec![];
        write_u29(&mut v, 2_097_280).unwrap();
        assert_eq!(v, &[0b1000_0000, 0b1100_0000, 0b1000_0000, 0b1000_0000]);
    }

    #[test]
    fn write_negative_number() {
        let mut v = vec![];
        write_u29(&mut v, -268_435_455).unwrap();
        assert_eq!(v, &[192, 128, 128, 1]);
    }

    #[test]
    fn boundary_byte_lengths() {
        for (value, expected_len) in [
            (0, 1),
            (0x7F, 1),
            (0x80, 2),
            (0x3FFF, 2),
            (0x4000, 3),
            (0x1F_FFFF, 3),
            (0x20_0000, 4),
            (0x1FFF_FFFF, 4),
        ] {
            let mut v = vec![];
            write_u29(&mut v, value).unwrap();
            assert_eq!(v.len(), expected_len, "length of {value:#x}");
            assert_eq!(read_u29(&v).unwrap().1, value as u32, "round trip of {value:#x}");
        }
    }
}
