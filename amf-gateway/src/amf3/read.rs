//! Handles decoding AMF3

use crate::amf3::custom_encoder::ExternalDecoderFn;
use crate::amf3::length::Length;
use crate::amf3::type_marker::TypeMarker;
use crate::errors::DecodeError;
use crate::nom_utils::AmfResult;
use crate::registry::ClassRegistry;
use crate::types::{Attribute, ClassDefinition, Element, ObjectId, Value};
use nom::bytes::complete::take;
use nom::combinator::map_res;
use nom::multi::many_m_n;
use nom::number::complete::{be_f64, be_i32, be_u32, be_u8};
use nom::Err;
use std::collections::HashMap;
use std::rc::Rc;

const REFERENCE_FLAG: u32 = 0x01;

/// Read a U29: 1 to 4 bytes, 29 payload bits.
///
/// Bytes 1-3 carry 7 bits each behind a continuation bit; a fourth byte
/// contributes 8 bits with no continuation bit.
pub(crate) fn read_u29(i: &[u8]) -> AmfResult<'_, u32> {
    let (mut i, byte) = be_u8(i)?;
    let mut value = (byte & 0x7F) as u32;
    if byte & 0x80 == 0 {
        return Ok((i, value));
    }

    for _ in 0..2 {
        let (j, byte) = be_u8(i)?;
        i = j;
        value = (value << 7) | ((byte & 0x7F) as u32);
        if byte & 0x80 == 0 {
            return Ok((i, value));
        }
    }

    let (i, byte) = be_u8(i)?;
    value = (value << 8) | (byte as u32);
    Ok((i, value))
}

/// Read a U29 and sign-extend bit 28, the interpretation used by the
/// integer marker.
pub(crate) fn read_i29(i: &[u8]) -> AmfResult<'_, i32> {
    let (i, value) = read_u29(i)?;
    let mut value = value as i32;
    if value & 0x1000_0000 != 0 {
        value -= 0x2000_0000;
    }
    Ok((i, value))
}

fn read_length(i: &[u8]) -> AmfResult<'_, Length> {
    let (i, value) = read_u29(i)?;
    Ok((
        i,
        match value & REFERENCE_FLAG == 0 {
            true => Length::Reference((value >> 1) as usize),
            false => Length::Size(value >> 1),
        },
    ))
}

/// Handles decoding AMF3
pub struct Amf3Decoder {
    /// The table used to cache repeated byte strings
    string_reference_table: Vec<Vec<u8>>,

    /// The table used to cache repeated trait definitions
    trait_reference_table: Vec<ClassDefinition>,

    /// The table used to cache repeated objects
    object_reference_table: Vec<Rc<Value>>,

    /// Decoders for externalizable classes, keyed by resolved class name
    pub external_decoders: HashMap<String, ExternalDecoderFn>,

    /// Resolves wire aliases to server class names
    registry: ClassRegistry,

    /// The id handed to the most recently started object
    next_object_id: i64,
}

impl Default for Amf3Decoder {
    fn default() -> Self {
        Self::new(ClassRegistry::default())
    }
}

impl Amf3Decoder {
    /// A decoder with fresh reference tables resolving aliases through
    /// `registry`.
    pub fn new(registry: ClassRegistry) -> Self {
        Self {
            string_reference_table: Vec::new(),
            trait_reference_table: Vec::new(),
            object_reference_table: Vec::new(),
            external_decoders: HashMap::new(),
            registry,
            next_object_id: 0,
        }
    }

    fn parse_byte_stream<'a>(&mut self, i: &'a [u8]) -> AmfResult<'a, Vec<u8>> {
        let (i, length) = read_length(i)?;

        match length {
            Length::Size(size) => {
                if size == 0 {
                    // The empty string is never interned
                    Ok((i, Vec::new()))
                } else {
                    let (i, bytes) = take(size)(i)?;
                    self.string_reference_table.push(bytes.to_vec());
                    Ok((i, bytes.to_vec()))
                }
            }
            Length::Reference(index) => {
                let bytes = self
                    .string_reference_table
                    .get(index)
                    .ok_or_else(|| Err::Error(DecodeError::BadReference(index as u32)))?
                    .clone();
                Ok((i, bytes))
            }
        }
    }

    fn parse_string<'a>(&mut self, i: &'a [u8]) -> AmfResult<'a, String> {
        let (i, bytes) = self.parse_byte_stream(i)?;
        let s = String::from_utf8(bytes).map_err(|_| Err::Error(DecodeError::InvalidUtf8))?;
        Ok((i, s))
    }

    fn parse_class_def<'a>(&mut self, header: u32, i: &'a [u8]) -> AmfResult<'a, ClassDefinition> {
        if header & REFERENCE_FLAG == 0 {
            let index = (header >> 1) as usize;
            let class_def = self
                .trait_reference_table
                .get(index)
                .ok_or_else(|| Err::Error(DecodeError::BadReference(index as u32)))?
                .clone();
            return Ok((i, class_def));
        }
        let header = header >> 1;

        let (i, alias) = self.parse_string(i)?;
        let name = self.registry.resolve_incoming(&alias).to_string();

        let encoding = (header & 0x03) as u8;
        let attribute_count = (header >> 2) as usize;

        let (i, static_props) =
            many_m_n(attribute_count, attribute_count, |i| self.parse_string(i))(i)?;

        let attributes = Attribute::set_from_encoding(encoding);

        let class_def = ClassDefinition {
            name,
            attributes,
            static_properties: static_props,
        };

        self.trait_reference_table.push(class_def.clone());
        Ok((i, class_def))
    }

    /// Resolve a reference-table hit; objects become explicit reference
    /// nodes so cyclic graphs terminate.
    fn resolve_table_entry<'a>(&self, i: &'a [u8], index: usize) -> AmfResult<'a, Rc<Value>> {
        let entry = self
            .object_reference_table
            .get(index)
            .ok_or(Err::Error(DecodeError::BadReference(index as u32)))?;
        let value = match &**entry {
            Value::Object(id, _, _) if id.is_valid() => Rc::new(Value::Reference(*id)),
            _ => Rc::clone(entry),
        };
        Ok((i, value))
    }

    fn parse_reference_or_val<'a>(
        &mut self,
        i: &'a [u8],
        parser: impl FnOnce(&mut Self, &'a [u8], usize) -> AmfResult<'a, Value>,
    ) -> AmfResult<'a, Rc<Value>> {
        let (i, length) = read_length(i)?;

        match length {
            Length::Reference(index) => self.resolve_table_entry(i, index),
            Length::Size(size) => {
                let size: usize = size as usize;
                let index = self.object_reference_table.len();
                self.object_reference_table.push(Rc::new(Value::Null));

                let (i, value) = parser(self, i, size)?;

                let slot = &mut self.object_reference_table[index];
                *Rc::get_mut(slot).ok_or(Err::Error(DecodeError::CircularReference))? = value;

                Ok((i, Rc::clone(&self.object_reference_table[index])))
            }
        }
    }

    fn parse_object_static<'a>(
        &mut self,
        i: &'a [u8],
        class_def: &ClassDefinition,
    ) -> AmfResult<'a, Vec<Element>> {
        let mut elements = Vec::new();
        let mut i = i;

        for name in class_def.static_properties.iter() {
            let (j, value) = self.parse_single_element(i)?;
            elements.push(Element::shared(name.clone(), value));
            i = j;
        }

        Ok((i, elements))
    }

    pub(crate) fn parse_element_object<'a>(&mut self, i: &'a [u8]) -> AmfResult<'a, Rc<Value>> {
        let (i, mut header) = read_u29(i)?;

        if header & REFERENCE_FLAG == 0 {
            return self.resolve_table_entry(i, (header >> 1) as usize);
        }
        header >>= 1;

        // The slot is claimed before the body is read so that nested
        // back-references can name this object
        self.next_object_id += 1;
        let id = ObjectId(self.next_object_id);
        let index = self.object_reference_table.len();
        self.object_reference_table
            .push(Rc::new(Value::Object(id, Vec::new(), None)));

        let (i, class_def) = self.parse_class_def(header, i)?;

        if class_def.is_external() {
            let decoder = self
                .external_decoders
                .get(&class_def.name)
                .cloned()
                .ok_or(Err::Error(DecodeError::MissingExternalDecoder))?;
            let (i, members) = decoder(i, self)?;
            let value = Rc::new(Value::External(members, Vec::new(), Some(class_def)));
            self.object_reference_table[index] = Rc::clone(&value);
            return Ok((i, value));
        }

        let mut i = i;
        let (j, mut elements) = self.parse_object_static(i, &class_def)?;
        i = j;

        if class_def.is_dynamic() {
            let (mut j, mut name) = self.parse_byte_stream(i)?;
            while !name.is_empty() {
                let name_str =
                    String::from_utf8(name).map_err(|_| Err::Error(DecodeError::InvalidUtf8))?;
                let (k, value) = self.parse_single_element(j)?;
                elements.push(Element::shared(name_str, value));
                let (k, next) = self.parse_byte_stream(k)?;
                j = k;
                name = next;
            }
            i = j;
        }

        {
            let slot = &mut self.object_reference_table[index];
            let inner =
                Rc::get_mut(slot).ok_or(Err::Error(DecodeError::CircularReference))?;
            if let Value::Object(_, members, def) = inner {
                *members = elements;
                *def = Some(class_def);
            }
        }

        Ok((i, Rc::clone(&self.object_reference_table[index])))
    }

    fn parse_element_byte_array<'a>(&mut self, i: &'a [u8]) -> AmfResult<'a, Rc<Value>> {
        self.parse_reference_or_val(i, |_this, i, len| {
            let (i, bytes) = take(len)(i)?;
            Ok((i, Value::ByteArray(bytes.to_vec())))
        })
    }

    fn parse_element_vector_int<'a>(&mut self, i: &'a [u8]) -> AmfResult<'a, Rc<Value>> {
        self.parse_reference_or_val(i, |_this, i, len| {
            // Guards against OOM on crafted lengths
            if i.len() < len * 4 {
                return Err(Err::Error(DecodeError::OutOfBounds));
            }

            let (i, fixed_length) = be_u8(i)?;
            let (i, items) = many_m_n(len, len, be_i32)(i)?;

            Ok((i, Value::VectorInt(items, fixed_length == 1)))
        })
    }

    fn parse_element_vector_uint<'a>(&mut self, i: &'a [u8]) -> AmfResult<'a, Rc<Value>> {
        self.parse_reference_or_val(i, |_this, i, len| {
            if i.len() < len * 4 {
                return Err(Err::Error(DecodeError::OutOfBounds));
            }

            let (i, fixed_length) = be_u8(i)?;
            let (i, items) = many_m_n(len, len, be_u32)(i)?;

            Ok((i, Value::VectorUInt(items, fixed_length == 1)))
        })
    }

    fn parse_element_vector_double<'a>(&mut self, i: &'a [u8]) -> AmfResult<'a, Rc<Value>> {
        self.parse_reference_or_val(i, |_this, i, len| {
            if i.len() < len * 8 {
                return Err(Err::Error(DecodeError::OutOfBounds));
            }

            let (i, fixed_length) = be_u8(i)?;
            let (i, items) = many_m_n(len, len, be_f64)(i)?;

            Ok((i, Value::VectorDouble(items, fixed_length == 1)))
        })
    }

    fn parse_element_object_vector<'a>(&mut self, i: &'a [u8]) -> AmfResult<'a, Rc<Value>> {
        self.parse_reference_or_val(i, |this, i, len| {
            let (i, fixed_length) = be_u8(i)?;
            let (i, type_name) = this.parse_string(i)?;
            let (i, items) = many_m_n(len, len, |i| this.parse_single_element(i))(i)?;

            Ok((i, Value::VectorObject(items, type_name, fixed_length == 1)))
        })
    }

    fn parse_element_array<'a>(&mut self, i: &'a [u8]) -> AmfResult<'a, Rc<Value>> {
        self.parse_reference_or_val(i, |this, i, len| {
            if i.len() < len {
                return Err(Err::Error(DecodeError::OutOfBounds));
            }

            let (i, mut key) = this.parse_byte_stream(i)?;

            if key.is_empty() {
                let (i, items) = many_m_n(len, len, |i| this.parse_single_element(i))(i)?;
                return Ok((i, Value::StrictArray(items)));
            }

            let mut assoc = Vec::new();
            let mut i = i;
            while !key.is_empty() {
                let name =
                    String::from_utf8(key).map_err(|_| Err::Error(DecodeError::InvalidUtf8))?;
                let (j, value) = this.parse_single_element(i)?;
                assoc.push(Element::shared(name, value));
                let (j, next) = this.parse_byte_stream(j)?;
                i = j;
                key = next;
            }

            let assoc_len = assoc.len() as u32;
            let (i, dense) = many_m_n(len, len, |i| this.parse_single_element(i))(i)?;

            Ok((i, Value::EcmaArray(dense, assoc, assoc_len)))
        })
    }

    fn parse_element_dict<'a>(&mut self, i: &'a [u8]) -> AmfResult<'a, Rc<Value>> {
        self.parse_reference_or_val(i, |this, i, len| {
            let (i, weak_keys) = be_u8(i)?;

            if i.len() < len * 2 {
                return Err(Err::Error(DecodeError::OutOfBounds));
            }

            let (i, pairs) = many_m_n(len * 2, len * 2, |i| this.parse_single_element(i))(i)?;
            let pairs = pairs
                .chunks_exact(2)
                .map(|chunk| (Rc::clone(&chunk[0]), Rc::clone(&chunk[1])))
                .collect::<Vec<_>>();

            Ok((i, Value::Dictionary(pairs, weak_keys == 1)))
        })
    }

    fn parse_element_date<'a>(&mut self, i: &'a [u8]) -> AmfResult<'a, Rc<Value>> {
        self.parse_reference_or_val(i, |_this, i, _len| {
            let (i, millis) = be_f64(i)?;
            Ok((i, Value::Date(millis, None)))
        })
    }

    fn parse_element_xml<'a>(&mut self, i: &'a [u8], string: bool) -> AmfResult<'a, Rc<Value>> {
        self.parse_reference_or_val(i, |_this, i, len| {
            let (i, content) = map_res(take(len as u32), std::str::from_utf8)(i)?;
            Ok((i, Value::Xml(content.into(), string)))
        })
    }

    fn read_type_marker<'a>(&self, i: &'a [u8]) -> AmfResult<'a, TypeMarker> {
        let (i, marker) = be_u8(i)?;
        TypeMarker::try_from(marker)
            .map(|marker| (i, marker))
            .map_err(|_| Err::Error(DecodeError::UnsupportedType(marker)))
    }

    /// Parse a single AMF3 value from the input
    pub fn parse_single_element<'a>(&mut self, i: &'a [u8]) -> AmfResult<'a, Rc<Value>> {
        let (i, marker) = self.read_type_marker(i)?;

        match marker {
            TypeMarker::Undefined => Ok((i, Rc::new(Value::Undefined))),
            TypeMarker::Null => Ok((i, Rc::new(Value::Null))),
            TypeMarker::False => Ok((i, Rc::new(Value::Bool(false)))),
            TypeMarker::True => Ok((i, Rc::new(Value::Bool(true)))),
            TypeMarker::Integer => {
                let (i, value) = read_i29(i)?;
                Ok((i, Rc::new(Value::Integer(value))))
            }
            TypeMarker::Number => {
                let (i, value) = be_f64(i)?;
                Ok((i, Rc::new(Value::Number(value))))
            }
            TypeMarker::String => {
                let (i, value) = self.parse_string(i)?;
                Ok((i, Rc::new(Value::String(value))))
            }
            TypeMarker::Xml => self.parse_element_xml(i, false),
            TypeMarker::Date => self.parse_element_date(i),
            TypeMarker::Array => self.parse_element_array(i),
            TypeMarker::Object => self.parse_element_object(i),
            TypeMarker::XmlString => self.parse_element_xml(i, true),
            TypeMarker::ByteArray => self.parse_element_byte_array(i),
            TypeMarker::VectorObject => self.parse_element_object_vector(i),
            TypeMarker::VectorInt => self.parse_element_vector_int(i),
            TypeMarker::VectorUInt => self.parse_element_vector_uint(i),
            TypeMarker::VectorDouble => self.parse_element_vector_double(i),
            TypeMarker::Dictionary => self.parse_element_dict(i),
        }
    }
}

#[cfg(test)]
mod read_number_tests {
    use super::{read_i29, read_u29};

    #[test]
    fn read_1byte_number() {
        assert_eq!(0b0010_1011, read_i29(&[0b0010_1011]).unwrap().1);
        assert_eq!(0b0010_1011, read_u29(&[0b0010_1011]).unwrap().1);
    }

    #[test]
    fn read_4byte_number() {
        let i = &[0b1000_0000, 0b1100_0000, 0b1000_0000, 0b1000_0000];
        assert_eq!(2_097_280, read_i29(i).unwrap().1);
        assert_eq!(2_097_280, read_u29(i).unwrap().1);
    }

    #[test]
    fn read_negative_number() {
        assert_eq!(-268_435_455, read_i29(&[192, 128, 128, 1]).unwrap().1);
        assert_eq!(268_435_457, read_u29(&[192, 128, 128, 1]).unwrap().1);
    }

    #[test]
    fn read_boundary_values() {
        assert_eq!(0x7F, read_u29(&[0x7F]).unwrap().1);
        assert_eq!(0x80, read_u29(&[0x81, 0x00]).unwrap().1);
        assert_eq!(0x3FFF, read_u29(&[0xFF, 0x7F]).unwrap().1);
        assert_eq!(0x4000, read_u29(&[0x81, 0x80, 0x00]).unwrap().1);
        assert_eq!(0x1F_FFFF, read_u29(&[0xFF, 0xFF, 0x7F]).unwrap().1);
        assert_eq!(0x20_0000, read_u29(&[0x80, 0xC0, 0x80, 0x00]).unwrap().1);
        assert_eq!(0x1FFF_FFFF, read_u29(&[0xFF, 0xFF, 0xFF, 0xFF]).unwrap().1);
    }
}
