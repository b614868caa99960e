//! Support for decoding AMF0 data

use crate::amf0::type_marker::TypeMarker;
use crate::amf3::custom_encoder::ExternalDecoderFn;
use crate::amf3::read::Amf3Decoder;
use crate::errors::DecodeError;
use crate::nom_utils::{take_str, AmfResult};
use crate::registry::ClassRegistry;
use crate::types::{ClassDefinition, Element, ObjectId, Value};
use nom::multi::many_m_n;
use nom::number::complete::{be_f64, be_u16, be_u32, be_u8};
use nom::Err;
use std::collections::HashMap;
use std::rc::Rc;

/// Read a u16-length-prefixed UTF-8 string
pub(crate) fn parse_string(i: &[u8]) -> AmfResult<'_, &str> {
    let (i, length) = be_u16(i)?;
    take_str(i, length as u32)
}

fn parse_long_string(i: &[u8]) -> AmfResult<'_, &str> {
    let (i, length) = be_u32(i)?;
    take_str(i, length)
}

/// Handles decoding AMF0
///
/// Holds the single object reference table; one decoder serves one packet.
pub struct Amf0Decoder {
    /// The table used to resolve reference markers
    reference_table: Vec<Rc<Value>>,

    /// Resolves wire aliases to server class names
    registry: ClassRegistry,

    /// Decoders handed to the AMF3 codec when a value escapes to AMF3
    pub external_decoders: HashMap<String, ExternalDecoderFn>,

    /// The id handed to the most recently started object
    next_object_id: i64,
}

impl Default for Amf0Decoder {
    fn default() -> Self {
        Self::new(ClassRegistry::default())
    }
}

impl Amf0Decoder {
    /// A decoder with a fresh reference table resolving aliases through
    /// `registry`.
    pub fn new(registry: ClassRegistry) -> Self {
        Self {
            reference_table: Vec::new(),
            registry,
            external_decoders: HashMap::new(),
            next_object_id: 0,
        }
    }

    fn read_type_marker<'a>(&self, i: &'a [u8]) -> AmfResult<'a, TypeMarker> {
        let (i, marker) = be_u8(i)?;
        TypeMarker::try_from(marker)
            .map(|marker| (i, marker))
            .map_err(|_| Err::Error(DecodeError::UnsupportedType(marker)))
    }

    /// Parse the name/value pairs of an object body up to the end marker
    fn parse_object_body<'a>(&mut self, i: &'a [u8]) -> AmfResult<'a, Vec<Element>> {
        let mut elements = Vec::new();

        let mut i = i;
        loop {
            let (j, name) = parse_string(i)?;
            let (k, marker) = self.read_type_marker(j)?;
            if name.is_empty() && marker == TypeMarker::ObjectEnd {
                i = k;
                break;
            }

            let name = name.to_string();
            let (j, value) = self.parse_single_element(j)?;
            elements.push(Element::shared(name, value));
            i = j;
        }

        Ok((i, elements))
    }

    /// Claim a reference-table slot for an object whose body is about to be
    /// read, returning its id and slot index.
    fn claim_object_slot(&mut self) -> (ObjectId, usize) {
        self.next_object_id += 1;
        let id = ObjectId(self.next_object_id);
        let index = self.reference_table.len();
        self.reference_table
            .push(Rc::new(Value::Object(id, Vec::new(), None)));
        (id, index)
    }

    fn finish_object_slot<'a>(
        &mut self,
        index: usize,
        elements: Vec<Element>,
        class_def: Option<ClassDefinition>,
        i: &'a [u8],
    ) -> AmfResult<'a, Rc<Value>> {
        let slot = &mut self.reference_table[index];
        let inner = Rc::get_mut(slot).ok_or(Err::Error(DecodeError::CircularReference))?;
        if let Value::Object(_, members, def) = inner {
            *members = elements;
            *def = class_def;
        }
        Ok((i, Rc::clone(&self.reference_table[index])))
    }

    fn parse_element_object<'a>(&mut self, i: &'a [u8]) -> AmfResult<'a, Rc<Value>> {
        let (_, index) = self.claim_object_slot();
        let (i, elements) = self.parse_object_body(i)?;
        self.finish_object_slot(index, elements, None, i)
    }

    fn parse_element_typed_object<'a>(&mut self, i: &'a [u8]) -> AmfResult<'a, Rc<Value>> {
        let (i, alias) = parse_string(i)?;
        let name = self.registry.resolve_incoming(alias).to_string();

        let (_, index) = self.claim_object_slot();
        let (i, elements) = self.parse_object_body(i)?;
        // the member names double as the sealed member list, so the object
        // survives re-encoding as AMF3
        let class_def = ClassDefinition {
            name,
            attributes: enumset::EnumSet::empty(),
            static_properties: elements.iter().map(|e| e.name.clone()).collect(),
        };
        self.finish_object_slot(index, elements, Some(class_def), i)
    }

    fn parse_element_reference<'a>(&mut self, i: &'a [u8]) -> AmfResult<'a, Rc<Value>> {
        let (i, index) = be_u16(i)?;
        let entry = self
            .reference_table
            .get(index as usize)
            .ok_or(Err::Error(DecodeError::BadReference(index as u32)))?;

        let value = match &**entry {
            // A still-open or completed object round-trips as a reference node
            Value::Object(id, _, _) if id.is_valid() => Rc::new(Value::Reference(*id)),
            _ => Rc::clone(entry),
        };
        Ok((i, value))
    }

    fn parse_element_ecma_array<'a>(&mut self, i: &'a [u8]) -> AmfResult<'a, Rc<Value>> {
        let (i, length) = be_u32(i)?;

        let index = self.reference_table.len();
        self.reference_table.push(Rc::new(Value::Null));

        let (i, elements) = self.parse_object_body(i)?;

        let slot = &mut self.reference_table[index];
        *Rc::get_mut(slot).ok_or(Err::Error(DecodeError::CircularReference))? =
            Value::EcmaArray(Vec::new(), elements, length);
        Ok((i, Rc::clone(&self.reference_table[index])))
    }

    fn parse_element_strict_array<'a>(&mut self, i: &'a [u8]) -> AmfResult<'a, Rc<Value>> {
        let (i, length) = be_u32(i)?;
        let length_usize = length as usize;

        // Guards against OOM on crafted lengths
        if i.len() < length_usize {
            return Err(Err::Error(DecodeError::OutOfBounds));
        }

        let index = self.reference_table.len();
        self.reference_table.push(Rc::new(Value::Null));

        let (i, items) = many_m_n(length_usize, length_usize, |i| self.parse_single_element(i))(i)?;

        let slot = &mut self.reference_table[index];
        *Rc::get_mut(slot).ok_or(Err::Error(DecodeError::CircularReference))? =
            Value::StrictArray(items);
        Ok((i, Rc::clone(&self.reference_table[index])))
    }

    fn parse_element_date<'a>(&self, i: &'a [u8]) -> AmfResult<'a, Rc<Value>> {
        let (i, millis) = be_f64(i)?;
        let (i, time_zone) = be_u16(i)?;
        Ok((i, Rc::new(Value::Date(millis, Some(time_zone)))))
    }

    fn parse_element_avm_plus<'a>(&mut self, i: &'a [u8]) -> AmfResult<'a, Rc<Value>> {
        // From the escape marker to the end of the value everything is AMF3,
        // with fresh reference tables
        let mut amf3 = Amf3Decoder::new(self.registry.clone());
        amf3.external_decoders = self.external_decoders.clone();
        let (i, value) = amf3.parse_single_element(i)?;
        Ok((i, Rc::new(Value::Amf3(value))))
    }

    /// Parse a single AMF0 value from the input
    pub fn parse_single_element<'a>(&mut self, i: &'a [u8]) -> AmfResult<'a, Rc<Value>> {
        let (i, marker) = self.read_type_marker(i)?;

        match marker {
            TypeMarker::Number => {
                let (i, value) = be_f64(i)?;
                Ok((i, Rc::new(Value::Number(value))))
            }
            TypeMarker::Boolean => {
                let (i, value) = be_u8(i)?;
                Ok((i, Rc::new(Value::Bool(value > 0))))
            }
            TypeMarker::String => {
                let (i, value) = parse_string(i)?;
                Ok((i, Rc::new(Value::String(value.to_string()))))
            }
            TypeMarker::LongString => {
                let (i, value) = parse_long_string(i)?;
                Ok((i, Rc::new(Value::String(value.to_string()))))
            }
            TypeMarker::Object => self.parse_element_object(i),
            TypeMarker::TypedObject => self.parse_element_typed_object(i),
            TypeMarker::Null => Ok((i, Rc::new(Value::Null))),
            TypeMarker::Undefined => Ok((i, Rc::new(Value::Undefined))),
            TypeMarker::Reference => self.parse_element_reference(i),
            TypeMarker::EcmaArray => self.parse_element_ecma_array(i),
            TypeMarker::StrictArray => self.parse_element_strict_array(i),
            TypeMarker::Date => self.parse_element_date(i),
            TypeMarker::Xml => {
                let (i, content) = parse_long_string(i)?;
                Ok((i, Rc::new(Value::Xml(content.to_string(), true))))
            }
            TypeMarker::AvmPlus => self.parse_element_avm_plus(i),
            TypeMarker::MovieClip | TypeMarker::RecordSet | TypeMarker::Unsupported => {
                Err(Err::Error(DecodeError::UnsupportedType(marker as u8)))
            }
            TypeMarker::ObjectEnd => {
                Err(Err::Error(DecodeError::UnsupportedType(marker as u8)))
            }
        }
    }
}
