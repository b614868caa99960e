use amf_gateway::amf0::read::Amf0Decoder;
use amf_gateway::amf0::write::Amf0Encoder;
use amf_gateway::amf3::read::Amf3Decoder;
use amf_gateway::amf3::write::Amf3Encoder;
use amf_gateway::errors::DecodeError;
use amf_gateway::packet::read::PacketDecoder;
use amf_gateway::packet::write::write_to_bytes;
use amf_gateway::packet::{Body, Packet};
use amf_gateway::types::{AmfVersion, ClassDefinition, Element, ObjectId, Value};
use core::fmt;
use std::rc::Rc;

/// Wrapper around Vec<u8> that makes `{:#?}` the same as `{:?}` so byte
/// diffs in failed asserts stay on one line.
#[derive(PartialEq, Eq)]
pub struct PrettyArray<'a>(pub &'a Vec<u8>);

impl<'a> fmt::Debug for PrettyArray<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&format!("{:?}", self.0))
    }
}

fn amf3_encode(value: &Rc<Value>) -> Vec<u8> {
    let mut out = vec![];
    Amf3Encoder::default()
        .write_value_element(&mut out, value)
        .expect("encode should succeed");
    out
}

fn amf3_decode(bytes: &[u8]) -> Rc<Value> {
    let (rest, value) = Amf3Decoder::default()
        .parse_single_element(bytes)
        .expect("decode should succeed");
    assert!(rest.is_empty(), "undecoded bytes left over");
    value
}

/// Byte-level round trip: decoding and re-encoding must reproduce the
/// input exactly.
fn assert_amf3_stable(bytes: &[u8]) {
    let value = amf3_decode(bytes);
    let again = amf3_encode(&value);
    assert_eq!(PrettyArray(&again), PrettyArray(&bytes.to_vec()));
}

fn contact(name: &str, email: &str) -> Rc<Value> {
    Rc::new(Value::Object(
        ObjectId::INVALID,
        vec![Element::new("name", name), Element::new("email", email)],
        Some(ClassDefinition {
            name: "ContactElt".to_string(),
            attributes: Default::default(),
            static_properties: vec!["name".to_string(), "email".to_string()],
        }),
    ))
}

#[test]
fn amf3_typed_vector_golden_bytes() {
    let vector = Rc::new(Value::VectorObject(
        vec![contact("a", "b"), contact("c", "d"), contact("e", "f")],
        "ContactElt".to_string(),
        false,
    ));

    let out = amf3_encode(&vector);

    let mut expected: Vec<u8> = vec![
        0x10, // vector<object> marker
        0x07, // 3 elements, inline
        0x00, // variable length
        0x15, // type name, 10 bytes inline
    ];
    expected.extend(b"ContactElt");
    // first element carries the full trait
    expected.extend([0x0A, 0x23, 0x00]); // object, 2 sealed members, alias by reference
    expected.extend([0x09]);
    expected.extend(b"name");
    expected.extend([0x0B]);
    expected.extend(b"email");
    expected.extend([0x06, 0x03, b'a', 0x06, 0x03, b'b']);
    // later elements reference the trait
    expected.extend([0x0A, 0x01, 0x06, 0x03, b'c', 0x06, 0x03, b'd']);
    expected.extend([0x0A, 0x01, 0x06, 0x03, b'e', 0x06, 0x03, b'f']);

    assert_eq!(PrettyArray(&out), PrettyArray(&expected));
    assert_amf3_stable(&out);
}

#[test]
fn amf3_repeated_handle_becomes_a_reference() {
    let bytes = Rc::new(Value::ByteArray(vec![1, 2, 3]));
    let array = Rc::new(Value::StrictArray(vec![Rc::clone(&bytes), Rc::clone(&bytes)]));

    let out = amf3_encode(&array);

    let expected = vec![
        0x09, 0x05, 0x01, // array, 2 dense, no associative part
        0x0C, 0x07, 1, 2, 3, // inline byte array
        0x0C, 0x02, // reference to table slot 1
    ];
    assert_eq!(PrettyArray(&out), PrettyArray(&expected));

    // both decoded positions share one allocation
    let decoded = amf3_decode(&out);
    if let Value::StrictArray(items) = &*decoded {
        assert!(Rc::ptr_eq(&items[0], &items[1]));
    } else {
        panic!("expected an array");
    }
}

#[test]
fn amf3_distinct_equal_values_stay_inline() {
    let array = Rc::new(Value::StrictArray(vec![
        Rc::new(Value::ByteArray(vec![9])),
        Rc::new(Value::ByteArray(vec![9])),
    ]));

    let out = amf3_encode(&array);
    // two inline byte arrays, no reference markers
    assert_eq!(out.iter().filter(|b| **b == 0x0C).count(), 2);
    assert!(out.ends_with(&[0x0C, 0x03, 9]));
}

#[test]
fn amf3_cyclic_object_terminates_and_round_trips() {
    // { self: <itself> } as a dynamic anonymous object
    let mut bytes: Vec<u8> = vec![
        0x0A, 0x0B, // object, inline trait, dynamic, 0 sealed
        0x01, // empty alias
        0x09, // member name, 4 bytes
    ];
    bytes.extend(b"self");
    bytes.extend([0x0A, 0x00]); // reference back to slot 0
    bytes.push(0x01); // end of dynamic members

    let value = amf3_decode(&bytes);
    let inner = value.field("self").expect("member should exist");
    match (&*value, &**inner) {
        (Value::Object(id, _, _), Value::Reference(target)) => assert_eq!(id, target),
        other => panic!("unexpected decode: {other:?}"),
    }

    assert_amf3_stable(&bytes);
}

#[test]
fn amf3_empty_string_is_never_interned() {
    let array = Rc::new(Value::StrictArray(vec![
        Rc::new(Value::String(String::new())),
        Rc::new(Value::String("x".to_string())),
        Rc::new(Value::String(String::new())),
        Rc::new(Value::String("x".to_string())),
    ]));

    let out = amf3_encode(&array);

    let expected = vec![
        0x09, 0x09, 0x01, // array, 4 dense
        0x06, 0x01, // "" inline
        0x06, 0x03, b'x', // "x" inline, interned
        0x06, 0x01, // "" inline again, not a reference
        0x06, 0x00, // "x" by reference
    ];
    assert_eq!(PrettyArray(&out), PrettyArray(&expected));
}

#[test]
fn amf3_out_of_range_integers_widen_to_doubles() {
    // 0x20000000 overflows i29 and must be written through the double
    // marker
    let out = amf3_encode(&Rc::new(Value::Integer(0x2000_0000)));
    let mut expected = vec![0x05];
    expected.extend(536_870_912.0f64.to_be_bytes());
    assert_eq!(out, expected);

    let in_range = amf3_encode(&Rc::new(Value::Integer(0x0FFF_FFFF)));
    assert_eq!(in_range, vec![0x04, 0xBF, 0xFF, 0xFF, 0xFF]);
}

#[test]
fn amf3_scalar_round_trips() {
    for value in [
        Rc::new(Value::Null),
        Rc::new(Value::Undefined),
        Rc::new(Value::Bool(true)),
        Rc::new(Value::Bool(false)),
        Rc::new(Value::Integer(-1)),
        Rc::new(Value::Number(2.5)),
        Rc::new(Value::String("héllo".to_string())),
        Rc::new(Value::Date(1_234_567_890_123.0, None)),
        Rc::new(Value::ByteArray(vec![0, 255, 1])),
        Rc::new(Value::VectorInt(vec![-1, 0, 1], true)),
        Rc::new(Value::VectorUInt(vec![0, u32::MAX], false)),
        Rc::new(Value::VectorDouble(vec![0.5, -0.5], false)),
        Rc::new(Value::Xml("<a/>".to_string(), true)),
    ] {
        let encoded = amf3_encode(&value);
        assert_eq!(amf3_decode(&encoded), value, "round trip of {value:?}");
    }
}

#[test]
fn amf3_nan_round_trips() {
    let encoded = amf3_encode(&Rc::new(Value::Number(f64::NAN)));
    if let Value::Number(n) = &*amf3_decode(&encoded) {
        assert!(n.is_nan());
    } else {
        panic!("expected a number");
    }
}

#[test]
fn amf3_dictionary_round_trips() {
    let dict = Rc::new(Value::Dictionary(
        vec![
            (
                Rc::new(Value::String("k".to_string())),
                Rc::new(Value::Integer(1)),
            ),
            (Rc::new(Value::Bool(true)), Rc::new(Value::Null)),
        ],
        true,
    ));

    let encoded = amf3_encode(&dict);
    assert_eq!(amf3_decode(&encoded), dict);
}

#[test]
fn amf3_typed_object_aliases_resolve_through_the_registry() {
    let mut registry = amf_gateway::registry::ClassRegistry::new();
    registry.set_mapping("com.example.ContactElt", "ContactElt");

    let mut out = vec![];
    Amf3Encoder::new(registry.clone())
        .write_value_element(&mut out, &contact("a", "b"))
        .unwrap();

    // the wire carries the mapped alias
    let rendered = String::from_utf8_lossy(&out);
    assert!(rendered.contains("com.example.ContactElt"));

    // and decoding maps it back to the server name
    let (_, decoded) = Amf3Decoder::new(registry)
        .parse_single_element(&out)
        .unwrap();
    assert_eq!(decoded.class_name(), Some("ContactElt"));
}

#[test]
fn amf0_long_strings_switch_markers() {
    let mut encoder = Amf0Encoder::default();
    let long = "a".repeat(65_536);
    let mut out = vec![];
    encoder
        .write_value(&mut out, &Rc::new(Value::String(long)))
        .unwrap();

    assert_eq!(out[0], 0x0C);
    assert_eq!(&out[1..5], &65_536u32.to_be_bytes());
}

#[test]
fn amf0_repeated_object_becomes_a_reference() {
    let object = Rc::new(Value::object(vec![Element::new("a", 1.0)]));
    let array = Rc::new(Value::StrictArray(vec![
        Rc::clone(&object),
        Rc::clone(&object),
    ]));

    let mut out = vec![];
    Amf0Encoder::default().write_value(&mut out, &array).unwrap();

    // the second occurrence is a u16 reference to table slot 1
    assert!(out.ends_with(&[0x07, 0x00, 0x01]));

    // decoding and re-encoding reproduces the bytes
    let mut decoder = Amf0Decoder::default();
    let (rest, decoded) = decoder.parse_single_element(&out).unwrap();
    assert!(rest.is_empty());
    let mut again = vec![];
    Amf0Encoder::default().write_value(&mut again, &decoded).unwrap();
    assert_eq!(PrettyArray(&again), PrettyArray(&out));
}

#[test]
fn amf0_ecma_array_tie_breaks() {
    // contiguous numeric keys collapse to a strict array
    let dense_keyed = Rc::new(Value::EcmaArray(
        vec![],
        vec![Element::new("0", 1.0), Element::new("1", 2.0)],
        2,
    ));
    let mut out = vec![];
    Amf0Encoder::default().write_value(&mut out, &dense_keyed).unwrap();
    assert_eq!(out[0], 0x0A);
    assert_eq!(&out[1..5], &2u32.to_be_bytes());

    // a non-numeric key degrades to an object
    let mixed = Rc::new(Value::EcmaArray(
        vec![],
        vec![Element::new("0", 1.0), Element::new("name", 2.0)],
        2,
    ));
    let mut out = vec![];
    Amf0Encoder::default().write_value(&mut out, &mixed).unwrap();
    assert_eq!(out[0], 0x03);

    // sparse numeric keys stay an ECMA array
    let sparse = Rc::new(Value::EcmaArray(
        vec![],
        vec![Element::new("0", 1.0), Element::new("2", 2.0)],
        2,
    ));
    let mut out = vec![];
    Amf0Encoder::default().write_value(&mut out, &sparse).unwrap();
    assert_eq!(out[0], 0x08);
}

#[test]
fn amf0_escapes_to_amf3_for_new_types() {
    let byte_array = Rc::new(Value::ByteArray(vec![1, 2]));
    let mut out = vec![];
    Amf0Encoder::default().write_value(&mut out, &byte_array).unwrap();

    assert_eq!(out, vec![0x11, 0x0C, 0x05, 1, 2]);

    let mut decoder = Amf0Decoder::default();
    let (_, decoded) = decoder.parse_single_element(&out).unwrap();
    match &*decoded {
        Value::Amf3(inner) => assert_eq!(**inner, Value::ByteArray(vec![1, 2])),
        other => panic!("unexpected decode: {other:?}"),
    }
}

#[test]
fn amf0_date_round_trips() {
    let date = Rc::new(Value::Date(86_400_000.0, Some(0)));
    let mut out = vec![];
    Amf0Encoder::default().write_value(&mut out, &date).unwrap();

    let mut decoder = Amf0Decoder::default();
    let (_, decoded) = decoder.parse_single_element(&out).unwrap();
    assert_eq!(decoded, date);
}

#[test]
fn envelope_framing_is_exact() {
    let packet = Packet {
        version: AmfVersion::Amf0,
        headers: vec![],
        bodies: vec![Body {
            target_uri: "a".to_string(),
            response_uri: "/1".to_string(),
            value: Rc::new(Value::Null),
        }],
    };

    let bytes = write_to_bytes(&packet, &mut Amf0Encoder::default()).unwrap();

    let mut expected: Vec<u8> = vec![];
    expected.extend(0u16.to_be_bytes()); // version
    expected.extend(0u16.to_be_bytes()); // header count
    expected.extend(1u16.to_be_bytes()); // body count
    expected.extend(1u16.to_be_bytes());
    expected.extend(b"a");
    expected.extend(2u16.to_be_bytes());
    expected.extend(b"/1");
    expected.extend(u32::MAX.to_be_bytes()); // unknown length
    expected.push(0x05); // null
    assert_eq!(PrettyArray(&bytes), PrettyArray(&expected));

    // 2 + 2 + 2 framing bytes plus the body bytes
    assert_eq!(bytes.len(), 6 + (2 + 1) + (2 + 2) + 4 + 1);
}

#[test]
fn envelope_round_trips() {
    let packet = Packet {
        version: AmfVersion::Amf0,
        headers: vec![],
        bodies: vec![Body {
            target_uri: "Svc.echo".to_string(),
            response_uri: "/1".to_string(),
            value: Rc::new(Value::StrictArray(vec![Rc::new(Value::Number(7.0))])),
        }],
    };

    let bytes = write_to_bytes(&packet, &mut Amf0Encoder::default()).unwrap();
    let parsed = PacketDecoder::default().parse(&bytes).unwrap();

    assert_eq!(parsed.version, AmfVersion::Amf0);
    assert_eq!(parsed.bodies.len(), 1);
    assert_eq!(parsed.bodies[0].target_uri, "Svc.echo");
    assert_eq!(parsed.bodies[0].response_uri, "/1");
}

#[test]
fn envelope_accepts_the_media_server_version() {
    // version 1 decodes as AMF0
    let bytes: Vec<u8> = vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
    let parsed = PacketDecoder::default().parse(&bytes).unwrap();
    assert_eq!(parsed.version, AmfVersion::Amf0);
}

#[test]
fn envelope_rejects_unknown_versions() {
    let bytes: Vec<u8> = vec![0x00, 0x05, 0x00, 0x00, 0x00, 0x00];
    let err = PacketDecoder::default().parse(&bytes).unwrap_err();
    match err {
        nom::Err::Error(DecodeError::UnsupportedVersion(5)) => {}
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn envelope_unwraps_message_bodies() {
    let message = Rc::new(Value::typed_object(
        "RemotingMessage",
        vec![
            Element::new("operation", "echo"),
            Element::new("source", "Svc"),
            Element::new("messageId", "m-1"),
        ],
    ));
    let packet = Packet {
        version: AmfVersion::Amf3,
        headers: vec![],
        bodies: vec![Body {
            target_uri: "null".to_string(),
            response_uri: "/2".to_string(),
            value: Rc::new(Value::Amf3(Rc::new(Value::StrictArray(vec![message])))),
        }],
    };

    let bytes = write_to_bytes(&packet, &mut Amf0Encoder::default()).unwrap();
    let parsed = PacketDecoder::default().parse(&bytes).unwrap();

    let body = &parsed.bodies[0];
    assert_eq!(body.value.class_name(), Some("RemotingMessage"));
    assert_eq!(
        body.value.field("operation").and_then(|v| v.as_str()),
        Some("echo")
    );
}
