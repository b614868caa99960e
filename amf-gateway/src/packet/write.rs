//! Handles writing of AMF envelopes

use crate::amf0::write::Amf0Encoder;
use crate::errors::EncodeError;
use crate::packet::{Body, Header, Packet};
use crate::types::AmfVersion;

fn write_header(
    header: &Header,
    out: &mut Vec<u8>,
    encoder: &mut Amf0Encoder,
) -> Result<(), EncodeError> {
    let name_length = u16::try_from(header.name.len()).map_err(|_| EncodeError::PacketTooLarge)?;
    out.extend(name_length.to_be_bytes());
    out.extend(header.name.as_bytes());

    out.push(u8::from(header.must_understand));

    // Value lengths are declared unknown; computing them would need a
    // second buffering pass
    out.extend(u32::MAX.to_be_bytes());
    encoder.write_value(out, &header.value)?;

    Ok(())
}

fn write_body(body: &Body, out: &mut Vec<u8>, encoder: &mut Amf0Encoder) -> Result<(), EncodeError> {
    let target_length =
        u16::try_from(body.target_uri.len()).map_err(|_| EncodeError::PacketTooLarge)?;
    out.extend(target_length.to_be_bytes());
    out.extend(body.target_uri.as_bytes());

    let response_length =
        u16::try_from(body.response_uri.len()).map_err(|_| EncodeError::PacketTooLarge)?;
    out.extend(response_length.to_be_bytes());
    out.extend(body.response_uri.as_bytes());

    out.extend(u32::MAX.to_be_bytes());
    encoder.write_value(out, &body.value)?;

    Ok(())
}

/// Write an envelope to a vec of bytes.
///
/// The encoder carries the reference tables and alias registry for this one
/// envelope.
pub fn write_to_bytes(packet: &Packet, encoder: &mut Amf0Encoder) -> Result<Vec<u8>, EncodeError> {
    let mut buffer = vec![];

    match packet.version {
        AmfVersion::Amf0 => buffer.extend(0u16.to_be_bytes()),
        AmfVersion::Amf3 => buffer.extend(3u16.to_be_bytes()),
    }

    let header_count =
        u16::try_from(packet.headers.len()).map_err(|_| EncodeError::PacketTooLarge)?;
    buffer.extend(header_count.to_be_bytes());
    for header in &packet.headers {
        write_header(header, &mut buffer, encoder)?;
    }

    let body_count = u16::try_from(packet.bodies.len()).map_err(|_| EncodeError::PacketTooLarge)?;
    buffer.extend(body_count.to_be_bytes());
    for body in &packet.bodies {
        write_body(body, &mut buffer, encoder)?;
    }

    Ok(buffer)
}
