//! Handles reading of AMF envelopes

use crate::amf0::read::Amf0Decoder;
use crate::amf0::read::parse_string;
use crate::errors::DecodeError;
use crate::messaging;
use crate::nom_utils::AmfResult;
use crate::packet::{Body, Header, Packet};
use crate::registry::ClassRegistry;
use crate::types::AmfVersion;
use nom::combinator::all_consuming;
use nom::multi::length_count;
use nom::number::complete::{be_u16, be_u32, be_u8};
use nom::Err;

/// The envelope version sent by some media servers; decoded as AMF0
const FMS_VERSION: u16 = 1;

/// Handles reading one request envelope.
///
/// All reference tables live inside and are shared by the headers and
/// bodies of that one envelope.
pub struct PacketDecoder {
    /// The value decoder; headers and bodies start in AMF0 and escape to
    /// AMF3 through the dedicated marker
    pub amf0: Amf0Decoder,
}

impl Default for PacketDecoder {
    fn default() -> Self {
        Self::new(ClassRegistry::default())
    }
}

impl PacketDecoder {
    /// A decoder resolving class aliases through `registry`.
    pub fn new(registry: ClassRegistry) -> Self {
        Self {
            amf0: Amf0Decoder::new(registry),
        }
    }

    fn parse_version<'a>(&self, i: &'a [u8]) -> AmfResult<'a, AmfVersion> {
        let (i, version) = be_u16(i)?;
        let version = match version {
            0 | FMS_VERSION => AmfVersion::Amf0,
            3 => AmfVersion::Amf3,
            unknown => return Err(Err::Error(DecodeError::UnsupportedVersion(unknown))),
        };
        Ok((i, version))
    }

    fn parse_header<'a>(&mut self, i: &'a [u8]) -> AmfResult<'a, Header> {
        let (i, name) = parse_string(i)?;
        let name = name.to_string();
        let (i, must_understand) = be_u8(i)?;
        // The length field is advisory and often -1
        let (i, _length) = be_u32(i)?;
        let (i, value) = self.amf0.parse_single_element(i)?;

        Ok((
            i,
            Header {
                name,
                must_understand: must_understand != 0,
                value,
            },
        ))
    }

    fn parse_body<'a>(&mut self, i: &'a [u8]) -> AmfResult<'a, Body> {
        let (i, target_uri) = parse_string(i)?;
        let target_uri = target_uri.to_string();
        let (i, response_uri) = parse_string(i)?;
        let response_uri = response_uri.to_string();
        let (i, _length) = be_u32(i)?;
        let (i, value) = self.amf0.parse_single_element(i)?;

        // An AMF3 call arrives as a one-element array holding the message
        let value = messaging::unwrap_body(&value).unwrap_or(value);

        Ok((
            i,
            Body {
                target_uri,
                response_uri,
                value,
            },
        ))
    }

    /// Read a given buffer as an envelope.
    ///
    /// Unlike [`parse`](Self::parse), this does not error when the slice
    /// has bytes left over, and returns the remainder.
    pub fn parse_incomplete<'a>(&mut self, i: &'a [u8]) -> AmfResult<'a, Packet> {
        let (i, version) = self.parse_version(i)?;
        let (i, headers) = length_count(be_u16, |i| self.parse_header(i))(i)?;
        let (i, bodies) = length_count(be_u16, |i| self.parse_body(i))(i)?;

        Ok((
            i,
            Packet {
                version,
                headers,
                bodies,
            },
        ))
    }

    /// Read a given slice as an envelope, requiring the entire slice to be
    /// consumed.
    pub fn parse<'a>(&mut self, i: &'a [u8]) -> Result<Packet, Err<DecodeError<'a>>> {
        let (_, packet) = all_consuming(|i| self.parse_incomplete(i))(i)?;
        Ok(packet)
    }
}
