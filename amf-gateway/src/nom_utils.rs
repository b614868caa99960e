//! Shared parser and writer helpers.

use crate::errors::DecodeError;
use byteorder::{BigEndian, WriteBytesExt};
use nom::bytes::complete::take;
use nom::{Err, IResult};
use std::io::Write;

/// Result type shared by every decoder in the crate.
pub type AmfResult<'a, T> = IResult<&'a [u8], T, DecodeError<'a>>;

/// Take `length` bytes and validate them as UTF-8.
///
/// Works for multi-byte characters regardless of host locale; the only
/// failure modes are a short read and invalid UTF-8.
pub(crate) fn take_str(i: &[u8], length: u32) -> AmfResult<'_, &str> {
    let (i, bytes) = take(length)(i)?;
    let s = std::str::from_utf8(bytes).map_err(|_| Err::Error(DecodeError::InvalidUtf8))?;
    Ok((i, s))
}

/// Write a u16-length-prefixed UTF-8 string.
pub(crate) fn write_short_string<W: Write>(writer: &mut W, s: &str) -> std::io::Result<()> {
    writer.write_u16::<BigEndian>(s.len() as u16)?;
    writer.write_all(s.as_bytes())?;
    Ok(())
}

/// Write a u32-length-prefixed UTF-8 string.
pub(crate) fn write_long_string<W: Write>(writer: &mut W, s: &str) -> std::io::Result<()> {
    writer.write_u32::<BigEndian>(s.len() as u32)?;
    writer.write_all(s.as_bytes())?;
    Ok(())
}
