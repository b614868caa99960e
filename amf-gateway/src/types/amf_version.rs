use core::fmt;

/// The encoding variant used by a packet
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Eq, PartialEq, Debug, Copy, Clone)]
#[repr(u8)]
pub enum AmfVersion {
    /// AMF0
    Amf0 = 0,

    /// AMF3
    Amf3 = 3,
}

impl TryFrom<u8> for AmfVersion {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Amf0),
            3 => Ok(Self::Amf3),
            _ => Err(()),
        }
    }
}

impl fmt::Display for AmfVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmfVersion::Amf0 => f.write_str("AMF0"),
            AmfVersion::Amf3 => f.write_str("AMF3"),
        }
    }
}
