/// Type markers used in AMF0
#[derive(Eq, PartialEq, Debug, Copy, Clone)]
#[repr(u8)]
pub(crate) enum TypeMarker {
    /// Number
    Number = 0,

    /// Boolean
    Boolean = 1,

    /// String
    String = 2,

    /// Object start
    Object = 3,

    /// MovieClip (reserved, unsupported)
    MovieClip = 4,

    /// Null
    Null = 5,

    /// Undefined
    Undefined = 6,

    /// Reference into the object table
    Reference = 7,

    /// Start of an ECMA array
    EcmaArray = 8,

    /// Object end
    ObjectEnd = 9,

    /// Strict array start
    StrictArray = 10,

    /// Date with timezone
    Date = 11,

    /// Long string (UTF-8 length > 65535)
    LongString = 12,

    /// Unsupported
    Unsupported = 13,

    /// Recordset (reserved, unsupported)
    RecordSet = 14,

    /// XML document
    Xml = 15,

    /// Typed object start
    TypedObject = 16,

    /// Escape into AMF3 for the rest of the value
    AvmPlus = 17,
}

impl TryFrom<u8> for TypeMarker {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Number),
            1 => Ok(Self::Boolean),
            2 => Ok(Self::String),
            3 => Ok(Self::Object),
            4 => Ok(Self::MovieClip),
            5 => Ok(Self::Null),
            6 => Ok(Self::Undefined),
            7 => Ok(Self::Reference),
            8 => Ok(Self::EcmaArray),
            9 => Ok(Self::ObjectEnd),
            10 => Ok(Self::StrictArray),
            11 => Ok(Self::Date),
            12 => Ok(Self::LongString),
            13 => Ok(Self::Unsupported),
            14 => Ok(Self::RecordSet),
            15 => Ok(Self::Xml),
            16 => Ok(Self::TypedObject),
            17 => Ok(Self::AvmPlus),
            _ => Err(()),
        }
    }
}
