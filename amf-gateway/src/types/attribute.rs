use enumset::{EnumSet, EnumSetType};

/// The possible attributes of a trait.
///
/// On the wire the attributes occupy a two-bit field in the AMF3 trait
/// header; this type owns that bit layout so the codecs never hard-code
/// it.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(EnumSetType, Debug)]
pub enum Attribute {
    /// A dynamic trait allows properties beyond the sealed member list
    Dynamic,

    /// An external trait delegates its body encoding to user code
    External,
}

impl Attribute {
    /// The bit this attribute occupies in the trait-header encoding field.
    fn flag(self) -> u8 {
        match self {
            Attribute::External => 0b01,
            Attribute::Dynamic => 0b10,
        }
    }

    /// Decode the trait-header encoding field into an attribute set.
    pub(crate) fn set_from_encoding(encoding: u8) -> EnumSet<Attribute> {
        let mut attributes = EnumSet::empty();
        for attribute in [Attribute::External, Attribute::Dynamic] {
            if encoding & attribute.flag() != 0 {
                attributes |= attribute;
            }
        }
        attributes
    }

    /// Encode an attribute set into the trait-header encoding field.
    pub(crate) fn encoding_bits(attributes: EnumSet<Attribute>) -> u8 {
        attributes.iter().fold(0, |bits, attribute| bits | attribute.flag())
    }
}
