use super::Attribute;
use enumset::EnumSet;

/// A trait: the wire description of an object's class.
///
/// Two traits are equal iff the alias, both attribute flags and the ordered
/// sealed member names are all equal; the AMF3 trait reference table relies
/// on this.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ClassDefinition {
    /// The class alias; empty for anonymous objects
    pub name: String,

    /// The attributes of this trait
    pub attributes: EnumSet<Attribute>,

    /// The sealed member names, in declaration order
    pub static_properties: Vec<String>,
}

impl Default for ClassDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            attributes: EnumSet::only(Attribute::Dynamic),
            static_properties: Vec::new(),
        }
    }
}

impl ClassDefinition {
    /// A sealed trait with the given alias and no members.
    pub fn default_with_name(name: String) -> Self {
        Self {
            name,
            attributes: EnumSet::empty(),
            static_properties: Vec::new(),
        }
    }

    /// Whether objects of this trait may carry extra dynamic members.
    pub fn is_dynamic(&self) -> bool {
        self.attributes.contains(Attribute::Dynamic)
    }

    /// Whether this trait delegates its body encoding to user code.
    pub fn is_external(&self) -> bool {
        self.attributes.contains(Attribute::External)
    }
}
