/// A packet-local identifier for a decoded object.
///
/// Back-references inside one value graph are expressed as
/// `Value::Reference(id)`; the encoder resolves them through its object
/// reference table.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ObjectId(pub i64);

impl ObjectId {
    /// An invalid object id.
    ///
    /// Used for objects built programmatically; multiple objects with an
    /// `INVALID` id may coexist, but such objects can never be the target of
    /// a `Value::Reference`.
    pub const INVALID: Self = ObjectId(-1);

    /// Whether this id can be the target of a reference.
    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }
}
