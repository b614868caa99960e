//! Write-side reference caches.
//!
//! The object cache searches by `Rc` pointer identity, never by value
//! equality, so distinct-but-equal values each get their own inline
//! encoding while a re-sent handle becomes a reference. Reference nodes
//! produced by the decoder are resolved through the id index.

use crate::types::{ObjectId, Value};
use std::collections::HashMap;
use std::rc::Rc;

/// Cache for interned byte strings (value equality).
#[derive(Debug, Default)]
pub(crate) struct StringCache {
    entries: Vec<Vec<u8>>,
}

impl StringCache {
    pub(crate) fn get_index(&self, bytes: &[u8]) -> Option<usize> {
        self.entries.iter().position(|e| e == bytes)
    }

    /// Intern `bytes` unless already present.
    pub(crate) fn store(&mut self, bytes: &[u8]) {
        if self.get_index(bytes).is_none() {
            self.entries.push(bytes.to_vec());
        }
    }
}

/// Cache for every referencable value (identity equality).
#[derive(Debug, Default)]
pub(crate) struct ObjectCache {
    entries: Vec<Rc<Value>>,
    by_id: HashMap<ObjectId, usize>,
}

impl ObjectCache {
    pub(crate) fn get_index(&self, value: &Rc<Value>) -> Option<usize> {
        self.entries.iter().position(|e| Rc::ptr_eq(e, value))
    }

    pub(crate) fn get_id_index(&self, id: ObjectId) -> Option<usize> {
        self.by_id.get(&id).copied()
    }

    /// Record `value` as the next table entry, indexing its id when valid.
    pub(crate) fn store(&mut self, value: &Rc<Value>, id: ObjectId) {
        if id.is_valid() {
            self.by_id.insert(id, self.entries.len());
        }
        self.entries.push(Rc::clone(value));
    }
}
