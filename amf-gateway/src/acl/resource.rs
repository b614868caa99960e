use crate::errors::AclError;
use std::collections::HashMap;

/// The resource tree.
///
/// Each resource has at most one parent; the implicit all-resources node
/// roots the tree and is represented by `None` in queries.
#[derive(Debug, Default, Clone)]
pub struct ResourceRegistry {
    parents: HashMap<String, Option<String>>,
}

impl ResourceRegistry {
    /// Register a resource under an optional parent.
    pub fn add(&mut self, id: &str, parent: Option<&str>) -> Result<(), AclError> {
        if self.parents.contains_key(id) {
            return Err(AclError::DuplicateResource(id.to_string()));
        }
        if let Some(parent) = parent {
            if !self.parents.contains_key(parent) {
                return Err(AclError::UnknownResource(parent.to_string()));
            }
        }
        self.parents
            .insert(id.to_string(), parent.map(str::to_string));
        Ok(())
    }

    /// Whether a resource is registered.
    pub fn has(&self, id: &str) -> bool {
        self.parents.contains_key(id)
    }

    /// The parent of a resource; `Some(None)` for a root resource, `None`
    /// for an unknown one.
    pub fn parent_of(&self, id: &str) -> Option<Option<&str>> {
        self.parents.get(id).map(|p| p.as_deref())
    }
}
