use crate::errors::AclError;
use std::collections::HashMap;

/// The role DAG.
///
/// Each role keeps its parents in registration order; the last-added parent
/// has the highest priority during rule search.
#[derive(Debug, Default, Clone)]
pub struct RoleRegistry {
    parents: HashMap<String, Vec<String>>,
}

impl RoleRegistry {
    /// Register a role under its parents.
    ///
    /// Every parent must already be registered.
    pub fn add(&mut self, id: &str, parents: &[&str]) -> Result<(), AclError> {
        if self.parents.contains_key(id) {
            return Err(AclError::DuplicateRole(id.to_string()));
        }
        for parent in parents {
            if !self.parents.contains_key(*parent) {
                return Err(AclError::UnknownRole((*parent).to_string()));
            }
        }
        self.parents.insert(
            id.to_string(),
            parents.iter().map(|p| (*p).to_string()).collect(),
        );
        Ok(())
    }

    /// Whether a role is registered.
    pub fn has(&self, id: &str) -> bool {
        self.parents.contains_key(id)
    }

    /// The parents of a role, in registration order.
    pub fn parents(&self, id: &str) -> Option<&[String]> {
        self.parents.get(id).map(Vec::as_slice)
    }
}
