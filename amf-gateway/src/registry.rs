//! Bidirectional mapping between wire class aliases and server class ids.
//!
//! The decoder resolves incoming aliases to server names; the encoder
//! resolves server names back to wire aliases. Both directions fall back to
//! the name as sent when no mapping exists.

use crate::messaging;
use std::collections::HashMap;

/// The class-alias registry.
///
/// Process-wide sharing is deliberately not built in: every codec instance
/// receives its own (cheaply cloned) copy, so concurrent engines never
/// contend on it.
#[derive(Debug, Clone)]
pub struct ClassRegistry {
    to_server: HashMap<String, String>,
    to_wire: HashMap<String, String>,
}

impl Default for ClassRegistry {
    fn default() -> Self {
        let mut registry = Self {
            to_server: HashMap::new(),
            to_wire: HashMap::new(),
        };
        registry.load_builtins();
        registry
    }
}

impl ClassRegistry {
    /// A registry preloaded with the built-in message aliases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a wire alias to a server class id (and back).
    pub fn set_mapping(&mut self, wire_alias: impl Into<String>, server_class: impl Into<String>) {
        let wire_alias = wire_alias.into();
        let server_class = server_class.into();
        self.to_server
            .insert(wire_alias.clone(), server_class.clone());
        self.to_wire.insert(server_class, wire_alias);
    }

    /// Resolve a name in either direction.
    ///
    /// Returns `None` when the name is unmapped.
    pub fn get_mapped_class_name(&self, name: &str) -> Option<&str> {
        self.to_server
            .get(name)
            .or_else(|| self.to_wire.get(name))
            .map(String::as_str)
    }

    /// Resolve a wire alias to a server class id, keeping unknown aliases.
    pub(crate) fn resolve_incoming<'a>(&'a self, alias: &'a str) -> &'a str {
        self.to_server.get(alias).map(String::as_str).unwrap_or(alias)
    }

    /// Resolve a server class id to a wire alias, keeping unmapped names.
    pub(crate) fn resolve_outgoing<'a>(&'a self, server_class: &'a str) -> &'a str {
        self.to_wire
            .get(server_class)
            .map(String::as_str)
            .unwrap_or(server_class)
    }

    /// Drop all mappings and reload the built-ins.
    pub fn reset_map(&mut self) {
        self.to_server.clear();
        self.to_wire.clear();
        self.load_builtins();
    }

    fn load_builtins(&mut self) {
        for (alias, server) in [
            (messaging::REMOTING_MESSAGE, "RemotingMessage"),
            (messaging::COMMAND_MESSAGE, "CommandMessage"),
            (messaging::ACKNOWLEDGE_MESSAGE, "AcknowledgeMessage"),
            (messaging::ERROR_MESSAGE, "ErrorMessage"),
            (messaging::ASYNC_MESSAGE, "AsyncMessage"),
        ] {
            self.set_mapping(alias, server);
        }
    }
}
