//! The dispatch table: qualified method names to invocables.

mod cast;
mod invocable;

pub use cast::cast_arguments;
pub use invocable::{Handler, Invocable, Param};

use crate::errors::DispatchError;
use std::collections::HashMap;
use tracing::debug;

/// A reflected service class: a name and its callable methods.
pub struct ServiceDefinition {
    /// The service (class) name; becomes the leading segment of each
    /// method's qualified name
    pub name: String,

    /// The callable methods of the service
    pub methods: Vec<Invocable>,
}

/// Loads a service definition by class name on a dispatch miss.
///
/// The seam to a service directory; the gateway consults it once per
/// unresolved source class and registers whatever it returns.
pub trait ServiceLoader {
    /// Look up a service class by name.
    fn load(&self, class_name: &str) -> Option<ServiceDefinition>;
}

/// The table of registered methods, keyed by qualified name.
///
/// Registration happens before serving; dispatch only reads.
#[derive(Debug, Default)]
pub struct DispatchTable {
    methods: HashMap<String, Invocable>,
}

impl DispatchTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, qualified_name: String, invocable: Invocable) -> Result<(), DispatchError> {
        if self.methods.contains_key(&qualified_name) {
            return Err(DispatchError::DuplicateMethod(qualified_name));
        }
        debug!(method = %qualified_name, "registered");
        self.methods.insert(qualified_name, invocable);
        Ok(())
    }

    /// Register a free function, optionally under a namespace.
    pub fn register_function(
        &mut self,
        namespace: Option<&str>,
        invocable: Invocable,
    ) -> Result<(), DispatchError> {
        let qualified_name = qualify(namespace, invocable.name());
        self.insert(qualified_name, invocable)
    }

    /// Register every method of a service, optionally under a namespace.
    ///
    /// A method `m` of service `Svc` becomes `Svc.m`, or `ns.Svc.m` under
    /// namespace `ns`.
    pub fn register_service(
        &mut self,
        namespace: Option<&str>,
        service: ServiceDefinition,
    ) -> Result<(), DispatchError> {
        let prefix = qualify(namespace, &service.name);
        for method in service.methods {
            let qualified_name = format!("{prefix}.{}", method.name());
            self.insert(qualified_name, method)?;
        }
        Ok(())
    }

    /// Look up a method by qualified name.
    pub fn lookup(&self, qualified_name: &str) -> Option<&Invocable> {
        self.methods.get(qualified_name)
    }
}

fn qualify(namespace: Option<&str>, short_name: &str) -> String {
    match namespace {
        Some(namespace) if !namespace.is_empty() => format!("{namespace}.{short_name}"),
        _ => short_name.to_string(),
    }
}
