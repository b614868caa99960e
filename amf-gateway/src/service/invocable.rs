use crate::errors::Fault;
use crate::types::Value;
use std::fmt;
use std::rc::Rc;

/// The invocation thunk of a dispatchable method.
pub type Handler = Box<dyn Fn(&[Rc<Value>]) -> Result<Rc<Value>, Fault>>;

/// One declared parameter of a method prototype.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Param {
    /// The parameter name
    pub name: String,

    /// The declared type, when the reflection layer knows one.
    ///
    /// A trailing `[]` declares a sequence of the element type.
    pub type_name: Option<String>,
}

impl Param {
    /// A parameter with a declared type.
    pub fn typed(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: Some(type_name.into()),
        }
    }

    /// A parameter with no declared type.
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: None,
        }
    }
}

/// A callable consumed from the reflection layer: a name, the declared
/// parameter prototypes, optional fixed arguments and the invocation thunk.
pub struct Invocable {
    pub(crate) name: String,
    pub(crate) prototypes: Vec<Vec<Param>>,
    pub(crate) fixed_args: Vec<Rc<Value>>,
    handler: Handler,
}

impl Invocable {
    /// Wrap a handler under `name` with the given parameter prototypes.
    pub fn new(
        name: impl Into<String>,
        prototypes: Vec<Vec<Param>>,
        handler: impl Fn(&[Rc<Value>]) -> Result<Rc<Value>, Fault> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            prototypes,
            fixed_args: Vec::new(),
            handler: Box::new(handler),
        }
    }

    /// Arguments appended to every call after the caller's own.
    pub fn with_fixed_args(mut self, fixed_args: Vec<Rc<Value>>) -> Self {
        self.fixed_args = fixed_args;
        self
    }

    /// The short name this callable was declared under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the thunk.
    pub fn invoke(&self, args: &[Rc<Value>]) -> Result<Rc<Value>, Fault> {
        (self.handler)(args)
    }
}

impl fmt::Debug for Invocable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocable")
            .field("name", &self.name)
            .field("prototypes", &self.prototypes)
            .field("fixed_args", &self.fixed_args.len())
            .finish()
    }
}
