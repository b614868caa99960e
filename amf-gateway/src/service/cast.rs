//! Coercion of deserialized records into declared parameter types.

use super::invocable::Param;
use crate::types::{ClassDefinition, Element, ObjectId, Value};
use std::rc::Rc;

/// Declared types that never trigger a cast, compared case-insensitively.
const PASSTHROUGH_TYPES: [&str; 15] = [
    "null",
    "mixed",
    "void",
    "unknown",
    "bool",
    "boolean",
    "number",
    "int",
    "integer",
    "double",
    "float",
    "string",
    "array",
    "object",
    "anonymous-record",
];

fn is_passthrough(type_name: &str) -> bool {
    PASSTHROUGH_TYPES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(type_name))
}

/// The declared type for each argument position, merged across prototypes.
///
/// The first prototype declaring a castable type at a position wins.
fn declared_types(prototypes: &[Vec<Param>], arg_count: usize) -> Vec<Option<String>> {
    let mut types: Vec<Option<String>> = vec![None; arg_count];
    for prototype in prototypes {
        for (position, param) in prototype.iter().enumerate().take(arg_count) {
            if types[position].is_some() {
                continue;
            }
            if let Some(type_name) = &param.type_name {
                if !is_passthrough(type_name) {
                    types[position] = Some(type_name.clone());
                }
            }
        }
    }
    types
}

/// Rebuild a record under the target class, copying members by name.
fn cast_value(value: &Rc<Value>, type_name: &str) -> Rc<Value> {
    // A sequence type casts each element
    if let Some(element_type) = type_name.strip_suffix("[]") {
        return match &**value {
            Value::StrictArray(items) => Rc::new(Value::StrictArray(
                items.iter().map(|item| cast_value(item, element_type)).collect(),
            )),
            Value::EcmaArray(dense, _, _) => Rc::new(Value::StrictArray(
                dense.iter().map(|item| cast_value(item, element_type)).collect(),
            )),
            _ => Rc::clone(value),
        };
    }

    match &**value {
        // Already an instance of the target
        Value::Object(_, _, Some(def)) if def.name == type_name => Rc::clone(value),
        // Any other record is rebuilt member by member
        Value::Object(_, elements, _) => Rc::new(Value::Object(
            ObjectId::INVALID,
            elements.clone(),
            Some(instance_definition(type_name, elements)),
        )),
        Value::EcmaArray(_, assoc, _) => {
            let members: Vec<Element> = assoc
                .iter()
                .map(|e| Element::shared(e.name.clone(), Rc::clone(&e.value)))
                .collect();
            let def = instance_definition(type_name, &members);
            Rc::new(Value::Object(ObjectId::INVALID, members, Some(def)))
        }
        Value::Null | Value::Undefined => Rc::clone(value),
        // A scalar cannot become a class instance
        _ => Rc::new(Value::Null),
    }
}

/// A sealed trait for a rebuilt instance, its members taken from the record.
fn instance_definition(type_name: &str, members: &[Element]) -> ClassDefinition {
    ClassDefinition {
        name: type_name.to_string(),
        attributes: enumset::EnumSet::empty(),
        static_properties: members.iter().map(|e| e.name.clone()).collect(),
    }
}

/// Cast the argument list in place against the declared prototypes.
pub fn cast_arguments(args: &mut Vec<Rc<Value>>, prototypes: &[Vec<Param>]) {
    let types = declared_types(prototypes, args.len());
    for (argument, declared) in args.iter_mut().zip(types) {
        if let Some(type_name) = declared {
            *argument = cast_value(argument, &type_name);
        }
    }
}
