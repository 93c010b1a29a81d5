//! Type expression AST nodes.

use oak_core::{FullIdentifier, Identifier, Location, QualifiedIdentifier};

/// A type as written in source, or synthesized for aliases.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// `(A, B): R`
    Func {
        params: Vec<Type>,
        ret: Box<Type>,
        location: Location,
    },
    /// `{ x: A, y: B }` with fields in source order.
    Record {
        fields: Vec<(Identifier, Type)>,
        location: Location,
    },
    /// `(A, B)`
    Tuple { items: Vec<Type>, location: Location },
    /// `()`
    Unit { location: Location },
    /// `Name` or `Module.Name[A, B]`, resolved later.
    Named {
        name: QualifiedIdentifier,
        args: Vec<Type>,
        location: Location,
    },
    /// A sum type synthesized by the data-type flattener.
    Data {
        name: FullIdentifier,
        args: Vec<Type>,
        options: Vec<DataOption>,
        location: Location,
    },
    /// A type implemented by the runtime: `alias native Int`.
    Native {
        name: FullIdentifier,
        args: Vec<Type>,
        location: Location,
    },
    /// A lowercase type parameter: `a`, `number`.
    Parameter { name: Identifier, location: Location },
}

impl Type {
    /// Get the location of this type expression.
    pub fn location(&self) -> &Location {
        match self {
            Type::Func { location, .. }
            | Type::Record { location, .. }
            | Type::Tuple { location, .. }
            | Type::Unit { location }
            | Type::Named { location, .. }
            | Type::Data { location, .. }
            | Type::Native { location, .. }
            | Type::Parameter { location, .. } => location,
        }
    }

    /// Collect every type parameter name in first-occurrence order.
    pub fn parameters(&self, out: &mut Vec<Identifier>) {
        match self {
            Type::Parameter { name, .. } => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Type::Func { params, ret, .. } => {
                params.iter().for_each(|p| p.parameters(out));
                ret.parameters(out);
            }
            Type::Record { fields, .. } => fields.iter().for_each(|(_, t)| t.parameters(out)),
            Type::Tuple { items, .. } => items.iter().for_each(|t| t.parameters(out)),
            Type::Named { args, .. } | Type::Data { args, .. } | Type::Native { args, .. } => {
                args.iter().for_each(|t| t.parameters(out))
            }
            Type::Unit { .. } => {}
        }
    }
}

/// One option of a data type: `Just(a)`, `hidden Secret`, `Nothing`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataOption {
    pub name: Identifier,
    pub values: Vec<Type>,
    pub hidden: bool,
    pub location: Location,
}
