//! Module-level declarations.

use std::collections::BTreeSet;
use std::sync::Arc;

use bitflags::bitflags;
use oak_core::{
    Identifier, InfixIdentifier, Location, PackageIdentifier, QualifiedIdentifier, SourceFile,
};

use crate::ast::expr::Expr;
use crate::ast::pattern::Pattern;
use crate::ast::types::{DataOption, Type};

bitflags! {
    /// Flags attached to a definition.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DefinitionFlags: u8 {
        /// Not visible outside the declaring module.
        const HIDDEN = 1 << 0;
        /// Implemented by the runtime; the body is a call of the same name.
        const NATIVE = 1 << 1;
        /// Synthesized constructor of a data option.
        const CONSTRUCTOR = 1 << 2;
        /// Synthesized by the lambda lifter.
        const LIFTED = 1 << 3;
    }
}

/// A parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: QualifiedIdentifier,
    /// Location of the module name in the header.
    pub location: Location,
    pub file: Arc<SourceFile>,
    pub imports: Vec<Import>,
    pub aliases: Vec<Alias>,
    pub infix_fns: Vec<Infix>,
    pub definitions: Vec<Definition>,
    pub data_types: Vec<DataType>,
    /// Owning package.
    pub package: PackageIdentifier,
    /// Packages transitively referenced by the owning package, filled in by
    /// the compiler when the module is loaded.
    pub referenced_packages: BTreeSet<PackageIdentifier>,
}

impl Module {
    /// Find a definition by name.
    pub fn definition(&self, name: &str) -> Option<&Definition> {
        self.definitions.iter().find(|d| d.name.as_str() == name)
    }

    /// Find an alias by name.
    pub fn alias(&self, name: &str) -> Option<&Alias> {
        self.aliases.iter().find(|a| a.name.as_str() == name)
    }

    /// Find an infix declaration by operator.
    pub fn infix(&self, op: &str) -> Option<&Infix> {
        self.infix_fns.iter().find(|i| i.name.as_str() == op)
    }

    /// Find a data type by name.
    pub fn data_type(&self, name: &str) -> Option<&DataType> {
        self.data_types.iter().find(|d| d.name.as_str() == name)
    }
}

/// `import A.B as X exposing (a, (+), T)`
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub module: QualifiedIdentifier,
    pub alias: Option<Identifier>,
    pub exposing: Exposing,
    pub location: Location,
}

/// The exposing clause of an import.
#[derive(Debug, Clone, PartialEq)]
pub enum Exposing {
    /// No clause: names are reachable only qualified.
    Nothing,
    /// `exposing (*)`
    All,
    /// `exposing (a, (+), T)`
    Names(Vec<(Identifier, Location)>),
}

/// A named type: `alias Pair[a] = (a, a)`, `alias native Int`, or the
/// synthesized alias of a data type.
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub name: Identifier,
    pub params: Vec<Identifier>,
    pub ty: Type,
    pub hidden: bool,
    pub location: Location,
}

/// Operator associativity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Associativity {
    Left,
    Right,
    Non,
}

/// `infix (+): (left 6) = add`
#[derive(Debug, Clone, PartialEq)]
pub struct Infix {
    pub name: InfixIdentifier,
    pub associativity: Associativity,
    pub precedence: i64,
    /// The definition the operator stands for, in the same module.
    pub alias: Identifier,
    pub hidden: bool,
    pub location: Location,
}

/// A top-level value (no params) or function (one or more params).
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub name: Identifier,
    pub params: Vec<Pattern>,
    pub return_type: Option<Type>,
    pub body: Expr,
    pub flags: DefinitionFlags,
    pub location: Location,
}

impl Definition {
    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.flags.contains(DefinitionFlags::HIDDEN)
    }

    #[inline]
    pub fn is_native(&self) -> bool {
        self.flags.contains(DefinitionFlags::NATIVE)
    }

    /// Whether this is a function rather than a value.
    #[inline]
    pub fn is_function(&self) -> bool {
        !self.params.is_empty()
    }
}

/// `type Maybe[a] = Just(a) | Nothing`
#[derive(Debug, Clone, PartialEq)]
pub struct DataType {
    pub name: Identifier,
    pub params: Vec<Identifier>,
    pub options: Vec<DataOption>,
    pub hidden: bool,
    pub location: Location,
}
