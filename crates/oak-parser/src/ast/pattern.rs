//! Pattern AST nodes.

use oak_core::{Constant, Identifier, Location, QualifiedIdentifier};

use crate::ast::types::Type;

/// A pattern with its optional declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub kind: PatternKind,
    /// `p: Type`
    pub declared_type: Option<Type>,
    pub location: Location,
}

/// The shape of a pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind {
    /// `p as name`
    Alias {
        name: Identifier,
        nested: Box<Pattern>,
    },
    /// `_`
    Any,
    /// `head | tail`
    Cons {
        head: Box<Pattern>,
        tail: Box<Pattern>,
    },
    /// `1`, `'c'`, `"s"`, `()`
    Const(Constant),
    /// `Just(x)`, `Nothing`, `Oak.Base.True`
    Option {
        name: QualifiedIdentifier,
        values: Vec<Pattern>,
    },
    /// `[a, b]`
    List(Vec<Pattern>),
    /// `x`
    Named(Identifier),
    /// `{ x, y }`
    Record(Vec<(Identifier, Location)>),
    /// `(a, b)`
    Tuple(Vec<Pattern>),
}

impl Pattern {
    /// Create an untyped pattern.
    pub fn new(kind: PatternKind, location: Location) -> Self {
        Self {
            kind,
            declared_type: None,
            location,
        }
    }

    /// Names bound by this pattern, in source order.
    pub fn bound_names(&self) -> Vec<&Identifier> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a Identifier>) {
        match &self.kind {
            PatternKind::Alias { name, nested } => {
                nested.collect_names(out);
                out.push(name);
            }
            PatternKind::Named(name) => out.push(name),
            PatternKind::Record(fields) => out.extend(fields.iter().map(|(name, _)| name)),
            PatternKind::Cons { head, tail } => {
                head.collect_names(out);
                tail.collect_names(out);
            }
            PatternKind::Option { values: items, .. }
            | PatternKind::List(items)
            | PatternKind::Tuple(items) => items.iter().for_each(|p| p.collect_names(out)),
            PatternKind::Any | PatternKind::Const(_) => {}
        }
    }
}
