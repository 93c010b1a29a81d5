//! Normalized IR.
//!
//! Surface sugar is gone and every identifier is resolved to a [`ExprKind::Local`]
//! binding or a [`ExprKind::Global`] definition. Nodes are generic over an
//! annotation `T`: `()` straight out of the normalizer, [`Type`] once the
//! solver has run.

use std::collections::BTreeSet;
use std::sync::Arc;

use oak_core::{
    Constant, DataOptionIdentifier, FullIdentifier, Identifier, Location, PackageIdentifier,
    QualifiedIdentifier, SourceFile,
};
use oak_parser::DefinitionFlags;

use crate::types::Type;

/// Identity of a pattern binding, unique within a compilation.
pub type BindingId = u32;

/// Identity of a definition, unique within a compilation.
pub type DefinitionId = u32;

/// Monotonic id counters threaded through the passes that allocate ids.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last_definition: DefinitionId,
    last_binding: BindingId,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_definition(&mut self) -> DefinitionId {
        self.last_definition += 1;
        self.last_definition
    }

    pub fn next_binding(&mut self) -> BindingId {
        self.last_binding += 1;
        self.last_binding
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr<T = ()> {
    pub kind: ExprKind<T>,
    pub location: Location,
    pub ty: T,
}

impl Expr<()> {
    pub fn new(kind: ExprKind<()>, location: Location) -> Self {
        Self {
            kind,
            location,
            ty: (),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind<T = ()> {
    Access {
        record: Box<Expr<T>>,
        field: Identifier,
    },
    Apply {
        func: Box<Expr<T>>,
        args: Vec<Expr<T>>,
    },
    /// Runtime-provided function.
    Call {
        name: FullIdentifier,
        args: Vec<Expr<T>>,
    },
    Const(Constant),
    Constructor {
        option: DataOptionIdentifier,
        args: Vec<Expr<T>>,
    },
    /// Local named function; removed by the lambda lifter.
    Function(Box<LocalFunction<T>>),
    /// Removed by the lambda lifter.
    Lambda {
        params: Vec<Pattern<T>>,
        return_type: Option<Type>,
        body: Box<Expr<T>>,
    },
    Let {
        pattern: Pattern<T>,
        value: Box<Expr<T>>,
        nested: Box<Expr<T>>,
    },
    List(Vec<Expr<T>>),
    Record(Vec<Field<T>>),
    Select {
        condition: Box<Expr<T>>,
        cases: Vec<Case<T>>,
    },
    Tuple(Vec<Expr<T>>),
    UpdateLocal {
        name: Identifier,
        target: BindingId,
        fields: Vec<Field<T>>,
    },
    UpdateGlobal {
        name: FullIdentifier,
        fields: Vec<Field<T>>,
    },
    Local {
        name: Identifier,
        target: BindingId,
    },
    Global(FullIdentifier),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalFunction<T = ()> {
    pub name: Identifier,
    /// Binding of the function name, visible in `body` and `nested`.
    pub binding: BindingId,
    pub params: Vec<Pattern<T>>,
    pub return_type: Option<Type>,
    pub body: Expr<T>,
    pub nested: Expr<T>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field<T = ()> {
    pub name: Identifier,
    pub value: Expr<T>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Case<T = ()> {
    pub pattern: Pattern<T>,
    pub body: Expr<T>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern<T = ()> {
    pub kind: PatternKind<T>,
    /// Resolved source annotation; may mention type parameters.
    pub declared: Option<Type>,
    pub location: Location,
    pub ty: T,
}

impl Pattern<()> {
    pub fn new(kind: PatternKind<()>, location: Location) -> Self {
        Self {
            kind,
            declared: None,
            location,
            ty: (),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind<T = ()> {
    Alias {
        name: Identifier,
        binding: BindingId,
        nested: Box<Pattern<T>>,
    },
    Any,
    Cons {
        head: Box<Pattern<T>>,
        tail: Box<Pattern<T>>,
    },
    Const(Constant),
    Option {
        option: DataOptionIdentifier,
        values: Vec<Pattern<T>>,
    },
    List(Vec<Pattern<T>>),
    Named {
        name: Identifier,
        binding: BindingId,
    },
    /// `{x, y}`: each field is bound under its own name.
    Record(Vec<RecordBinding>),
    Tuple(Vec<Pattern<T>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordBinding {
    pub name: Identifier,
    pub binding: BindingId,
    pub location: Location,
}

impl<T> Pattern<T> {
    /// Bindings introduced by this pattern, in source order.
    pub fn bindings(&self) -> Vec<(&Identifier, BindingId)> {
        let mut out = Vec::new();
        self.collect_bindings(&mut out);
        out
    }

    fn collect_bindings<'a>(&'a self, out: &mut Vec<(&'a Identifier, BindingId)>) {
        match &self.kind {
            PatternKind::Alias {
                name,
                binding,
                nested,
            } => {
                nested.collect_bindings(out);
                out.push((name, *binding));
            }
            PatternKind::Named { name, binding } => out.push((name, *binding)),
            PatternKind::Record(fields) => {
                out.extend(fields.iter().map(|f| (&f.name, f.binding)));
            }
            PatternKind::Cons { head, tail } => {
                head.collect_bindings(out);
                tail.collect_bindings(out);
            }
            PatternKind::Option { values: items, .. }
            | PatternKind::List(items)
            | PatternKind::Tuple(items) => items.iter().for_each(|p| p.collect_bindings(out)),
            PatternKind::Any | PatternKind::Const(_) => {}
        }
    }
}

/// A top-level definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition<T = ()> {
    pub id: DefinitionId,
    pub name: FullIdentifier,
    pub params: Vec<Pattern<T>>,
    pub return_type: Option<Type>,
    pub body: Expr<T>,
    pub flags: DefinitionFlags,
    pub location: Location,
    pub ty: T,
}

impl<T> Definition<T> {
    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.flags.contains(DefinitionFlags::HIDDEN)
    }

    #[inline]
    pub fn is_native(&self) -> bool {
        self.flags.contains(DefinitionFlags::NATIVE)
    }

    #[inline]
    pub fn is_lifted(&self) -> bool {
        self.flags.contains(DefinitionFlags::LIFTED)
    }

    /// Full names of every global this definition references, in
    /// first-occurrence order.
    pub fn references(&self) -> Vec<&FullIdentifier> {
        let mut out = Vec::new();
        self.body.visit(&mut |expr| match &expr.kind {
            ExprKind::Global(name) | ExprKind::UpdateGlobal { name, .. } => {
                if !out.contains(&name) {
                    out.push(name);
                }
            }
            _ => {}
        });
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Module<T = ()> {
    pub name: QualifiedIdentifier,
    pub package: PackageIdentifier,
    pub file: Arc<SourceFile>,
    pub definitions: Vec<Definition<T>>,
    /// Modules referenced through `Global`s.
    pub dependencies: BTreeSet<QualifiedIdentifier>,
}

impl<T> Module<T> {
    pub fn definition(&self, name: &str) -> Option<&Definition<T>> {
        self.definitions.iter().find(|d| d.name.as_str() == name)
    }
}

impl<T> Expr<T> {
    /// Visit this expression and every sub-expression, pre-order.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Expr<T>)) {
        f(self);
        match &self.kind {
            ExprKind::Access { record, .. } => record.visit(f),
            ExprKind::Apply { func, args } => {
                func.visit(f);
                args.iter().for_each(|a| a.visit(f));
            }
            ExprKind::Call { args, .. }
            | ExprKind::Constructor { args, .. }
            | ExprKind::List(args)
            | ExprKind::Tuple(args) => args.iter().for_each(|a| a.visit(f)),
            ExprKind::Function(function) => {
                function.body.visit(f);
                function.nested.visit(f);
            }
            ExprKind::Lambda { body, .. } => body.visit(f),
            ExprKind::Let { value, nested, .. } => {
                value.visit(f);
                nested.visit(f);
            }
            ExprKind::Record(fields)
            | ExprKind::UpdateLocal { fields, .. }
            | ExprKind::UpdateGlobal { fields, .. } => {
                fields.iter().for_each(|field| field.value.visit(f))
            }
            ExprKind::Select { condition, cases } => {
                condition.visit(f);
                cases.iter().for_each(|c| c.body.visit(f));
            }
            ExprKind::Const(_) | ExprKind::Local { .. } | ExprKind::Global(_) => {}
        }
    }

    /// Whether any lambda or local function remains.
    pub fn has_closures(&self) -> bool {
        let mut found = false;
        self.visit(&mut |expr| {
            if matches!(expr.kind, ExprKind::Lambda { .. } | ExprKind::Function(_)) {
                found = true;
            }
        });
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Location {
        Location::file_start(SourceFile::new("t.oak", ""))
    }

    #[test]
    fn ids_are_monotonic() {
        let mut ids = IdGenerator::new();
        assert_eq!(ids.next_definition(), 1);
        assert_eq!(ids.next_definition(), 2);
        assert_eq!(ids.next_binding(), 1);
    }

    #[test]
    fn references_are_deduplicated() {
        let global = |name: &str| Expr::new(ExprKind::Global(FullIdentifier::new(name)), loc());
        let body = Expr::new(
            ExprKind::Apply {
                func: Box::new(global("M.f")),
                args: vec![global("M.x"), global("M.f")],
            },
            loc(),
        );
        let def = Definition {
            id: 1,
            name: FullIdentifier::new("M.main"),
            params: Vec::new(),
            return_type: None,
            body,
            flags: DefinitionFlags::empty(),
            location: loc(),
            ty: (),
        };
        let refs: Vec<_> = def.references().iter().map(|r| r.as_str()).collect();
        assert_eq!(refs, vec!["M.f", "M.x"]);
    }

    #[test]
    fn pattern_bindings_in_order() {
        let named = |name: &str, binding| {
            Pattern::new(
                PatternKind::Named {
                    name: Identifier::new(name),
                    binding,
                },
                loc(),
            )
        };
        let pattern = Pattern::new(
            PatternKind::Alias {
                name: Identifier::new("all"),
                binding: 3,
                nested: Box::new(Pattern::new(
                    PatternKind::Tuple(vec![named("a", 1), named("b", 2)]),
                    loc(),
                )),
            },
            loc(),
        );
        let names: Vec<_> = pattern
            .bindings()
            .into_iter()
            .map(|(n, b)| (n.as_str().to_string(), b))
            .collect();
        assert_eq!(
            names,
            vec![("a".to_string(), 1), ("b".to_string(), 2), ("all".to_string(), 3)]
        );
    }
}
