//! Expression AST nodes for Oak.
//!
//! Binary operators are not given precedence here: an operator chain parses to
//! a flat [`ExprKind::BinOp`] list and the normalizer reduces it once every
//! operator's declared precedence and associativity is known.

use oak_core::{
    Constant, DataOptionIdentifier, FullIdentifier, Identifier, InfixIdentifier, Location,
    QualifiedIdentifier,
};

use crate::ast::pattern::Pattern;
use crate::ast::types::Type;

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub location: Location,
}

impl Expr {
    pub fn new(kind: ExprKind, location: Location) -> Self {
        Self { kind, location }
    }
}

/// The kind of expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// `record.field`
    Access { record: Box<Expr>, field: Identifier },
    /// `.field`
    Accessor(Identifier),
    /// `f(a, b)`
    Apply { func: Box<Expr>, args: Vec<Expr> },
    /// `a + b * c` before precedence resolution.
    BinOp {
        items: Vec<BinOpItem>,
        in_parentheses: bool,
    },
    /// `native "Full.name"(args)`
    Call {
        name: FullIdentifier,
        args: Vec<Expr>,
    },
    Const(Constant),
    /// Tagged value construction; only synthesized by the data-type flattener.
    Constructor {
        option: DataOptionIdentifier,
        args: Vec<Expr>,
    },
    /// `let f(x) = body in nested`
    Function(Box<LocalFunction>),
    /// `if c then a else b`
    If {
        condition: Box<Expr>,
        positive: Box<Expr>,
        negative: Box<Expr>,
    },
    /// `(+)`
    InfixVar(InfixIdentifier),
    /// `\(x): T -> body`
    Lambda {
        params: Vec<Pattern>,
        return_type: Option<Type>,
        body: Box<Expr>,
    },
    /// `let p = value in nested`
    Let {
        pattern: Pattern,
        value: Box<Expr>,
        nested: Box<Expr>,
    },
    /// `[a, b]`
    List(Vec<Expr>),
    /// `-e`
    Negate(Box<Expr>),
    /// `{ x = 1, y = 2 }`
    Record(Vec<RecordField>),
    /// `select e case p -> body ... end`
    Select {
        condition: Box<Expr>,
        cases: Vec<SelectCase>,
    },
    /// `(a, b)`
    Tuple(Vec<Expr>),
    /// `{ r | x = 1 }`
    Update {
        record: QualifiedIdentifier,
        fields: Vec<RecordField>,
    },
    /// `x`, `List.map`, `r.x.y`
    Var(QualifiedIdentifier),
}

/// One element of an unresolved operator chain.
#[derive(Debug, Clone, PartialEq)]
pub enum BinOpItem {
    Operand(Expr),
    Infix {
        op: InfixIdentifier,
        location: Location,
    },
}

/// A local named function.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalFunction {
    pub name: Identifier,
    pub params: Vec<Pattern>,
    pub return_type: Option<Type>,
    pub body: Expr,
    pub nested: Expr,
    pub location: Location,
}

/// `name = value` in a record literal or update.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordField {
    pub name: Identifier,
    pub value: Expr,
    pub location: Location,
}

/// `case pattern -> body`
#[derive(Debug, Clone, PartialEq)]
pub struct SelectCase {
    pub pattern: Pattern,
    pub body: Expr,
    pub location: Location,
}
