//! Pattern-match exhaustiveness and redundancy checking.
//!
//! Patterns are first simplified to three shapes: anything, a literal, or a
//! constructor of some union. Tuples are the single-option union `!!N` and
//! lists the union `!!list` of `Nil` and `Cons`. Usefulness over the
//! resulting pattern matrix follows Maranget's algorithm.

use std::fmt;
use std::rc::Rc;

use ordered_float::OrderedFloat;

use oak_core::{Constant, Diagnostic, Diagnostics, Location};

use crate::normalized::*;
use crate::types::DataTypeTable;

const LIST_UNION: &str = "!!list";
const NIL: &str = "Nil";
const CONS: &str = "Cons";
const ONLY: &str = "Only";

/// The full set of options a constructor belongs to.
#[derive(Debug, PartialEq, Eq)]
struct Union {
    name: String,
    /// Option names with their arity.
    options: Vec<(String, usize)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Literal {
    Char(char),
    Int(i64),
    Float(OrderedFloat<f64>),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Simple {
    Anything,
    Literal(Literal),
    Constructor {
        union: Rc<Union>,
        option: String,
        args: Vec<Simple>,
    },
}

impl Simple {
    fn is_option(&self, union: &Union, name: &str) -> bool {
        matches!(self, Simple::Constructor { union: u, option, .. } if u.name == union.name && option == name)
    }
}

impl fmt::Display for Simple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Simple::Anything => f.write_str("_"),
            Simple::Literal(Literal::Char(c)) => write!(f, "{}", Constant::Char(*c)),
            Simple::Literal(Literal::Int(v)) => write!(f, "{v}"),
            Simple::Literal(Literal::Float(v)) => write!(f, "{}", Constant::Float(v.0)),
            Simple::Literal(Literal::String(s)) => write!(f, "{}", Constant::String(s.clone())),
            Simple::Constructor {
                union,
                option,
                args,
            } => {
                if union.name == LIST_UNION {
                    return match args.as_slice() {
                        [head, tail] => write!(f, "{head} | {tail}"),
                        _ => f.write_str("[]"),
                    };
                }
                if union.name.starts_with("!!") {
                    return write!(f, "({})", join(args, ", "));
                }
                if args.is_empty() {
                    f.write_str(option)
                } else {
                    write!(f, "{}({})", option, join(args, ", "))
                }
            }
        }
    }
}

fn join(items: &[Simple], separator: &str) -> String {
    items
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

struct Simplifier<'a> {
    data_types: &'a DataTypeTable,
    list: Rc<Union>,
}

impl Simplifier<'_> {
    fn new(data_types: &DataTypeTable) -> Simplifier<'_> {
        Simplifier {
            data_types,
            list: Rc::new(Union {
                name: LIST_UNION.to_string(),
                options: vec![(NIL.to_string(), 0), (CONS.to_string(), 2)],
            }),
        }
    }

    fn tuple(&self, args: Vec<Simple>) -> Simple {
        Simple::Constructor {
            union: Rc::new(Union {
                name: format!("!!{}", args.len()),
                options: vec![(ONLY.to_string(), args.len())],
            }),
            option: ONLY.to_string(),
            args,
        }
    }

    fn cons(&self, head: Simple, tail: Simple) -> Simple {
        Simple::Constructor {
            union: self.list.clone(),
            option: CONS.to_string(),
            args: vec![head, tail],
        }
    }

    fn simplify<T>(&self, pattern: &Pattern<T>) -> Simple {
        match &pattern.kind {
            PatternKind::Alias { nested, .. } => self.simplify(nested),
            PatternKind::Any | PatternKind::Named { .. } | PatternKind::Record(_) => Simple::Anything,
            PatternKind::Const(value) => match value {
                Constant::Unit => Simple::Anything,
                Constant::Char(c) => Simple::Literal(Literal::Char(*c)),
                Constant::Int(v) => Simple::Literal(Literal::Int(*v)),
                Constant::Float(v) => Simple::Literal(Literal::Float(OrderedFloat(*v))),
                Constant::String(s) => Simple::Literal(Literal::String(s.clone())),
            },
            PatternKind::Cons { head, tail } => self.cons(self.simplify(head), self.simplify(tail)),
            PatternKind::List(items) => {
                let nil = Simple::Constructor {
                    union: self.list.clone(),
                    option: NIL.to_string(),
                    args: Vec::new(),
                };
                items
                    .iter()
                    .rev()
                    .fold(nil, |tail, item| self.cons(self.simplify(item), tail))
            }
            PatternKind::Option { option, values } => {
                let Some(data) = self.data_types.get(option.data()) else {
                    return Simple::Anything;
                };
                let union = Rc::new(Union {
                    name: data.name.to_string(),
                    options: data
                        .options
                        .iter()
                        .map(|o| (o.name.option().to_string(), o.values.len()))
                        .collect(),
                });
                Simple::Constructor {
                    union,
                    option: option.option().to_string(),
                    args: values.iter().map(|v| self.simplify(v)).collect(),
                }
            }
            PatternKind::Tuple(items) => self.tuple(items.iter().map(|p| self.simplify(p)).collect()),
        }
    }
}

type Row = Vec<Simple>;

/// Rows whose first column admits `option`, with the constructor's
/// arguments spliced in its place.
fn specialize(matrix: &[Row], union: &Union, option: &str, arity: usize) -> Vec<Row> {
    matrix
        .iter()
        .filter_map(|row| {
            let (first, rest) = row.split_first()?;
            match first {
                Simple::Constructor { args, .. } if first.is_option(union, option) => {
                    Some(args.iter().chain(rest).cloned().collect())
                }
                Simple::Anything => Some(
                    std::iter::repeat_n(Simple::Anything, arity)
                        .chain(rest.iter().cloned())
                        .collect(),
                ),
                _ => None,
            }
        })
        .collect()
}

fn specialize_literal(matrix: &[Row], literal: &Literal) -> Vec<Row> {
    matrix
        .iter()
        .filter_map(|row| {
            let (first, rest) = row.split_first()?;
            match first {
                Simple::Literal(l) if l == literal => Some(rest.to_vec()),
                Simple::Anything => Some(rest.to_vec()),
                _ => None,
            }
        })
        .collect()
}

/// Rows whose first column is a wildcard, without that column.
fn default_matrix(matrix: &[Row]) -> Vec<Row> {
    matrix
        .iter()
        .filter_map(|row| match row.split_first() {
            Some((Simple::Anything, rest)) => Some(rest.to_vec()),
            _ => None,
        })
        .collect()
}

/// Constructors appearing in the first column.
fn first_constructors(matrix: &[Row]) -> Vec<(&Rc<Union>, &str)> {
    let mut out: Vec<(&Rc<Union>, &str)> = Vec::new();
    for row in matrix {
        if let Some(Simple::Constructor { union, option, .. }) = row.first()
            && !out
                .iter()
                .any(|(u, o)| u.name == union.name && *o == option.as_str())
        {
            out.push((union, option.as_str()));
        }
    }
    out
}

/// The union of the first column when its constructors cover every option.
fn complete_union(matrix: &[Row]) -> Option<Rc<Union>> {
    let constructors = first_constructors(matrix);
    let (union, _) = constructors.first()?;
    if constructors.iter().any(|(u, _)| u.name != union.name) {
        return None;
    }
    let covered = union
        .options
        .iter()
        .all(|(option, _)| constructors.iter().any(|(_, o)| *o == option.as_str()));
    covered.then(|| Rc::clone(union))
}

fn is_useful(matrix: &[Row], row: &[Simple]) -> bool {
    let Some((first, rest)) = row.split_first() else {
        return matrix.is_empty();
    };
    match first {
        Simple::Constructor {
            union,
            option,
            args,
        } => {
            let specialized = specialize(matrix, union, option, args.len());
            let row: Row = args.iter().chain(rest).cloned().collect();
            is_useful(&specialized, &row)
        }
        Simple::Anything => match complete_union(matrix) {
            Some(union) => union.options.iter().any(|(option, arity)| {
                let specialized = specialize(matrix, &union, option, *arity);
                let row: Row = std::iter::repeat_n(Simple::Anything, *arity)
                    .chain(rest.iter().cloned())
                    .collect();
                is_useful(&specialized, &row)
            }),
            None => is_useful(&default_matrix(matrix), rest),
        },
        Simple::Literal(literal) => is_useful(&specialize_literal(matrix, literal), rest),
    }
}

/// Witness rows of `n` columns not matched by `matrix`.
fn missing(matrix: &[Row], n: usize) -> Vec<Row> {
    if n == 0 {
        return if matrix.is_empty() { vec![Vec::new()] } else { Vec::new() };
    }

    if let Some(union) = complete_union(matrix) {
        let mut out = Vec::new();
        for (option, arity) in &union.options {
            let specialized = specialize(matrix, &union, option, *arity);
            for mut witness in missing(&specialized, arity + n - 1) {
                let rest = witness.split_off(*arity);
                let mut row = vec![Simple::Constructor {
                    union: Rc::clone(&union),
                    option: option.clone(),
                    args: witness,
                }];
                row.extend(rest);
                out.push(row);
            }
        }
        return out;
    }

    let rest = missing(&default_matrix(matrix), n - 1);
    if rest.is_empty() {
        return rest;
    }

    let constructors = first_constructors(matrix);
    let single_union = constructors
        .first()
        .filter(|(union, _)| constructors.iter().all(|(u, _)| u.name == union.name))
        .map(|(union, _)| Rc::clone(union));
    let heads: Vec<Simple> = match single_union {
        Some(union) => union
            .options
            .iter()
            .filter(|(option, _)| !constructors.iter().any(|(_, o)| *o == option.as_str()))
            .map(|(option, arity)| Simple::Constructor {
                union: Rc::clone(&union),
                option: option.clone(),
                args: vec![Simple::Anything; *arity],
            })
            .collect(),
        None => vec![Simple::Anything],
    };

    let mut out = Vec::new();
    for head in heads {
        for witness in &rest {
            let mut row = vec![head.clone()];
            row.extend(witness.iter().cloned());
            out.push(row);
        }
    }
    out
}

/// Check every `select`, definition parameter list and `let` pattern of
/// `module`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn check_module<T>(module: &Module<T>, data_types: &DataTypeTable, diagnostics: &mut Diagnostics) {
    let simplifier = Simplifier::new(data_types);
    for definition in &module.definitions {
        check_definition(&simplifier, definition, diagnostics);
    }
}

fn check_definition<T>(simplifier: &Simplifier<'_>, definition: &Definition<T>, diagnostics: &mut Diagnostics) {
    if !definition.params.is_empty() {
        let row: Row = definition.params.iter().map(|p| simplifier.simplify(p)).collect();
        let witnesses = missing(&[row], definition.params.len());
        if !witnesses.is_empty() {
            let rendered = witnesses
                .iter()
                .map(|w| {
                    if w.len() == 1 {
                        w[0].to_string()
                    } else {
                        format!("({})", join(w, ", "))
                    }
                })
                .collect();
            diagnostics.push(not_exhaustive(definition.location.clone(), rendered));
        }
    }

    definition.body.visit(&mut |expr| match &expr.kind {
        ExprKind::Select { cases, .. } => check_select(simplifier, cases, diagnostics),
        ExprKind::Let { pattern, .. } => {
            let witnesses = missing(&[vec![simplifier.simplify(pattern)]], 1);
            if !witnesses.is_empty() {
                let rendered = witnesses.iter().map(|w| w[0].to_string()).collect();
                diagnostics.push(not_exhaustive(pattern.location.clone(), rendered));
            }
        }
        _ => {}
    });
}

fn check_select<T>(simplifier: &Simplifier<'_>, cases: &[Case<T>], diagnostics: &mut Diagnostics) {
    let Some(last) = cases.last() else {
        return;
    };

    let mut matrix: Vec<Row> = Vec::with_capacity(cases.len());
    let mut redundant: Vec<Location> = Vec::new();
    for case in cases {
        let row = vec![simplifier.simplify(&case.pattern)];
        if !is_useful(&matrix, &row) {
            redundant.push(case.pattern.location.clone());
        }
        matrix.push(row);
    }
    if let Some((first, rest)) = redundant.split_first() {
        diagnostics.push(
            Diagnostic::error(first.clone(), "pattern matching is redundant")
                .with_extra(rest.iter().cloned()),
        );
    }

    let witnesses = missing(&matrix, 1);
    if !witnesses.is_empty() {
        let rendered = witnesses.iter().map(|w| w[0].to_string()).collect();
        diagnostics.push(not_exhaustive(last.location.clone(), rendered));
    }
}

fn not_exhaustive(location: Location, witnesses: Vec<String>) -> Diagnostic {
    Diagnostic::error(
        location,
        format!(
            "pattern matching is not exhaustive, missing patterns: {}",
            witnesses.join("\n")
        ),
    )
}
