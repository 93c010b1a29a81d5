//! Parsed IR to normalized IR.
//!
//! Sugar is rewritten into the small normalized core and every name is
//! resolved: locals through a scope stack of pattern bindings, globals
//! through the [`Resolver`]. A definition that fails to normalize is
//! reported and left out of the normalized module.

use std::collections::BTreeSet;

use oak_core::{
    Constant, DataOptionIdentifier, Diagnostic, Diagnostics, FullIdentifier, Identifier, Location,
    QualifiedIdentifier,
};
use oak_parser as parsed;
use oak_parser::{Associativity, BinOpItem};

use crate::normalized::*;
use crate::resolve::{Namespace, Operator, Resolution, Resolver};
use crate::types::{Type, names};

/// Normalize every definition of a parsed, flattened module.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn normalize_module(
    module: &parsed::Module,
    resolver: &Resolver<'_>,
    ids: &mut IdGenerator,
    diagnostics: &mut Diagnostics,
) -> Module {
    let mut normalizer = Normalizer {
        resolver,
        module,
        ids,
        scopes: Vec::new(),
        dependencies: BTreeSet::new(),
    };

    let mut definitions = Vec::with_capacity(module.definitions.len());
    for definition in &module.definitions {
        match normalizer.definition(definition) {
            Ok(definition) => definitions.push(definition),
            Err(diagnostic) => diagnostics.push(diagnostic),
        }
    }

    tracing::debug!(
        module = %module.name,
        definitions = definitions.len(),
        dependencies = normalizer.dependencies.len(),
        "normalized module"
    );

    Module {
        name: module.name.clone(),
        package: module.package.clone(),
        file: module.file.clone(),
        definitions,
        dependencies: normalizer.dependencies,
    }
}

struct Normalizer<'a, 'm> {
    resolver: &'a Resolver<'m>,
    module: &'a parsed::Module,
    ids: &'a mut IdGenerator,
    /// Bindings in scope, innermost last.
    scopes: Vec<(Identifier, BindingId)>,
    dependencies: BTreeSet<QualifiedIdentifier>,
}

type Result<T> = std::result::Result<T, Diagnostic>;

impl Normalizer<'_, '_> {
    fn definition(&mut self, definition: &parsed::Definition) -> Result<Definition> {
        let mark = self.scopes.len();
        let result = self.definition_inner(definition);
        self.scopes.truncate(mark);
        result
    }

    fn definition_inner(&mut self, definition: &parsed::Definition) -> Result<Definition> {
        let params = self.patterns(&definition.params)?;
        let return_type = self.declared(definition.return_type.as_ref())?;
        let body = self.expr(&definition.body)?;
        Ok(Definition {
            id: self.ids.next_definition(),
            name: FullIdentifier::from_parts(&self.module.name, &definition.name),
            params,
            return_type,
            body,
            flags: definition.flags,
            location: definition.location.clone(),
            ty: (),
        })
    }

    // =========================================
    // Scopes and names
    // =========================================

    fn local(&self, name: &str) -> Option<BindingId> {
        self.scopes
            .iter()
            .rev()
            .find(|(bound, _)| bound.as_str() == name)
            .map(|(_, binding)| *binding)
    }

    fn bind(&mut self, name: &Identifier) -> BindingId {
        let binding = self.ids.next_binding();
        self.scopes.push((name.clone(), binding));
        binding
    }

    fn global(&mut self, name: FullIdentifier, location: &Location) -> Expr {
        let module = name.module();
        if module != self.module.name {
            self.dependencies.insert(module);
        }
        Expr::new(ExprKind::Global(name), location.clone())
    }

    fn resolve_global(&self, name: &str, location: &Location) -> Result<FullIdentifier> {
        match self.resolver.resolve_value(&self.module.name, name) {
            Resolution::Found(full) => Ok(full),
            other => Err(self
                .resolver
                .lookup_error(name, &other, Namespace::Value, location)),
        }
    }

    fn declared(&self, ty: Option<&parsed::Type>) -> Result<Option<Type>> {
        ty.map(|ty| self.resolver.resolve_type(&self.module.name, ty))
            .transpose()
    }

    // =========================================
    // Patterns
    // =========================================

    fn patterns(&mut self, patterns: &[parsed::Pattern]) -> Result<Vec<Pattern>> {
        let mut seen: Vec<&Identifier> = Vec::new();
        for pattern in patterns {
            for name in pattern.bound_names() {
                if seen.contains(&name) {
                    return Err(Diagnostic::error(
                        pattern.location.clone(),
                        format!("'{name}' is bound more than once"),
                    ));
                }
                seen.push(name);
            }
        }
        patterns.iter().map(|p| self.pattern_inner(p)).collect()
    }

    fn pattern(&mut self, pattern: &parsed::Pattern) -> Result<Pattern> {
        self.patterns(std::slice::from_ref(pattern))
            .map(|mut patterns| patterns.remove(0))
    }

    fn pattern_inner(&mut self, pattern: &parsed::Pattern) -> Result<Pattern> {
        use parsed::PatternKind as P;

        let location = pattern.location.clone();
        let kind = match &pattern.kind {
            P::Alias { name, nested } => {
                let nested = self.pattern_inner(nested)?;
                PatternKind::Alias {
                    name: name.clone(),
                    binding: self.bind(name),
                    nested: Box::new(nested),
                }
            }
            P::Any => PatternKind::Any,
            P::Cons { head, tail } => PatternKind::Cons {
                head: Box::new(self.pattern_inner(head)?),
                tail: Box::new(self.pattern_inner(tail)?),
            },
            P::Const(value) => PatternKind::Const(value.clone()),
            P::Option { name, values } => {
                let option = self.option(name, values.len(), &location)?;
                let values = values
                    .iter()
                    .map(|v| self.pattern_inner(v))
                    .collect::<Result<_>>()?;
                PatternKind::Option { option, values }
            }
            P::List(items) => PatternKind::List(
                items
                    .iter()
                    .map(|p| self.pattern_inner(p))
                    .collect::<Result<_>>()?,
            ),
            P::Named(name) => PatternKind::Named {
                name: name.clone(),
                binding: self.bind(name),
            },
            P::Record(fields) => PatternKind::Record(
                fields
                    .iter()
                    .map(|(name, location)| RecordBinding {
                        name: name.clone(),
                        binding: self.bind(name),
                        location: location.clone(),
                    })
                    .collect(),
            ),
            P::Tuple(items) => PatternKind::Tuple(
                items
                    .iter()
                    .map(|p| self.pattern_inner(p))
                    .collect::<Result<_>>()?,
            ),
        };

        Ok(Pattern {
            kind,
            declared: self.declared(pattern.declared_type.as_ref())?,
            location,
            ty: (),
        })
    }

    fn option(
        &mut self,
        name: &QualifiedIdentifier,
        arity: usize,
        location: &Location,
    ) -> Result<DataOptionIdentifier> {
        let full = self.resolve_global(name, location)?;
        let info = self.resolver.constructor(&full).ok_or_else(|| {
            Diagnostic::error(location.clone(), format!("'{name}' is not a data option"))
        })?;
        if info.arity != arity {
            return Err(Diagnostic::error(
                location.clone(),
                format!(
                    "option '{}' expects {} value(s) but {} given",
                    name, info.arity, arity
                ),
            ));
        }
        Ok(info.option.clone())
    }

    // =========================================
    // Expressions
    // =========================================

    fn exprs(&mut self, exprs: &[parsed::Expr]) -> Result<Vec<Expr>> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    fn fields(&mut self, fields: &[parsed::RecordField]) -> Result<Vec<Field>> {
        fields
            .iter()
            .map(|field| {
                Ok(Field {
                    name: field.name.clone(),
                    value: self.expr(&field.value)?,
                    location: field.location.clone(),
                })
            })
            .collect()
    }

    fn expr(&mut self, expr: &parsed::Expr) -> Result<Expr> {
        use parsed::ExprKind as E;

        let location = &expr.location;
        let kind = match &expr.kind {
            E::Access { record, field } => ExprKind::Access {
                record: Box::new(self.expr(record)?),
                field: field.clone(),
            },
            E::Accessor(field) => {
                let name = Identifier::new("_x");
                let binding = self.ids.next_binding();
                let param = Pattern::new(
                    PatternKind::Named {
                        name: name.clone(),
                        binding,
                    },
                    location.clone(),
                );
                let target = Expr::new(ExprKind::Local { name, target: binding }, location.clone());
                ExprKind::Lambda {
                    params: vec![param],
                    return_type: None,
                    body: Box::new(Expr::new(
                        ExprKind::Access {
                            record: Box::new(target),
                            field: field.clone(),
                        },
                        location.clone(),
                    )),
                }
            }
            E::Apply { func, args } => ExprKind::Apply {
                func: Box::new(self.expr(func)?),
                args: self.exprs(args)?,
            },
            E::BinOp { items, .. } => return self.binop(items, location),
            E::Call { name, args } => ExprKind::Call {
                name: name.clone(),
                args: self.exprs(args)?,
            },
            E::Const(value) => ExprKind::Const(value.clone()),
            E::Constructor { option, args } => ExprKind::Constructor {
                option: option.clone(),
                args: self.exprs(args)?,
            },
            E::Function(function) => {
                let mark = self.scopes.len();
                let binding = self.bind(&function.name);
                let params = self.patterns(&function.params)?;
                let return_type = self.declared(function.return_type.as_ref())?;
                let body = self.expr(&function.body)?;
                self.scopes.truncate(mark + 1);
                let nested = self.expr(&function.nested)?;
                self.scopes.truncate(mark);
                ExprKind::Function(Box::new(LocalFunction {
                    name: function.name.clone(),
                    binding,
                    params,
                    return_type,
                    body,
                    nested,
                }))
            }
            E::If {
                condition,
                positive,
                negative,
            } => {
                let case = |option: &str, body: Expr| Case {
                    pattern: Pattern::new(
                        PatternKind::Option {
                            option: DataOptionIdentifier::new(option),
                            values: Vec::new(),
                        },
                        body.location.clone(),
                    ),
                    location: body.location.clone(),
                    body,
                };
                let condition = self.expr(condition)?;
                let positive = self.expr(positive)?;
                let negative = self.expr(negative)?;
                ExprKind::Select {
                    condition: Box::new(condition),
                    cases: vec![case(names::TRUE, positive), case(names::FALSE, negative)],
                }
            }
            E::InfixVar(op) => {
                let operator = self.resolver.resolve_operator(&self.module.name, op, location)?;
                return Ok(self.global(operator.target, location));
            }
            E::Lambda {
                params,
                return_type,
                body,
            } => {
                let mark = self.scopes.len();
                let params = self.patterns(params)?;
                let return_type = self.declared(return_type.as_ref())?;
                let body = self.expr(body)?;
                self.scopes.truncate(mark);
                ExprKind::Lambda {
                    params,
                    return_type,
                    body: Box::new(body),
                }
            }
            E::Let {
                pattern,
                value,
                nested,
            } => {
                let value = self.expr(value)?;
                let mark = self.scopes.len();
                let pattern = self.pattern(pattern)?;
                let nested = self.expr(nested)?;
                self.scopes.truncate(mark);
                ExprKind::Let {
                    pattern,
                    value: Box::new(value),
                    nested: Box::new(nested),
                }
            }
            E::List(items) => ExprKind::List(self.exprs(items)?),
            E::Negate(inner) => match &inner.kind {
                E::Const(Constant::Int(value)) => ExprKind::Const(Constant::Int(value.wrapping_neg())),
                E::Const(Constant::Float(value)) => ExprKind::Const(Constant::Float(-value)),
                _ => {
                    let func = self.global(FullIdentifier::new(names::NEG), location);
                    ExprKind::Apply {
                        func: Box::new(func),
                        args: vec![self.expr(inner)?],
                    }
                }
            },
            E::Record(fields) => ExprKind::Record(self.fields(fields)?),
            E::Select { condition, cases } => {
                let condition = self.expr(condition)?;
                let mut normalized = Vec::with_capacity(cases.len());
                for case in cases {
                    let mark = self.scopes.len();
                    let pattern = self.pattern(&case.pattern)?;
                    let body = self.expr(&case.body)?;
                    self.scopes.truncate(mark);
                    normalized.push(Case {
                        pattern,
                        body,
                        location: case.location.clone(),
                    });
                }
                ExprKind::Select {
                    condition: Box::new(condition),
                    cases: normalized,
                }
            }
            E::Tuple(items) => ExprKind::Tuple(self.exprs(items)?),
            E::Update { record, fields } => {
                let fields = self.fields(fields)?;
                match self.local(record).filter(|_| !record.is_qualified()) {
                    Some(target) => ExprKind::UpdateLocal {
                        name: Identifier::new(record.as_str()),
                        target,
                        fields,
                    },
                    None => {
                        let name = self.resolve_global(record, location)?;
                        let module = name.module();
                        if module != self.module.name {
                            self.dependencies.insert(module);
                        }
                        ExprKind::UpdateGlobal { name, fields }
                    }
                }
            }
            E::Var(name) => return self.var(name, location),
        };
        Ok(Expr::new(kind, location.clone()))
    }

    /// `a.b.c`: a local with field accesses, a global, or the longest
    /// resolvable global prefix with field accesses.
    fn var(&mut self, name: &QualifiedIdentifier, location: &Location) -> Result<Expr> {
        let access = |expr: Expr, fields: &[&str]| {
            fields.iter().fold(expr, |record, field| {
                Expr::new(
                    ExprKind::Access {
                        record: Box::new(record),
                        field: Identifier::new(*field),
                    },
                    location.clone(),
                )
            })
        };

        let segments: Vec<&str> = name.segments().collect();
        if let Some(target) = self.local(segments[0]) {
            let local = Expr::new(
                ExprKind::Local {
                    name: Identifier::new(segments[0]),
                    target,
                },
                location.clone(),
            );
            return Ok(access(local, &segments[1..]));
        }

        let resolution = self.resolver.resolve_value(&self.module.name, name);
        match resolution {
            Resolution::Found(full) => Ok(self.global(full, location)),
            Resolution::Ambiguous(_) => Err(self.resolver.lookup_error(
                name,
                &resolution,
                Namespace::Value,
                location,
            )),
            Resolution::NotFound => {
                for split in (1..segments.len()).rev() {
                    let prefix = segments[..split].join(".");
                    if let Resolution::Found(full) =
                        self.resolver.resolve_value(&self.module.name, &prefix)
                    {
                        let global = self.global(full, location);
                        return Ok(access(global, &segments[split..]));
                    }
                }
                Err(self
                    .resolver
                    .lookup_error(name, &resolution, Namespace::Value, location))
            }
        }
    }

    /// Resolve operator precedence and associativity over a flat operator
    /// chain, producing left-leaning applications.
    fn binop(&mut self, items: &[BinOpItem], location: &Location) -> Result<Expr> {
        let mut operands: Vec<Expr> = Vec::new();
        let mut operators: Vec<(Operator, Location)> = Vec::new();

        for item in items {
            match item {
                BinOpItem::Operand(operand) => operands.push(self.expr(operand)?),
                BinOpItem::Infix { op, location } => {
                    let current = self
                        .resolver
                        .resolve_operator(&self.module.name, op, location)?;
                    while let Some((top, _)) = operators.last() {
                        let reduce = if top.precedence != current.precedence {
                            top.precedence > current.precedence
                        } else {
                            match (top.associativity, current.associativity) {
                                (Associativity::Left, Associativity::Left) => true,
                                (Associativity::Right, Associativity::Right) => false,
                                (Associativity::Non, _) | (_, Associativity::Non) => {
                                    return Err(Diagnostic::error(
                                        location.clone(),
                                        format!(
                                            "non-associative operators '{}' and '{}' cannot be chained",
                                            top.symbol, current.symbol
                                        ),
                                    ));
                                }
                                _ => {
                                    return Err(Diagnostic::error(
                                        location.clone(),
                                        format!(
                                            "operators '{}' and '{}' have the same precedence but different associativity",
                                            top.symbol, current.symbol
                                        ),
                                    ));
                                }
                            }
                        };
                        if !reduce {
                            break;
                        }
                        self.reduce(&mut operands, &mut operators, location)?;
                    }
                    operators.push((current, location.clone()));
                }
            }
        }

        while !operators.is_empty() {
            self.reduce(&mut operands, &mut operators, location)?;
        }
        match (operands.pop(), operands.is_empty()) {
            (Some(expr), true) => Ok(expr),
            _ => Err(Diagnostic::error(
                location.clone(),
                "malformed operator expression",
            )),
        }
    }

    fn reduce(
        &mut self,
        operands: &mut Vec<Expr>,
        operators: &mut Vec<(Operator, Location)>,
        location: &Location,
    ) -> Result<()> {
        let malformed = || Diagnostic::error(location.clone(), "malformed operator expression");
        let (operator, op_location) = operators.pop().ok_or_else(malformed)?;
        let right = operands.pop().ok_or_else(malformed)?;
        let left = operands.pop().ok_or_else(malformed)?;
        let span = left.location.merge(&right.location);
        let func = self.global(operator.target, &op_location);
        operands.push(Expr::new(
            ExprKind::Apply {
                func: Box::new(func),
                args: vec![left, right],
            },
            span,
        ));
        Ok(())
    }
}
