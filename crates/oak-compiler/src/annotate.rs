//! Type annotation.
//!
//! Gives every expression and pattern node a type slot: literals get their
//! native type (integer literals a fresh `number` variable), everything
//! else a fresh unbound variable the solver will refine. Declared types
//! have their parameters interned per definition, so every `a` in one
//! definition's annotations is the same variable.

use rustc_hash::FxHashMap;

use oak_core::{Constant, Identifier};

use crate::normalized::*;
use crate::types::{Constraint, Type, TypeVarGen};

/// Annotate every definition of `module`.
pub fn annotate_module(module: Module, vars: &mut TypeVarGen) -> Module<Type> {
    let Module {
        name,
        package,
        file,
        definitions,
        dependencies,
    } = module;
    Module {
        name,
        package,
        file,
        definitions: definitions
            .into_iter()
            .map(|definition| annotate_definition(definition, vars))
            .collect(),
        dependencies,
    }
}

/// Annotate a single definition.
pub fn annotate_definition(definition: Definition, vars: &mut TypeVarGen) -> Definition<Type> {
    let mut annotator = Annotator {
        vars,
        parameters: FxHashMap::default(),
    };
    let Definition {
        id,
        name,
        params,
        return_type,
        body,
        flags,
        location,
        ..
    } = definition;

    let params = annotator.patterns(params);
    let return_type = return_type.map(|ty| annotator.intern(&ty));
    let body = annotator.expr(body);
    Definition {
        id,
        name,
        params,
        return_type,
        body,
        flags,
        location,
        ty: annotator.vars.fresh(),
    }
}

struct Annotator<'a> {
    vars: &'a mut TypeVarGen,
    /// Type parameters seen so far in this definition's annotations.
    parameters: FxHashMap<Identifier, Type>,
}

impl Annotator<'_> {
    fn intern(&mut self, declared: &Type) -> Type {
        let Self { vars, parameters } = self;
        declared.substitute_parameters(&mut |name| {
            parameters
                .entry(name.clone())
                .or_insert_with(|| vars.fresh_constrained(Constraint::from_parameter(name)))
                .clone()
        })
    }

    fn constant(&mut self, value: &Constant) -> Type {
        match value {
            Constant::Unit => Type::unit(),
            Constant::Char(_) => Type::char(),
            Constant::Int(_) => self.vars.fresh_constrained(Constraint::Number),
            Constant::Float(_) => Type::float(),
            Constant::String(_) => Type::string(),
        }
    }

    fn exprs(&mut self, exprs: Vec<Expr>) -> Vec<Expr<Type>> {
        exprs.into_iter().map(|e| self.expr(e)).collect()
    }

    fn fields(&mut self, fields: Vec<Field>) -> Vec<Field<Type>> {
        fields
            .into_iter()
            .map(|field| Field {
                name: field.name,
                value: self.expr(field.value),
                location: field.location,
            })
            .collect()
    }

    fn expr(&mut self, expr: Expr) -> Expr<Type> {
        let Expr { kind, location, .. } = expr;
        let mut ty = None;
        let kind = match kind {
            ExprKind::Access { record, field } => ExprKind::Access {
                record: Box::new(self.expr(*record)),
                field,
            },
            ExprKind::Apply { func, args } => ExprKind::Apply {
                func: Box::new(self.expr(*func)),
                args: self.exprs(args),
            },
            ExprKind::Call { name, args } => ExprKind::Call {
                name,
                args: self.exprs(args),
            },
            ExprKind::Const(value) => {
                ty = Some(self.constant(&value));
                ExprKind::Const(value)
            }
            ExprKind::Constructor { option, args } => ExprKind::Constructor {
                option,
                args: self.exprs(args),
            },
            ExprKind::Function(function) => {
                let LocalFunction {
                    name,
                    binding,
                    params,
                    return_type,
                    body,
                    nested,
                } = *function;
                ExprKind::Function(Box::new(LocalFunction {
                    name,
                    binding,
                    params: self.patterns(params),
                    return_type: return_type.map(|ty| self.intern(&ty)),
                    body: self.expr(body),
                    nested: self.expr(nested),
                }))
            }
            ExprKind::Lambda {
                params,
                return_type,
                body,
            } => ExprKind::Lambda {
                params: self.patterns(params),
                return_type: return_type.map(|ty| self.intern(&ty)),
                body: Box::new(self.expr(*body)),
            },
            ExprKind::Let {
                pattern,
                value,
                nested,
            } => ExprKind::Let {
                pattern: self.pattern(pattern),
                value: Box::new(self.expr(*value)),
                nested: Box::new(self.expr(*nested)),
            },
            ExprKind::List(items) => ExprKind::List(self.exprs(items)),
            ExprKind::Record(fields) => ExprKind::Record(self.fields(fields)),
            ExprKind::Select { condition, cases } => ExprKind::Select {
                condition: Box::new(self.expr(*condition)),
                cases: cases
                    .into_iter()
                    .map(|case| Case {
                        pattern: self.pattern(case.pattern),
                        body: self.expr(case.body),
                        location: case.location,
                    })
                    .collect(),
            },
            ExprKind::Tuple(items) => ExprKind::Tuple(self.exprs(items)),
            ExprKind::UpdateLocal {
                name,
                target,
                fields,
            } => ExprKind::UpdateLocal {
                name,
                target,
                fields: self.fields(fields),
            },
            ExprKind::UpdateGlobal { name, fields } => ExprKind::UpdateGlobal {
                name,
                fields: self.fields(fields),
            },
            ExprKind::Local { name, target } => ExprKind::Local { name, target },
            ExprKind::Global(name) => ExprKind::Global(name),
        };
        Expr {
            kind,
            location,
            ty: ty.unwrap_or_else(|| self.vars.fresh()),
        }
    }

    fn patterns(&mut self, patterns: Vec<Pattern>) -> Vec<Pattern<Type>> {
        patterns.into_iter().map(|p| self.pattern(p)).collect()
    }

    fn pattern(&mut self, pattern: Pattern) -> Pattern<Type> {
        let Pattern {
            kind,
            declared,
            location,
            ..
        } = pattern;
        let mut ty = None;
        let kind = match kind {
            PatternKind::Alias {
                name,
                binding,
                nested,
            } => PatternKind::Alias {
                name,
                binding,
                nested: Box::new(self.pattern(*nested)),
            },
            PatternKind::Any => PatternKind::Any,
            PatternKind::Cons { head, tail } => PatternKind::Cons {
                head: Box::new(self.pattern(*head)),
                tail: Box::new(self.pattern(*tail)),
            },
            PatternKind::Const(value) => {
                ty = Some(self.constant(&value));
                PatternKind::Const(value)
            }
            PatternKind::Option { option, values } => PatternKind::Option {
                option,
                values: self.patterns(values),
            },
            PatternKind::List(items) => PatternKind::List(self.patterns(items)),
            PatternKind::Named { name, binding } => PatternKind::Named { name, binding },
            PatternKind::Record(fields) => PatternKind::Record(fields),
            PatternKind::Tuple(items) => PatternKind::Tuple(self.patterns(items)),
        };
        Pattern {
            kind,
            declared: declared.map(|ty| self.intern(&ty)),
            location,
            ty: ty.unwrap_or_else(|| self.vars.fresh()),
        }
    }
}
