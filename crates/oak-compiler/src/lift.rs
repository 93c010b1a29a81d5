//! Lambda lifting.
//!
//! Every lambda and local function becomes a hidden top-level definition
//! whose leading parameters are the locals it captures. The original site
//! becomes an application of the lifted definition to those locals, or a
//! plain global reference when nothing is captured. Nested closures are
//! lifted inside-out.

use rustc_hash::{FxHashMap, FxHashSet};

use oak_core::{FullIdentifier, Identifier, Location};
use oak_parser::DefinitionFlags;

use crate::normalized::*;

/// Lift the closures of every definition in `module`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn lift_module(module: &mut Module, ids: &mut IdGenerator) {
    let mut lifter = Lifter {
        module: module.name.clone(),
        parent: String::new(),
        counter: 0,
        ids,
        lifted: Vec::new(),
    };

    for definition in &mut module.definitions {
        if !definition.body.has_closures() {
            continue;
        }
        lifter.parent = definition.name.short_name().to_string();
        let body = std::mem::replace(&mut definition.body, placeholder(&definition.location));
        definition.body = lifter.lift(body);
    }

    tracing::debug!(module = %module.name, lifted = lifter.lifted.len(), "lifted lambdas");
    module.definitions.append(&mut lifter.lifted);
}

fn placeholder(location: &Location) -> Expr {
    Expr::new(ExprKind::Const(oak_core::Constant::Unit), location.clone())
}

struct Lifter<'a> {
    module: oak_core::QualifiedIdentifier,
    /// Short name of the top-level definition being lifted.
    parent: String,
    counter: usize,
    ids: &'a mut IdGenerator,
    lifted: Vec<Definition>,
}

/// A closure body ready to become a definition.
struct Closure {
    suffix: Option<Identifier>,
    params: Vec<Pattern>,
    return_type: Option<crate::types::Type>,
    body: Expr,
    /// Binding of a local function's own name.
    this: Option<BindingId>,
    location: Location,
}

impl Lifter<'_> {
    fn lift(&mut self, expr: Expr) -> Expr {
        let Expr { kind, location, .. } = expr;
        let kind = match kind {
            ExprKind::Lambda {
                params,
                return_type,
                body,
            } => {
                let body = self.lift(*body);
                return self.closure(Closure {
                    suffix: None,
                    params,
                    return_type,
                    body,
                    this: None,
                    location,
                });
            }
            ExprKind::Function(function) => {
                let LocalFunction {
                    name,
                    binding,
                    params,
                    return_type,
                    body,
                    nested,
                } = *function;
                let body = self.lift(body);
                let site = self.closure(Closure {
                    suffix: Some(name.clone()),
                    params,
                    return_type,
                    body,
                    this: Some(binding),
                    location: location.clone(),
                });
                let pattern = Pattern::new(PatternKind::Named { name, binding }, location.clone());
                ExprKind::Let {
                    pattern,
                    value: Box::new(site),
                    nested: Box::new(self.lift(nested)),
                }
            }
            ExprKind::Access { record, field } => ExprKind::Access {
                record: Box::new(self.lift(*record)),
                field,
            },
            ExprKind::Apply { func, args } => ExprKind::Apply {
                func: Box::new(self.lift(*func)),
                args: self.lift_all(args),
            },
            ExprKind::Call { name, args } => ExprKind::Call {
                name,
                args: self.lift_all(args),
            },
            ExprKind::Constructor { option, args } => ExprKind::Constructor {
                option,
                args: self.lift_all(args),
            },
            ExprKind::Let {
                pattern,
                value,
                nested,
            } => ExprKind::Let {
                pattern,
                value: Box::new(self.lift(*value)),
                nested: Box::new(self.lift(*nested)),
            },
            ExprKind::List(items) => ExprKind::List(self.lift_all(items)),
            ExprKind::Tuple(items) => ExprKind::Tuple(self.lift_all(items)),
            ExprKind::Record(fields) => ExprKind::Record(self.lift_fields(fields)),
            ExprKind::Select { condition, cases } => ExprKind::Select {
                condition: Box::new(self.lift(*condition)),
                cases: cases
                    .into_iter()
                    .map(|case| Case {
                        pattern: case.pattern,
                        body: self.lift(case.body),
                        location: case.location,
                    })
                    .collect(),
            },
            ExprKind::UpdateLocal {
                name,
                target,
                fields,
            } => ExprKind::UpdateLocal {
                name,
                target,
                fields: self.lift_fields(fields),
            },
            ExprKind::UpdateGlobal { name, fields } => ExprKind::UpdateGlobal {
                name,
                fields: self.lift_fields(fields),
            },
            kind @ (ExprKind::Const(_) | ExprKind::Local { .. } | ExprKind::Global(_)) => kind,
        };
        Expr::new(kind, location)
    }

    fn lift_all(&mut self, exprs: Vec<Expr>) -> Vec<Expr> {
        exprs.into_iter().map(|e| self.lift(e)).collect()
    }

    fn lift_fields(&mut self, fields: Vec<Field>) -> Vec<Field> {
        fields
            .into_iter()
            .map(|field| Field {
                name: field.name,
                value: self.lift(field.value),
                location: field.location,
            })
            .collect()
    }

    /// Turn a closure into a definition and return the expression that
    /// replaces it at its original site.
    fn closure(&mut self, closure: Closure) -> Expr {
        let Closure {
            suffix,
            params,
            return_type,
            mut body,
            this,
            location,
        } = closure;

        let mut bound: FxHashSet<BindingId> = params
            .iter()
            .flat_map(|p| p.bindings().into_iter().map(|(_, b)| b))
            .collect();
        bound.extend(this);
        bound_in(&body, &mut bound);
        let captured: Vec<(Identifier, BindingId)> = free_locals(&body)
            .into_iter()
            .filter(|(_, binding)| !bound.contains(binding))
            .collect();

        self.counter += 1;
        let short = match &suffix {
            Some(name) => format!("_lmbd_{}_{}_{}", self.parent, self.counter, name),
            None => format!("_lmbd_{}_{}", self.parent, self.counter),
        };
        let name = FullIdentifier::from_parts(&self.module, &short);

        let mut retarget: FxHashMap<BindingId, (Identifier, BindingId)> = FxHashMap::default();
        let mut lifted_params = Vec::with_capacity(captured.len() + params.len());
        for (local, old) in &captured {
            let fresh = self.ids.next_binding();
            retarget.insert(*old, (local.clone(), fresh));
            lifted_params.push(Pattern::new(
                PatternKind::Named {
                    name: local.clone(),
                    binding: fresh,
                },
                location.clone(),
            ));
        }
        lifted_params.extend(params);

        // A local function refers to itself through `_self`, rebuilt from
        // the captured locals inside the lifted body.
        if let Some(this) = this
            && references(&body, this)
        {
            let own = Identifier::new("_self");
            let own_binding = self.ids.next_binding();
            retarget.insert(this, (own.clone(), own_binding));
            retarget_locals(&mut body, &retarget);
            let rebuilt = site(
                &name,
                captured
                    .iter()
                    .map(|(local, old)| {
                        let (_, fresh) = &retarget[old];
                        (local.clone(), *fresh)
                    })
                    .collect(),
                &location,
            );
            body = Expr::new(
                ExprKind::Let {
                    pattern: Pattern::new(
                        PatternKind::Named {
                            name: own,
                            binding: own_binding,
                        },
                        location.clone(),
                    ),
                    value: Box::new(rebuilt),
                    nested: Box::new(body),
                },
                location.clone(),
            );
        } else {
            retarget_locals(&mut body, &retarget);
        }

        tracing::trace!(name = %name, captured = captured.len(), "lifted closure");
        self.lifted.push(Definition {
            id: self.ids.next_definition(),
            name: name.clone(),
            params: lifted_params,
            return_type,
            body,
            flags: DefinitionFlags::HIDDEN | DefinitionFlags::LIFTED,
            location: location.clone(),
            ty: (),
        });

        site(&name, captured, &location)
    }
}

/// `name(captured...)`, or just `name` when nothing is captured.
fn site(name: &FullIdentifier, captured: Vec<(Identifier, BindingId)>, location: &Location) -> Expr {
    let global = Expr::new(ExprKind::Global(name.clone()), location.clone());
    if captured.is_empty() {
        return global;
    }
    let args = captured
        .into_iter()
        .map(|(name, target)| Expr::new(ExprKind::Local { name, target }, location.clone()))
        .collect();
    Expr::new(
        ExprKind::Apply {
            func: Box::new(global),
            args,
        },
        location.clone(),
    )
}

/// Locals referenced in `expr`, in first-occurrence order.
fn free_locals(expr: &Expr) -> Vec<(Identifier, BindingId)> {
    let mut out: Vec<(Identifier, BindingId)> = Vec::new();
    expr.visit(&mut |e| match &e.kind {
        ExprKind::Local { name, target } | ExprKind::UpdateLocal { name, target, .. } => {
            if !out.iter().any(|(_, b)| b == target) {
                out.push((name.clone(), *target));
            }
        }
        _ => {}
    });
    out
}

/// Bindings introduced by patterns inside `expr`.
fn bound_in(expr: &Expr, out: &mut FxHashSet<BindingId>) {
    expr.visit(&mut |e| match &e.kind {
        ExprKind::Let { pattern, .. } => {
            out.extend(pattern.bindings().into_iter().map(|(_, b)| b));
        }
        ExprKind::Select { cases, .. } => {
            for case in cases {
                out.extend(case.pattern.bindings().into_iter().map(|(_, b)| b));
            }
        }
        _ => {}
    });
}

fn references(expr: &Expr, binding: BindingId) -> bool {
    free_locals(expr).iter().any(|(_, b)| *b == binding)
}

fn retarget_locals(expr: &mut Expr, map: &FxHashMap<BindingId, (Identifier, BindingId)>) {
    if map.is_empty() {
        return;
    }
    match &mut expr.kind {
        ExprKind::Local { name, target } | ExprKind::UpdateLocal { name, target, .. } => {
            if let Some((new_name, new_target)) = map.get(target) {
                *name = new_name.clone();
                *target = *new_target;
            }
        }
        _ => {}
    }
    match &mut expr.kind {
        ExprKind::Access { record, .. } => retarget_locals(record, map),
        ExprKind::Apply { func, args } => {
            retarget_locals(func, map);
            args.iter_mut().for_each(|a| retarget_locals(a, map));
        }
        ExprKind::Call { args, .. }
        | ExprKind::Constructor { args, .. }
        | ExprKind::List(args)
        | ExprKind::Tuple(args) => args.iter_mut().for_each(|a| retarget_locals(a, map)),
        ExprKind::Function(function) => {
            retarget_locals(&mut function.body, map);
            retarget_locals(&mut function.nested, map);
        }
        ExprKind::Lambda { body, .. } => retarget_locals(body, map),
        ExprKind::Let { value, nested, .. } => {
            retarget_locals(value, map);
            retarget_locals(nested, map);
        }
        ExprKind::Record(fields)
        | ExprKind::UpdateLocal { fields, .. }
        | ExprKind::UpdateGlobal { fields, .. } => fields
            .iter_mut()
            .for_each(|field| retarget_locals(&mut field.value, map)),
        ExprKind::Select { condition, cases } => {
            retarget_locals(condition, map);
            cases
                .iter_mut()
                .for_each(|case| retarget_locals(&mut case.body, map));
        }
        ExprKind::Const(_) | ExprKind::Local { .. } | ExprKind::Global(_) => {}
    }
}
