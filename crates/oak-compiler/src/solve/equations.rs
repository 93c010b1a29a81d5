//! Equation generation over typed definitions.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use oak_core::{Diagnostic, FullIdentifier, Location};

use crate::normalized::*;
use crate::types::{DataTypeTable, Type, TypeVarGen};

/// `left = right`, introduced by the node at `location`.
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    pub left: Type,
    pub right: Type,
    pub location: Location,
}

/// How a global reference is typed.
pub(crate) trait GlobalTypes {
    /// The type of `name` at a use site, or `None` when the definition
    /// failed or is unknown.
    fn instantiate(&self, name: &FullIdentifier, vars: &mut TypeVarGen) -> Option<Type>;
}

pub(crate) struct EquationBuilder<'a, G: GlobalTypes> {
    vars: &'a mut TypeVarGen,
    data_types: &'a DataTypeTable,
    globals: &'a G,
    bindings: FxHashMap<BindingId, Type>,
    equations: Vec<Equation>,
}

impl<'a, G: GlobalTypes> EquationBuilder<'a, G> {
    pub fn new(vars: &'a mut TypeVarGen, data_types: &'a DataTypeTable, globals: &'a G) -> Self {
        Self {
            vars,
            data_types,
            globals,
            bindings: FxHashMap::default(),
            equations: Vec::new(),
        }
    }

    pub fn finish(self) -> Vec<Equation> {
        self.equations
    }

    fn equate(&mut self, left: Type, right: Type, location: &Location) {
        self.equations.push(Equation {
            left,
            right,
            location: location.clone(),
        });
    }

    /// Equations of one definition, in pre-order.
    pub fn definition(&mut self, definition: &Definition<Type>) -> Result<(), Diagnostic> {
        let params: Vec<Type> = definition.params.iter().map(|p| p.ty.clone()).collect();
        let own = if params.is_empty() {
            definition.body.ty.clone()
        } else {
            Type::func(params, definition.body.ty.clone())
        };
        self.equate(definition.ty.clone(), own, &definition.location);
        if let Some(declared) = &definition.return_type {
            self.equate(definition.body.ty.clone(), declared.clone(), &definition.location);
        }
        for param in &definition.params {
            self.pattern(param)?;
        }
        self.expr(&definition.body)
    }

    fn open_record(&mut self, fields: BTreeMap<oak_core::Identifier, Type>) -> Type {
        Type::Record {
            fields,
            row: Some(self.vars.fresh_id()),
        }
    }

    fn option(
        &mut self,
        option: &oak_core::DataOptionIdentifier,
        location: &Location,
    ) -> Result<(Type, Vec<Type>), Diagnostic> {
        let data_types = self.data_types;
        let (data, info) = data_types.option(option).ok_or_else(|| {
            Diagnostic::error(location.clone(), format!("unknown data option '{option}'"))
        })?;
        Ok(data.instantiate(info, self.vars))
    }

    fn expr(&mut self, expr: &Expr<Type>) -> Result<(), Diagnostic> {
        let ty = &expr.ty;
        let location = &expr.location;
        match &expr.kind {
            ExprKind::Access { record, field } => {
                let open = self.open_record(BTreeMap::from([(field.clone(), ty.clone())]));
                self.equate(record.ty.clone(), open, location);
                self.expr(record)?;
            }
            ExprKind::Apply { func, args } => {
                let arg_types = args.iter().map(|a| a.ty.clone()).collect();
                self.equate(func.ty.clone(), Type::func(arg_types, ty.clone()), location);
                self.expr(func)?;
                self.exprs(args)?;
            }
            ExprKind::Call { args, .. } => self.exprs(args)?,
            ExprKind::Const(_) => {}
            ExprKind::Constructor { option, args } => {
                let (data, values) = self.option(option, location)?;
                self.equate(ty.clone(), data, location);
                for (arg, value) in args.iter().zip(values) {
                    self.equate(arg.ty.clone(), value, &arg.location);
                }
                self.exprs(args)?;
            }
            ExprKind::Function(function) => {
                let params = function.params.iter().map(|p| p.ty.clone()).collect();
                self.bindings.insert(function.binding, self.vars.fresh());
                let own = self.bindings[&function.binding].clone();
                self.equate(own, Type::func(params, function.body.ty.clone()), location);
                if let Some(declared) = &function.return_type {
                    self.equate(function.body.ty.clone(), declared.clone(), location);
                }
                self.equate(ty.clone(), function.nested.ty.clone(), location);
                for param in &function.params {
                    self.pattern(param)?;
                }
                self.expr(&function.body)?;
                self.expr(&function.nested)?;
            }
            ExprKind::Lambda {
                params,
                return_type,
                body,
            } => {
                let param_types = params.iter().map(|p| p.ty.clone()).collect();
                self.equate(ty.clone(), Type::func(param_types, body.ty.clone()), location);
                if let Some(declared) = return_type {
                    self.equate(body.ty.clone(), declared.clone(), location);
                }
                for param in params {
                    self.pattern(param)?;
                }
                self.expr(body)?;
            }
            ExprKind::Let {
                pattern,
                value,
                nested,
            } => {
                self.equate(pattern.ty.clone(), value.ty.clone(), location);
                self.equate(ty.clone(), nested.ty.clone(), location);
                self.expr(value)?;
                self.pattern(pattern)?;
                self.expr(nested)?;
            }
            ExprKind::List(items) => {
                let element = self.vars.fresh();
                for item in items {
                    self.equate(item.ty.clone(), element.clone(), &item.location);
                }
                self.equate(ty.clone(), Type::list(element), location);
                self.exprs(items)?;
            }
            ExprKind::Record(fields) => {
                let record = Type::Record {
                    fields: fields
                        .iter()
                        .map(|f| (f.name.clone(), f.value.ty.clone()))
                        .collect(),
                    row: None,
                };
                self.equate(ty.clone(), record, location);
                for field in fields {
                    self.expr(&field.value)?;
                }
            }
            ExprKind::Select { condition, cases } => {
                for case in cases {
                    self.equate(condition.ty.clone(), case.pattern.ty.clone(), &case.location);
                    self.equate(ty.clone(), case.body.ty.clone(), &case.location);
                }
                self.expr(condition)?;
                for case in cases {
                    self.pattern(&case.pattern)?;
                    self.expr(&case.body)?;
                }
            }
            ExprKind::Tuple(items) => {
                let items_types = items.iter().map(|i| i.ty.clone()).collect();
                self.equate(ty.clone(), Type::Tuple(items_types), location);
                self.exprs(items)?;
            }
            ExprKind::UpdateLocal { target, fields, .. } => {
                if let Some(local) = self.bindings.get(target).cloned() {
                    self.equate(ty.clone(), local, location);
                }
                self.update(ty, fields, location)?;
            }
            ExprKind::UpdateGlobal { name, fields } => {
                if let Some(global) = self.globals.instantiate(name, self.vars) {
                    self.equate(ty.clone(), global, location);
                }
                self.update(ty, fields, location)?;
            }
            ExprKind::Local { target, .. } => {
                if let Some(local) = self.bindings.get(target).cloned() {
                    self.equate(ty.clone(), local, location);
                }
            }
            ExprKind::Global(name) => {
                if let Some(global) = self.globals.instantiate(name, self.vars) {
                    self.equate(ty.clone(), global, location);
                }
            }
        }
        Ok(())
    }

    fn exprs(&mut self, exprs: &[Expr<Type>]) -> Result<(), Diagnostic> {
        exprs.iter().try_for_each(|e| self.expr(e))
    }

    fn update(&mut self, ty: &Type, fields: &[Field<Type>], location: &Location) -> Result<(), Diagnostic> {
        let updated = fields
            .iter()
            .map(|f| (f.name.clone(), f.value.ty.clone()))
            .collect();
        let open = self.open_record(updated);
        self.equate(ty.clone(), open, location);
        for field in fields {
            self.expr(&field.value)?;
        }
        Ok(())
    }

    fn pattern(&mut self, pattern: &Pattern<Type>) -> Result<(), Diagnostic> {
        let ty = &pattern.ty;
        let location = &pattern.location;
        if let Some(declared) = &pattern.declared {
            self.equate(ty.clone(), declared.clone(), location);
        }
        match &pattern.kind {
            PatternKind::Alias {
                binding, nested, ..
            } => {
                self.bindings.insert(*binding, ty.clone());
                self.equate(nested.ty.clone(), ty.clone(), location);
                self.pattern(nested)?;
            }
            PatternKind::Any | PatternKind::Const(_) => {}
            PatternKind::Cons { head, tail } => {
                self.equate(ty.clone(), Type::list(head.ty.clone()), location);
                self.equate(tail.ty.clone(), ty.clone(), &tail.location);
                self.pattern(head)?;
                self.pattern(tail)?;
            }
            PatternKind::Option { option, values } => {
                let (data, value_types) = self.option(option, location)?;
                self.equate(ty.clone(), data, location);
                for (value, expected) in values.iter().zip(value_types) {
                    self.equate(value.ty.clone(), expected, &value.location);
                }
                for value in values {
                    self.pattern(value)?;
                }
            }
            PatternKind::List(items) => {
                let element = self.vars.fresh();
                for item in items {
                    self.equate(item.ty.clone(), element.clone(), &item.location);
                }
                self.equate(ty.clone(), Type::list(element), location);
                for item in items {
                    self.pattern(item)?;
                }
            }
            PatternKind::Named { binding, .. } => {
                self.bindings.insert(*binding, ty.clone());
            }
            PatternKind::Record(fields) => {
                let mut types = BTreeMap::new();
                for field in fields {
                    let field_ty = self.vars.fresh();
                    self.bindings.insert(field.binding, field_ty.clone());
                    types.insert(field.name.clone(), field_ty);
                }
                let open = self.open_record(types);
                self.equate(ty.clone(), open, location);
            }
            PatternKind::Tuple(items) => {
                let item_types = items.iter().map(|i| i.ty.clone()).collect();
                self.equate(ty.clone(), Type::Tuple(item_types), location);
                for item in items {
                    self.pattern(item)?;
                }
            }
        }
        Ok(())
    }
}
