//! First-order unification over [`Type`] with row-extensible records.

use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::FxHashMap;

use oak_core::Identifier;

use crate::types::{Constraint, Type, TypeId, TypeVarGen};

/// Why two types failed to unify.
#[derive(Debug, Clone, PartialEq)]
pub enum UnifyError {
    Mismatch(Type, Type),
    Arity { expected: usize, found: usize },
    Fields(Type, Type),
    /// A variable would have to contain itself.
    Occurs,
}

impl fmt::Display for UnifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnifyError::Mismatch(left, right) => {
                write!(f, "{left} cannot be matched with {right}")
            }
            UnifyError::Arity { expected, found } => {
                write!(f, "arity mismatch: expected {expected} but found {found}")
            }
            UnifyError::Fields(left, right) => {
                write!(f, "record field mismatch: {left} and {right}")
            }
            UnifyError::Occurs => f.write_str("ambiguous type"),
        }
    }
}

/// Bindings of type variables, and of row variables to the record fields
/// they stand for.
#[derive(Debug, Default)]
pub struct Substitution {
    map: FxHashMap<TypeId, Type>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Follow variable bindings until a non-variable or an unbound variable.
    fn shallow(&self, ty: &Type) -> Type {
        let mut current = ty.clone();
        while let Type::Unbound { id, .. } = current {
            match self.map.get(&id) {
                Some(next) => current = next.clone(),
                None => break,
            }
        }
        current
    }

    /// All fields of a record, following its row through the substitution.
    fn record_view(
        &self,
        fields: &BTreeMap<Identifier, Type>,
        row: Option<TypeId>,
    ) -> (BTreeMap<Identifier, Type>, Option<TypeId>) {
        let mut fields = fields.clone();
        let mut row = row;
        while let Some(id) = row {
            match self.map.get(&id) {
                Some(Type::Record {
                    fields: more,
                    row: next,
                }) => {
                    for (name, ty) in more {
                        fields.entry(name.clone()).or_insert_with(|| ty.clone());
                    }
                    row = *next;
                }
                Some(Type::Unbound { id: next, .. }) => row = Some(*next),
                _ => break,
            }
        }
        (fields, row)
    }

    /// Apply the substitution everywhere in `ty`. The result is a fixpoint:
    /// applying again changes nothing.
    pub fn apply(&self, ty: &Type) -> Type {
        match ty {
            Type::Func { params, ret } => Type::Func {
                params: params.iter().map(|p| self.apply(p)).collect(),
                ret: Box::new(self.apply(ret)),
            },
            Type::Record { fields, row } => {
                let (fields, row) = self.record_view(fields, *row);
                Type::Record {
                    fields: fields
                        .iter()
                        .map(|(name, ty)| (name.clone(), self.apply(ty)))
                        .collect(),
                    row,
                }
            }
            Type::Tuple(items) => Type::Tuple(items.iter().map(|t| self.apply(t)).collect()),
            Type::Data { name, args } => Type::Data {
                name: name.clone(),
                args: args.iter().map(|t| self.apply(t)).collect(),
            },
            Type::Native { name, args } => Type::Native {
                name: name.clone(),
                args: args.iter().map(|t| self.apply(t)).collect(),
            },
            Type::Parameter(_) => ty.clone(),
            Type::Unbound { id, .. } => match self.map.get(id) {
                Some(bound) => self.apply(bound),
                None => ty.clone(),
            },
        }
    }

    /// Make `left` and `right` equal, extending the substitution.
    pub fn unify(&mut self, left: &Type, right: &Type, vars: &mut TypeVarGen) -> Result<(), UnifyError> {
        let left = self.shallow(left);
        let right = self.shallow(right);
        match (&left, &right) {
            (Type::Unbound { id: a, .. }, Type::Unbound { id: b, .. }) if a == b => Ok(()),
            (Type::Unbound { id, constraint }, other) | (other, Type::Unbound { id, constraint }) => {
                self.bind(*id, *constraint, other, vars)
            }
            (
                Type::Func {
                    params: left_params,
                    ret: left_ret,
                },
                Type::Func {
                    params: right_params,
                    ret: right_ret,
                },
            ) => self.unify_funcs(left_params, left_ret, right_params, right_ret, vars),
            (
                Type::Record {
                    fields: left_fields,
                    row: left_row,
                },
                Type::Record {
                    fields: right_fields,
                    row: right_row,
                },
            ) => {
                let left_view = self.record_view(left_fields, *left_row);
                let right_view = self.record_view(right_fields, *right_row);
                self.unify_records(left_view, right_view, vars)
                    .map_err(|error| match error {
                        UnifyError::Fields(..) => {
                            UnifyError::Fields(self.apply(&left), self.apply(&right))
                        }
                        other => other,
                    })
            }
            (Type::Tuple(left_items), Type::Tuple(right_items))
                if left_items.len() == right_items.len() =>
            {
                for (l, r) in left_items.iter().zip(right_items) {
                    self.unify(l, r, vars)?;
                }
                Ok(())
            }
            (
                Type::Data {
                    name: left_name,
                    args: left_args,
                },
                Type::Data {
                    name: right_name,
                    args: right_args,
                },
            )
            | (
                Type::Native {
                    name: left_name,
                    args: left_args,
                },
                Type::Native {
                    name: right_name,
                    args: right_args,
                },
            ) if left_name == right_name && left_args.len() == right_args.len() => {
                for (l, r) in left_args.iter().zip(right_args) {
                    self.unify(l, r, vars)?;
                }
                Ok(())
            }
            (Type::Parameter(a), Type::Parameter(b)) if a == b => Ok(()),
            _ => Err(UnifyError::Mismatch(self.apply(&left), self.apply(&right))),
        }
    }

    fn bind(
        &mut self,
        id: TypeId,
        constraint: Constraint,
        ty: &Type,
        vars: &mut TypeVarGen,
    ) -> Result<(), UnifyError> {
        if let Type::Unbound {
            id: other,
            constraint: other_constraint,
        } = ty
        {
            let merged = constraint.merge(*other_constraint);
            if merged == *other_constraint {
                self.map.insert(id, ty.clone());
            } else {
                let joined = vars.fresh_constrained(merged);
                self.map.insert(id, joined.clone());
                self.map.insert(*other, joined);
            }
            return Ok(());
        }

        let applied = self.apply(ty);
        if applied.contains_var(id) {
            return Err(UnifyError::Occurs);
        }
        if !constraint.accepts(&applied) {
            let var = Type::Unbound { id, constraint };
            return Err(UnifyError::Mismatch(var, applied));
        }
        self.map.insert(id, applied);
        Ok(())
    }

    /// Functions of different arity are balanced by currying the longer one:
    /// `(a, b, c): r` unifies with `(a): (b, c): r`.
    fn unify_funcs(
        &mut self,
        left_params: &[Type],
        left_ret: &Type,
        right_params: &[Type],
        right_ret: &Type,
        vars: &mut TypeVarGen,
    ) -> Result<(), UnifyError> {
        use std::cmp::Ordering;

        let (shared, left_rest, right_rest) = match left_params.len().cmp(&right_params.len()) {
            Ordering::Equal => (left_params.len(), &[][..], &[][..]),
            Ordering::Greater => (right_params.len(), &left_params[right_params.len()..], &[][..]),
            Ordering::Less => (left_params.len(), &[][..], &right_params[left_params.len()..]),
        };
        if shared == 0 && !(left_rest.is_empty() && right_rest.is_empty()) {
            return Err(UnifyError::Arity {
                expected: left_params.len(),
                found: right_params.len(),
            });
        }

        for (l, r) in left_params[..shared].iter().zip(&right_params[..shared]) {
            self.unify(l, r, vars)?;
        }

        let curried = |rest: &[Type], ret: &Type| Type::Func {
            params: rest.to_vec(),
            ret: Box::new(ret.clone()),
        };
        if !left_rest.is_empty() {
            self.unify_rest(&curried(left_rest, left_ret), right_ret, left_params.len(), right_params.len(), vars)
        } else if !right_rest.is_empty() {
            self.unify_rest(&curried(right_rest, right_ret), left_ret, left_params.len(), right_params.len(), vars)
        } else {
            self.unify(left_ret, right_ret, vars)
        }
    }

    /// Unify the curried tail of the longer function with the shorter one's
    /// return type, which must be a function or a variable.
    fn unify_rest(
        &mut self,
        tail: &Type,
        ret: &Type,
        expected: usize,
        found: usize,
        vars: &mut TypeVarGen,
    ) -> Result<(), UnifyError> {
        match self.shallow(ret) {
            Type::Func { .. } | Type::Unbound { .. } => self.unify(tail, ret, vars),
            _ => Err(UnifyError::Arity { expected, found }),
        }
    }

    fn unify_records(
        &mut self,
        (left_fields, left_row): (BTreeMap<Identifier, Type>, Option<TypeId>),
        (right_fields, right_row): (BTreeMap<Identifier, Type>, Option<TypeId>),
        vars: &mut TypeVarGen,
    ) -> Result<(), UnifyError> {
        let mismatch = || {
            UnifyError::Fields(
                Type::Record {
                    fields: BTreeMap::new(),
                    row: None,
                },
                Type::Record {
                    fields: BTreeMap::new(),
                    row: None,
                },
            )
        };

        for (name, left) in &left_fields {
            if let Some(right) = right_fields.get(name) {
                self.unify(left, right, vars)?;
            }
        }
        let only_left: BTreeMap<Identifier, Type> = left_fields
            .iter()
            .filter(|(name, _)| !right_fields.contains_key(*name))
            .map(|(name, ty)| (name.clone(), ty.clone()))
            .collect();
        let only_right: BTreeMap<Identifier, Type> = right_fields
            .iter()
            .filter(|(name, _)| !left_fields.contains_key(*name))
            .map(|(name, ty)| (name.clone(), ty.clone()))
            .collect();

        match (left_row, right_row) {
            (None, None) => {
                if only_left.is_empty() && only_right.is_empty() {
                    Ok(())
                } else {
                    Err(mismatch())
                }
            }
            (Some(row), None) => {
                if !only_left.is_empty() {
                    return Err(mismatch());
                }
                self.bind_row(row, only_right, None)
            }
            (None, Some(row)) => {
                if !only_right.is_empty() {
                    return Err(mismatch());
                }
                self.bind_row(row, only_left, None)
            }
            (Some(left), Some(right)) if left == right => {
                if only_left.is_empty() && only_right.is_empty() {
                    Ok(())
                } else {
                    Err(mismatch())
                }
            }
            (Some(left), Some(right)) => {
                let rest = vars.fresh_id();
                self.bind_row(left, only_right, Some(rest))?;
                self.bind_row(right, only_left, Some(rest))
            }
        }
    }

    fn bind_row(
        &mut self,
        row: TypeId,
        fields: BTreeMap<Identifier, Type>,
        rest: Option<TypeId>,
    ) -> Result<(), UnifyError> {
        let record = Type::Record { fields, row: rest };
        if self.apply(&record).contains_var(row) {
            return Err(UnifyError::Occurs);
        }
        self.map.insert(row, record);
        Ok(())
    }
}
