//! Semantic types shared by declared annotations and the typed IR.
//!
//! Declared types resolved from source may contain [`Type::Parameter`]s;
//! the annotator replaces those with fresh [`Type::Unbound`] variables per
//! definition, so solved types only ever contain unbound variables.

use std::collections::BTreeMap;
use std::fmt;

use oak_core::{DataOptionIdentifier, FullIdentifier, Identifier, Location};
use rustc_hash::{FxHashMap, FxHashSet};

/// Fresh type variable id.
pub type TypeId = u32;

/// Fully qualified names of the built-in types and definitions the compiler
/// refers to directly.
pub mod names {
    pub const BASE_MODULE: &str = "Oak.Base";
    pub const BASE_PACKAGE: &str = "oak-base";

    pub const INT: &str = "Oak.Base.Int";
    pub const FLOAT: &str = "Oak.Base.Float";
    pub const CHAR: &str = "Oak.Base.Char";
    pub const STRING: &str = "Oak.Base.String";
    pub const UNIT: &str = "Oak.Base.Unit";
    pub const LIST: &str = "Oak.Base.List";
    pub const BOOL: &str = "Oak.Base.Bool";
    pub const TRUE: &str = "Oak.Base.Bool#True";
    pub const FALSE: &str = "Oak.Base.Bool#False";
    pub const NEG: &str = "Oak.Base.neg";
}

/// Constraint carried by an unbound type variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum Constraint {
    #[default]
    None,
    /// `Int` or `Float`.
    Number,
    /// Any type with an ordering: numbers, `Char` and `String`.
    Comparable,
}

impl Constraint {
    /// Constraint implied by a declared type parameter name.
    pub fn from_parameter(name: &str) -> Self {
        if name.starts_with("number") {
            Constraint::Number
        } else if name.starts_with("comparable") {
            Constraint::Comparable
        } else {
            Constraint::None
        }
    }

    /// The combined constraint of two variables being unified.
    pub fn merge(self, other: Constraint) -> Constraint {
        match (self, other) {
            (Constraint::None, c) | (c, Constraint::None) => c,
            (Constraint::Number, _) | (_, Constraint::Number) => Constraint::Number,
            (Constraint::Comparable, Constraint::Comparable) => Constraint::Comparable,
        }
    }

    /// Whether a non-variable type satisfies this constraint.
    pub fn accepts(self, ty: &Type) -> bool {
        match self {
            Constraint::None => true,
            Constraint::Number => ty.is_native(names::INT) || ty.is_native(names::FLOAT),
            Constraint::Comparable => {
                ty.is_native(names::INT)
                    || ty.is_native(names::FLOAT)
                    || ty.is_native(names::CHAR)
                    || ty.is_native(names::STRING)
            }
        }
    }
}

/// A semantic type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Func {
        params: Vec<Type>,
        ret: Box<Type>,
    },
    /// A record; `row` is the variable standing for the remaining fields of
    /// an extensible record, `None` for a closed one.
    Record {
        fields: BTreeMap<Identifier, Type>,
        row: Option<TypeId>,
    },
    Tuple(Vec<Type>),
    /// A data type declared with `type`; options live in [`DataTypeTable`].
    Data {
        name: FullIdentifier,
        args: Vec<Type>,
    },
    /// A runtime-provided type declared with `alias native`.
    Native {
        name: FullIdentifier,
        args: Vec<Type>,
    },
    /// A named type parameter of a declared type.
    Parameter(Identifier),
    Unbound {
        id: TypeId,
        constraint: Constraint,
    },
}

impl Type {
    /// A native type without arguments.
    pub fn native(name: &str) -> Type {
        Type::Native {
            name: FullIdentifier::new(name),
            args: Vec::new(),
        }
    }

    pub fn int() -> Type {
        Type::native(names::INT)
    }

    pub fn float() -> Type {
        Type::native(names::FLOAT)
    }

    pub fn char() -> Type {
        Type::native(names::CHAR)
    }

    pub fn string() -> Type {
        Type::native(names::STRING)
    }

    pub fn unit() -> Type {
        Type::native(names::UNIT)
    }

    pub fn bool() -> Type {
        Type::Data {
            name: FullIdentifier::new(names::BOOL),
            args: Vec::new(),
        }
    }

    pub fn list(element: Type) -> Type {
        Type::Native {
            name: FullIdentifier::new(names::LIST),
            args: vec![element],
        }
    }

    pub fn func(params: Vec<Type>, ret: Type) -> Type {
        Type::Func {
            params,
            ret: Box::new(ret),
        }
    }

    /// Whether this is the native type `name` (arguments ignored).
    pub fn is_native(&self, expected: &str) -> bool {
        matches!(self, Type::Native { name, .. } if name.as_str() == expected)
    }

    /// Whether the variable `id` occurs anywhere in this type, rows included.
    pub fn contains_var(&self, id: TypeId) -> bool {
        match self {
            Type::Func { params, ret } => {
                params.iter().any(|p| p.contains_var(id)) || ret.contains_var(id)
            }
            Type::Record { fields, row } => {
                *row == Some(id) || fields.values().any(|f| f.contains_var(id))
            }
            Type::Tuple(items) | Type::Data { args: items, .. } | Type::Native { args: items, .. } => {
                items.iter().any(|t| t.contains_var(id))
            }
            Type::Parameter(_) => false,
            Type::Unbound { id: other, .. } => *other == id,
        }
    }

    /// Free variables in order of first occurrence, paired with their
    /// constraints. Row variables report [`Constraint::None`].
    pub fn free_vars(&self) -> Vec<(TypeId, Constraint)> {
        let mut out = Vec::new();
        let mut seen = FxHashSet::default();
        self.collect_vars(&mut out, &mut seen);
        out
    }

    fn collect_vars(&self, out: &mut Vec<(TypeId, Constraint)>, seen: &mut FxHashSet<TypeId>) {
        match self {
            Type::Func { params, ret } => {
                params.iter().for_each(|p| p.collect_vars(out, seen));
                ret.collect_vars(out, seen);
            }
            Type::Record { fields, row } => {
                fields.values().for_each(|f| f.collect_vars(out, seen));
                if let Some(row) = row
                    && seen.insert(*row)
                {
                    out.push((*row, Constraint::None));
                }
            }
            Type::Tuple(items) | Type::Data { args: items, .. } | Type::Native { args: items, .. } => {
                items.iter().for_each(|t| t.collect_vars(out, seen));
            }
            Type::Parameter(_) => {}
            Type::Unbound { id, constraint } => {
                if seen.insert(*id) {
                    out.push((*id, *constraint));
                }
            }
        }
    }

    /// Replace every [`Type::Parameter`] using `lookup`.
    pub fn substitute_parameters(&self, lookup: &mut impl FnMut(&Identifier) -> Type) -> Type {
        match self {
            Type::Func { params, ret } => Type::Func {
                params: params
                    .iter()
                    .map(|p| p.substitute_parameters(lookup))
                    .collect(),
                ret: Box::new(ret.substitute_parameters(lookup)),
            },
            Type::Record { fields, row } => Type::Record {
                fields: fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.substitute_parameters(lookup)))
                    .collect(),
                row: *row,
            },
            Type::Tuple(items) => {
                Type::Tuple(items.iter().map(|t| t.substitute_parameters(lookup)).collect())
            }
            Type::Data { name, args } => Type::Data {
                name: name.clone(),
                args: args.iter().map(|t| t.substitute_parameters(lookup)).collect(),
            },
            Type::Native { name, args } => Type::Native {
                name: name.clone(),
                args: args.iter().map(|t| t.substitute_parameters(lookup)).collect(),
            },
            Type::Parameter(name) => lookup(name),
            Type::Unbound { .. } => self.clone(),
        }
    }

    /// Rename unbound variables (and row variables) through `map`.
    pub fn rename_vars(&self, map: &FxHashMap<TypeId, Type>) -> Type {
        match self {
            Type::Func { params, ret } => Type::Func {
                params: params.iter().map(|p| p.rename_vars(map)).collect(),
                ret: Box::new(ret.rename_vars(map)),
            },
            Type::Record { fields, row } => Type::Record {
                fields: fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.rename_vars(map)))
                    .collect(),
                row: row.map(|row| match map.get(&row) {
                    Some(Type::Unbound { id, .. }) => *id,
                    _ => row,
                }),
            },
            Type::Tuple(items) => Type::Tuple(items.iter().map(|t| t.rename_vars(map)).collect()),
            Type::Data { name, args } => Type::Data {
                name: name.clone(),
                args: args.iter().map(|t| t.rename_vars(map)).collect(),
            },
            Type::Native { name, args } => Type::Native {
                name: name.clone(),
                args: args.iter().map(|t| t.rename_vars(map)).collect(),
            },
            Type::Parameter(_) => self.clone(),
            Type::Unbound { id, .. } => map.get(id).cloned().unwrap_or_else(|| self.clone()),
        }
    }
}

impl fmt::Display for Type {
    /// Source-like rendering; unbound variables are named `a`, `b`, ...
    /// (or `number`, `comparable`) in order of appearance.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = FxHashMap::default();
        let mut counters = [0usize; 3];
        for (id, constraint) in self.free_vars() {
            let index = constraint as usize;
            let n = counters[index];
            counters[index] += 1;
            let name = match constraint {
                Constraint::None => variable_name(n),
                Constraint::Number if n == 0 => "number".to_string(),
                Constraint::Number => format!("number{n}"),
                Constraint::Comparable if n == 0 => "comparable".to_string(),
                Constraint::Comparable => format!("comparable{n}"),
            };
            names.insert(id, name);
        }
        write_type(self, &names, f)
    }
}

fn variable_name(n: usize) -> String {
    let letter = (b'a' + (n % 26) as u8) as char;
    if n < 26 {
        letter.to_string()
    } else {
        format!("{letter}{}", n / 26)
    }
}

fn write_list(
    items: &[Type],
    names: &FxHashMap<TypeId, String>,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_type(item, names, f)?;
    }
    Ok(())
}

fn write_type(ty: &Type, names: &FxHashMap<TypeId, String>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match ty {
        Type::Func { params, ret } => {
            f.write_str("(")?;
            write_list(params, names, f)?;
            f.write_str("): ")?;
            write_type(ret, names, f)
        }
        Type::Record { fields, row } => {
            f.write_str("{ ")?;
            for (i, (name, field)) in fields.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{name}: ")?;
                write_type(field, names, f)?;
            }
            if let Some(row) = row {
                let name = names.get(row).map(String::as_str).unwrap_or("r");
                write!(f, " | {name}")?;
            }
            f.write_str(" }")
        }
        Type::Tuple(items) => {
            f.write_str("(")?;
            write_list(items, names, f)?;
            f.write_str(")")
        }
        Type::Data { name, args } | Type::Native { name, args } => {
            if name.as_str() == names::UNIT {
                return f.write_str("()");
            }
            f.write_str(name.short_name())?;
            if !args.is_empty() {
                f.write_str("[")?;
                write_list(args, names, f)?;
                f.write_str("]")?;
            }
            Ok(())
        }
        Type::Parameter(name) => write!(f, "{name}"),
        Type::Unbound { id, .. } => match names.get(id) {
            Some(name) => f.write_str(name),
            None => write!(f, "t{id}"),
        },
    }
}

/// Monotonic source of fresh type variable ids.
#[derive(Debug, Default)]
pub struct TypeVarGen {
    next: TypeId,
}

impl TypeVarGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_id(&mut self) -> TypeId {
        self.next += 1;
        self.next
    }

    pub fn fresh(&mut self) -> Type {
        self.fresh_constrained(Constraint::None)
    }

    pub fn fresh_constrained(&mut self, constraint: Constraint) -> Type {
        Type::Unbound {
            id: self.fresh_id(),
            constraint,
        }
    }

    /// A copy of `ty` with every variable renamed to a fresh one.
    ///
    /// This is type-scheme instantiation: each use site of a solved
    /// definition refines its own copy.
    pub fn unique(&mut self, ty: &Type) -> Type {
        let map: FxHashMap<TypeId, Type> = ty
            .free_vars()
            .into_iter()
            .map(|(id, constraint)| (id, self.fresh_constrained(constraint)))
            .collect();
        ty.rename_vars(&map)
    }
}

/// One option of a data type.
#[derive(Debug, Clone, PartialEq)]
pub struct DataOptionInfo {
    pub name: DataOptionIdentifier,
    /// Value types, possibly mentioning the data type's parameters.
    pub values: Vec<Type>,
    pub hidden: bool,
}

/// A resolved data type declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTypeInfo {
    pub name: FullIdentifier,
    pub params: Vec<Identifier>,
    pub options: Vec<DataOptionInfo>,
    pub hidden: bool,
    pub location: Location,
}

impl DataTypeInfo {
    /// Find an option by its short name.
    pub fn option(&self, name: &str) -> Option<&DataOptionInfo> {
        self.options.iter().find(|o| o.name.option() == name)
    }

    /// Instantiate the type parameters with fresh variables.
    ///
    /// Returns the data type itself and the value types of `option`.
    pub fn instantiate(&self, option: &DataOptionInfo, vars: &mut TypeVarGen) -> (Type, Vec<Type>) {
        let args: Vec<Type> = self.params.iter().map(|_| vars.fresh()).collect();
        let mut lookup = |name: &Identifier| {
            self.params
                .iter()
                .position(|p| p == name)
                .map(|i| args[i].clone())
                .unwrap_or_else(|| Type::Parameter(name.clone()))
        };
        let values = option
            .values
            .iter()
            .map(|v| v.substitute_parameters(&mut lookup))
            .collect();
        let data = Type::Data {
            name: self.name.clone(),
            args,
        };
        (data, values)
    }
}

/// All data types of the program, keyed by full name.
#[derive(Debug, Clone, Default)]
pub struct DataTypeTable {
    types: FxHashMap<FullIdentifier, DataTypeInfo>,
}

impl DataTypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, info: DataTypeInfo) {
        self.types.insert(info.name.clone(), info);
    }

    pub fn get(&self, name: &str) -> Option<&DataTypeInfo> {
        self.types.get(name)
    }

    /// Look up a data type and one of its options.
    pub fn option(&self, id: &DataOptionIdentifier) -> Option<(&DataTypeInfo, &DataOptionInfo)> {
        let data = self.types.get(id.data())?;
        let option = data.option(id.option())?;
        Some((data, option))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
