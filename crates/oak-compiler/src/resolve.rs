//! Import unwrapping and name resolution.
//!
//! The [`Resolver`] indexes every parsed (and flattened) module of the
//! program. Per module it unwraps the imports into a flat environment of
//! reachable names, then answers lookups in a fixed order:
//!
//! 1. names defined in the module itself;
//! 2. names brought in by explicit imports (bare if exposed, `Module.Name`,
//!    `Alias.Name` and `Tail.Name`);
//! 3. names exposed by the implicit `Oak.Base` import;
//! 4. `Module.name` against the fully qualified module name, then against
//!    any module whose name ends with the given module part;
//! 5. an uppercase name taken as a module of the same name;
//! 6. any module of a referenced package.
//!
//! Values, types and operators live in separate namespaces. Hidden names are
//! never visible from another module.

use std::collections::{BTreeMap, BTreeSet};

use oak_core::{
    DataOptionIdentifier, Diagnostic, Diagnostics, FullIdentifier, Identifier, InfixIdentifier,
    Location, PackageIdentifier, QualifiedIdentifier,
};
use oak_parser::{Associativity, Exposing, Infix, Module};
use rustc_hash::FxHashMap;

use crate::types::{DataOptionInfo, DataTypeInfo, DataTypeTable, Type, names};

/// Which table a name is looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    Value,
    Type,
}

/// Outcome of a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(FullIdentifier),
    /// Sorted, deduplicated candidates.
    Ambiguous(Vec<FullIdentifier>),
    NotFound,
}

impl Resolution {
    fn from_candidates(mut candidates: Vec<FullIdentifier>) -> Resolution {
        candidates.sort();
        candidates.dedup();
        match candidates.len() {
            0 => Resolution::NotFound,
            1 => Resolution::Found(candidates.remove(0)),
            _ => Resolution::Ambiguous(candidates),
        }
    }
}

/// A resolved infix operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    pub symbol: InfixIdentifier,
    /// The definition the operator stands for.
    pub target: FullIdentifier,
    pub associativity: Associativity,
    pub precedence: i64,
}

/// The data option a constructor definition builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorInfo {
    pub option: DataOptionIdentifier,
    pub arity: usize,
}

#[derive(Debug, Clone)]
struct Symbol {
    full: FullIdentifier,
    hidden: bool,
    location: Location,
}

/// Names contributed by a set of imports.
#[derive(Debug, Default)]
struct ImportEnv {
    values: FxHashMap<String, Vec<FullIdentifier>>,
    types: FxHashMap<String, Vec<FullIdentifier>>,
    /// Operator symbol to the modules declaring it.
    infix: FxHashMap<InfixIdentifier, Vec<QualifiedIdentifier>>,
}

impl ImportEnv {
    fn table(&self, namespace: Namespace) -> &FxHashMap<String, Vec<FullIdentifier>> {
        match namespace {
            Namespace::Value => &self.values,
            Namespace::Type => &self.types,
        }
    }

    fn add(&mut self, namespace: Namespace, key: String, full: &FullIdentifier) {
        let table = match namespace {
            Namespace::Value => &mut self.values,
            Namespace::Type => &mut self.types,
        };
        let entry = table.entry(key).or_default();
        if !entry.contains(full) {
            entry.push(full.clone());
        }
    }

    fn add_infix(&mut self, symbol: &InfixIdentifier, module: &QualifiedIdentifier) {
        let entry = self.infix.entry(symbol.clone()).or_default();
        if !entry.contains(module) {
            entry.push(module.clone());
        }
    }
}

/// Per-module view used by lookups.
#[derive(Debug)]
struct ModuleScope<'m> {
    module: &'m Module,
    values: FxHashMap<Identifier, Symbol>,
    types: FxHashMap<Identifier, Symbol>,
    infix: FxHashMap<InfixIdentifier, &'m Infix>,
    imports: ImportEnv,
    prelude: ImportEnv,
    /// Modules of the packages this module may reference, sorted.
    visible: Vec<QualifiedIdentifier>,
}

impl ModuleScope<'_> {
    fn own(&self, namespace: Namespace) -> &FxHashMap<Identifier, Symbol> {
        match namespace {
            Namespace::Value => &self.values,
            Namespace::Type => &self.types,
        }
    }

    fn exported(&self, namespace: Namespace, name: &str) -> Option<&Symbol> {
        self.own(namespace).get(name).filter(|s| !s.hidden)
    }
}

/// Program-wide name resolver.
#[derive(Debug)]
pub struct Resolver<'m> {
    scopes: BTreeMap<QualifiedIdentifier, ModuleScope<'m>>,
    constructors: FxHashMap<FullIdentifier, ConstructorInfo>,
}

impl<'m> Resolver<'m> {
    /// Index `modules` and unwrap their imports.
    ///
    /// Duplicate declarations, unknown imported modules and unexposed names
    /// are reported to `diagnostics`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn new(modules: &'m [Module], diagnostics: &mut Diagnostics) -> Self {
        let mut scopes = BTreeMap::new();
        let mut constructors = FxHashMap::default();

        for module in modules {
            let scope = index_module(module, &mut constructors, diagnostics);
            scopes.insert(module.name.clone(), scope);
        }

        let mut resolver = Resolver {
            scopes,
            constructors,
        };
        resolver.compute_visibility(modules);
        resolver.unwrap_imports(modules, diagnostics);
        resolver
    }

    fn compute_visibility(&mut self, modules: &[Module]) {
        let by_package: Vec<(PackageIdentifier, QualifiedIdentifier)> = modules
            .iter()
            .map(|m| (m.package.clone(), m.name.clone()))
            .collect();
        for module in modules {
            let mut visible: Vec<QualifiedIdentifier> = by_package
                .iter()
                .filter(|(package, _)| {
                    *package == module.package
                        || package.as_str() == names::BASE_PACKAGE
                        || module.referenced_packages.contains(package)
                })
                .map(|(_, name)| name.clone())
                .collect();
            visible.sort();
            visible.dedup();
            if let Some(scope) = self.scopes.get_mut(&module.name) {
                scope.visible = visible;
            }
        }
    }

    fn unwrap_imports(&mut self, modules: &[Module], diagnostics: &mut Diagnostics) {
        for module in modules {
            let mut imports = ImportEnv::default();
            for import in &module.imports {
                let visible = self
                    .scopes
                    .get(&module.name)
                    .is_some_and(|s| s.visible.contains(&import.module));
                let Some(target) = self.scopes.get(&import.module).filter(|_| visible) else {
                    diagnostics.error(
                        import.location.clone(),
                        format!("unknown module '{}'", import.module),
                    );
                    continue;
                };
                let prefixes = import_prefixes(&import.module, import.alias.as_ref());
                expose_module(target, &prefixes, &import.exposing, &mut imports, diagnostics);
            }

            let mut prelude = ImportEnv::default();
            let base = QualifiedIdentifier::new(names::BASE_MODULE);
            if module.name != base
                && let Some(target) = self.scopes.get(&base)
            {
                let prefixes = import_prefixes(&base, None);
                expose_module(target, &prefixes, &Exposing::All, &mut prelude, diagnostics);
            }

            if let Some(scope) = self.scopes.get_mut(&module.name) {
                scope.imports = imports;
                scope.prelude = prelude;
            }
        }
    }

    /// Whether `module` is known.
    pub fn has_module(&self, module: &QualifiedIdentifier) -> bool {
        self.scopes.contains_key(module)
    }

    /// Resolve a value name (definition or constructor) used in `from`.
    pub fn resolve_value(&self, from: &QualifiedIdentifier, name: &str) -> Resolution {
        self.lookup(from, name, Namespace::Value)
    }

    /// Resolve a type name used in `from`.
    pub fn resolve_type_name(&self, from: &QualifiedIdentifier, name: &str) -> Resolution {
        self.lookup(from, name, Namespace::Type)
    }

    fn lookup(&self, from: &QualifiedIdentifier, name: &str, namespace: Namespace) -> Resolution {
        let Some(scope) = self.scopes.get(from) else {
            return Resolution::NotFound;
        };
        let qualified = name.contains('.');

        if !qualified && let Some(symbol) = scope.own(namespace).get(name) {
            return Resolution::Found(symbol.full.clone());
        }

        for env in [&scope.imports, &scope.prelude] {
            if let Some(candidates) = env.table(namespace).get(name) {
                return Resolution::from_candidates(candidates.clone());
            }
        }

        if let Some((module_part, short)) = name.rsplit_once('.') {
            let module = QualifiedIdentifier::new(module_part);
            if module == *from
                && let Some(symbol) = scope.own(namespace).get(short)
            {
                return Resolution::Found(symbol.full.clone());
            }
            if scope.visible.contains(&module)
                && let Some(symbol) = self
                    .scopes
                    .get(&module)
                    .and_then(|m| m.exported(namespace, short))
            {
                return Resolution::Found(symbol.full.clone());
            }

            let suffix = format!(".{module_part}");
            let candidates = self.exported_by(scope, namespace, short, |m| m.ends_with(&suffix));
            if !candidates.is_empty() {
                return Resolution::from_candidates(candidates);
            }
        }

        let last = name.rsplit('.').next().unwrap_or(name);
        if last.chars().next().is_some_and(char::is_uppercase) {
            let suffix = format!(".{name}");
            let candidates = self.exported_by(scope, namespace, last, |m| {
                m == name || m.ends_with(&suffix)
            });
            if !candidates.is_empty() {
                return Resolution::from_candidates(candidates);
            }
        }

        if !qualified {
            let candidates = self.exported_by(scope, namespace, name, |m| m != from.as_str());
            return Resolution::from_candidates(candidates);
        }
        Resolution::NotFound
    }

    /// Exported `name` in every visible module accepted by `filter`.
    fn exported_by(
        &self,
        scope: &ModuleScope<'_>,
        namespace: Namespace,
        name: &str,
        filter: impl Fn(&str) -> bool,
    ) -> Vec<FullIdentifier> {
        scope
            .visible
            .iter()
            .filter(|m| filter(m.as_str()))
            .filter_map(|m| self.scopes.get(m))
            .filter_map(|m| m.exported(namespace, name))
            .map(|s| s.full.clone())
            .collect()
    }

    /// Resolve an infix operator used in `from`.
    pub fn resolve_operator(
        &self,
        from: &QualifiedIdentifier,
        symbol: &InfixIdentifier,
        location: &Location,
    ) -> Result<Operator, Diagnostic> {
        let scope = self
            .scopes
            .get(from)
            .ok_or_else(|| Diagnostic::error(location.clone(), format!("unknown module '{from}'")))?;

        let modules: Vec<QualifiedIdentifier> = if scope.infix.contains_key(symbol) {
            vec![from.clone()]
        } else if let Some(modules) = scope.imports.infix.get(symbol) {
            modules.clone()
        } else if let Some(modules) = scope.prelude.infix.get(symbol) {
            modules.clone()
        } else {
            scope
                .visible
                .iter()
                .filter(|m| *m != from)
                .filter(|m| {
                    self.scopes
                        .get(*m)
                        .and_then(|s| s.infix.get(symbol))
                        .is_some_and(|i| !i.hidden)
                })
                .cloned()
                .collect()
        };

        match modules.as_slice() {
            [] => Err(Diagnostic::error(
                location.clone(),
                format!("unknown operator '{symbol}'"),
            )),
            [module] => {
                let infix = self
                    .scopes
                    .get(module)
                    .and_then(|s| s.infix.get(symbol))
                    .ok_or_else(|| {
                        Diagnostic::error(location.clone(), format!("unknown operator '{symbol}'"))
                    })?;
                Ok(Operator {
                    symbol: symbol.clone(),
                    target: FullIdentifier::from_parts(module, &infix.alias),
                    associativity: infix.associativity,
                    precedence: infix.precedence,
                })
            }
            many => {
                let mut candidates: Vec<String> = many
                    .iter()
                    .map(|m| format!("{m}.({symbol})"))
                    .collect();
                candidates.sort();
                Err(Diagnostic::error(
                    location.clone(),
                    format!(
                        "ambiguous operator '{}', it can be one of {}",
                        symbol,
                        candidates.join(", ")
                    ),
                ))
            }
        }
    }

    /// The diagnostic for a failed lookup.
    pub fn lookup_error(
        &self,
        name: &str,
        resolution: &Resolution,
        namespace: Namespace,
        location: &Location,
    ) -> Diagnostic {
        let message = match resolution {
            Resolution::Ambiguous(candidates) => {
                let candidates: Vec<&str> = candidates.iter().map(|c| c.as_str()).collect();
                format!(
                    "ambiguous identifier '{}', it can be one of {}",
                    name,
                    candidates.join(", ")
                )
            }
            _ => match namespace {
                Namespace::Value => format!("unknown identifier '{name}'"),
                Namespace::Type => format!("unknown type '{name}'"),
            },
        };
        Diagnostic::error(location.clone(), message)
    }

    /// Constructor information of a constructor definition.
    pub fn constructor(&self, definition: &FullIdentifier) -> Option<&ConstructorInfo> {
        self.constructors.get(definition)
    }

    /// Resolve a source type annotation written in `from`.
    ///
    /// Aliases are expanded; type parameters are kept as
    /// [`Type::Parameter`].
    pub fn resolve_type(
        &self,
        from: &QualifiedIdentifier,
        ty: &oak_parser::Type,
    ) -> Result<Type, Diagnostic> {
        self.resolve_type_in(from, ty, &mut Vec::new())
    }

    fn resolve_type_in(
        &self,
        from: &QualifiedIdentifier,
        ty: &oak_parser::Type,
        expanding: &mut Vec<FullIdentifier>,
    ) -> Result<Type, Diagnostic> {
        use oak_parser::Type as Declared;

        let resolve_all = |items: &[Declared], expanding: &mut Vec<FullIdentifier>| {
            items
                .iter()
                .map(|item| self.resolve_type_in(from, item, expanding))
                .collect::<Result<Vec<_>, _>>()
        };

        Ok(match ty {
            Declared::Func { params, ret, .. } => Type::Func {
                params: resolve_all(params, expanding)?,
                ret: Box::new(self.resolve_type_in(from, ret, expanding)?),
            },
            Declared::Record { fields, .. } => {
                let mut resolved = BTreeMap::new();
                for (name, field) in fields {
                    resolved.insert(name.clone(), self.resolve_type_in(from, field, expanding)?);
                }
                Type::Record {
                    fields: resolved,
                    row: None,
                }
            }
            Declared::Tuple { items, .. } => Type::Tuple(resolve_all(items, expanding)?),
            Declared::Unit { .. } => Type::unit(),
            Declared::Parameter { name, .. } => Type::Parameter(name.clone()),
            Declared::Native { name, args, .. } => Type::Native {
                name: name.clone(),
                args: resolve_all(args, expanding)?,
            },
            Declared::Data { name, args, .. } => Type::Data {
                name: name.clone(),
                args: resolve_all(args, expanding)?,
            },
            Declared::Named {
                name,
                args,
                location,
            } => {
                let full = match self.resolve_type_name(from, name) {
                    Resolution::Found(full) => full,
                    other => {
                        return Err(self.lookup_error(name, &other, Namespace::Type, location));
                    }
                };
                if expanding.contains(&full) {
                    return Err(Diagnostic::error(
                        location.clone(),
                        format!("recursive type alias '{name}'"),
                    ));
                }
                let module = full.module();
                let alias = self
                    .scopes
                    .get(&module)
                    .and_then(|s| s.module.alias(full.short_name()))
                    .ok_or_else(|| {
                        Diagnostic::error(location.clone(), format!("unknown type '{name}'"))
                    })?;
                if alias.params.len() != args.len() {
                    return Err(Diagnostic::error(
                        location.clone(),
                        format!(
                            "type '{}' expects {} argument(s) but {} given",
                            name,
                            alias.params.len(),
                            args.len()
                        ),
                    ));
                }
                let args = resolve_all(args, expanding)?;

                expanding.push(full);
                let body = self.resolve_type_in(&module, &alias.ty, expanding);
                expanding.pop();

                body?.substitute_parameters(&mut |param| {
                    alias
                        .params
                        .iter()
                        .position(|p| p == param)
                        .map(|i| args[i].clone())
                        .unwrap_or_else(|| Type::Parameter(param.clone()))
                })
            }
        })
    }

    /// Build the option table of every data type, resolving option value
    /// types in their declaring module.
    pub fn data_types(&self, diagnostics: &mut Diagnostics) -> DataTypeTable {
        let mut table = DataTypeTable::new();
        for scope in self.scopes.values() {
            let module = scope.module;
            for data in &module.data_types {
                let full = FullIdentifier::from_parts(&module.name, &data.name);
                let mut options = Vec::with_capacity(data.options.len());
                for option in &data.options {
                    let mut values = Vec::with_capacity(option.values.len());
                    for value in &option.values {
                        match self.resolve_type(&module.name, value) {
                            Ok(ty) => values.push(ty),
                            Err(diagnostic) => {
                                diagnostics.push(diagnostic);
                                values.push(Type::Parameter(Identifier::new("_")));
                            }
                        }
                    }
                    options.push(DataOptionInfo {
                        name: DataOptionIdentifier::from_parts(&full, &option.name),
                        values,
                        hidden: data.hidden || option.hidden,
                    });
                }
                table.insert(DataTypeInfo {
                    name: full,
                    params: data.params.clone(),
                    options,
                    hidden: data.hidden,
                    location: data.location.clone(),
                });
            }
        }
        table
    }
}

/// Own declarations of a module; duplicates are reported.
fn index_module<'m>(
    module: &'m Module,
    constructors: &mut FxHashMap<FullIdentifier, ConstructorInfo>,
    diagnostics: &mut Diagnostics,
) -> ModuleScope<'m> {
    let mut values: FxHashMap<Identifier, Symbol> = FxHashMap::default();
    let mut types: FxHashMap<Identifier, Symbol> = FxHashMap::default();
    let mut infix: FxHashMap<InfixIdentifier, &'m Infix> = FxHashMap::default();

    let mut declare = |table: &mut FxHashMap<Identifier, Symbol>,
                       name: &Identifier,
                       hidden: bool,
                       location: &Location,
                       what: &str| {
        if let Some(existing) = table.get(name) {
            diagnostics.push(
                Diagnostic::error(
                    location.clone(),
                    format!("{what} '{name}' is already defined in this module"),
                )
                .with_extra([existing.location.clone()]),
            );
            return;
        }
        table.insert(
            name.clone(),
            Symbol {
                full: FullIdentifier::from_parts(&module.name, name),
                hidden,
                location: location.clone(),
            },
        );
    };

    for definition in &module.definitions {
        declare(
            &mut values,
            &definition.name,
            definition.is_hidden(),
            &definition.location,
            "definition",
        );
    }
    for alias in &module.aliases {
        declare(&mut types, &alias.name, alias.hidden, &alias.location, "type");
    }

    for data in &module.data_types {
        let full = FullIdentifier::from_parts(&module.name, &data.name);
        for option in &data.options {
            constructors.insert(
                FullIdentifier::from_parts(&module.name, &option.name),
                ConstructorInfo {
                    option: DataOptionIdentifier::from_parts(&full, &option.name),
                    arity: option.values.len(),
                },
            );
        }
    }

    for declaration in &module.infix_fns {
        if infix.contains_key(&declaration.name) {
            diagnostics.error(
                declaration.location.clone(),
                format!("operator '{}' is already declared in this module", declaration.name),
            );
            continue;
        }
        if module.definition(&declaration.alias).is_none() {
            diagnostics.error(
                declaration.location.clone(),
                format!(
                    "operator '{}' refers to unknown definition '{}'",
                    declaration.name, declaration.alias
                ),
            );
        }
        infix.insert(declaration.name.clone(), declaration);
    }

    ModuleScope {
        module,
        values,
        types,
        infix,
        imports: ImportEnv::default(),
        prelude: ImportEnv::default(),
        visible: Vec::new(),
    }
}

/// Qualifiers under which an imported module's names are reachable.
fn import_prefixes(module: &QualifiedIdentifier, alias: Option<&Identifier>) -> Vec<String> {
    let mut prefixes = vec![module.to_string()];
    if let Some(alias) = alias {
        prefixes.push(alias.to_string());
    }
    if module.is_qualified() {
        prefixes.push(module.last_segment().to_string());
    }
    prefixes.dedup();
    prefixes
}

fn expose_module(
    target: &ModuleScope<'_>,
    prefixes: &[String],
    exposing: &Exposing,
    env: &mut ImportEnv,
    diagnostics: &mut Diagnostics,
) {
    let module = target.module;
    let mut bare: BTreeSet<(Namespace, Identifier)> = BTreeSet::new();

    match exposing {
        Exposing::Nothing => {}
        Exposing::All => {
            for (namespace, table) in [
                (Namespace::Value, &target.values),
                (Namespace::Type, &target.types),
            ] {
                for (name, symbol) in table {
                    if !symbol.hidden {
                        bare.insert((namespace, name.clone()));
                    }
                }
            }
            for (symbol, infix) in &target.infix {
                if !infix.hidden {
                    env.add_infix(symbol, &module.name);
                }
            }
        }
        Exposing::Names(names) => {
            for (name, location) in names {
                let mut found = false;
                if let Some(infix) = target.infix.get(name.as_str()).filter(|i| !i.hidden) {
                    env.add_infix(&infix.name, &module.name);
                    found = true;
                }
                if target.exported(Namespace::Value, name).is_some() {
                    bare.insert((Namespace::Value, name.clone()));
                    found = true;
                }
                if target.exported(Namespace::Type, name).is_some() {
                    bare.insert((Namespace::Type, name.clone()));
                    found = true;
                    if let Some(data) = module.data_type(name) {
                        for option in data.options.iter().filter(|o| !o.hidden) {
                            if target.exported(Namespace::Value, &option.name).is_some() {
                                bare.insert((Namespace::Value, option.name.clone()));
                            }
                        }
                    }
                }
                if !found {
                    diagnostics.error(
                        location.clone(),
                        format!("module '{}' does not expose '{}'", module.name, name),
                    );
                }
            }
        }
    }

    for (namespace, table) in [
        (Namespace::Value, &target.values),
        (Namespace::Type, &target.types),
    ] {
        for (name, symbol) in table.iter().filter(|(_, s)| !s.hidden) {
            for prefix in prefixes {
                env.add(namespace, format!("{prefix}.{name}"), &symbol.full);
            }
        }
    }
    for (namespace, name) in bare {
        if let Some(symbol) = target.own(namespace).get(&name) {
            env.add(namespace, name.to_string(), &symbol.full);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oak_core::SourceFile;

    fn modules(sources: &[&str]) -> Vec<Module> {
        sources
            .iter()
            .enumerate()
            .map(|(i, source)| {
                let file = SourceFile::new(format!("m{i}.oak"), *source);
                let mut module =
                    oak_parser::parse_module(&file, PackageIdentifier::new("main")).unwrap();
                crate::flatten::flatten_data_types(&mut module);
                module
            })
            .collect()
    }

    fn found(name: &str) -> Resolution {
        Resolution::Found(FullIdentifier::new(name))
    }

    #[test]
    fn own_definitions_win() {
        let modules = modules(&[
            "module A\ndef helper = 1\n",
            "module B\nimport A exposing (*)\ndef helper = 2\n",
        ]);
        let mut diagnostics = Diagnostics::new();
        let resolver = Resolver::new(&modules, &mut diagnostics);
        assert!(diagnostics.is_empty());
        let b = QualifiedIdentifier::new("B");
        assert_eq!(resolver.resolve_value(&b, "helper"), found("B.helper"));
        assert_eq!(resolver.resolve_value(&b, "A.helper"), found("A.helper"));
    }

    #[test]
    fn ambiguous_imports_list_sorted_candidates() {
        let modules = modules(&[
            "module B\ndef helper = 1\n",
            "module A\ndef helper = 2\n",
            "module C\nimport A exposing (*)\nimport B exposing (*)\ndef x = 1\n",
        ]);
        let mut diagnostics = Diagnostics::new();
        let resolver = Resolver::new(&modules, &mut diagnostics);
        let resolution = resolver.resolve_value(&QualifiedIdentifier::new("C"), "helper");
        assert_eq!(
            resolution,
            Resolution::Ambiguous(vec![
                FullIdentifier::new("A.helper"),
                FullIdentifier::new("B.helper")
            ])
        );
        let location = Location::file_start(SourceFile::new("x", ""));
        let error = resolver.lookup_error("helper", &resolution, Namespace::Value, &location);
        assert_eq!(
            error.message,
            "ambiguous identifier 'helper', it can be one of A.helper, B.helper"
        );
    }

    #[test]
    fn aliases_and_tails_qualify_names() {
        let modules = modules(&[
            "module Data.Dict\ndef empty = 1\ndef hidden secret = 2\n",
            "module Main\nimport Data.Dict as D\ndef x = 1\n",
        ]);
        let mut diagnostics = Diagnostics::new();
        let resolver = Resolver::new(&modules, &mut diagnostics);
        let main = QualifiedIdentifier::new("Main");
        assert_eq!(resolver.resolve_value(&main, "D.empty"), found("Data.Dict.empty"));
        assert_eq!(resolver.resolve_value(&main, "Dict.empty"), found("Data.Dict.empty"));
        assert_eq!(
            resolver.resolve_value(&main, "Data.Dict.empty"),
            found("Data.Dict.empty")
        );
        assert_eq!(resolver.resolve_value(&main, "D.secret"), Resolution::NotFound);
        assert_eq!(resolver.resolve_value(&main, "secret"), Resolution::NotFound);
    }

    #[test]
    fn exposing_a_data_type_exposes_visible_options() {
        let modules = modules(&[
            "module Shapes\ntype Shape = Circle(Float) | hidden Secret\n",
            "module Main\nimport Shapes exposing (Shape)\ndef x = 1\n",
        ]);
        let mut diagnostics = Diagnostics::new();
        let resolver = Resolver::new(&modules, &mut diagnostics);
        assert!(diagnostics.is_empty());
        let main = QualifiedIdentifier::new("Main");
        assert_eq!(resolver.resolve_type_name(&main, "Shape"), found("Shapes.Shape"));
        assert_eq!(resolver.resolve_value(&main, "Circle"), found("Shapes.Circle"));
        assert_eq!(resolver.resolve_value(&main, "Secret"), Resolution::NotFound);
        let info = resolver.constructor(&FullIdentifier::new("Shapes.Circle")).unwrap();
        assert_eq!(info.option.as_str(), "Shapes.Shape#Circle");
        assert_eq!(info.arity, 1);
    }

    #[test]
    fn import_errors_are_reported() {
        let modules = modules(&[
            "module A\ndef hidden h = 1\n",
            "module B\nimport Missing\nimport A exposing (h)\ndef x = 1\n",
        ]);
        let mut diagnostics = Diagnostics::new();
        Resolver::new(&modules, &mut diagnostics);
        let messages: Vec<_> = diagnostics.iter().map(|d| d.message.clone()).collect();
        assert_eq!(
            messages,
            vec![
                "unknown module 'Missing'".to_string(),
                "module 'A' does not expose 'h'".to_string()
            ]
        );
    }

    #[test]
    fn duplicate_definitions_are_reported() {
        let modules = modules(&["module A\ndef x = 1\ndef x = 2\n"]);
        let mut diagnostics = Diagnostics::new();
        Resolver::new(&modules, &mut diagnostics);
        assert_eq!(diagnostics.len(), 1);
        let diagnostic = diagnostics.iter().next().unwrap();
        assert_eq!(diagnostic.extra.len(), 1);
        assert!(diagnostic.message.contains("already defined"));
    }

    #[test]
    fn aliases_expand_with_arguments() {
        let modules = modules(&[
            "module A\nalias native Int\nalias Pair[a] = (a, a)\nalias Loop = Loop\ndef x = 1\n",
        ]);
        let mut diagnostics = Diagnostics::new();
        let resolver = Resolver::new(&modules, &mut diagnostics);
        let a = QualifiedIdentifier::new("A");
        let file = SourceFile::new("t.oak", "module T\ndef y: Pair[Int] = 1\ndef z: Loop = 1\n");
        let parsed = oak_parser::parse_module(&file, PackageIdentifier::new("main")).unwrap();

        let pair = parsed.definition("y").unwrap().return_type.clone().unwrap();
        let resolved = resolver.resolve_type(&a, &pair).unwrap();
        assert_eq!(resolved, Type::Tuple(vec![Type::native("A.Int"), Type::native("A.Int")]));

        let recursive = parsed.definition("z").unwrap().return_type.clone().unwrap();
        let error = resolver.resolve_type(&a, &recursive).unwrap_err();
        assert_eq!(error.message, "recursive type alias 'Loop'");
    }

    #[test]
    fn operators_resolve_through_imports() {
        let modules = modules(&[
            "module Ops\ninfix (<+>): (left 5) = combine\ndef combine(a, b) = a\n",
            "module Main\nimport Ops exposing ((<+>))\ndef x = 1\n",
        ]);
        let mut diagnostics = Diagnostics::new();
        let resolver = Resolver::new(&modules, &mut diagnostics);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let location = Location::file_start(SourceFile::new("x", ""));
        let op = resolver
            .resolve_operator(
                &QualifiedIdentifier::new("Main"),
                &InfixIdentifier::new("<+>"),
                &location,
            )
            .unwrap();
        assert_eq!(op.target.as_str(), "Ops.combine");
        assert_eq!(op.associativity, Associativity::Left);
        assert_eq!(op.precedence, 5);
    }
}
