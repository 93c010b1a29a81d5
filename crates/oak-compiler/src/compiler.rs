//! The compilation pipeline.
//!
//! [`Compiler::compile`] runs every stage over a set of packages:
//!
//! 1. parse each module (cached by path and content)
//! 2. flatten data types into aliases and constructors
//! 3. resolve imports and build the data-type table
//! 4. normalize and lift closures
//! 5. annotate and solve types
//! 6. check pattern exhaustiveness and redundancy
//! 7. emit and link, only when no error was reported
//!
//! The built-in `Oak.Base` prelude is compiled into every program.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};
use xxhash_rust::xxh64::xxh64;

use oak_core::{
    Diagnostic, Diagnostics, FullIdentifier, PackageIdentifier, ParseError, QualifiedIdentifier,
    Result, SourceFile,
};
use oak_parser::parse_module;

use crate::bytecode::Binary;
use crate::flatten::flatten_data_types;
use crate::lift::lift_module;
use crate::link::link_program;
use crate::normalize::normalize_module;
use crate::normalized::{self, IdGenerator};
use crate::patterns::check_module;
use crate::resolve::Resolver;
use crate::solve::solve_program;
use crate::types::{DataTypeTable, Type, names};

/// Source of the built-in prelude.
pub const PRELUDE_SOURCE: &str = include_str!("prelude/Base.oak");

/// Path the prelude is reported under.
pub const PRELUDE_PATH: &str = "oak-base/src/Oak/Base.oak";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Export hidden definitions and write per-op locations.
    pub debug: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { debug: true }
    }
}

/// One module file to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    /// Expected module name, derived from the file's path in its package.
    pub name: QualifiedIdentifier,
    pub path: String,
    pub content: Arc<str>,
}

/// A package and its module files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSource {
    pub name: PackageIdentifier,
    /// Packages this one references, transitively.
    pub dependencies: BTreeSet<PackageIdentifier>,
    pub modules: Vec<ModuleSource>,
}

impl PackageSource {
    pub fn new(name: impl Into<PackageIdentifier>) -> Self {
        Self {
            name: name.into(),
            dependencies: BTreeSet::new(),
            modules: Vec::new(),
        }
    }

    /// Add a module file.
    pub fn with_module(
        mut self,
        name: &str,
        path: impl Into<String>,
        content: impl Into<Arc<str>>,
    ) -> Self {
        self.modules.push(ModuleSource {
            name: QualifiedIdentifier::new(name),
            path: path.into(),
            content: content.into(),
        });
        self
    }

    /// The built-in prelude package.
    pub fn prelude() -> Self {
        PackageSource::new(names::BASE_PACKAGE).with_module(
            names::BASE_MODULE,
            PRELUDE_PATH,
            PRELUDE_SOURCE,
        )
    }
}

/// Result of one pipeline run.
#[derive(Debug)]
pub struct Compilation {
    /// The linked program, present only when no error was reported.
    pub binary: Option<Binary>,
    /// Every diagnostic, sorted by file and position.
    pub diagnostics: Diagnostics,
    /// Solved types of the source-level definitions.
    pub types: BTreeMap<FullIdentifier, Type>,
    /// Path of every module file that took part.
    pub paths: Vec<String>,
}

impl Compilation {
    pub fn is_success(&self) -> bool {
        self.binary.is_some()
    }

    /// Display string of a definition's type.
    pub fn type_of(&self, name: &str) -> Option<String> {
        self.types.get(name).map(Type::to_string)
    }
}

struct CachedModule {
    package: PackageIdentifier,
    hash: u64,
    parsed: std::result::Result<oak_parser::Module, ParseError>,
}

/// Runs the pipeline, keeping parsed modules between runs.
#[derive(Default)]
pub struct Compiler {
    options: CompileOptions,
    cache: FxHashMap<String, CachedModule>,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            cache: FxHashMap::default(),
        }
    }

    pub fn options(&self) -> CompileOptions {
        self.options
    }

    /// Drop the cached parse of `path`.
    pub fn invalidate(&mut self, path: &str) {
        if self.cache.remove(path).is_some() {
            trace!(path, "invalidated cached module");
        }
    }

    fn parse(
        &mut self,
        source: &ModuleSource,
        package: &PackageIdentifier,
    ) -> std::result::Result<oak_parser::Module, ParseError> {
        let hash = xxh64(source.content.as_bytes(), 0);
        if let Some(cached) = self.cache.get(&source.path)
            && cached.hash == hash
            && cached.package == *package
        {
            trace!(path = %source.path, "parse cache hit");
            return cached.parsed.clone();
        }

        let file = SourceFile::new(source.path.clone(), source.content.clone());
        let parsed = parse_module(&file, package.clone());
        debug!(path = %source.path, ok = parsed.is_ok(), "parsed module");
        self.cache.insert(
            source.path.clone(),
            CachedModule {
                package: package.clone(),
                hash,
                parsed: parsed.clone(),
            },
        );
        parsed
    }

    /// Compile `packages` together with the prelude.
    ///
    /// User errors end up in [`Compilation::diagnostics`]; only system
    /// failures and compiler bugs are returned as `Err`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile(&mut self, packages: &[PackageSource]) -> Result<Compilation> {
        let mut diagnostics = Diagnostics::new();
        let mut parsed = Vec::new();
        let mut paths = Vec::new();
        let mut seen: FxHashMap<QualifiedIdentifier, String> = FxHashMap::default();

        let prelude = PackageSource::prelude();
        let all = std::iter::once(&prelude)
            .chain(packages.iter().filter(|p| p.name.as_str() != names::BASE_PACKAGE));
        for package in all {
            for source in &package.modules {
                paths.push(source.path.clone());
                let mut module = match self.parse(source, &package.name) {
                    Ok(module) => module,
                    Err(err) => {
                        diagnostics.push(err.to_diagnostic());
                        continue;
                    }
                };
                if module.name != source.name {
                    diagnostics.push(Diagnostic::error(
                        module.location.clone(),
                        format!(
                            "module '{}' should be named '{}' to match its path",
                            module.name, source.name
                        ),
                    ));
                    continue;
                }
                if let Some(previous) = seen.insert(module.name.clone(), source.path.clone()) {
                    diagnostics.push(Diagnostic::error(
                        module.location.clone(),
                        format!("module '{}' is already defined in {previous}", module.name),
                    ));
                    continue;
                }
                module.referenced_packages = package.dependencies.clone();
                parsed.push(module);
            }
        }

        let (modules, data_types) = front_end(parsed, &mut diagnostics);
        let typed = solve_program(modules, &data_types, &mut diagnostics);
        for module in &typed {
            check_module(module, &data_types, &mut diagnostics);
        }

        let types = typed
            .iter()
            .flat_map(|m| &m.definitions)
            .filter(|d| !d.is_lifted())
            .map(|d| (d.name.clone(), d.ty.clone()))
            .collect();

        let binary = if diagnostics.has_errors() {
            None
        } else {
            let binary = link_program(&typed, self.options.debug, &mut diagnostics)?;
            (!diagnostics.has_errors()).then_some(binary)
        };

        diagnostics.sort();
        debug!(
            modules = typed.len(),
            diagnostics = diagnostics.len(),
            linked = binary.is_some(),
            "compilation finished"
        );
        Ok(Compilation {
            binary,
            diagnostics,
            types,
            paths,
        })
    }
}

/// Flatten, resolve, normalize and lift parsed modules.
fn front_end(
    mut parsed: Vec<oak_parser::Module>,
    diagnostics: &mut Diagnostics,
) -> (Vec<normalized::Module>, DataTypeTable) {
    for module in &mut parsed {
        flatten_data_types(module);
    }
    let resolver = Resolver::new(&parsed, diagnostics);
    let data_types = resolver.data_types(diagnostics);

    let mut ids = IdGenerator::new();
    let mut modules = Vec::with_capacity(parsed.len());
    for module in &parsed {
        let mut normalized = normalize_module(module, &resolver, &mut ids, diagnostics);
        lift_module(&mut normalized, &mut ids);
        modules.push(normalized);
    }
    (modules, data_types)
}

/// Run the front end over the prelude plus one `main` package module read
/// from `M.oak`. Modules come back prelude first.
#[cfg(test)]
pub(crate) fn front_end_for_tests(
    source: &str,
) -> (Vec<normalized::Module>, DataTypeTable, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let base = SourceFile::new(PRELUDE_PATH, PRELUDE_SOURCE);
    let user = SourceFile::new("M.oak", source);
    let parsed = vec![
        parse_module(&base, PackageIdentifier::new(names::BASE_PACKAGE)).unwrap(),
        parse_module(&user, PackageIdentifier::new("main")).unwrap(),
    ];
    let (modules, data_types) = front_end(parsed, &mut diagnostics);
    (modules, data_types, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn main_package(modules: &[(&str, &str)]) -> PackageSource {
        modules.iter().fold(PackageSource::new("main"), |package, (name, source)| {
            package.with_module(name, format!("main/src/{}.oak", name.replace('.', "/")), *source)
        })
    }

    #[test]
    fn prelude_compiles_cleanly() {
        let compilation = Compiler::default().compile(&[]).unwrap();
        assert!(compilation.diagnostics.is_empty(), "{:?}", compilation.diagnostics);
        let binary = compilation.binary.as_ref().unwrap();
        assert!(binary.export("Oak.Base.add").is_some());
        assert_eq!(
            compilation.type_of("Oak.Base.identity").as_deref(),
            Some("(a): a")
        );
    }

    #[test]
    fn arithmetic_program_links() {
        let package = main_package(&[("M", "module M\ndef add(a, b) = a + b\ndef r = add(2, 3)\n")]);
        let compilation = Compiler::default().compile(&[package]).unwrap();
        assert!(compilation.is_success());
        assert_eq!(compilation.type_of("M.r").as_deref(), Some("Int"));
        assert!(compilation.paths.contains(&"main/src/M.oak".to_string()));
    }

    #[test]
    fn errors_suppress_the_binary() {
        let package = main_package(&[("M", "module M\ndef x = 1 + \"a\"\n")]);
        let compilation = Compiler::default().compile(&[package]).unwrap();
        assert!(compilation.binary.is_none());
        assert!(compilation.diagnostics.has_errors());
    }

    #[test]
    fn parse_errors_exclude_only_their_module() {
        let package = main_package(&[
            ("A", "module A\ndef = \n"),
            ("B", "module B\ndef ok = 1\n"),
        ]);
        let compilation = Compiler::default().compile(&[package]).unwrap();
        let errors: Vec<_> = compilation.diagnostics.iter().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].location.path(), "main/src/A.oak");
        assert_eq!(compilation.type_of("B.ok").as_deref(), Some("Int"));
    }

    #[test]
    fn module_names_must_match_paths() {
        let package = PackageSource::new("main").with_module("M", "main/src/M.oak", "module N\n");
        let compilation = Compiler::default().compile(&[package]).unwrap();
        assert_eq!(
            compilation.diagnostics.iter().next().unwrap().message,
            "module 'N' should be named 'M' to match its path"
        );
    }

    #[test]
    fn parse_cache_follows_content() {
        let mut compiler = Compiler::default();
        let first = main_package(&[("M", "module M\ndef x = 1\n")]);
        assert!(compiler.compile(&[first.clone()]).unwrap().is_success());
        assert!(compiler.cache.contains_key("main/src/M.oak"));

        let changed = main_package(&[("M", "module M\ndef x = \"s\"\n")]);
        let compilation = compiler.compile(&[changed]).unwrap();
        assert_eq!(compilation.type_of("M.x").as_deref(), Some("String"));

        compiler.invalidate("main/src/M.oak");
        assert!(!compiler.cache.contains_key("main/src/M.oak"));
    }

    #[test]
    fn release_builds_hide_hidden_definitions() {
        let package = main_package(&[("M", "module M\ndef hidden h = 1\ndef x = h\n")]);
        let mut compiler = Compiler::new(CompileOptions { debug: false });
        let binary = compiler.compile(&[package]).unwrap().binary.unwrap();
        assert!(binary.export("M.x").is_some());
        assert!(binary.export("M.h").is_none());
        assert!(binary.funcs.iter().all(|f| f.locations.is_empty()));
    }
}
