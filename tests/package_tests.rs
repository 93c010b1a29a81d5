//! Package loading from real directories.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use oak::cli::{self, Options};
use oak::package::{Manifest, PackageLoader, discover_modules};
use oak_compiler::{Compiler, PackageSource};

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("oak-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn package(root: &Path, name: &str, dependencies: &[&str], main: Option<&str>) -> PathBuf {
    let dir = root.join(name);
    let manifest = Manifest {
        name: name.to_string(),
        version: "0.1.0".to_string(),
        oak_version: "0.1".to_string(),
        dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
        main: main.map(str::to_string),
    };
    write(&dir.join("oak.json"), &serde_json::to_string_pretty(&manifest).unwrap());
    dir
}

#[test]
fn nested_modules_are_discovered() {
    let root = scratch("discover");
    let dir = package(&root, "app", &[], None);
    write(&dir.join("src/App.oak"), "module App\n");
    write(&dir.join("src/App/Util.oak"), "module App.Util\n");
    write(&dir.join("src/notes.txt"), "not a module");

    let modules: Vec<String> = discover_modules(&dir.join("src"))
        .unwrap()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(modules, vec!["App", "App.Util"]);
}

#[test]
fn dependencies_load_transitively() {
    let root = scratch("transitive");
    let units = package(&root, "units", &[], None);
    write(&units.join("src/Units.oak"), "module Units\ndef scale = 10\n");
    let geometry = package(&root, "geometry", &["../units"], None);
    write(
        &geometry.join("src/Geometry.oak"),
        "module Geometry\nimport Units\ndef size(n) = n * Units.scale\n",
    );
    let app = package(&root, "app", &["../geometry"], Some("App.main"));
    write(
        &app.join("src/App.oak"),
        "module App\nimport Geometry exposing (size)\nimport Units\ndef main = size(Units.scale)\n",
    );

    let mut loader = PackageLoader::new(root.join("cache"));
    let name = loader.load("app", &root).unwrap();
    assert_eq!(name.as_str(), "app");
    assert_eq!(loader.packages().count(), 3);

    let sources = loader.sources(&BTreeMap::new()).unwrap();
    let app_source = sources.iter().find(|p| p.name.as_str() == "app").unwrap();
    let closure: Vec<&str> = app_source.dependencies.iter().map(|d| d.as_str()).collect();
    assert_eq!(closure, vec!["geometry", "units"]);

    let compilation = Compiler::default().compile(&sources).unwrap();
    assert!(compilation.is_success(), "{:?}", compilation.diagnostics);
    assert_eq!(compilation.type_of("App.main").as_deref(), Some("Int"));
}

#[test]
fn undeclared_packages_cannot_be_imported() {
    let root = scratch("undeclared");
    let other = package(&root, "other", &[], None);
    write(&other.join("src/Other.oak"), "module Other\ndef x = 1\n");
    let app = package(&root, "app", &[], None);
    write(&app.join("src/App.oak"), "module App\nimport Other\ndef y = Other.x\n");

    let mut loader = PackageLoader::new(root.join("cache"));
    loader.load("app", &root).unwrap();
    loader.load("other", &root).unwrap();
    let sources = loader.sources(&BTreeMap::new()).unwrap();
    let compilation = Compiler::default().compile(&sources).unwrap();

    let messages: Vec<&str> = compilation.diagnostics.iter().map(|d| d.message.as_str()).collect();
    assert!(messages.contains(&"unknown module 'Other'"), "{messages:?}");
}

#[test]
fn overrides_replace_file_content() {
    let root = scratch("overrides");
    let app = package(&root, "app", &[], None);
    let file = app.join("src/App.oak");
    write(&file, "module App\ndef x = broken\n");

    let mut loader = PackageLoader::new(root.join("cache"));
    loader.load("app", &root).unwrap();
    let canonical = file.canonicalize().unwrap();
    let overrides = BTreeMap::from([(canonical, Arc::<str>::from("module App\ndef x = 1\n"))]);
    let sources = loader.sources(&overrides).unwrap();

    let compilation = Compiler::default().compile(&sources).unwrap();
    assert!(compilation.is_success(), "{:?}", compilation.diagnostics);
}

#[test]
fn broken_packages_are_system_errors() {
    let root = scratch("broken");
    fs::create_dir_all(root.join("empty")).unwrap();
    let mut loader = PackageLoader::new(root.join("cache"));
    let err = loader.load("empty", &root).unwrap_err();
    assert!(err.to_string().contains("oak.json"), "{err}");

    let future = package(&root, "future", &[], None);
    let mut manifest = Manifest::read(&future).unwrap();
    manifest.oak_version = "9.0".into();
    write(&future.join("oak.json"), &serde_json::to_string(&manifest).unwrap());
    fs::create_dir_all(future.join("src")).unwrap();
    let err = loader.load("future", &root).unwrap_err();
    assert_eq!(err.to_string(), "package 'future' requires oak 9.0, this is 0.1");

    let first = package(&root.join("a"), "twin", &[], None);
    let second = package(&root.join("b"), "twin", &[], None);
    fs::create_dir_all(first.join("src")).unwrap();
    fs::create_dir_all(second.join("src")).unwrap();
    loader.load("a/twin", &root).unwrap();
    let err = loader.load("b/twin", &root).unwrap_err();
    assert!(err.to_string().starts_with("package 'twin' is defined both in"), "{err}");
}

#[test]
fn build_checks_the_entry_point() {
    let root = scratch("entry");
    let app = package(&root, "app", &[], Some("App.start"));
    write(&app.join("src/App.oak"), "module App\ndef main = 1\n");

    let options = Options::parse(
        ["app".to_string(), "--cache".to_string(), root.join("cache").display().to_string()],
        None,
    )
    .unwrap();
    let err = cli::build(&options, &root).unwrap_err();
    assert_eq!(err.to_string(), "entry point 'App.start' is not defined");
}

#[test]
fn test_scripts_compile_together() {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_scripts");
    let mut scripts = PackageSource::new("scripts");
    for (name, path) in discover_modules(&dir).unwrap() {
        let content = fs::read_to_string(&path).unwrap();
        scripts = scripts.with_module(&name, path.display().to_string(), content);
    }
    assert_eq!(scripts.modules.len(), 4);

    let compilation = Compiler::default().compile(&[scripts]).unwrap();
    assert!(compilation.is_success(), "{:?}", compilation.diagnostics);
    assert_eq!(compilation.type_of("Hello.main").as_deref(), Some("String"));
    assert_eq!(compilation.type_of("Shapes.totalArea").as_deref(), Some("Float"));
    assert_eq!(compilation.type_of("Lists.total").as_deref(), Some("Int"));
    assert_eq!(compilation.type_of("Records.twice").as_deref(), Some("Int"));
}
