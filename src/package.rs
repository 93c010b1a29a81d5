//! Package manifests, module discovery and package loading.
//!
//! A package is a directory holding an `oak.json` manifest and a `src/`
//! tree of `.oak` files. The module name of a file is its path relative to
//! `src/` without the extension, with `/` replaced by `.`:
//!
//! ```text
//! geometry/
//! ├── oak.json
//! └── src/
//!     ├── Geometry.oak         -> Geometry
//!     └── Geometry/
//!         └── Shapes.oak       -> Geometry.Shapes
//! ```
//!
//! Dependencies are local paths (relative to the depending package) or Git
//! URLs, which are cloned once into the cache directory.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use xxhash_rust::xxh64::xxh64;

use oak_compiler::PackageSource;
use oak_core::{OakError, PackageIdentifier, Result};

/// File name of a package manifest.
pub const MANIFEST_FILE: &str = "oak.json";

/// Directory holding a package's modules.
pub const SOURCE_DIR: &str = "src";

/// Extension of module files.
pub const SOURCE_EXTENSION: &str = "oak";

/// Contents of `oak.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    /// Compiler versions this package accepts, e.g. `"0.1"`.
    #[serde(rename = "oak-version")]
    pub oak_version: String,
    /// Local paths or Git URLs.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Full identifier of the entry definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
}

impl Manifest {
    /// Parse a manifest from JSON text.
    pub fn parse(text: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(text)
            .map_err(|e| OakError::system(format!("invalid manifest: {e}")))?;
        if manifest.name.is_empty() {
            return Err(OakError::system("invalid manifest: package name is empty"));
        }
        Ok(manifest)
    }

    /// Read `oak.json` from a package directory.
    pub fn read(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let text = fs::read_to_string(&path)
            .map_err(|e| OakError::system(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&text).map_err(|e| OakError::system(format!("{}: {e}", path.display())))
    }

    /// Whether this package accepts compiler version `major.minor`.
    ///
    /// The constraint is a `major` or `major.minor` prefix; an empty
    /// constraint or `*` accepts everything.
    pub fn accepts_compiler(&self, major: u16, minor: u16) -> bool {
        let constraint = self.oak_version.trim();
        if constraint.is_empty() || constraint == "*" {
            return true;
        }
        let mut parts = constraint.split('.');
        let wanted_major = parts.next().and_then(|p| p.parse::<u16>().ok());
        let wanted_minor = parts.next().and_then(|p| p.parse::<u16>().ok());
        match (wanted_major, wanted_minor) {
            (Some(a), Some(b)) => a == major && b == minor,
            (Some(a), None) => a == major,
            _ => false,
        }
    }
}

/// Module name of `path` relative to a package's `src/` directory.
///
/// Returns `None` for files outside `src_root` or without the `.oak`
/// extension.
pub fn module_name(src_root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(src_root).ok()?;
    if relative.extension()? != SOURCE_EXTENSION {
        return None;
    }
    let stem = relative.with_extension("");
    let segments: Vec<&str> = stem
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    (!segments.is_empty()).then(|| segments.join("."))
}

/// Every module file under `src_root`, sorted by module name.
pub fn discover_modules(src_root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut found = Vec::new();
    let mut pending = vec![src_root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = fs::read_dir(&dir)
            .map_err(|e| OakError::system(format!("cannot list {}: {e}", dir.display())))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if let Some(name) = module_name(src_root, &path) {
                found.push((name, path));
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Whether a dependency string names a remote Git repository.
pub fn is_remote(location: &str) -> bool {
    ["https://", "http://", "git://", "ssh://", "git@"]
        .iter()
        .any(|prefix| location.starts_with(prefix))
}

/// Directory a remote package is cloned into.
pub fn cache_path(cache_dir: &Path, url: &str) -> PathBuf {
    let trimmed = url.trim_end_matches('/').trim_end_matches(".git");
    let tail: String = trimmed
        .rsplit(['/', ':'])
        .next()
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    cache_dir.join(format!("{tail}-{:016x}", xxh64(url.as_bytes(), 0)))
}

/// A package read from disk.
#[derive(Debug, Clone)]
pub struct LoadedPackage {
    pub manifest: Manifest,
    pub root: PathBuf,
    /// Identifiers of the direct dependencies.
    pub dependencies: Vec<PackageIdentifier>,
    /// Module name and path of every source file.
    pub modules: Vec<(String, PathBuf)>,
}

/// Loads packages and their dependencies.
#[derive(Debug)]
pub struct PackageLoader {
    cache_dir: PathBuf,
    packages: BTreeMap<PackageIdentifier, LoadedPackage>,
    /// Canonical root of every loaded package.
    roots: BTreeMap<PathBuf, PackageIdentifier>,
}

impl PackageLoader {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            packages: BTreeMap::new(),
            roots: BTreeMap::new(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn package(&self, name: &str) -> Option<&LoadedPackage> {
        self.packages.get(name)
    }

    pub fn packages(&self) -> impl Iterator<Item = &LoadedPackage> {
        self.packages.values()
    }

    /// Load the package at a local path or Git URL, with its dependencies.
    ///
    /// Relative paths are resolved against `base`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn load(&mut self, location: &str, base: &Path) -> Result<PackageIdentifier> {
        let dir = if is_remote(location) {
            self.fetch(location)?
        } else {
            base.join(location)
        };
        let root = dir
            .canonicalize()
            .map_err(|e| OakError::system(format!("cannot open package {location}: {e}")))?;
        if let Some(name) = self.roots.get(&root) {
            return Ok(name.clone());
        }

        let manifest = Manifest::read(&root)?;
        let name = PackageIdentifier::new(manifest.name.clone());
        if let Some(existing) = self.packages.get(&name) {
            return Err(OakError::system(format!(
                "package '{name}' is defined both in {} and {}",
                existing.root.display(),
                root.display()
            )));
        }
        let (major, minor) = oak_compiler::bytecode::COMPILER_VERSION;
        if !manifest.accepts_compiler(major, minor) {
            return Err(OakError::system(format!(
                "package '{name}' requires oak {}, this is {major}.{minor}",
                manifest.oak_version
            )));
        }
        self.roots.insert(root.clone(), name.clone());

        let modules = discover_modules(&root.join(SOURCE_DIR))?;
        info!(package = %name, modules = modules.len(), "loaded package");

        let mut dependencies = Vec::with_capacity(manifest.dependencies.len());
        for dependency in &manifest.dependencies {
            dependencies.push(self.load(dependency, &root)?);
        }

        self.packages.insert(
            name.clone(),
            LoadedPackage {
                manifest,
                root,
                dependencies,
                modules,
            },
        );
        Ok(name)
    }

    /// Clone `url` into the cache unless it is already there.
    fn fetch(&self, url: &str) -> Result<PathBuf> {
        let target = cache_path(&self.cache_dir, url);
        if target.join(MANIFEST_FILE).is_file() {
            debug!(url, path = %target.display(), "package already cached");
            return Ok(target);
        }
        fs::create_dir_all(&self.cache_dir).map_err(|e| {
            OakError::system(format!("cannot create {}: {e}", self.cache_dir.display()))
        })?;

        info!(url, path = %target.display(), "cloning package");
        let output = Command::new("git")
            .args(["clone", "--depth", "1", "--quiet", url])
            .arg(&target)
            .output()
            .map_err(|e| OakError::system(format!("cannot run git: {e}")))?;
        if !output.status.success() {
            return Err(OakError::system(format!(
                "git clone of {url} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(target)
    }

    /// Every loaded package as compiler input, each carrying the closure of
    /// its dependencies.
    ///
    /// `overrides` replaces the content of files by path.
    pub fn sources(&self, overrides: &BTreeMap<PathBuf, Arc<str>>) -> Result<Vec<PackageSource>> {
        let mut sources = Vec::with_capacity(self.packages.len());
        for (name, package) in &self.packages {
            let mut source = PackageSource::new(name.clone());
            source.dependencies = self.dependency_closure(name);
            for (module, path) in &package.modules {
                let content = match overrides.get(path) {
                    Some(text) => text.clone(),
                    None => fs::read_to_string(path)
                        .map_err(|e| {
                            OakError::system(format!("cannot read {}: {e}", path.display()))
                        })?
                        .into(),
                };
                source = source.with_module(module, path.display().to_string(), content);
            }
            sources.push(source);
        }
        Ok(sources)
    }

    fn dependency_closure(&self, name: &PackageIdentifier) -> BTreeSet<PackageIdentifier> {
        let mut closure = BTreeSet::new();
        let mut pending = vec![name.clone()];
        while let Some(next) = pending.pop() {
            let Some(package) = self.packages.get(&next) else {
                continue;
            };
            for dependency in &package.dependencies {
                if closure.insert(dependency.clone()) {
                    pending.push(dependency.clone());
                }
            }
        }
        closure.remove(name);
        closure
    }
}
