//! Command-line options and the batch build.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use thiserror::Error;
use tracing::{debug, info};

use oak_compiler::{CompileOptions, Compilation, Compiler};
use oak_core::{OakError, Result};

use crate::package::PackageLoader;

pub const USAGE: &str = "\
usage: oak [options] <package>...
       oak --lsp [--tcp <port>] [--cache <dir>]

options:
  --out <path>     output binary (default out.oakb)
  --cache <dir>    package cache (default $HOME/.oak)
  --release        strip debug symbols and hidden definitions
  --lsp            run the language server on stdio
  --tcp <port>     serve the language server on a TCP port
  --run            run the binary after a successful build
  -h, --help       show this message

environment:
  OAK_LOG          log filter (default warn)
  OAK_RUNTIME      runtime used by --run (default oak-vm)";

/// Default output file.
pub const DEFAULT_OUT: &str = "out.oakb";

/// Default runtime executable.
pub const DEFAULT_RUNTIME: &str = "oak-vm";

/// Invalid command lines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("help requested")]
    Help,

    #[error("missing value for {0}")]
    MissingValue(&'static str),

    #[error("invalid port '{0}'")]
    InvalidPort(String),

    #[error("unknown option '{0}'")]
    UnknownOption(String),

    #[error("no package to compile")]
    NoPackages,

    #[error("--tcp requires --lsp")]
    TcpWithoutLsp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Package paths or Git URLs.
    pub packages: Vec<String>,
    pub out: PathBuf,
    pub cache: PathBuf,
    pub release: bool,
    pub lsp: bool,
    pub tcp: Option<u16>,
    pub run: bool,
}

impl Options {
    /// Parse arguments, without the program name.
    ///
    /// `home` provides the default cache directory.
    pub fn parse<I>(args: I, home: Option<&Path>) -> std::result::Result<Self, UsageError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = Options {
            packages: Vec::new(),
            out: PathBuf::from(DEFAULT_OUT),
            cache: home.unwrap_or(Path::new(".")).join(".oak"),
            release: false,
            lsp: false,
            tcp: None,
            run: false,
        };

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--out" => {
                    let value = args.next().ok_or(UsageError::MissingValue("--out"))?;
                    options.out = PathBuf::from(value);
                }
                "--cache" => {
                    let value = args.next().ok_or(UsageError::MissingValue("--cache"))?;
                    options.cache = PathBuf::from(value);
                }
                "--tcp" => {
                    let value = args.next().ok_or(UsageError::MissingValue("--tcp"))?;
                    let port = value.parse().map_err(|_| UsageError::InvalidPort(value))?;
                    options.tcp = Some(port);
                }
                "--release" => options.release = true,
                "--lsp" => options.lsp = true,
                "--run" => options.run = true,
                "-h" | "--help" => return Err(UsageError::Help),
                flag if flag.starts_with('-') => {
                    return Err(UsageError::UnknownOption(flag.to_string()));
                }
                _ => options.packages.push(arg),
            }
        }

        if options.tcp.is_some() && !options.lsp {
            return Err(UsageError::TcpWithoutLsp);
        }
        if !options.lsp && options.packages.is_empty() {
            return Err(UsageError::NoPackages);
        }
        Ok(options)
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            debug: !self.release,
        }
    }
}

/// Outcome of a batch build.
#[derive(Debug)]
pub struct Build {
    pub compilation: Compilation,
    /// Entry definition named by the first package's manifest.
    pub main: Option<String>,
}

/// Load and compile every package named on the command line.
pub fn build(options: &Options, base: &Path) -> Result<Build> {
    let mut loader = PackageLoader::new(&options.cache);
    let mut main = None;
    for location in &options.packages {
        let name = loader.load(location, base)?;
        if main.is_none() {
            main = loader.package(&name).and_then(|p| p.manifest.main.clone());
        }
    }

    let sources = loader.sources(&BTreeMap::new())?;
    let compilation = Compiler::new(options.compile_options()).compile(&sources)?;

    if let (Some(binary), Some(entry)) = (&compilation.binary, &main)
        && binary.export(entry).is_none()
    {
        return Err(OakError::system(format!("entry point '{entry}' is not defined")));
    }
    info!(
        packages = sources.len(),
        diagnostics = compilation.diagnostics.len(),
        "build finished"
    );
    Ok(Build { compilation, main })
}

/// Write the binary of a successful build to `out`.
pub fn write_binary(compilation: &Compilation, out: &Path) -> Result<()> {
    let binary = compilation
        .binary
        .as_ref()
        .ok_or_else(|| OakError::internal("no binary to write"))?;
    let bytes = binary.write()?;
    std::fs::write(out, &bytes)
        .map_err(|e| OakError::system(format!("cannot write {}: {e}", out.display())))?;
    debug!(path = %out.display(), bytes = bytes.len(), "wrote binary");
    Ok(())
}

/// Run `runtime` on a written binary, passing the entry definition if any.
pub fn run_binary(runtime: &str, binary: &Path, main: Option<&str>) -> Result<ExitStatus> {
    let mut command = Command::new(runtime);
    command.arg(binary);
    if let Some(main) = main {
        command.arg(main);
    }
    info!(runtime, binary = %binary.display(), "running");
    command
        .status()
        .map_err(|e| OakError::system(format!("cannot run {runtime}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Options, UsageError> {
        Options::parse(args.iter().map(|a| a.to_string()), Some(Path::new("/home/u")))
    }

    #[test]
    fn defaults() {
        let options = parse(&["pkg"]).unwrap();
        assert_eq!(options.packages, vec!["pkg"]);
        assert_eq!(options.out, PathBuf::from("out.oakb"));
        assert_eq!(options.cache, PathBuf::from("/home/u/.oak"));
        assert!(!options.release && !options.lsp && !options.run);
        assert!(options.compile_options().debug);
    }

    #[test]
    fn every_option() {
        let options = parse(&[
            "--out", "app.oakb", "--cache", "/tmp/c", "--release", "--run", "a", "b",
        ])
        .unwrap();
        assert_eq!(options.packages, vec!["a", "b"]);
        assert_eq!(options.out, PathBuf::from("app.oakb"));
        assert_eq!(options.cache, PathBuf::from("/tmp/c"));
        assert!(options.release && options.run);
        assert!(!options.compile_options().debug);

        let lsp = parse(&["--lsp", "--tcp", "9257"]).unwrap();
        assert!(lsp.lsp);
        assert_eq!(lsp.tcp, Some(9257));
        assert!(lsp.packages.is_empty());
    }

    #[test]
    fn usage_errors() {
        assert_eq!(parse(&[]), Err(UsageError::NoPackages));
        assert_eq!(parse(&["--out"]), Err(UsageError::MissingValue("--out")));
        assert_eq!(
            parse(&["--lsp", "--tcp", "http"]),
            Err(UsageError::InvalidPort("http".into()))
        );
        assert_eq!(parse(&["--tcp", "80", "p"]), Err(UsageError::TcpWithoutLsp));
        assert_eq!(parse(&["--fast", "p"]), Err(UsageError::UnknownOption("--fast".into())));
        assert_eq!(parse(&["p", "--help"]), Err(UsageError::Help));
    }
}
