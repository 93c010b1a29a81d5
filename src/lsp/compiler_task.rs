//! The task that owns the compiler and every piece of document state.
//!
//! Other tasks talk to it through [`Event`]s only. Events arriving within
//! [`COALESCE_WINDOW`] of each other are applied together before one
//! compilation runs.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use tracing::{debug, info, warn};

use oak_compiler::{CompileOptions, Compiler, PRELUDE_PATH, PackageSource};
use oak_core::{PackageIdentifier, Result};

use super::protocol::{
    Diagnostic, Message, PublishDiagnosticsParams, ShowMessageParams,
    TextDocumentContentChangeEvent, message_type, path_to_uri,
};
use crate::package::{MANIFEST_FILE, PackageLoader, SOURCE_DIR, module_name};

/// Idle time after the last change before compiling.
pub const COALESCE_WINDOW: Duration = Duration::from_millis(500);

/// Package holding open documents that belong to no loaded package.
pub const LOOSE_PACKAGE: &str = "workspace";

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Workspace folders to load packages from.
    Roots(Vec<PathBuf>),
    Open { path: PathBuf, text: String },
    Change {
        path: PathBuf,
        changes: Vec<TextDocumentContentChangeEvent>,
    },
    Close { path: PathBuf },
}

pub struct CompilerTask {
    compiler: Compiler,
    cache_dir: PathBuf,
    roots: Vec<PathBuf>,
    /// Unsaved buffers by path.
    overrides: BTreeMap<PathBuf, Vec<char>>,
    /// Paths that got a diagnostics batch from the last compilation.
    reported: BTreeSet<String>,
    outgoing: Sender<Message>,
}

impl CompilerTask {
    pub fn new(cache_dir: PathBuf, options: CompileOptions, outgoing: Sender<Message>) -> Self {
        Self {
            compiler: Compiler::new(options),
            cache_dir,
            roots: Vec::new(),
            overrides: BTreeMap::new(),
            reported: BTreeSet::new(),
            outgoing,
        }
    }

    /// Process events until every sender is gone.
    pub fn run(mut self, events: Receiver<Event>) {
        while let Ok(event) = events.recv() {
            self.apply(event);
            let disconnected = loop {
                match events.recv_timeout(COALESCE_WINDOW) {
                    Ok(event) => self.apply(event),
                    Err(RecvTimeoutError::Timeout) => break false,
                    Err(RecvTimeoutError::Disconnected) => break true,
                }
            };
            self.compile();
            if disconnected {
                break;
            }
        }
        debug!("compiler task stopped");
    }

    pub(crate) fn apply(&mut self, event: Event) {
        match event {
            Event::Roots(roots) => {
                info!(?roots, "workspace roots");
                self.roots = roots;
            }
            Event::Open { path, text } => {
                let path = canonical(path);
                self.compiler.invalidate(&path.display().to_string());
                self.overrides.insert(path, text.chars().collect());
            }
            Event::Change { path, changes } => {
                let path = canonical(path);
                self.compiler.invalidate(&path.display().to_string());
                let Some(text) = self.overrides.get_mut(&path) else {
                    warn!(path = %path.display(), "change to a document that is not open");
                    return;
                };
                for change in &changes {
                    apply_change(text, change);
                }
            }
            Event::Close { path } => {
                let path = canonical(path);
                self.compiler.invalidate(&path.display().to_string());
                self.overrides.remove(&path);
            }
        }
    }

    /// Compile the workspace and publish diagnostics.
    pub(crate) fn compile(&mut self) {
        let sources = match self.sources() {
            Ok(sources) => sources,
            Err(err) => {
                warn!(%err, "cannot load workspace");
                self.show_message(message_type::ERROR, err.to_string());
                return;
            }
        };
        let compilation = match self.compiler.compile(&sources) {
            Ok(compilation) => compilation,
            Err(err) => {
                warn!(%err, "compilation failed");
                self.show_message(message_type::ERROR, err.to_string());
                return;
            }
        };

        let mut batches: BTreeMap<String, Vec<Diagnostic>> = compilation
            .paths
            .iter()
            .filter(|path| path.as_str() != PRELUDE_PATH)
            .map(|path| (path.clone(), Vec::new()))
            .collect();
        for diagnostic in &compilation.diagnostics {
            batches
                .entry(diagnostic.location.path().to_string())
                .or_default()
                .push(Diagnostic::from(diagnostic));
        }
        for stale in &self.reported {
            batches.entry(stale.clone()).or_default();
        }

        info!(
            documents = batches.len(),
            diagnostics = compilation.diagnostics.len(),
            "publishing diagnostics"
        );
        self.reported.clear();
        for (path, diagnostics) in batches {
            if !diagnostics.is_empty() || compilation.paths.contains(&path) {
                self.reported.insert(path.clone());
            }
            self.send(Message::notification(
                "textDocument/publishDiagnostics",
                PublishDiagnosticsParams {
                    uri: path_to_uri(Path::new(&path)),
                    diagnostics,
                },
            ));
        }
    }

    /// Packages under the roots, plus open documents outside them.
    fn sources(&self) -> Result<Vec<PackageSource>> {
        let overrides: BTreeMap<PathBuf, Arc<str>> = self
            .overrides
            .iter()
            .map(|(path, text)| (path.clone(), Arc::from(text.iter().collect::<String>())))
            .collect();

        let mut loader = PackageLoader::new(&self.cache_dir);
        for root in &self.roots {
            if root.join(MANIFEST_FILE).is_file() {
                loader.load(&root.to_string_lossy(), Path::new("."))?;
            }
        }
        let mut sources = loader.sources(&overrides)?;

        let known: BTreeSet<&str> = sources
            .iter()
            .flat_map(|p| &p.modules)
            .map(|m| m.path.as_str())
            .collect();
        let mut loose = PackageSource::new(LOOSE_PACKAGE);
        for (path, text) in &overrides {
            let display = path.display().to_string();
            if known.contains(display.as_str()) {
                continue;
            }
            loose = loose.with_module(&loose_module_name(path), display, text.clone());
        }
        if !loose.modules.is_empty() {
            loose.dependencies = sources
                .iter()
                .map(|p| p.name.clone())
                .collect::<BTreeSet<PackageIdentifier>>();
            sources.push(loose);
        }
        Ok(sources)
    }

    fn show_message(&self, kind: u8, message: String) {
        self.send(Message::notification(
            "window/showMessage",
            ShowMessageParams { kind, message },
        ));
    }

    fn send(&self, message: Message) {
        if self.outgoing.send(message).is_err() {
            debug!("sender task is gone");
        }
    }
}

fn canonical(path: PathBuf) -> PathBuf {
    path.canonicalize().unwrap_or(path)
}

/// Module name of a file outside any package: the path below its nearest
/// `src` directory, or the file stem.
fn loose_module_name(path: &Path) -> String {
    path.ancestors()
        .skip(1)
        .find(|dir| dir.file_name().is_some_and(|name| name == SOURCE_DIR))
        .and_then(|src| module_name(src, path))
        .or_else(|| Some(path.file_stem()?.to_string_lossy().into_owned()))
        .unwrap_or_default()
}

/// Apply one content change to a buffer of characters.
///
/// Positions count lines and characters from zero and are clamped to the
/// buffer.
pub fn apply_change(text: &mut Vec<char>, change: &TextDocumentContentChangeEvent) {
    let Some(range) = change.range else {
        *text = change.text.chars().collect();
        return;
    };
    let offset = |line: u32, character: u32| {
        let mut index = 0;
        let mut current = 0;
        while current < line && index < text.len() {
            if text[index] == '\n' {
                current += 1;
            }
            index += 1;
        }
        let line_end = text[index..]
            .iter()
            .position(|&c| c == '\n')
            .map_or(text.len(), |p| index + p);
        (index + character as usize).min(line_end)
    };
    let start = offset(range.start.line, range.start.character);
    let end = offset(range.end.line, range.end.character).max(start);
    text.splice(start..end, change.text.chars());
}
