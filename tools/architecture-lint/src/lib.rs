//! Repo-local lint that keeps the provisioning crate's hexagon intact.
//!
//! `delivery_store` is split into `domain` (services and ports), `inbound`
//! (the command-line surface) and `outbound` (store adapters). Only
//! `main.rs` wires them together. This lint parses every source file under
//! the three layer directories and rejects:
//!
//! - `domain` code that names `inbound` or `outbound`, or reaches for the
//!   MongoDB driver, the CLI parser or the async runtime
//! - `inbound` code that names `outbound` or the MongoDB driver
//! - `outbound` code that names `inbound`
//!
//! Items gated behind `#[cfg(test)]` are not inspected, so unit tests may use
//! `#[tokio::test]` and similar harness attributes.
//!
//! Run it with `cargo run -p architecture-lint`.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use syn::visit::Visit;

/// Library name of the crate being linted, as it appears in absolute paths.
pub const CRATE_NAME: &str = "delivery_store";

/// A single boundary violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File path relative to `backend/src`.
    pub file: PathBuf,
    /// Which rule was broken.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file.display(), self.message)
    }
}

/// Failure modes returned by the lint.
#[derive(Debug)]
pub enum ArchitectureLintError {
    /// Reading the source tree failed.
    Io(io::Error),
    /// A file could not be attributed to a layer or did not parse.
    Parse {
        /// Offending file.
        file: PathBuf,
        /// Parser or layer-inference message.
        message: String,
    },
    /// One or more boundary violations were found.
    Violations(Vec<Violation>),
}

impl fmt::Display for ArchitectureLintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read sources: {err}"),
            Self::Parse { file, message } => {
                write!(f, "failed to lint {}: {message}", file.display())
            }
            Self::Violations(violations) => {
                writeln!(f, "{} layer boundary violations:", violations.len())?;
                for violation in violations {
                    writeln!(f, "- {violation}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ArchitectureLintError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ArchitectureLintError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// A Rust source file to lint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintSource {
    /// Path relative to `backend/src`.
    pub file: PathBuf,
    /// File contents.
    pub contents: String,
}

impl LintSource {
    /// Build a source from a relative path and its contents.
    pub fn new(file: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            contents: contents.into(),
        }
    }
}

/// Lint the sources under `backend_dir/src`.
pub fn lint_backend_sources(backend_dir: &Path) -> Result<(), ArchitectureLintError> {
    let src_dir = backend_dir.join("src");
    let mut sources = Vec::new();
    for layer in Layer::ALL {
        let dir = src_dir.join(layer.dir());
        if dir.is_dir() {
            collect_sources(&src_dir, &dir, &mut sources)?;
        }
    }
    lint_sources(&sources)
}

/// Lint in-memory sources.
pub fn lint_sources(sources: &[LintSource]) -> Result<(), ArchitectureLintError> {
    let mut violations = Vec::new();
    for source in sources {
        let layer = Layer::of(&source.file).ok_or_else(|| ArchitectureLintError::Parse {
            file: source.file.clone(),
            message: "not under domain/, inbound/ or outbound/".to_owned(),
        })?;
        let parsed =
            syn::parse_file(&source.contents).map_err(|err| ArchitectureLintError::Parse {
                file: source.file.clone(),
                message: err.to_string(),
            })?;
        violations.extend(check_file(&source.file, layer, &parsed));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ArchitectureLintError::Violations(violations))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layer {
    Domain,
    Inbound,
    Outbound,
}

impl Layer {
    const ALL: [Self; 3] = [Self::Domain, Self::Inbound, Self::Outbound];

    const fn dir(self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }

    fn of(relative_path: &Path) -> Option<Self> {
        let first = relative_path.components().next()?.as_os_str().to_str()?;
        Self::ALL.into_iter().find(|layer| layer.dir() == first)
    }

    fn from_root(root: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|layer| layer.dir() == root)
    }

    const fn forbidden_layers(self) -> &'static [Self] {
        match self {
            Self::Domain => &[Self::Inbound, Self::Outbound],
            Self::Inbound => &[Self::Outbound],
            Self::Outbound => &[Self::Inbound],
        }
    }

    const fn forbidden_crates(self) -> &'static [&'static str] {
        match self {
            Self::Domain => &["mongodb", "clap", "tokio", "futures_util"],
            Self::Inbound => &["mongodb"],
            Self::Outbound => &[],
        }
    }
}

fn check_file(file: &Path, layer: Layer, parsed: &syn::File) -> Vec<Violation> {
    let mut collector = PathCollector::default();
    collector.visit_file(parsed);

    let mut messages = BTreeSet::new();
    for segments in &collector.paths {
        match classify(segments) {
            Some(Target::Layer(target)) if layer.forbidden_layers().contains(&target) => {
                messages.insert(format!(
                    "{} must not depend on crate::{}",
                    layer.dir(),
                    target.dir()
                ));
            }
            Some(Target::Crate(name)) if layer.forbidden_crates().contains(&name) => {
                messages.insert(format!(
                    "{} must not depend on external crate `{name}`",
                    layer.dir()
                ));
            }
            _ => {}
        }
    }

    messages
        .into_iter()
        .map(|message| Violation {
            file: file.to_path_buf(),
            message,
        })
        .collect()
}

/// What a path points at.
enum Target<'a> {
    Layer(Layer),
    Crate(&'a str),
}

fn classify(segments: &[String]) -> Option<Target<'_>> {
    let first = segments.first()?.as_str();
    if let Some(layer) = Layer::from_root(first) {
        return Some(Target::Layer(layer));
    }
    if matches!(first, "crate" | "self" | "super") || first == CRATE_NAME {
        let root = segments
            .iter()
            .skip(1)
            .find(|segment| !matches!(segment.as_str(), "self" | "super"))?;
        return Layer::from_root(root).map(Target::Layer);
    }
    Some(Target::Crate(first))
}

#[derive(Default)]
struct PathCollector {
    paths: BTreeSet<Vec<String>>,
}

impl PathCollector {
    fn record_use_tree(&mut self, tree: &syn::UseTree, mut prefix: Vec<String>) {
        match tree {
            syn::UseTree::Path(path) => {
                prefix.push(path.ident.to_string());
                self.record_use_tree(&path.tree, prefix);
            }
            syn::UseTree::Name(name) => {
                prefix.push(name.ident.to_string());
                self.paths.insert(prefix);
            }
            syn::UseTree::Rename(rename) => {
                prefix.push(rename.ident.to_string());
                self.paths.insert(prefix);
            }
            syn::UseTree::Glob(_) => {
                prefix.push("*".to_owned());
                self.paths.insert(prefix);
            }
            syn::UseTree::Group(group) => {
                for item in &group.items {
                    self.record_use_tree(item, prefix.clone());
                }
            }
        }
    }
}

impl<'ast> Visit<'ast> for PathCollector {
    fn visit_path(&mut self, node: &'ast syn::Path) {
        let segments: Vec<String> = node
            .segments
            .iter()
            .map(|segment| segment.ident.to_string())
            .collect();
        if !segments.is_empty() {
            self.paths.insert(segments);
        }
        syn::visit::visit_path(self, node);
    }

    fn visit_item_use(&mut self, node: &'ast syn::ItemUse) {
        if !is_test_only(&node.attrs) {
            self.record_use_tree(&node.tree, Vec::new());
        }
    }

    fn visit_item_mod(&mut self, node: &'ast syn::ItemMod) {
        if !is_test_only(&node.attrs) {
            syn::visit::visit_item_mod(self, node);
        }
    }

    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        if !is_test_only(&node.attrs) {
            syn::visit::visit_item_fn(self, node);
        }
    }
}

/// True for items carrying `#[cfg(test)]`.
fn is_test_only(attrs: &[syn::Attribute]) -> bool {
    attrs.iter().any(|attr| {
        attr.path().is_ident("cfg")
            && attr
                .parse_args::<syn::Ident>()
                .is_ok_and(|ident| ident == "test")
    })
}

fn collect_sources(
    src_root: &Path,
    current: &Path,
    sources: &mut Vec<LintSource>,
) -> Result<(), ArchitectureLintError> {
    let mut entries = fs::read_dir(current)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            collect_sources(src_root, &path, sources)?;
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some("rs") {
            continue;
        }
        let relative = path
            .strip_prefix(src_root)
            .map_err(|err| ArchitectureLintError::Parse {
                file: path.clone(),
                message: err.to_string(),
            })?
            .to_path_buf();
        let contents = fs::read_to_string(&path)?;
        sources.push(LintSource::new(relative, contents));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
