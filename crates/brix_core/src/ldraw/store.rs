//! Logical document store.
//!
//! Resolves filenames to [`LogicalDocument`]s through a [`FileResolver`],
//! splitting multi-part containers (`0 FILE` / `0 NOFILE`) into their named
//! sub-documents. Every file is read from storage at most once per session,
//! and missing names are remembered so they are looked up only once.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::ldraw::types::{line_tail, normalize_name, LogicalDocument};

/// Errors that can occur while fetching a document.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage collaborator: maps filenames to readable locations.
///
/// Search order and case-insensitive matching are the resolver's concern.
pub trait FileResolver {
    /// Locate a file by LDraw name.
    fn locate(&self, name: &str) -> Option<PathBuf>;

    /// Read every text line of a located file.
    fn read_lines(&self, path: &Path) -> std::io::Result<Vec<String>>;
}

/// Sub-directories tried under each search root, in order.
const SEARCH_SUBDIRS: [&str; 9] = [
    "",
    "models",
    "parts",
    "p",
    "p/48",
    "unofficial/parts",
    "unofficial/p",
    "unofficial/p/48",
    "unofficial",
];

/// Filesystem resolver over an ordered list of library roots.
#[derive(Clone, Debug, Default)]
pub struct SearchPaths {
    roots: Vec<PathBuf>,
}

impl SearchPaths {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    /// Append a root searched after the existing ones.
    pub fn push_root(&mut self, root: impl Into<PathBuf>) {
        self.roots.push(root.into());
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl FileResolver for SearchPaths {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        let name = name.trim().replace('\\', "/");
        let lower = name.to_ascii_lowercase();

        for root in &self.roots {
            for subdir in SEARCH_SUBDIRS {
                let dir = root.join(subdir);
                for candidate in [&name, &lower] {
                    let path = dir.join(candidate);
                    if path.is_file() {
                        return Some(path);
                    }
                }
            }
        }
        None
    }

    fn read_lines(&self, path: &Path) -> std::io::Result<Vec<String>> {
        // Some library files are not valid UTF-8 (Latin-1 author names)
        let bytes = std::fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect())
    }
}

/// In-memory resolver keyed by normalized name.
#[derive(Debug, Default)]
pub struct MemoryResolver {
    files: HashMap<String, Vec<String>>,
    reads: Cell<usize>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a file.
    pub fn insert(&mut self, name: &str, text: &str) {
        self.files
            .insert(normalize_name(name), text.lines().map(str::to_string).collect());
    }

    /// Builder form of [`MemoryResolver::insert`].
    pub fn with_file(mut self, name: &str, text: &str) -> Self {
        self.insert(name, text);
        self
    }

    /// Number of successful `read_lines` calls so far.
    pub fn read_count(&self) -> usize {
        self.reads.get()
    }
}

impl FileResolver for MemoryResolver {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        let key = normalize_name(name);
        self.files.contains_key(&key).then(|| PathBuf::from(key))
    }

    fn read_lines(&self, path: &Path) -> std::io::Result<Vec<String>> {
        let key = path.to_string_lossy();
        match self.files.get(key.as_ref()) {
            Some(lines) => {
                self.reads.set(self.reads.get() + 1);
                Ok(lines.clone())
            }
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not in memory", key),
            )),
        }
    }
}

/// Session cache of logical documents.
pub struct DocumentStore<R: FileResolver> {
    resolver: R,
    documents: HashMap<String, Arc<LogicalDocument>>,
    missing: HashSet<String>,
}

impl<R: FileResolver> DocumentStore<R> {
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            documents: HashMap::new(),
            missing: HashSet::new(),
        }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Fetch a document by name, reading storage on first access.
    ///
    /// For a multi-part container requested by its own filename, the first
    /// declared sub-document is returned.
    pub fn get(&mut self, name: &str) -> StoreResult<Arc<LogicalDocument>> {
        let key = normalize_name(name);
        if let Some(doc) = self.documents.get(&key) {
            return Ok(Arc::clone(doc));
        }
        if self.missing.contains(&key) {
            return Err(StoreError::NotFound(name.to_string()));
        }

        let Some(path) = self.resolver.locate(name) else {
            log::debug!("Not found: {}", name);
            self.missing.insert(key);
            return Err(StoreError::NotFound(name.to_string()));
        };
        let lines = self.resolver.read_lines(&path)?;
        log::debug!("Read {} ({} lines) from {}", name, lines.len(), path.display());

        let Some(sub_documents) = split_container(&lines) else {
            let doc = Arc::new(LogicalDocument::new(name.trim(), lines));
            self.documents.insert(key, Arc::clone(&doc));
            return Ok(doc);
        };

        log::debug!("Split {} into {} sub-documents", name, sub_documents.len());
        let mut first = None;
        for doc in sub_documents {
            let doc = Arc::new(doc);
            first.get_or_insert_with(|| Arc::clone(&doc));
            // First declaration of a duplicated name wins
            self.documents.entry(doc.key()).or_insert(doc);
        }

        if let Some(doc) = self.documents.get(&key) {
            return Ok(Arc::clone(doc));
        }
        match first {
            Some(doc) => {
                self.documents.insert(key, Arc::clone(&doc));
                Ok(doc)
            }
            None => {
                self.missing.insert(key);
                Err(StoreError::NotFound(name.to_string()))
            }
        }
    }

    /// True when `name` resolves to a document.
    pub fn exists(&mut self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    /// Check if a name is already cached (without touching storage).
    pub fn is_cached(&self, name: &str) -> bool {
        self.documents.contains_key(&normalize_name(name))
    }

    /// Number of cached documents (aliases included).
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Drop every cached document and negative entry.
    pub fn clear(&mut self) {
        self.documents.clear();
        self.missing.clear();
    }
}

/// Split a multi-part container into its sub-documents.
///
/// Returns `None` when the file declares no `0 FILE` line. Lines before the
/// first `0 FILE` and lines between `0 NOFILE` and the next `0 FILE` are
/// discarded.
pub fn split_container(lines: &[String]) -> Option<Vec<LogicalDocument>> {
    let mut documents: Vec<LogicalDocument> = Vec::new();
    let mut open = false;

    for (index, line) in lines.iter().enumerate() {
        let mut tokens = line.split_whitespace();
        let is_meta = tokens.next() == Some("0");
        let keyword = if is_meta { tokens.next() } else { None };

        match keyword {
            Some(k) if k.eq_ignore_ascii_case("FILE") => {
                let name = line_tail(line, 2);
                if name.is_empty() {
                    continue;
                }
                documents.push(LogicalDocument {
                    name: name.to_string(),
                    lines: Vec::new(),
                    first_line: index + 2,
                    from_container: true,
                });
                open = true;
            }
            Some(k) if k.eq_ignore_ascii_case("NOFILE") => open = false,
            _ => {
                if open {
                    if let Some(doc) = documents.last_mut() {
                        doc.lines.push(line.clone());
                    }
                }
            }
        }
    }

    (!documents.is_empty()).then_some(documents)
}
