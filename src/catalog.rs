//! Source catalog: maps the lore directory tree to typed documents.
//!
//! The directory convention is the contract:
//!
//! ```text
//! <root>/global/tags/<tag>.txt
//! <root>/global/tags/<tag>/<anything>.txt
//! <root>/campaigns/<campaign>/tags/<tag>.txt
//! <root>/campaigns/<campaign>/tags/<tag>/<anything>.txt
//! ```
//!
//! Scope, campaign, and tag name are derived from a file's position under
//! the root and nothing else. There is no fallback between scopes: a
//! campaign lookup never returns global documents and vice versa.

use anyhow::Result;
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::LoreError;
use crate::models::{LoreMeta, Scope, SourceDocument};

pub struct SourceCatalog {
    root: PathBuf,
    include: GlobSet,
}

impl SourceCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        builder.add(Glob::new("**/*.txt")?);
        Ok(Self {
            root: root.into(),
            include: builder.build()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Derive scope, campaign, and tag name from a path relative to the
    /// catalog root.
    pub fn classify(&self, path: &Path) -> LoreMeta {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let segments: Vec<&str> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect();

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        // Only the leading segment and the depth decide the scope; the
        // conventional `tags/` level is not required.
        let (scope, campaign) = match segments.as_slice() {
            ["campaigns", campaign, ..] if segments.len() >= 4 => {
                (Scope::Campaign, Some(campaign.to_string()))
            }
            ["global", ..] if segments.len() >= 3 => (Scope::Global, None),
            _ => (Scope::Other, None),
        };

        LoreMeta {
            scope,
            campaign,
            tag_name: stem,
            path: path.to_path_buf(),
        }
    }

    /// Load a single lore file as a UTF-8 document.
    pub fn load_document(&self, path: &Path) -> Result<SourceDocument, LoreError> {
        let bytes = std::fs::read(path).map_err(|source| LoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let content = String::from_utf8(bytes).map_err(|_| LoreError::Decode {
            path: path.to_path_buf(),
        })?;

        let (size_bytes, modified_at) = file_stat(path).map_err(|source| LoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(SourceDocument {
            content,
            meta: self.classify(path),
            size_bytes,
            modified_at,
        })
    }

    /// Load every `*.txt` file under the root, in path order.
    ///
    /// Files that cannot be read or decoded are logged and skipped; one
    /// bad file never aborts the scan.
    pub fn load_all(&self) -> Vec<SourceDocument> {
        let mut documents = Vec::new();
        for path in self.walk_txt(&self.root) {
            match self.load_document(&path) {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable lore file");
                }
            }
        }
        documents
    }

    /// Load the documents for one tag within one scope.
    ///
    /// Both forms may coexist: a single `<tag>.txt` file and a `<tag>/`
    /// directory of `*.txt` files; all matching documents are returned.
    pub fn load_for_tag(
        &self,
        tag_name: &str,
        campaign: Option<&str>,
    ) -> Result<Vec<SourceDocument>, LoreError> {
        let tag_dir = self.scope_dir(campaign);
        if !tag_dir.exists() {
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();

        let single = tag_dir.join(format!("{tag_name}.txt"));
        if single.is_file() {
            documents.push(self.load_document(&single)?);
        }

        // Only direct children of `<tag>/` belong to the tag; nested
        // directories are not part of the convention.
        let multi = tag_dir.join(tag_name);
        if multi.is_dir() {
            for path in direct_txt(&multi) {
                documents.push(self.load_document(&path)?);
            }
        }

        Ok(documents)
    }

    /// Load every document under one campaign's tag tree.
    pub fn load_for_campaign(&self, campaign: &str) -> Vec<SourceDocument> {
        let dir = self.root.join("campaigns").join(campaign).join("tags");
        if !dir.exists() {
            return Vec::new();
        }
        let mut documents = Vec::new();
        for path in self.walk_txt(&dir) {
            match self.load_document(&path) {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable lore file");
                }
            }
        }
        documents
    }

    /// Tag names available in one scope: stems of top-level `*.txt` files
    /// plus names of subdirectories with at least one direct-child `*.txt`.
    pub fn list_tags(&self, campaign: Option<&str>) -> Vec<String> {
        let tag_dir = self.scope_dir(campaign);
        let entries = match std::fs::read_dir(&tag_dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut tags = std::collections::BTreeSet::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|e| e == "txt") {
                if let Some(stem) = path.file_stem() {
                    tags.insert(stem.to_string_lossy().to_string());
                }
            } else if path.is_dir() && !direct_txt(&path).is_empty() {
                if let Some(name) = path.file_name() {
                    tags.insert(name.to_string_lossy().to_string());
                }
            }
        }
        tags.into_iter().collect()
    }

    /// Campaign names that have at least one `*.txt` anywhere under their
    /// `tags/` directory.
    pub fn list_campaigns(&self) -> Vec<String> {
        let campaigns_dir = self.root.join("campaigns");
        let entries = match std::fs::read_dir(&campaigns_dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut campaigns = std::collections::BTreeSet::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let tags_dir = path.join("tags");
            if tags_dir.is_dir() && !self.walk_txt(&tags_dir).is_empty() {
                if let Some(name) = path.file_name() {
                    campaigns.insert(name.to_string_lossy().to_string());
                }
            }
        }
        campaigns.into_iter().collect()
    }

    /// Every `*.txt` path under the root, without reading contents. Used
    /// by the lifecycle manager for mtime-based staleness checks.
    pub fn all_txt_paths(&self) -> Vec<PathBuf> {
        self.walk_txt(&self.root)
    }

    fn scope_dir(&self, campaign: Option<&str>) -> PathBuf {
        match campaign {
            Some(c) => self.root.join("campaigns").join(c).join("tags"),
            None => self.root.join("global").join("tags"),
        }
    }

    /// Recursively collect `*.txt` files under `dir`, path-sorted for
    /// deterministic ordering.
    fn walk_txt(&self, dir: &Path) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                let rel = path.strip_prefix(dir).unwrap_or(path);
                self.include.is_match(rel) || rel.extension().is_some_and(|e| e == "txt")
            })
            .collect();
        paths.sort();
        paths
    }
}

/// Direct-child `*.txt` files of `dir`, path-sorted. Never recurses.
fn direct_txt(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };
    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|e| e == "txt"))
        .collect();
    paths.sort();
    paths
}

fn file_stat(path: &Path) -> std::io::Result<(u64, DateTime<Utc>)> {
    let metadata = std::fs::metadata(path)?;
    let modified = metadata
        .modified()
        .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
    Ok((metadata.len(), DateTime::<Utc>::from(modified)))
}
