//! Core data models used throughout Loredex.
//!
//! These types represent the lore documents, chunks, and search results
//! that flow through the indexing and retrieval pipeline. Metadata is a
//! fixed typed record derived from a file's position under the source
//! root — never set independently of the path.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Where a lore file sits in the source tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// `global/tags/...` — visible to every campaign.
    Global,
    /// `campaigns/<name>/tags/...` — visible to one campaign only.
    Campaign,
    /// Any other path shape under the root.
    Other,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Campaign => "campaign",
            Scope::Other => "other",
        }
    }

    pub fn from_str_lossy(s: &str) -> Scope {
        match s {
            "global" => Scope::Global,
            "campaign" => Scope::Campaign,
            _ => Scope::Other,
        }
    }
}

/// Typed metadata attached to every document and chunk.
///
/// A pure function of the path relative to the catalog root: `scope` is
/// `Campaign` iff `campaign` is `Some`, and `tag_name` is the file stem.
#[derive(Debug, Clone, PartialEq)]
pub struct LoreMeta {
    pub scope: Scope,
    pub campaign: Option<String>,
    pub tag_name: String,
    pub path: PathBuf,
}

/// One physical `*.txt` lore file, loaded as UTF-8.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub content: String,
    pub meta: LoreMeta,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
}

/// A bounded-length slice of a document's text — the unit actually
/// embedded and indexed. Inherits the parent document's metadata unchanged.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub meta: LoreMeta,
}

/// A chunk returned from the index, ranked best-first.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f64,
}

/// Aggregate report for one tag's indexed content.
#[derive(Debug, Clone)]
pub struct TagReport {
    pub meta: LoreMeta,
    /// Number of matching chunks (sampled, capped at 100).
    pub total_documents: usize,
    /// Sum of sampled chunk lengths in characters.
    pub total_content_length: usize,
    /// Floor of `total_content_length / total_documents`; 0 if none.
    pub average_chunk_size: usize,
}
