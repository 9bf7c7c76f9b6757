//! Tag-scoped retrieval and persona context assembly.
//!
//! [`LoreRetriever`] is the query-facing surface: similarity search,
//! per-tag lookup, tag summaries, and the persona-context algorithm that
//! blends per-tag and free-query results under a hard entry cap. It only
//! reads through the index contract and never mutates the index.
//!
//! Persona context ordering is a contract: declared tags first, in the
//! caller's order, then the free-text fallback, capped at `k` entries.
//! Later tags or the fallback are silently dropped once the cap is hit.

use anyhow::Result;

use crate::catalog::SourceCatalog;
use crate::config::{Config, EmbeddingConfig};
use crate::embedding::embed_query;
use crate::index::{ChunkFilter, ChunkIndex};
use crate::manager::IndexManager;
use crate::models::{ScoredChunk, TagReport};

/// Chunks fetched per declared tag during persona assembly.
const PERSONA_CHUNKS_PER_TAG: usize = 2;
/// Per-entry character budget in persona context.
const PERSONA_SNIPPET_CHARS: usize = 300;
/// Chunks concatenated into a tag summary.
const SUMMARY_CHUNKS: usize = 3;
/// Sample size for tag report aggregates.
const REPORT_SAMPLE: usize = 100;

pub struct LoreRetriever {
    index: Option<Box<dyn ChunkIndex>>,
    embedding: EmbeddingConfig,
    catalog: SourceCatalog,
}

impl LoreRetriever {
    /// Open the retriever, building or refreshing the index if needed.
    /// `index` stays `None` on an empty corpus; every read path then
    /// returns empty results.
    pub async fn open(config: &Config) -> Result<Self> {
        let manager = IndexManager::new(config);
        let index = manager.get_or_refresh().await?;
        Ok(Self {
            index: index.map(|i| Box::new(i) as Box<dyn ChunkIndex>),
            embedding: config.embedding.clone(),
            catalog: SourceCatalog::new(&config.paths.source_root)?,
        })
    }

    /// Wrap an existing index handle without touching the lifecycle
    /// manager. Used by tests and embedding callers that manage their
    /// own builds.
    pub fn with_index(index: Box<dyn ChunkIndex>, config: &Config) -> Result<Self> {
        Ok(Self {
            index: Some(index),
            embedding: config.embedding.clone(),
            catalog: SourceCatalog::new(&config.paths.source_root)?,
        })
    }

    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }

    /// Rank chunks against a free-text query, optionally confined to one
    /// campaign. No campaign means no campaign predicate (all scopes).
    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        campaign: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        let index = match &self.index {
            Some(index) => index,
            None => return Ok(Vec::new()),
        };
        let query_vec = embed_query(&self.embedding, query).await?;
        index
            .query(&query_vec, k, &ChunkFilter::for_campaign(campaign))
            .await
    }

    /// Rank one tag's chunks, using the tag name itself as the query
    /// text — exact-match on the tag filter plus similarity to the tag's
    /// own name biases toward its most on-topic chunks.
    pub async fn search_by_tag(
        &self,
        tag_name: &str,
        campaign: Option<&str>,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let index = match &self.index {
            Some(index) => index,
            None => return Ok(Vec::new()),
        };
        let query_vec = embed_query(&self.embedding, tag_name).await?;
        index
            .query(&query_vec, k, &ChunkFilter::for_tag(tag_name, campaign))
            .await
    }

    /// Bounded summary of a tag's content: top chunks joined by blank
    /// lines, truncated to `max_length` characters with an ellipsis.
    /// Returns a fixed sentinel when the tag has no chunks.
    pub async fn tag_summary(
        &self,
        tag_name: &str,
        campaign: Option<&str>,
        max_length: usize,
    ) -> Result<String> {
        let chunks = self.search_by_tag(tag_name, campaign, SUMMARY_CHUNKS).await?;
        if chunks.is_empty() {
            return Ok(format!("No content found for tag '{tag_name}'"));
        }

        let mut combined = String::new();
        for sc in &chunks {
            combined.push_str(&sc.chunk.text);
            combined.push_str("\n\n");
        }
        Ok(truncate_chars(&combined, max_length).trim().to_string())
    }

    /// Assemble bounded context for a persona from its declared tags and
    /// an optional free-text query.
    ///
    /// For each tag, in the given order: up to two chunks, each truncated
    /// to 300 characters. If fewer than `k` entries accumulated and the
    /// query is non-empty, one similarity search tops up the remainder.
    /// The result is hard-capped to the first `k` entries.
    pub async fn assemble_persona_context(
        &self,
        tags: &[String],
        query: &str,
        campaign: Option<&str>,
        k: usize,
    ) -> Result<Vec<(String, String)>> {
        if self.index.is_none() {
            return Ok(Vec::new());
        }

        let mut entries: Vec<(String, String)> = Vec::new();

        for tag in tags {
            let chunks = self
                .search_by_tag(tag, campaign, PERSONA_CHUNKS_PER_TAG)
                .await?;
            for sc in chunks {
                entries.push((
                    tag.clone(),
                    truncate_chars(&sc.chunk.text, PERSONA_SNIPPET_CHARS),
                ));
            }
        }

        if !query.is_empty() && entries.len() < k {
            let extra = self
                .similarity_search(query, k - entries.len(), campaign)
                .await?;
            for sc in extra {
                entries.push((
                    sc.chunk.meta.tag_name.clone(),
                    truncate_chars(&sc.chunk.text, PERSONA_SNIPPET_CHARS),
                ));
            }
        }

        entries.truncate(k);
        Ok(entries)
    }

    /// Metadata of a tag's best chunk plus aggregate statistics over a
    /// sample of up to 100 matching chunks. `None` when the tag has no
    /// indexed content.
    pub async fn metadata_report(
        &self,
        tag_name: &str,
        campaign: Option<&str>,
    ) -> Result<Option<TagReport>> {
        let best = self.search_by_tag(tag_name, campaign, 1).await?;
        let best = match best.into_iter().next() {
            Some(sc) => sc,
            None => return Ok(None),
        };

        let sample = self
            .search_by_tag(tag_name, campaign, REPORT_SAMPLE)
            .await?;
        let total_documents = sample.len();
        let total_content_length: usize =
            sample.iter().map(|sc| sc.chunk.text.chars().count()).sum();
        let average_chunk_size = if total_documents > 0 {
            total_content_length / total_documents
        } else {
            0
        };

        Ok(Some(TagReport {
            meta: best.chunk.meta,
            total_documents,
            total_content_length,
            average_chunk_size,
        }))
    }

    /// Tag names available on disk for one scope.
    pub fn available_tags(&self, campaign: Option<&str>) -> Vec<String> {
        self.catalog.list_tags(campaign)
    }

    /// Campaigns that have lore content on disk.
    pub fn available_campaigns(&self) -> Vec<String> {
        self.catalog.list_campaigns()
    }
}

/// Truncate to `max_chars` characters, appending `"..."` when cut.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max_chars).collect();
        out.push_str("...");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_noop_under_budget() {
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn test_truncate_appends_ellipsis() {
        let out = truncate_chars(&"x".repeat(400), 300);
        assert_eq!(out.chars().count(), 303);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let text = "ä".repeat(5);
        assert_eq!(truncate_chars(&text, 5), text);
        assert_eq!(truncate_chars(&text, 4), format!("{}...", "ä".repeat(4)));
    }
}
