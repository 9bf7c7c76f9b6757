//! Index lifecycle: staleness detection, rebuilds, and the checkpoint.
//!
//! The manager owns the on-disk index location and the checkpoint file.
//! It is the only writer; callers must serialize rebuilds themselves
//! (typically a single maintenance process). The checkpoint records the
//! wall-clock time of the last successful build and is advanced only
//! after the index mutation fully succeeds, so a crash mid-build leaves
//! the index stale and the next run re-triggers.
//!
//! A non-clean rebuild appends the re-chunked corpus without deleting
//! prior entries; repeated non-clean rebuilds therefore grow the index
//! with duplicate content. That matches the source-of-record behavior and
//! stays until a product decision says otherwise.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::catalog::SourceCatalog;
use crate::chunk::split_document;
use crate::config::Config;
use crate::embedding::embed_texts;
use crate::index::{ChunkIndex, SqliteIndex};

const CHECKPOINT_VERSION: &str = "1.0";

/// Persisted record of the last successful index build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexCheckpoint {
    pub last_updated: DateTime<Utc>,
    pub version: String,
}

pub struct IndexManager {
    config: Config,
}

impl IndexManager {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn index_dir(&self) -> &Path {
        &self.config.paths.index_dir
    }

    fn checkpoint_path(&self) -> &Path {
        &self.config.paths.checkpoint
    }

    /// Read the checkpoint; a missing or malformed file reads as `None`
    /// (always stale).
    pub fn read_checkpoint(&self) -> Option<IndexCheckpoint> {
        let content = std::fs::read_to_string(self.checkpoint_path()).ok()?;
        serde_json::from_str(&content).ok()
    }

    fn write_checkpoint(&self) -> Result<()> {
        let checkpoint = IndexCheckpoint {
            last_updated: Utc::now(),
            version: CHECKPOINT_VERSION.to_string(),
        };
        if let Some(parent) = self.checkpoint_path().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&checkpoint)?;
        std::fs::write(self.checkpoint_path(), json).with_context(|| {
            format!(
                "Failed to write checkpoint {}",
                self.checkpoint_path().display()
            )
        })?;
        Ok(())
    }

    /// True if no checkpoint exists, or any source file was modified
    /// strictly later than the last successful build. File granularity
    /// only — no per-chunk diffing.
    pub fn is_stale(&self) -> Result<bool> {
        let checkpoint = match self.read_checkpoint() {
            Some(cp) => cp,
            None => return Ok(true),
        };

        let catalog = SourceCatalog::new(&self.config.paths.source_root)?;
        for path in catalog.all_txt_paths() {
            let modified = std::fs::metadata(&path)
                .and_then(|m| m.modified())
                .map(DateTime::<Utc>::from);
            if let Ok(modified) = modified {
                if modified > checkpoint.last_updated {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn clean_index(&self) -> Result<()> {
        if self.index_dir().exists() {
            tracing::info!(dir = %self.index_dir().display(), "removing existing index");
            std::fs::remove_dir_all(self.index_dir())?;
        }
        std::fs::create_dir_all(self.index_dir())?;
        if self.checkpoint_path().exists() {
            std::fs::remove_file(self.checkpoint_path())?;
        }
        Ok(())
    }

    /// Build or update the index from the current source tree.
    ///
    /// With `clean`, the storage location and checkpoint are removed
    /// first. An empty corpus is a no-op returning `None`, never an
    /// error. Otherwise every document is chunked, embedded in batches,
    /// and appended to the (new or existing) index; the checkpoint is
    /// written only after the append succeeds.
    pub async fn rebuild(&self, clean: bool) -> Result<Option<SqliteIndex>> {
        if clean {
            self.clean_index()?;
        }

        let catalog = SourceCatalog::new(&self.config.paths.source_root)?;
        let documents = catalog.load_all();
        if documents.is_empty() {
            tracing::info!(
                root = %self.config.paths.source_root.display(),
                "no lore files found, leaving index untouched"
            );
            return Ok(None);
        }
        tracing::info!(documents = documents.len(), "loaded lore documents");

        let mut chunks = Vec::new();
        for doc in &documents {
            chunks.extend(split_document(
                doc,
                self.config.chunking.chunk_size,
                self.config.chunking.chunk_overlap,
            ));
        }
        tracing::info!(chunks = chunks.len(), "split documents into chunks");

        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.config.embedding.batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let batch_vectors = embed_texts(&self.config.embedding, &texts)
                .await
                .context("index build failed: embedding")?;
            vectors.extend(batch_vectors);
        }

        let index = SqliteIndex::open(self.index_dir())
            .await
            .context("index build failed: storage")?;
        index
            .add(&chunks, &vectors)
            .await
            .context("index build failed: storage")?;

        self.write_checkpoint()?;
        tracing::info!(chunks = chunks.len(), "index build complete");
        Ok(Some(index))
    }

    /// Return a queryable index, rebuilding only when needed: a clean
    /// build when the storage is absent or empty, an append when stale,
    /// otherwise open the existing index without any write.
    pub async fn get_or_refresh(&self) -> Result<Option<SqliteIndex>> {
        if !SqliteIndex::exists_nonempty(self.index_dir()).await? {
            tracing::info!("index not found, building");
            return self.rebuild(true).await;
        }
        if self.is_stale()? {
            tracing::info!("index is stale, updating");
            return self.rebuild(false).await;
        }
        Ok(Some(SqliteIndex::open(self.index_dir()).await?))
    }
}
