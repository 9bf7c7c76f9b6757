//! Chunk index: durable storage plus metadata-filtered similarity search.
//!
//! The [`ChunkIndex`] trait is the contract the retrieval layer consumes:
//! append chunk batches with their vectors, and run nearest-neighbor
//! queries narrowed by exact-match metadata predicates. The lifecycle
//! manager is the only writer; readers see whatever batch was last
//! appended.
//!
//! Two implementations: [`SqliteIndex`] persists at
//! `<index_dir>/index.sqlite` (WAL mode, brute-force cosine ranking in
//! process), and [`MemoryIndex`] backs unit tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::RwLock;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{Chunk, LoreMeta, Scope, ScoredChunk};

/// Exact-match predicate over chunk metadata. A `None` field matches
/// everything; a `Some` field must match exactly.
#[derive(Debug, Clone, Default)]
pub struct ChunkFilter {
    pub tag_name: Option<String>,
    pub campaign: Option<String>,
}

impl ChunkFilter {
    pub fn for_tag(tag_name: &str, campaign: Option<&str>) -> Self {
        Self {
            tag_name: Some(tag_name.to_string()),
            campaign: campaign.map(|c| c.to_string()),
        }
    }

    pub fn for_campaign(campaign: Option<&str>) -> Self {
        Self {
            tag_name: None,
            campaign: campaign.map(|c| c.to_string()),
        }
    }

    fn matches(&self, meta: &LoreMeta) -> bool {
        if let Some(ref tag) = self.tag_name {
            if &meta.tag_name != tag {
                return false;
            }
        }
        if let Some(ref campaign) = self.campaign {
            if meta.campaign.as_deref() != Some(campaign.as_str()) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait ChunkIndex: Send + Sync {
    /// Append a chunk batch with one vector per chunk. Applied atomically
    /// per call.
    async fn add(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()>;

    /// Nearest-neighbor search narrowed by `filter`, best-first, at most
    /// `k` results.
    async fn query(&self, query_vec: &[f32], k: usize, filter: &ChunkFilter)
        -> Result<Vec<ScoredChunk>>;

    /// Number of stored chunks.
    async fn count(&self) -> Result<u64>;
}

// ============ SQLite implementation ============

pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    pub fn file_path(index_dir: &Path) -> PathBuf {
        index_dir.join("index.sqlite")
    }

    /// Open (creating if missing) the index under `index_dir`.
    pub async fn open(index_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_dir)
            .with_context(|| format!("Failed to create index dir {}", index_dir.display()))?;

        let db_path = Self::file_path(index_dir);
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                scope TEXT NOT NULL,
                campaign TEXT,
                tag_name TEXT NOT NULL,
                path TEXT NOT NULL,
                embedding BLOB NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_tag_name ON chunks(tag_name)")
            .execute(&pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_campaign ON chunks(campaign)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    /// Whether a non-empty index is already present under `index_dir`.
    pub async fn exists_nonempty(index_dir: &Path) -> Result<bool> {
        if !Self::file_path(index_dir).exists() {
            return Ok(false);
        }
        let index = Self::open(index_dir).await?;
        let count = index.count().await?;
        index.close().await;
        Ok(count > 0)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ChunkIndex for SqliteIndex {
    async fn add(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        anyhow::ensure!(
            chunks.len() == vectors.len(),
            "chunk batch and vector batch differ in length"
        );

        let mut tx = self.pool.begin().await?;
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, text, scope, campaign, tag_name, path, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.text)
            .bind(chunk.meta.scope.as_str())
            .bind(&chunk.meta.campaign)
            .bind(&chunk.meta.tag_name)
            .bind(chunk.meta.path.to_string_lossy().to_string())
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        query_vec: &[f32],
        k: usize,
        filter: &ChunkFilter,
    ) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut sql =
            String::from("SELECT id, text, scope, campaign, tag_name, path, embedding FROM chunks");
        let mut conditions = Vec::new();
        if filter.tag_name.is_some() {
            conditions.push("tag_name = ?");
        }
        if filter.campaign.is_some() {
            conditions.push("campaign = ?");
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        let mut query = sqlx::query(&sql);
        if let Some(ref tag) = filter.tag_name {
            query = query.bind(tag);
        }
        if let Some(ref campaign) = filter.campaign {
            query = query.bind(campaign);
        }

        let rows = query.fetch_all(&self.pool).await?;

        let mut results: Vec<ScoredChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vector = blob_to_vec(&blob);
                let score = cosine_similarity(query_vec, &vector) as f64;
                let scope: String = row.get("scope");
                let path: String = row.get("path");
                ScoredChunk {
                    chunk: Chunk {
                        id: row.get("id"),
                        text: row.get("text"),
                        meta: LoreMeta {
                            scope: Scope::from_str_lossy(&scope),
                            campaign: row.get("campaign"),
                            tag_name: row.get("tag_name"),
                            path: PathBuf::from(path),
                        },
                    },
                    score,
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);

        Ok(results)
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

// ============ In-memory implementation ============

/// Brute-force in-memory index for unit tests.
pub struct MemoryIndex {
    entries: RwLock<Vec<(Chunk, Vec<f32>)>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChunkIndex for MemoryIndex {
    async fn add(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        anyhow::ensure!(
            chunks.len() == vectors.len(),
            "chunk batch and vector batch differ in length"
        );
        let mut entries = self.entries.write().unwrap();
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            entries.push((chunk.clone(), vector.clone()));
        }
        Ok(())
    }

    async fn query(
        &self,
        query_vec: &[f32],
        k: usize,
        filter: &ChunkFilter,
    ) -> Result<Vec<ScoredChunk>> {
        let entries = self.entries.read().unwrap();
        let mut results: Vec<ScoredChunk> = entries
            .iter()
            .filter(|(chunk, _)| filter.matches(&chunk.meta))
            .map(|(chunk, vector)| ScoredChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(query_vec, vector) as f64,
            })
            .collect();
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);
        Ok(results)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.entries.read().unwrap().len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn chunk(id: &str, text: &str, tag: &str, campaign: Option<&str>) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: text.to_string(),
            meta: LoreMeta {
                scope: if campaign.is_some() {
                    Scope::Campaign
                } else {
                    Scope::Global
                },
                campaign: campaign.map(|c| c.to_string()),
                tag_name: tag.to_string(),
                path: PathBuf::from(format!("{tag}.txt")),
            },
        }
    }

    #[tokio::test]
    async fn test_sqlite_add_and_filtered_query() {
        let tmp = tempfile::tempdir().unwrap();
        let index = SqliteIndex::open(tmp.path()).await.unwrap();

        let chunks = vec![
            chunk("c1", "warriors of the gate", "warrior", None),
            chunk("c2", "ravenfall warriors", "warrior", Some("ravenfall")),
            chunk("c3", "house arden rules", "noble", None),
        ];
        let vectors = vec![vec![1.0, 0.0], vec![0.9, 0.1], vec![0.0, 1.0]];
        index.add(&chunks, &vectors).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 3);

        let results = index
            .query(&[1.0, 0.0], 10, &ChunkFilter::for_tag("warrior", None))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.id, "c1");

        let results = index
            .query(
                &[1.0, 0.0],
                10,
                &ChunkFilter::for_tag("warrior", Some("ravenfall")),
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.id, "c2");
        index.close().await;
    }

    #[tokio::test]
    async fn test_sqlite_exists_nonempty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(!SqliteIndex::exists_nonempty(tmp.path()).await.unwrap());

        let index = SqliteIndex::open(tmp.path()).await.unwrap();
        index.close().await;
        // Present but empty still counts as absent.
        assert!(!SqliteIndex::exists_nonempty(tmp.path()).await.unwrap());

        let index = SqliteIndex::open(tmp.path()).await.unwrap();
        index
            .add(&[chunk("c1", "text", "warrior", None)], &[vec![1.0]])
            .await
            .unwrap();
        index.close().await;
        assert!(SqliteIndex::exists_nonempty(tmp.path()).await.unwrap());
    }

    #[tokio::test]
    async fn test_sqlite_append_keeps_existing_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let index = SqliteIndex::open(tmp.path()).await.unwrap();
        index
            .add(&[chunk("c1", "first", "warrior", None)], &[vec![1.0]])
            .await
            .unwrap();
        index.close().await;

        let index = SqliteIndex::open(tmp.path()).await.unwrap();
        index
            .add(&[chunk("c2", "second", "warrior", None)], &[vec![0.5]])
            .await
            .unwrap();
        assert_eq!(index.count().await.unwrap(), 2);
        index.close().await;
    }

    #[tokio::test]
    async fn test_memory_index_ranking_and_k_bound() {
        let index = MemoryIndex::new();
        let chunks = vec![
            chunk("c1", "a", "t", None),
            chunk("c2", "b", "t", None),
            chunk("c3", "c", "t", None),
        ];
        let vectors = vec![vec![0.2, 0.8], vec![1.0, 0.0], vec![0.7, 0.3]];
        index.add(&chunks, &vectors).await.unwrap();

        let results = index
            .query(&[1.0, 0.0], 2, &ChunkFilter::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.id, "c2");
        assert_eq!(results[1].chunk.id, "c3");
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_filter_campaign_only() {
        let index = MemoryIndex::new();
        index
            .add(
                &[
                    chunk("c1", "a", "warrior", Some("ravenfall")),
                    chunk("c2", "b", "noble", Some("ravenfall")),
                    chunk("c3", "c", "warrior", None),
                ],
                &[vec![1.0], vec![1.0], vec![1.0]],
            )
            .await
            .unwrap();

        let results = index
            .query(&[1.0], 10, &ChunkFilter::for_campaign(Some("ravenfall")))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results
            .iter()
            .all(|r| r.chunk.meta.campaign.as_deref() == Some("ravenfall")));
    }
}
