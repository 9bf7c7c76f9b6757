//! Retrieval-layer properties: persona context ordering and budgets,
//! summaries, reports, and scope isolation, exercised over the in-memory
//! index with the deterministic hashed embedding provider.

use std::path::PathBuf;

use loredex::config::{Config, ChunkingConfig, EmbeddingConfig, PathsConfig, RetrievalConfig};
use loredex::embedding::embed_query;
use loredex::index::{ChunkIndex, MemoryIndex};
use loredex::models::{Chunk, LoreMeta, Scope};
use loredex::retriever::LoreRetriever;

fn test_config(root: &std::path::Path) -> Config {
    Config {
        paths: PathsConfig {
            source_root: root.join("source"),
            index_dir: root.join("index"),
            checkpoint: root.join("processed/last_updated.json"),
        },
        chunking: ChunkingConfig::default(),
        retrieval: RetrievalConfig::default(),
        embedding: EmbeddingConfig {
            dims: 64,
            ..EmbeddingConfig::default()
        },
    }
}

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
            path: PathBuf::from(format!("global/tags/{tag}.txt")),
        },
    }
}

async fn populate(config: &Config, chunks: Vec<Chunk>) -> MemoryIndex {
    let index = MemoryIndex::new();
    let mut vectors = Vec::with_capacity(chunks.len());
    for c in &chunks {
        vectors.push(embed_query(&config.embedding, &c.text).await.unwrap());
    }
    index.add(&chunks, &vectors).await.unwrap();
    index
}

#[tokio::test]
async fn test_persona_context_order_and_truncation() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());

    // warrior: two 50-char chunks; noble: two 400-char chunks.
    let short_a = "warrior lore entry alpha padded to fifty chars xxx";
    let short_b = "warrior lore entry bravo padded to fifty chars xxx";
    let long_a = format!("noble house arden {}", "a".repeat(382));
    let long_b = format!("noble house vale {}", "b".repeat(383));
    assert_eq!(short_a.chars().count(), 50);
    assert_eq!(long_a.chars().count(), 400);
    assert_eq!(long_b.chars().count(), 400);

    let index = populate(
        &config,
        vec![
            chunk("w1", short_a, "warrior", None),
            chunk("w2", short_b, "warrior", None),
            chunk("n1", &long_a, "noble", None),
            chunk("n2", &long_b, "noble", None),
        ],
    )
    .await;

    let retriever = LoreRetriever::with_index(Box::new(index), &config).unwrap();
    let entries = retriever
        .assemble_persona_context(
            &["warrior".to_string(), "noble".to_string()],
            "",
            None,
            10,
        )
        .await
        .unwrap();

    // Cap never bites here: 2 chunks per declared tag, 4 entries total.
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0].0, "warrior");
    assert_eq!(entries[1].0, "warrior");
    assert_eq!(entries[2].0, "noble");
    assert_eq!(entries[3].0, "noble");

    // Short chunks pass through untouched; long ones are cut to 300 + "...".
    for (_, content) in &entries[..2] {
        assert!(content.chars().count() <= 300);
        assert!(!content.ends_with("..."));
    }
    for (_, content) in &entries[2..] {
        assert_eq!(content.chars().count(), 303);
        assert!(content.ends_with("..."));
    }
}

#[tokio::test]
async fn test_persona_context_hard_cap_drops_later_tags() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());

    let mut chunks = Vec::new();
    for tag in ["a", "b", "c", "d"] {
        for i in 0..2 {
            chunks.push(chunk(
                &format!("{tag}{i}"),
                &format!("{tag} lore piece {i}"),
                tag,
                None,
            ));
        }
    }
    let index = populate(&config, chunks).await;
    let retriever = LoreRetriever::with_index(Box::new(index), &config).unwrap();

    let tags: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
    let entries = retriever
        .assemble_persona_context(&tags, "", None, 5)
        .await
        .unwrap();

    assert_eq!(entries.len(), 5);
    let tag_order: Vec<&str> = entries.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(tag_order, vec!["a", "a", "b", "b", "c"]);
}

#[tokio::test]
async fn test_persona_context_query_fallback_tops_up() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());

    let index = populate(
        &config,
        vec![
            chunk("w1", "warrior oath of silence", "warrior", None),
            chunk("m1", "the eastern market trades in ember steel", "market", None),
            chunk("m2", "grain prices rose in the market", "market", None),
        ],
    )
    .await;
    let retriever = LoreRetriever::with_index(Box::new(index), &config).unwrap();

    let entries = retriever
        .assemble_persona_context(&["warrior".to_string()], "ember steel market", None, 3)
        .await
        .unwrap();

    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].0, "warrior");
    // Fallback entries carry the matched chunk's own tag.
    assert!(entries[1..].iter().all(|(t, _)| t == "market" || t == "warrior"));
}

#[tokio::test]
async fn test_persona_context_no_fallback_without_query() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());

    let index = populate(
        &config,
        vec![
            chunk("w1", "warrior oath", "warrior", None),
            chunk("m1", "market gossip", "market", None),
        ],
    )
    .await;
    let retriever = LoreRetriever::with_index(Box::new(index), &config).unwrap();

    let entries = retriever
        .assemble_persona_context(&["warrior".to_string()], "", None, 10)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "warrior");
}

#[tokio::test]
async fn test_persona_context_campaign_isolation() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());

    let index = populate(
        &config,
        vec![
            chunk("g1", "global warrior lore", "warrior", None),
            chunk("r1", "ravenfall warrior lore", "warrior", Some("ravenfall")),
        ],
    )
    .await;
    let retriever = LoreRetriever::with_index(Box::new(index), &config).unwrap();

    let entries = retriever
        .assemble_persona_context(&["warrior".to_string()], "", Some("ravenfall"), 10)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].1, "ravenfall warrior lore");
}

#[tokio::test]
async fn test_tag_summary_sentinel_for_missing_tag() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let index = populate(&config, vec![]).await;
    let retriever = LoreRetriever::with_index(Box::new(index), &config).unwrap();

    let summary = retriever.tag_summary("ghost", None, 500).await.unwrap();
    assert_eq!(summary, "No content found for tag 'ghost'");
}

#[tokio::test]
async fn test_tag_summary_joins_and_truncates() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());

    let index = populate(
        &config,
        vec![
            chunk("w1", "warrior first piece", "warrior", None),
            chunk("w2", "warrior second piece", "warrior", None),
        ],
    )
    .await;
    let retriever = LoreRetriever::with_index(Box::new(index), &config).unwrap();

    let summary = retriever.tag_summary("warrior", None, 500).await.unwrap();
    assert!(summary.contains("warrior first piece"));
    assert!(summary.contains("warrior second piece"));
    assert!(summary.contains("\n\n"));
    assert!(!summary.ends_with('\n'));

    let tight = retriever.tag_summary("warrior", None, 10).await.unwrap();
    assert!(tight.ends_with("..."));
    assert!(tight.chars().count() <= 13);
}

#[tokio::test]
async fn test_metadata_report_aggregates() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());

    let index = populate(
        &config,
        vec![
            chunk("w1", "warrior guard duty", "warrior", None), // 18 chars
            chunk("w2", "warrior oath", "warrior", None),       // 12 chars
        ],
    )
    .await;
    let retriever = LoreRetriever::with_index(Box::new(index), &config).unwrap();

    let report = retriever
        .metadata_report("warrior", None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.meta.tag_name, "warrior");
    assert_eq!(report.total_documents, 2);
    assert_eq!(report.total_content_length, 30);
    assert_eq!(report.average_chunk_size, 15);

    let missing = retriever.metadata_report("ghost", None).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_similarity_search_bounds_and_filter() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());

    let index = populate(
        &config,
        vec![
            chunk("g1", "ember steel forged in the mountain", "smith", None),
            chunk("r1", "ravenfall smith hammers ember steel", "smith", Some("ravenfall")),
            chunk("g2", "the noble court dances at dusk", "noble", None),
        ],
    )
    .await;
    let retriever = LoreRetriever::with_index(Box::new(index), &config).unwrap();

    let all = retriever
        .similarity_search("ember steel", 2, None)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert!(all[0].score >= all[1].score);

    let scoped = retriever
        .similarity_search("ember steel", 10, Some("ravenfall"))
        .await
        .unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].chunk.id, "r1");
}
