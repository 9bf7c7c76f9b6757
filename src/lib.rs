//! # Loredex
//!
//! A file-backed lore index and tag-scoped context retriever for AI game
//! characters.
//!
//! Loredex watches a directory of plain-text "lore" files describing
//! game-world entities (NPC traits, locations, factions), keeps a chunked
//! embedding index consistent with those files through mtime-based
//! staleness detection, and assembles bounded, tag-prioritized context
//! bundles for grounding a persona's responses.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌──────────────┐
//! │ SourceCatalog │──▶│ IndexManager  │──▶│  ChunkIndex   │
//! │ classify/load │   │ chunk + embed │   │ SQLite (vec)  │
//! └──────────────┘   │ checkpoint    │   └──────┬───────┘
//!                    └───────────────┘          │
//!                                       ┌───────▼───────┐
//!                                       │ LoreRetriever  │
//!                                       │ tags / context │
//!                                       └───────────────┘
//! ```
//!
//! Lore files live under a fixed convention: `global/tags/<tag>.txt` for
//! world-wide content and `campaigns/<name>/tags/<tag>.txt` for content
//! scoped to one campaign. The two scopes never bleed into each other.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Catalog read errors |
//! | [`catalog`] | Source tree discovery and classification |
//! | [`chunk`] | Size-bounded recursive text splitting |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Chunk index contract and backends |
//! | [`manager`] | Index lifecycle and staleness |
//! | [`retriever`] | Tag-scoped retrieval and persona context |

pub mod catalog;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod manager;
pub mod models;
pub mod retriever;
