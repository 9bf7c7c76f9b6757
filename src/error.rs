//! Typed errors for the source catalog.
//!
//! Only the catalog has a closed error taxonomy callers match on: bulk
//! loading must distinguish an unreadable file from an undecodable one to
//! log and skip it. Everything else in the crate propagates
//! [`anyhow::Error`] with context.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoreError {
    /// The file could not be read from disk.
    #[error("Failed to read lore file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file's bytes are not valid UTF-8.
    #[error("Lore file {} is not valid UTF-8", path.display())]
    Decode { path: PathBuf },
}
