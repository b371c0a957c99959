//! Schema context retrieval.
//!
//! The agent only sees [`SchemaContextProvider`]. The lexical index and its
//! cache are the in-process implementation used by the binaries.

pub mod cache;
pub mod index;
pub mod splitter;

pub use cache::{CachedRetriever, RetrievalCacheStats};
pub use index::{load_documents, LexicalIndex};
pub use splitter::TextSplitter;

use async_trait::async_trait;
use std::path::PathBuf;

/// Separator placed between snippets in a context blob
pub const SNIPPET_SEPARATOR: &str = "\n---\n";

/// Returns ranked schema/documentation snippets relevant to free text
#[async_trait]
pub trait SchemaContextProvider: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, RetrievalError>;

    /// Hit/miss counters when the provider caches its results
    fn cache_stats(&self) -> Option<RetrievalCacheStats> {
        None
    }
}

/// Retrieve the top `k` snippets for `query` and join them into one blob
pub async fn schema_context(
    provider: &dyn SchemaContextProvider,
    query: &str,
    k: usize,
) -> Result<String, RetrievalError> {
    let snippets = provider.retrieve(query, k).await?;
    Ok(join_snippets(&snippets))
}

pub fn join_snippets(snippets: &[String]) -> String {
    snippets.join(SNIPPET_SEPARATOR)
}

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No documents to index")]
    EmptyCorpus,
}
