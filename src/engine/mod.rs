// Retrieval engine module
// Answers similarity queries against a loaded snapshot under a character budget


use std::path::Path;
use tracing::debug;

use crate::embeddings::Embedder;
use crate::embeddings::chunking::ChunkingConfig;
use crate::indexer::IndexBuilder;
use crate::store::{IndexSnapshot, IndexStore};
use crate::{Result, RetrievalError};

/// One retrieved fragment with its provenance and distance to the query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub text: String,
    pub document: String,
    pub ordinal: usize,
    pub distance: f32,
}

/// Query engine over an immutable index snapshot.
///
/// Created empty; `load_or_build` or `install` makes it ready. Searching an
/// engine with no snapshot fails with `NotReady`.
pub struct RetrievalEngine<E> {
    embedder: E,
    snapshot: Option<IndexSnapshot>,
}

impl<E: Embedder> RetrievalEngine<E> {
    #[inline]
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            snapshot: None,
        }
    }

    /// Load the index stored at `store`, or build it from `corpus_dir` and save it,
    /// returning a ready engine
    #[inline]
    pub fn open(
        embedder: E,
        store: &IndexStore,
        corpus_dir: &Path,
        chunking: &ChunkingConfig,
    ) -> Result<Self> {
        let mut engine = Self::new(embedder);
        engine.load_or_build(store, corpus_dir, chunking)?;
        Ok(engine)
    }

    #[inline]
    pub fn load_or_build(
        &mut self,
        store: &IndexStore,
        corpus_dir: &Path,
        chunking: &ChunkingConfig,
    ) -> Result<&IndexSnapshot> {
        let snapshot = {
            let builder = IndexBuilder::new(&self.embedder, chunking.clone());
            store.load_or_build(corpus_dir, &builder)?
        };
        Ok(self.install(snapshot))
    }

    /// Replace the current snapshot as a whole
    #[inline]
    pub fn install(&mut self, snapshot: IndexSnapshot) -> &IndexSnapshot {
        self.snapshot.insert(snapshot)
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.snapshot.is_some()
    }

    #[inline]
    pub fn snapshot(&self) -> Option<&IndexSnapshot> {
        self.snapshot.as_ref()
    }

    #[inline]
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Texts of the nearest fragments that fit in `max_characters`, closest first
    #[inline]
    pub fn search(&self, query: &str, top_k: usize, max_characters: usize) -> Result<Vec<String>> {
        Ok(self
            .search_hits(query, top_k, max_characters)?
            .into_iter()
            .map(|hit| hit.text)
            .collect())
    }

    /// Like `search`, keeping document, ordinal and distance for each fragment.
    ///
    /// Fragments are taken whole, nearest first, until the next one would push
    /// the total past `max_characters`; nothing after that point is considered.
    #[inline]
    pub fn search_hits(
        &self,
        query: &str,
        top_k: usize,
        max_characters: usize,
    ) -> Result<Vec<SearchHit>> {
        let snapshot = self.snapshot.as_ref().ok_or(RetrievalError::NotReady)?;

        if top_k == 0 {
            return Err(RetrievalError::InvalidQuery(
                "top_k must be at least 1".to_string(),
            ));
        }

        let query_vector = self
            .embedder
            .embed(query)
            .map_err(|e| RetrievalError::Embedding(format!("{:#}", e)))?;

        let neighbors = snapshot.index().search(&query_vector, top_k)?;

        let mut hits = Vec::with_capacity(neighbors.len());
        let mut used_characters = 0;
        for neighbor in neighbors {
            let Some(fragment) = snapshot.fragments().get(neighbor.position) else {
                return Err(RetrievalError::Index(format!(
                    "neighbor position {} has no fragment",
                    neighbor.position
                )));
            };

            let length = fragment.text.chars().count();
            if used_characters + length > max_characters {
                debug!(
                    "Character budget {} reached after {} fragments",
                    max_characters,
                    hits.len()
                );
                break;
            }

            used_characters += length;
            hits.push(SearchHit {
                text: fragment.text.clone(),
                document: fragment.document.clone(),
                ordinal: fragment.ordinal,
                distance: neighbor.distance,
            });
        }

        debug!(
            "Query returned {} fragments ({} characters)",
            hits.len(),
            used_characters
        );
        Ok(hits)
    }
}
