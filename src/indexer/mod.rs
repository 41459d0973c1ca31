// Indexer module
// Builds an index snapshot from a corpus directory: decode, split, embed, collect

#[cfg(test)]
mod tests;

use indicatif::ProgressBar;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::embeddings::Embedder;
use crate::embeddings::chunking::{ChunkingConfig, FragmentSplitter};
use crate::encoding::decode_document;
use crate::index::VectorIndex;
use crate::store::{IndexSnapshot, StoredFragment};
use crate::{Result, RetrievalError};

/// Statistics about one build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexingStats {
    pub documents_found: usize,
    pub documents_indexed: usize,
    pub documents_skipped: usize,
    pub fragments_created: usize,
    pub errors_encountered: usize,
}

/// Builds index snapshots with an injected embedding capability
pub struct IndexBuilder<'a, E> {
    embedder: &'a E,
    chunking: ChunkingConfig,
    progress: Option<ProgressBar>,
}

impl<'a, E: Embedder> IndexBuilder<'a, E> {
    #[inline]
    pub fn new(embedder: &'a E, chunking: ChunkingConfig) -> Self {
        Self {
            embedder,
            chunking,
            progress: None,
        }
    }

    /// Report per-document progress on `progress`
    #[inline]
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    #[inline]
    pub fn model_id(&self) -> &str {
        self.embedder.model_id()
    }

    #[inline]
    pub fn chunking(&self) -> &ChunkingConfig {
        &self.chunking
    }

    /// Index every document in `corpus_dir`.
    ///
    /// Documents that cannot be read, decoded or embedded are logged and
    /// skipped. Fails with `EmptyCorpus` when nothing at all was embedded.
    #[inline]
    pub fn build(&self, corpus_dir: &Path) -> Result<(IndexSnapshot, IndexingStats)> {
        info!("Building index from {}", corpus_dir.display());

        let documents = discover_documents(corpus_dir)?;
        let mut stats = IndexingStats {
            documents_found: documents.len(),
            ..IndexingStats::default()
        };

        if let Some(progress) = &self.progress {
            progress.set_length(documents.len() as u64);
        }

        let mut fragments = Vec::new();
        let mut vectors = Vec::new();

        for path in &documents {
            if let Some(progress) = &self.progress {
                progress.set_message(document_name(path));
            }

            match self.process_document(path) {
                Ok(embedded) if embedded.is_empty() => {
                    debug!("No fragments produced for {}", path.display());
                    stats.documents_skipped += 1;
                }
                Ok(embedded) => {
                    stats.documents_indexed += 1;
                    stats.fragments_created += embedded.len();
                    for (fragment, vector) in embedded {
                        fragments.push(fragment);
                        vectors.push(vector);
                    }
                }
                Err(e) => {
                    warn!("Skipping document {}: {}", path.display(), e);
                    stats.documents_skipped += 1;
                    stats.errors_encountered += 1;
                }
            }

            if let Some(progress) = &self.progress {
                progress.inc(1);
            }
        }

        if let Some(progress) = &self.progress {
            progress.finish_and_clear();
        }

        if vectors.is_empty() {
            return Err(RetrievalError::EmptyCorpus(corpus_dir.to_path_buf()));
        }

        let index = VectorIndex::build(vectors)?;
        let snapshot = IndexSnapshot::new(
            self.embedder.model_id(),
            self.chunking.fragment_size,
            index,
            fragments,
        )?;

        info!(
            "Indexed {} fragments from {}/{} documents ({} skipped)",
            stats.fragments_created,
            stats.documents_indexed,
            stats.documents_found,
            stats.documents_skipped
        );

        Ok((snapshot, stats))
    }

    /// Decode, split and embed one document.
    ///
    /// Returns nothing unless every fragment of the document was embedded, so
    /// a failure never leaves a document half indexed.
    fn process_document(&self, path: &Path) -> Result<Vec<(StoredFragment, Vec<f32>)>> {
        let name = document_name(path);
        debug!("Processing document: {}", name);

        let bytes = fs::read(path)?;
        let decoded =
            decode_document(&bytes).map_err(|e| RetrievalError::Corpus(format!("{}: {}", name, e)))?;
        debug!("Decoded {} as {}", name, decoded.encoding);

        let fragments: Vec<StoredFragment> =
            FragmentSplitter::new(&decoded.text, &name, &self.chunking)
                .map(|fragment| StoredFragment {
                    text: fragment.text,
                    document: fragment.document,
                    ordinal: fragment.ordinal,
                })
                .collect();

        if fragments.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = fragments.iter().map(|f| f.text.clone()).collect();
        let vectors = self
            .embedder
            .embed_batch(&texts)
            .map_err(|e| RetrievalError::Embedding(format!("{}: {:#}", name, e)))?;

        if vectors.len() != fragments.len() {
            return Err(RetrievalError::Embedding(format!(
                "{}: expected {} embeddings, received {}",
                name,
                fragments.len(),
                vectors.len()
            )));
        }

        Ok(fragments.into_iter().zip(vectors).collect())
    }
}

/// Regular files directly inside `corpus_dir`, sorted by file name
#[inline]
pub fn discover_documents(corpus_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(corpus_dir).map_err(|e| {
        RetrievalError::Corpus(format!(
            "Failed to read corpus directory {}: {}",
            corpus_dir.display(),
            e
        ))
    })?;

    let mut documents = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable directory entry: {}", e);
                continue;
            }
        };

        let path = entry.path();
        if path.is_file() {
            documents.push(path);
        } else {
            debug!("Skipping non-file entry {}", path.display());
        }
    }

    documents.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(documents)
}

fn document_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}
