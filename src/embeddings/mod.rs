// Embeddings module
// Sentence-aware fragment splitting and the embedding capability used to vectorize fragments

pub mod chunking;
pub mod ollama;

pub use chunking::{
    ChunkingConfig, Fragment, FragmentSplitter, split_into_fragments, split_sentences,
};
pub use ollama::OllamaClient;

/// Maps text to a fixed-dimension vector.
///
/// Implementations must be deterministic for a given model so that rebuilding
/// from an unchanged corpus reproduces the same index.
pub trait Embedder {
    /// Identifier of the model producing the vectors, recorded in persisted indexes
    fn model_id(&self) -> &str;

    /// Embed a single text
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// Embed several texts, preserving order
    #[inline]
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

impl<E: Embedder + ?Sized> Embedder for &E {
    #[inline]
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    #[inline]
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        (**self).embed(text)
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }
}
