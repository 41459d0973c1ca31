// Vector index module
// Exact nearest-neighbor search over a flat, immutable set of embedding vectors

#[cfg(test)]
mod tests;

use tracing::debug;

use crate::{Result, RetrievalError};

/// One search result: the position of a stored vector and its distance to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    /// Squared Euclidean distance
    pub distance: f32,
}

/// Flat L2 index.
///
/// Vectors are stored back to back in a single buffer. The index is built once
/// and never mutated; a changed corpus means building a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Build an index from vectors that all share one non-zero dimension
    #[inline]
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self> {
        let Some(first) = vectors.first() else {
            return Err(RetrievalError::Index(
                "cannot build an index from zero vectors".to_string(),
            ));
        };

        let dimension = first.len();
        if dimension == 0 {
            return Err(RetrievalError::Index(
                "vectors must have at least one dimension".to_string(),
            ));
        }

        let mut data = Vec::with_capacity(dimension * vectors.len());
        for (position, vector) in vectors.into_iter().enumerate() {
            if vector.len() != dimension {
                return Err(RetrievalError::DimensionMismatch {
                    position,
                    expected: dimension,
                    found: vector.len(),
                });
            }
            data.extend(vector);
        }

        debug!(
            "Built vector index with {} vectors of dimension {}",
            data.len() / dimension,
            dimension
        );

        Ok(Self { dimension, data })
    }

    /// Rebuild an index from its flat representation, checking its invariants
    #[inline]
    pub fn from_flat(dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 {
            return Err(RetrievalError::Index(
                "vectors must have at least one dimension".to_string(),
            ));
        }
        if data.is_empty() {
            return Err(RetrievalError::Index(
                "cannot build an index from zero vectors".to_string(),
            ));
        }
        if data.len() % dimension != 0 {
            return Err(RetrievalError::Index(format!(
                "flat data of length {} is not a multiple of dimension {}",
                data.len(),
                dimension
            )));
        }

        Ok(Self { dimension, data })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    /// Always false for a successfully built index
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The stored vector at `position`
    #[inline]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        self.data.chunks_exact(self.dimension).nth(position)
    }

    /// The flat vector buffer, `len() * dimension()` values
    #[inline]
    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }

    /// Return up to `k` stored vectors nearest to `query`, closest first.
    ///
    /// Equal distances keep insertion order.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(RetrievalError::InvalidQuery(format!(
                "query vector has dimension {} but the index has dimension {}",
                query.len(),
                self.dimension
            )));
        }

        if k == 0 {
            return Ok(Vec::new());
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, vector)| Neighbor {
                position,
                distance: squared_l2(query, vector),
            })
            .collect();

        // stable, so ties stay in insertion order
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        neighbors.truncate(k);

        Ok(neighbors)
    }
}

/// Squared Euclidean distance between two equal-length vectors
#[inline]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}
