// Index persistence module
// Serializes index snapshots to a single blob and rebuilds them when the blob is unusable


use bincode::config::{Configuration, Limit, standard};
use bincode::serde::{decode_from_slice, encode_to_vec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::embeddings::Embedder;
use crate::index::VectorIndex;
use crate::indexer::IndexBuilder;
use crate::{Result, RetrievalError};

/// Leading bytes of every index blob
pub const BLOB_MAGIC: &[u8; 8] = b"CTXIDX\0\0";

/// Bump this value whenever the blob payload layout changes.
pub const BLOB_FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = BLOB_MAGIC.len() + 2;
const MAX_BLOB_BYTES: usize = 1 << 30;

type BlobConfig = Configuration<bincode::config::LittleEndian, bincode::config::Varint, Limit<MAX_BLOB_BYTES>>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Index blob not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("Index blob at {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("Index blob at {} has unsupported format version {found} (expected {expected})", path.display())]
    UnsupportedVersion {
        path: PathBuf,
        found: u16,
        expected: u16,
    },

    #[error("Index blob at {} was built with model '{found}', but '{expected}' is configured", path.display())]
    ModelMismatch {
        path: PathBuf,
        found: String,
        expected: String,
    },

    #[error("Index blob at {} was split into fragments of {found} characters, but {expected} is configured", path.display())]
    FragmentSizeMismatch {
        path: PathBuf,
        found: usize,
        expected: usize,
    },

    #[error("Failed to read index blob at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write index blob at {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to encode index blob: {0}")]
    Encode(String),
}

impl StoreError {
    /// Whether this error means the blob should be rebuilt rather than reported
    #[inline]
    pub fn is_rebuildable(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::Corrupt { .. }
                | Self::UnsupportedVersion { .. }
                | Self::ModelMismatch { .. }
                | Self::FragmentSizeMismatch { .. }
        )
    }
}

/// Fragment text plus where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFragment {
    pub text: String,
    pub document: String,
    pub ordinal: usize,
}

/// An immutable, queryable index: vectors plus the parallel fragment list.
///
/// Position `i` of the index and of `fragments` always refer to the same fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSnapshot {
    model: String,
    fragment_size: usize,
    created_at: DateTime<Utc>,
    index: VectorIndex,
    fragments: Vec<StoredFragment>,
}

impl IndexSnapshot {
    #[inline]
    pub fn new(
        model: impl Into<String>,
        fragment_size: usize,
        index: VectorIndex,
        fragments: Vec<StoredFragment>,
    ) -> Result<Self> {
        Self::with_created_at(model, fragment_size, Utc::now(), index, fragments)
    }

    fn with_created_at(
        model: impl Into<String>,
        fragment_size: usize,
        created_at: DateTime<Utc>,
        index: VectorIndex,
        fragments: Vec<StoredFragment>,
    ) -> Result<Self> {
        if index.len() != fragments.len() {
            return Err(RetrievalError::Index(format!(
                "index holds {} vectors but {} fragments were supplied",
                index.len(),
                fragments.len()
            )));
        }

        Ok(Self {
            model: model.into(),
            fragment_size,
            created_at,
            index,
            fragments,
        })
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn fragment_size(&self) -> usize {
        self.fragment_size
    }

    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[inline]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    #[inline]
    pub fn fragments(&self) -> &[StoredFragment] {
        &self.fragments
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// On-disk payload that follows the blob header
#[derive(Debug, Serialize, Deserialize)]
struct IndexBlob {
    model: String,
    fragment_size: usize,
    created_at: DateTime<Utc>,
    dimension: usize,
    vectors: Vec<f32>,
    fragments: Vec<StoredFragment>,
}

/// Reads and writes the index blob at one path
#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    #[inline]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored snapshot, whichever model produced it
    #[inline]
    pub fn load(&self) -> std::result::Result<IndexSnapshot, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(self.path.clone()));
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let snapshot = self.decode(&bytes)?;
        info!(
            "Loaded index with {} fragments from {}",
            snapshot.len(),
            self.path.display()
        );
        Ok(snapshot)
    }

    /// Load the stored snapshot, rejecting one built by a different model
    #[inline]
    pub fn load_for_model(&self, model: &str) -> std::result::Result<IndexSnapshot, StoreError> {
        let snapshot = self.load()?;
        if snapshot.model() != model {
            return Err(StoreError::ModelMismatch {
                path: self.path.clone(),
                found: snapshot.model().to_string(),
                expected: model.to_string(),
            });
        }
        Ok(snapshot)
    }

    /// Load the stored snapshot only if it was built by `model` with `fragment_size`
    #[inline]
    pub fn load_matching(
        &self,
        model: &str,
        fragment_size: usize,
    ) -> std::result::Result<IndexSnapshot, StoreError> {
        let snapshot = self.load_for_model(model)?;
        if snapshot.fragment_size() != fragment_size {
            return Err(StoreError::FragmentSizeMismatch {
                path: self.path.clone(),
                found: snapshot.fragment_size(),
                expected: fragment_size,
            });
        }
        Ok(snapshot)
    }

    /// Serialize `snapshot`, overwriting any existing blob
    #[inline]
    pub fn save(&self, snapshot: &IndexSnapshot) -> std::result::Result<(), StoreError> {
        let blob = IndexBlob {
            model: snapshot.model.clone(),
            fragment_size: snapshot.fragment_size,
            created_at: snapshot.created_at,
            dimension: snapshot.index.dimension(),
            vectors: snapshot.index.as_flat().to_vec(),
            fragments: snapshot.fragments.clone(),
        };

        let payload =
            encode_to_vec(&blob, blob_config()).map_err(|e| StoreError::Encode(e.to_string()))?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(BLOB_MAGIC);
        bytes.extend_from_slice(&BLOB_FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&payload);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                path: self.path.clone(),
                source,
            })?;
        }

        fs::write(&self.path, &bytes).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;

        info!(
            "Saved index with {} fragments ({} bytes) to {}",
            snapshot.len(),
            bytes.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Load the stored snapshot, or build one from `corpus_dir` and save it.
    ///
    /// A missing, corrupt or outdated blob costs one rebuild, as does one built
    /// by another model or with another fragment size.
    /// Read and write failures and build failures propagate.
    #[inline]
    pub fn load_or_build<E: Embedder>(
        &self,
        corpus_dir: &Path,
        builder: &IndexBuilder<'_, E>,
    ) -> Result<IndexSnapshot> {
        match self.load_matching(builder.model_id(), builder.chunking().fragment_size) {
            Ok(snapshot) => return Ok(snapshot),
            Err(StoreError::NotFound(_)) => {
                info!(
                    "No index found at {}, building a new one",
                    self.path.display()
                );
            }
            Err(e) if e.is_rebuildable() => {
                warn!("Discarding stored index: {}", e);
            }
            Err(e) => return Err(e.into()),
        }

        let (snapshot, stats) = builder.build(corpus_dir)?;
        debug!("Rebuild finished: {:?}", stats);
        self.save(&snapshot)?;
        Ok(snapshot)
    }

    fn decode(&self, bytes: &[u8]) -> std::result::Result<IndexSnapshot, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            path: self.path.clone(),
            reason,
        };

        if bytes.len() > MAX_BLOB_BYTES + HEADER_LEN {
            return Err(corrupt(format!("blob is {} bytes, over the size limit", bytes.len())));
        }

        let (header, payload) = bytes
            .split_first_chunk::<HEADER_LEN>()
            .ok_or_else(|| corrupt("blob is shorter than its header".to_string()))?;

        let (magic, version) = header.split_at(BLOB_MAGIC.len());
        if magic != BLOB_MAGIC {
            return Err(corrupt("missing index blob signature".to_string()));
        }

        let version = u16::from_le_bytes([version[0], version[1]]);
        if version != BLOB_FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                path: self.path.clone(),
                found: version,
                expected: BLOB_FORMAT_VERSION,
            });
        }

        let (blob, read): (IndexBlob, usize) =
            decode_from_slice(payload, blob_config()).map_err(|e| corrupt(e.to_string()))?;
        if read != payload.len() {
            return Err(corrupt(format!(
                "{} trailing bytes after payload",
                payload.len() - read
            )));
        }

        let index = VectorIndex::from_flat(blob.dimension, blob.vectors)
            .map_err(|e| corrupt(e.to_string()))?;

        IndexSnapshot::with_created_at(
            blob.model,
            blob.fragment_size,
            blob.created_at,
            index,
            blob.fragments,
        )
        .map_err(|e| corrupt(e.to_string()))
    }
}

fn blob_config() -> BlobConfig {
    standard().with_limit::<MAX_BLOB_BYTES>()
}
