//! External-interface traits: the narrow surfaces through which the core
//! consumes caller-owned vector storage, per `spec.md` §6.
//!
//! The core never mutates externally-owned vectors and never performs file
//! I/O through these traits; any blocking happens on the caller's side of
//! the boundary.

use serde::{Deserialize, Serialize};

/// Dense small integer identifying a vector within a [`VectorSource`] or a
/// graph's ordinal space.
pub type Ordinal = u32;

/// The similarity/distance function a graph or PQ codec is built against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Similarity {
    /// Inner product; higher is more similar.
    DotProduct,
    /// Squared Euclidean distance; scoring paths invert it (exact scoring
    /// negates it, PQ ADC/SDC tables fold it into `[0, 1]` per §4.2) so a
    /// larger score still means "closer" everywhere a `Similarity` is used.
    SquaredL2,
    /// Cosine similarity; higher is more similar.
    Cosine,
}

impl Similarity {
    /// `true` for similarity functions where a larger score means "closer".
    #[must_use]
    pub const fn higher_is_better(self) -> bool {
        true
    }
}

/// Random-access read-by-ordinal vector storage, externally supplied.
///
/// Implementors must be safe to call concurrently from many search/build
/// threads; the core holds no lock across a call into this trait.
pub trait VectorSource: Send + Sync {
    /// Number of vectors currently addressable.
    fn size(&self) -> usize;

    /// Dimensionality shared by every vector in this source.
    fn dimension(&self) -> usize;

    /// Borrows the vector at `ordinal`.
    ///
    /// # Panics
    ///
    /// Implementations may panic on out-of-range ordinals; callers within
    /// this crate always bounds-check first and surface
    /// `Error::IndexOutOfBounds` instead of reaching this path.
    fn get_vector(&self, ordinal: Ordinal) -> &[f32];
}

/// A `Vec<Vec<f32>>`-backed [`VectorSource`], primarily for tests and small
/// benchmarks.
#[derive(Debug, Clone, Default)]
pub struct InMemoryVectorSource {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl InMemoryVectorSource {
    /// Builds a source from owned vectors; all vectors must share `dimension`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` if any vector's length differs from
    /// the first vector's length.
    pub fn new(vectors: Vec<Vec<f32>>) -> crate::error::Result<Self> {
        let dimension = vectors.first().map_or(0, Vec::len);
        for v in &vectors {
            if v.len() != dimension {
                return Err(crate::error::Error::InvalidArgument(format!(
                    "expected dimension {dimension}, got {}",
                    v.len()
                )));
            }
        }
        Ok(Self { dimension, vectors })
    }
}

impl VectorSource for InMemoryVectorSource {
    fn size(&self) -> usize {
        self.vectors.len()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn get_vector(&self, ordinal: Ordinal) -> &[f32] {
        &self.vectors[ordinal as usize]
    }
}

/// Yields an approximate score function bound to a single query, over
/// compressed (e.g. PQ-encoded) storage.
pub trait CompressedVectors: Send + Sync {
    /// Number of stored codes.
    fn size(&self) -> usize;

    /// Returns a closure computing the approximate score of `query` against
    /// the code stored at `ordinal`.
    fn approximate_score_function(&self, query: &[f32]) -> Box<dyn Fn(Ordinal) -> f32 + '_>;
}
