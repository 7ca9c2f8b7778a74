//! Trained Product Quantization codebook (`spec.md` §4.2).
//!
//! Shaped after the teacher's `quantization.rs`: an immutable trained
//! struct produced once by `train`/`refine` and then shared freely (the
//! teacher wraps its per-dimension quantizer in an `Arc`; callers here are
//! expected to do the same). The subspace partitioning and k-means math
//! have no teacher precedent and follow `spec.md` directly.

use super::kmeans::{lloyd_anisotropic, lloyd_unweighted, seed_plus_plus, LloydResult};
use crate::error::{Error, Result};
use crate::vector_source::VectorSource;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Training/refinement parameters for a [`PqCodebook`].
#[derive(Debug, Clone, Copy)]
pub struct PqTrainParams {
    /// Number of subspaces (`M`).
    pub subspaces: usize,
    /// Clusters per subspace (`K`, at most 256 since codes are one byte).
    pub clusters: usize,
    /// `Some(threshold)` selects anisotropic Lloyd iteration.
    pub anisotropic_threshold: Option<f32>,
    /// Cap on Lloyd iterations per subspace.
    pub max_iterations: usize,
    /// Whether to center training vectors on their mean first.
    pub use_global_centroid: bool,
}

/// A trained Product Quantization codebook: `M` independent per-subspace
/// vocabularies of up to 256 centroids each.
#[derive(Debug, Clone, PartialEq)]
pub struct PqCodebook {
    dimension: usize,
    subspaces: usize,
    clusters: usize,
    anisotropic_threshold: Option<f32>,
    global_centroid: Option<Vec<f32>>,
    subvector_offsets: Vec<usize>,
    subvector_sizes: Vec<usize>,
    /// `centroids[s]` is `clusters` rows of `subvector_sizes[s]` floats,
    /// flattened row-major.
    centroids: Vec<Vec<f32>>,
}

/// Splits `dimension` into `m` contiguous subspaces; when it does not
/// divide evenly the remainder is distributed so earlier subspaces are one
/// element larger (`spec.md` §4.2 step 2).
fn partition_subvectors(dimension: usize, m: usize) -> (Vec<usize>, Vec<usize>) {
    let base = dimension / m;
    let remainder = dimension % m;
    let mut offsets = Vec::with_capacity(m);
    let mut sizes = Vec::with_capacity(m);
    let mut offset = 0;
    for s in 0..m {
        let size = if s < remainder { base + 1 } else { base };
        offsets.push(offset);
        sizes.push(size);
        offset += size;
    }
    (offsets, sizes)
}

fn mean_vector(vectors: &[Vec<f32>], dimension: usize) -> Vec<f32> {
    let mut sum = vec![0.0f32; dimension];
    for v in vectors {
        for (s, &x) in sum.iter_mut().zip(v) {
            *s += x;
        }
    }
    let n = vectors.len().max(1) as f32;
    sum.iter_mut().for_each(|s| *s /= n);
    sum
}

fn subtract(vectors: &[Vec<f32>], centroid: &[f32]) -> Vec<Vec<f32>> {
    vectors
        .iter()
        .map(|v| v.iter().zip(centroid).map(|(x, c)| x - c).collect())
        .collect()
}

fn extract_subspace(vectors: &[Vec<f32>], offset: usize, size: usize) -> Vec<Vec<f32>> {
    vectors.iter().map(|v| v[offset..offset + size].to_vec()).collect()
}

fn run_lloyd(points: &[Vec<f32>], seeds: Vec<Vec<f32>>, threshold: Option<f32>, max_iterations: usize) -> LloydResult {
    match threshold {
        Some(t) => lloyd_anisotropic(points, seeds, t, max_iterations),
        None => lloyd_unweighted(points, seeds, max_iterations),
    }
}

impl PqCodebook {
    /// Trains a fresh codebook from `vectors`, using an internally-seeded
    /// RNG for k-means++ initialization.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgument` if `vectors` is empty, `params.subspaces`
    /// is `0` or exceeds the vector dimension, or `params.clusters` is `0`
    /// or greater than 256.
    pub fn train(vectors: &[Vec<f32>], params: PqTrainParams) -> Result<Self> {
        let mut rng = StdRng::from_entropy();
        Self::train_with_rng(vectors, params, &mut rng)
    }

    /// As [`Self::train`] but with an explicit RNG, for deterministic tests.
    pub fn train_with_rng(vectors: &[Vec<f32>], params: PqTrainParams, rng: &mut StdRng) -> Result<Self> {
        let dimension = vectors.first().map_or(0, Vec::len);
        if vectors.is_empty() || dimension == 0 {
            return Err(Error::InvalidArgument("PQ training requires non-empty vectors".into()));
        }
        if params.subspaces == 0 || params.subspaces > dimension {
            return Err(Error::InvalidArgument(format!(
                "subspaces must be in 1..={dimension}, got {}",
                params.subspaces
            )));
        }
        if params.clusters == 0 || params.clusters > 256 {
            return Err(Error::InvalidArgument(format!(
                "clusters must be in 1..=256, got {}",
                params.clusters
            )));
        }

        let global_centroid = params.use_global_centroid.then(|| mean_vector(vectors, dimension));
        let centered = match &global_centroid {
            Some(c) => subtract(vectors, c),
            None => vectors.to_vec(),
        };

        let (offsets, sizes) = partition_subvectors(dimension, params.subspaces);
        let k = params.clusters.min(vectors.len());
        let mut centroids = Vec::with_capacity(params.subspaces);
        for (&offset, &size) in offsets.iter().zip(&sizes) {
            let sub = extract_subspace(&centered, offset, size);
            let seeds = seed_plus_plus(&sub, k, rng);
            let result = run_lloyd(&sub, seeds, params.anisotropic_threshold, params.max_iterations);
            centroids.push(result.centroids.into_iter().flatten().collect());
        }

        Ok(Self {
            dimension,
            subspaces: params.subspaces,
            clusters: k,
            anisotropic_threshold: params.anisotropic_threshold,
            global_centroid,
            subvector_offsets: offsets,
            subvector_sizes: sizes,
            centroids,
        })
    }

    /// Continues Lloyd iteration from the current centroids on a fresh
    /// vector stream, per `spec.md` §4.2's `refine`.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgument` if `ravv`'s dimension disagrees with this
    /// codebook's.
    pub fn refine<V: VectorSource>(&self, ravv: &V, max_iterations: usize) -> Result<Self> {
        if ravv.dimension() != self.dimension {
            return Err(Error::InvalidArgument(format!(
                "refine expected dimension {}, got {}",
                self.dimension,
                ravv.dimension()
            )));
        }
        let vectors: Vec<Vec<f32>> = (0..ravv.size() as u32).map(|i| ravv.get_vector(i).to_vec()).collect();
        let centered = match &self.global_centroid {
            Some(c) => subtract(&vectors, c),
            None => vectors,
        };

        let mut centroids = Vec::with_capacity(self.subspaces);
        for (s, (&offset, &size)) in self.subvector_offsets.iter().zip(&self.subvector_sizes).enumerate() {
            let sub = extract_subspace(&centered, offset, size);
            let seeds = self.subspace_centroids(s).to_vec();
            let result = run_lloyd(&sub, seeds, self.anisotropic_threshold, max_iterations);
            centroids.push(result.centroids.into_iter().flatten().collect());
        }

        Ok(Self { centroids, ..self.clone() })
    }

    fn subspace_centroids(&self, s: usize) -> Vec<Vec<f32>> {
        let size = self.subvector_sizes[s];
        self.centroids[s].chunks(size).map(<[f32]>::to_vec).collect()
    }

    /// Encodes `vector` to one byte per subspace (the nearest centroid's
    /// index). `None` encodes as all-zero bytes, per `spec.md` §4.2's
    /// treatment of absent ordinals during parallel encoding.
    #[must_use]
    pub fn encode(&self, vector: Option<&[f32]>) -> Vec<u8> {
        let Some(vector) = vector else {
            return vec![0u8; self.subspaces];
        };
        let centered: Vec<f32> = match &self.global_centroid {
            Some(c) => vector.iter().zip(c).map(|(x, g)| x - g).collect(),
            None => vector.to_vec(),
        };

        (0..self.subspaces)
            .map(|s| {
                let offset = self.subvector_offsets[s];
                let size = self.subvector_sizes[s];
                let sub = &centered[offset..offset + size];
                self.nearest_cluster(s, sub) as u8
            })
            .collect()
    }

    /// Reconstructs a vector from its code by concatenating the selected
    /// centroid of each subspace. Only used by test oracles and diagnostics.
    #[must_use]
    pub fn decode(&self, code: &[u8]) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.dimension);
        for s in 0..self.subspaces {
            let size = self.subvector_sizes[s];
            let cluster = code[s] as usize;
            out.extend_from_slice(&self.centroids[s][cluster * size..(cluster + 1) * size]);
        }
        if let Some(c) = &self.global_centroid {
            for (x, g) in out.iter_mut().zip(c) {
                *x += g;
            }
        }
        out
    }

    fn nearest_cluster(&self, subspace: usize, sub: &[f32]) -> usize {
        let size = self.subvector_sizes[subspace];
        let row = &self.centroids[subspace];
        (0..self.clusters)
            .map(|c| {
                let centroid = &row[c * size..(c + 1) * size];
                let d: f32 = sub.iter().zip(centroid).map(|(x, y)| (x - y) * (x - y)).sum();
                (c, d)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map_or(0, |(c, _)| c)
    }

    /// Original (uncompressed) vector dimension.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of subspaces (`M`).
    #[must_use]
    pub const fn subspaces(&self) -> usize {
        self.subspaces
    }

    /// Clusters per subspace (`K`).
    #[must_use]
    pub const fn clusters(&self) -> usize {
        self.clusters
    }

    /// `true` if this codebook centers vectors before quantizing them.
    #[must_use]
    pub fn global_centroid(&self) -> Option<&[f32]> {
        self.global_centroid.as_deref()
    }

    pub(crate) fn subvector_layout(&self) -> (&[usize], &[usize]) {
        (&self.subvector_offsets, &self.subvector_sizes)
    }

    pub(crate) fn anisotropic_threshold(&self) -> Option<f32> {
        self.anisotropic_threshold
    }

    pub(crate) fn centroid_rows(&self) -> &[Vec<f32>] {
        &self.centroids
    }

    /// Reassembles a codebook from its raw parts, used only by
    /// [`crate::persist::pq_format`] to reconstruct a loaded blob.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        dimension: usize,
        subspaces: usize,
        clusters: usize,
        anisotropic_threshold: Option<f32>,
        global_centroid: Option<Vec<f32>>,
        subvector_offsets: Vec<usize>,
        subvector_sizes: Vec<usize>,
        centroids: Vec<Vec<f32>>,
    ) -> Self {
        Self {
            dimension,
            subspaces,
            clusters,
            anisotropic_threshold,
            global_centroid,
            subvector_offsets,
            subvector_sizes,
            centroids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_source::InMemoryVectorSource;

    fn params(subspaces: usize, clusters: usize) -> PqTrainParams {
        PqTrainParams {
            subspaces,
            clusters,
            anisotropic_threshold: None,
            max_iterations: 25,
            use_global_centroid: false,
        }
    }

    fn repeated_unique_vectors(unique: &[Vec<f32>], repeat: usize) -> Vec<Vec<f32>> {
        unique.iter().cloned().cycle().take(unique.len() * repeat).collect()
    }

    /// Property 1: perfect reconstruction when unique-vector count <= K.
    #[test]
    fn perfect_reconstruction_when_unique_count_leq_k() {
        let unique = vec![
            vec![1.0, 2.0, 3.0, 4.0],
            vec![-1.0, -2.0, -3.0, -4.0],
            vec![0.5, 0.5, 0.5, 0.5],
        ];
        for repeat in [1, 10] {
            let vectors = repeated_unique_vectors(&unique, repeat);
            let mut rng = StdRng::seed_from_u64(11);
            let codebook = PqCodebook::train_with_rng(&vectors, params(4, 256), &mut rng).unwrap();
            for v in &vectors {
                let code = codebook.encode(Some(v));
                let decoded = codebook.decode(&code);
                for (a, b) in v.iter().zip(&decoded) {
                    assert!((a - b).abs() < 1e-4, "{v:?} -> {decoded:?}");
                }
            }
        }
    }

    #[test]
    fn null_vector_encodes_to_all_zero_bytes() {
        let vectors = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0], vec![7.0, 8.0]];
        let mut rng = StdRng::seed_from_u64(2);
        let codebook = PqCodebook::train_with_rng(&vectors, params(2, 4), &mut rng).unwrap();
        assert_eq!(codebook.encode(None), vec![0u8, 0u8]);
    }

    #[test]
    fn rejects_too_many_clusters() {
        let vectors = vec![vec![1.0, 2.0]; 4];
        let err = PqCodebook::train(&vectors, params(1, 257)).unwrap_err();
        assert_eq!(err.code(), "ANN-001");
    }

    #[test]
    fn subspace_sizes_put_remainder_on_earlier_subspaces() {
        let (offsets, sizes) = partition_subvectors(10, 3);
        assert_eq!(sizes, vec![4, 3, 3]);
        assert_eq!(offsets, vec![0, 4, 7]);
    }

    /// Property 3: refine on more data from the same distribution does not
    /// increase loss relative to the unrefined codebook.
    #[test]
    fn refine_does_not_increase_loss_on_fresh_data() {
        let mut rng = StdRng::seed_from_u64(99);
        let half_a: Vec<Vec<f32>> = (0..40)
            .map(|i| vec![(i % 5) as f32, ((i * 3) % 7) as f32, (i % 2) as f32, 1.0])
            .collect();
        let half_b: Vec<Vec<f32>> = (0..40)
            .map(|i| vec![(i % 5) as f32 + 0.01, ((i * 3) % 7) as f32 - 0.01, (i % 2) as f32, 1.0])
            .collect();

        let pq1 = PqCodebook::train_with_rng(&half_a, params(2, 8), &mut rng).unwrap();
        let source_b = InMemoryVectorSource::new(half_b.clone()).unwrap();
        let pq2 = pq1.refine(&source_b, 25).unwrap();

        let loss_of = |pq: &PqCodebook| -> f32 {
            half_b
                .iter()
                .map(|v| {
                    let code = pq.encode(Some(v));
                    let decoded = pq.decode(&code);
                    v.iter().zip(&decoded).map(|(a, b)| (a - b) * (a - b)).sum::<f32>()
                })
                .sum()
        };

        assert!(loss_of(&pq2) <= loss_of(&pq1) + 1e-3);
    }
}
