//! k-means++ seeding and Lloyd iteration for one PQ subspace.
//!
//! No teacher module trains subspace codebooks (the teacher's own
//! quantizer is per-dimension scalar quantization, not vector quantization),
//! so this is original code; it follows the shape of the teacher's
//! `quantization.rs` in spirit (an immutable trained result handed back to
//! the caller) while the clustering math itself follows `spec.md` §4.2
//! directly.

use rand::Rng;

/// Fraction of reassigned points below which Lloyd iteration stops.
const CONVERGENCE_FRACTION: f64 = 0.01;

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest_centroid(point: &[f32], centroids: &[Vec<f32>]) -> (usize, f32) {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, squared_l2(point, c)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .expect("centroids is non-empty")
}

/// k-means++ seeding: first centroid uniform, each subsequent centroid drawn
/// with probability proportional to its squared distance from the nearest
/// centroid already chosen.
pub fn seed_plus_plus<R: Rng + ?Sized>(points: &[Vec<f32>], k: usize, rng: &mut R) -> Vec<Vec<f32>> {
    assert!(!points.is_empty() && k > 0);
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..points.len())].clone());

    while centroids.len() < k {
        let weights: Vec<f64> = points
            .iter()
            .map(|p| f64::from(nearest_centroid(p, &centroids).1))
            .collect();
        let total: f64 = weights.iter().sum();
        let chosen = if total <= 0.0 {
            rng.gen_range(0..points.len())
        } else {
            let mut target = rng.gen_range(0.0..total);
            weights
                .iter()
                .position(|&w| {
                    target -= w;
                    target <= 0.0
                })
                .unwrap_or(points.len() - 1)
        };
        centroids.push(points[chosen].clone());
    }
    centroids
}

/// Result of training one subspace's codebook.
pub struct LloydResult {
    /// Final centroids, one per cluster.
    pub centroids: Vec<Vec<f32>>,
    /// Cluster assignment per input point.
    pub assignments: Vec<u8>,
}

/// Re-seeds an emptied cluster from the point currently furthest from its
/// assigned centroid, per `spec.md` §4.2.
fn reseed_empty_cluster(points: &[Vec<f32>], centroids: &mut [Vec<f32>], assignments: &[u8], empty: usize) {
    let (furthest, _) = points
        .iter()
        .zip(assignments)
        .map(|(p, &a)| squared_l2(p, &centroids[a as usize]))
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .expect("points is non-empty");
    centroids[empty] = points[furthest].clone();
}

fn recompute_centroids(
    points: &[Vec<f32>],
    dimension: usize,
    k: usize,
    assignments: &[u8],
    weights: Option<&[f32]>,
) -> Vec<Vec<f32>> {
    let mut sums = vec![vec![0.0f32; dimension]; k];
    let mut totals = vec![0.0f32; k];
    for (i, (point, &cluster)) in points.iter().zip(assignments).enumerate() {
        let w = weights.map_or(1.0, |w| w[i]);
        let cluster = cluster as usize;
        for (s, &x) in sums[cluster].iter_mut().zip(point) {
            *s += w * x;
        }
        totals[cluster] += w;
    }
    sums.into_iter()
        .zip(totals)
        .map(|(sum, total)| {
            if total > 0.0 {
                sum.into_iter().map(|s| s / total).collect()
            } else {
                sum
            }
        })
        .collect()
}

/// Unweighted Lloyd iteration: repeatedly assigns each point to its nearest
/// centroid (squared-L2) and recomputes centroids as the mean of their
/// assigned points, re-seeding any cluster that empties out from the point
/// furthest from its own centroid. Stops once fewer than 1% of points
/// change assignment in an iteration, or `max_iterations` is reached.
pub fn lloyd_unweighted(points: &[Vec<f32>], mut centroids: Vec<Vec<f32>>, max_iterations: usize) -> LloydResult {
    let dimension = points.first().map_or(0, Vec::len);
    let k = centroids.len();
    let mut assignments = vec![0u8; points.len()];

    for _ in 0..max_iterations.max(1) {
        let mut changed = 0usize;
        for (i, point) in points.iter().enumerate() {
            let (cluster, _) = nearest_centroid(point, &centroids);
            if cluster as u8 != assignments[i] {
                changed += 1;
            }
            assignments[i] = cluster as u8;
        }

        centroids = recompute_centroids(points, dimension, k, &assignments, None);
        for cluster in 0..k {
            if !assignments.iter().any(|&a| a as usize == cluster) {
                reseed_empty_cluster(points, &mut centroids, &assignments, cluster);
            }
        }

        if (changed as f64) / (points.len() as f64) < CONVERGENCE_FRACTION {
            break;
        }
    }
    LloydResult { centroids, assignments }
}

/// Anisotropic Lloyd iteration (`spec.md` §4.2): assignment is ordinary
/// nearest-centroid (a scalar per-point weight does not change the argmin
/// over centroids), but the centroid recompute step is a weighted mean,
/// where the weight down-weights directions orthogonal to the source
/// vector when the vector's magnitude dominates the quantization error
/// relative to `threshold`.
pub fn lloyd_anisotropic(
    points: &[Vec<f32>],
    mut centroids: Vec<Vec<f32>>,
    threshold: f32,
    max_iterations: usize,
) -> LloydResult {
    let dimension = points.first().map_or(0, Vec::len);
    let k = centroids.len();
    let mut assignments = vec![0u8; points.len()];

    let weights: Vec<f32> = points
        .iter()
        .map(|p| {
            let norm_sq = squared_l2(p, &vec![0.0; p.len()]);
            if norm_sq <= f32::EPSILON {
                1.0
            } else if norm_sq.sqrt() < threshold {
                // orthogonal-direction regime: the vector's own magnitude
                // does not dominate, so weight the residual lightly.
                threshold / norm_sq
            } else {
                (norm_sq - threshold) / norm_sq
            }
        })
        .collect();

    for _ in 0..max_iterations.max(1) {
        let mut changed = 0usize;
        for (i, point) in points.iter().enumerate() {
            let (cluster, _) = nearest_centroid(point, &centroids);
            if cluster as u8 != assignments[i] {
                changed += 1;
            }
            assignments[i] = cluster as u8;
        }

        centroids = recompute_centroids(points, dimension, k, &assignments, Some(&weights));
        for cluster in 0..k {
            if !assignments.iter().any(|&a| a as usize == cluster) {
                reseed_empty_cluster(points, &mut centroids, &assignments, cluster);
            }
        }

        if (changed as f64) / (points.len() as f64) < CONVERGENCE_FRACTION {
            break;
        }
    }
    LloydResult { centroids, assignments }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn two_clusters() -> Vec<Vec<f32>> {
        let mut points = Vec::new();
        for i in 0..20 {
            points.push(vec![0.0 + (i % 3) as f32 * 0.01, 0.0]);
        }
        for i in 0..20 {
            points.push(vec![10.0 + (i % 3) as f32 * 0.01, 10.0]);
        }
        points
    }

    #[test]
    fn seed_plus_plus_picks_k_distinct_rows() {
        let points = two_clusters();
        let mut rng = StdRng::seed_from_u64(7);
        let centroids = seed_plus_plus(&points, 2, &mut rng);
        assert_eq!(centroids.len(), 2);
    }

    #[test]
    fn unweighted_lloyd_separates_two_well_spaced_clusters() {
        let points = two_clusters();
        let mut rng = StdRng::seed_from_u64(7);
        let seeds = seed_plus_plus(&points, 2, &mut rng);
        let result = lloyd_unweighted(&points, seeds, 25);

        let first_half_cluster = result.assignments[0];
        assert!(result.assignments[..20].iter().all(|&a| a == first_half_cluster));
        let second_half_cluster = result.assignments[20];
        assert_ne!(first_half_cluster, second_half_cluster);
        assert!(result.assignments[20..].iter().all(|&a| a == second_half_cluster));
    }

    /// Property 2 (loss decreases after iterating from a fixed seed).
    #[test]
    fn iterating_further_does_not_increase_within_cluster_error() {
        let points = two_clusters();
        let mut rng = StdRng::seed_from_u64(3);
        let seeds = seed_plus_plus(&points, 2, &mut rng);

        let loss = |centroids: &[Vec<f32>], assignments: &[u8]| -> f32 {
            points
                .iter()
                .zip(assignments)
                .map(|(p, &a)| squared_l2(p, &centroids[a as usize]))
                .sum()
        };

        let one_iter = lloyd_unweighted(&points, seeds.clone(), 1);
        let loss_after_one = loss(&one_iter.centroids, &one_iter.assignments);
        let more_iters = lloyd_unweighted(&points, seeds, 10);
        let loss_after_more = loss(&more_iters.centroids, &more_iters.assignments);
        assert!(loss_after_more <= loss_after_one + 1e-4);
    }
}
