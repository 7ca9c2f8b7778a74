//! Vectorized distance kernels (C1): a pluggable `SimdOps` surface with a
//! scalar reference implementation and an accelerated `wide`-backed one,
//! selected once at process start.

mod dispatch;
mod nvq;
mod scalar;
mod wide_backend;

pub use dispatch::{global, SimdBackend};
pub use nvq::{
    nvq_cosine_8bit, nvq_dot_product_8bit, nvq_loss, nvq_quantize_8bit,
    nvq_shuffle_query_in_place_8bit, nvq_square_l2_distance_8bit, nvq_uniform_loss,
    NvqParams,
};
pub use scalar::ScalarOps;
pub use wide_backend::WideOps;

/// Vectorized kernels used by the PQ codec and the graph search/build paths.
///
/// Every kernel is a total function on equal-length, validated input;
/// callers are responsible for checking lengths before calling (see
/// `spec.md` §4.1 failure semantics).
pub trait SimdOps: Send + Sync {
    /// Inner product of `a` and `b`.
    fn dot(&self, a: &[f32], b: &[f32]) -> f32;

    /// Squared Euclidean distance between `a` and `b`.
    fn square_l2(&self, a: &[f32], b: &[f32]) -> f32;

    /// Cosine similarity between `a` and `b`. Undefined (caller must guard)
    /// when either vector has zero norm.
    fn cosine(&self, a: &[f32], b: &[f32]) -> f32;

    /// Sum of elements; `0.0` for an empty slice.
    fn sum(&self, v: &[f32]) -> f32;

    /// Minimum element; `f32::INFINITY` for an empty slice.
    fn min(&self, v: &[f32]) -> f32;

    /// Maximum element; `f32::NEG_INFINITY` for an empty slice.
    fn max(&self, v: &[f32]) -> f32;

    /// `a[i] += b[i]` for every `i`.
    fn add_in_place(&self, a: &mut [f32], b: &[f32]);

    /// `a[i] -= b[i]` for every `i`.
    fn sub_in_place(&self, a: &mut [f32], b: &[f32]);

    /// `a[i] *= s` for every `i`.
    fn scale(&self, a: &mut [f32], s: f32);

    /// `a[i] = min(a[i], b[i])` for every `i`.
    fn min_in_place(&self, a: &mut [f32], b: &[f32]);

    /// Allocating elementwise `a - b`.
    fn sub(&self, a: &[f32], b: &[f32]) -> Vec<f32>;

    /// `Σ data[stride * i + offsets[i] as usize]` — the PQ asymmetric
    /// distance accumulation hot path. Always scalar: benchmarking showed
    /// the 128-bit SIMD gather path loses here (`spec.md` §4.1).
    fn assemble_and_sum(&self, data: &[f32], stride: usize, offsets: &[u8]) -> f32 {
        scalar::assemble_and_sum_scalar(data, stride, offsets)
    }

    /// `Σ partials[i*B + tri(r,c)]` where `r = min(code1[off1+i], code2[off2+i])`,
    /// `c = max(...)`, `tri(r,c) = r*K - r*(r-1)/2 + (c-r)`, `B = K*(K+1)/2`
    /// — the PQ symmetric distance hot path.
    fn assemble_and_sum_pq(
        &self,
        partials: &[f32],
        m: usize,
        code1: &[u8],
        off1: usize,
        code2: &[u8],
        off2: usize,
        k: usize,
    ) -> f32 {
        scalar::assemble_and_sum_pq_scalar(partials, m, code1, off1, code2, off2, k)
    }

    /// `Σ popcount(a_i ^ b_i)` over bit-packed 64-bit words.
    fn hamming_distance(&self, a: &[u64], b: &[u64]) -> u32;

    /// Per-subspace base-relative linear quantization to little-endian
    /// `u16`, saturating to `[0, 65535]`.
    fn quantize_partials(&self, delta: f32, partials: &[f32], bases: &[f32], out_bytes: &mut [u8]);

    /// `(Σ partial_sums[i*K + code[offset+i]]) / sqrt((Σ a_magnitudes[i*K + code[offset+i]]) * b_magnitude)`.
    fn pq_decoded_cosine_similarity(
        &self,
        code: &[u8],
        offset: usize,
        length: usize,
        k: usize,
        partial_sums: &[f32],
        a_magnitudes: &[f32],
        b_magnitude: f32,
    ) -> f32 {
        scalar::pq_decoded_cosine_similarity_scalar(
            code,
            offset,
            length,
            k,
            partial_sums,
            a_magnitudes,
            b_magnitude,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_vec(len: usize, seed: u64) -> Vec<f32> {
        let mut state = seed.max(1);
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                ((state % 2000) as f32 - 1000.0) / 1000.0
            })
            .collect()
    }

    /// Property 9: scalar and accelerated kernels agree to within 1e-4
    /// relative over a prime-length (tail-exercising) input.
    #[test]
    fn scalar_and_wide_backends_agree_on_prime_length() {
        let a = random_vec(1021, 1);
        let b = random_vec(1021, 2);
        let scalar = ScalarOps;
        let wide = WideOps;

        let rel = |x: f32, y: f32| ((x - y).abs() / x.abs().max(y.abs()).max(1e-6));

        assert!(rel(scalar.dot(&a, &b), wide.dot(&a, &b)) < 1e-4);
        assert!(rel(scalar.square_l2(&a, &b), wide.square_l2(&a, &b)) < 1e-4);
        assert!(rel(scalar.cosine(&a, &b), wide.cosine(&a, &b)) < 1e-4);
        assert!(rel(scalar.sum(&a), wide.sum(&a)) < 1e-4);

        let offsets: Vec<u8> = (0..1021u32).map(|i| (i % 250) as u8).collect();
        let data = random_vec(1021 * 250, 3);
        assert!(
            rel(
                scalar.assemble_and_sum(&data, 250, &offsets),
                wide.assemble_and_sum(&data, 250, &offsets)
            ) < 1e-4
        );
    }

    #[test]
    fn empty_slices_return_additive_identity() {
        let scalar = ScalarOps;
        assert_eq!(scalar.sum(&[]), 0.0);
        assert_eq!(scalar.min(&[]), f32::INFINITY);
        assert_eq!(scalar.max(&[]), f32::NEG_INFINITY);
    }

    #[test]
    fn hamming_counts_differing_bits() {
        let scalar = ScalarOps;
        let a = [0b1010_u64, 0xFF];
        let b = [0b0110_u64, 0x0F];
        assert_eq!(scalar.hamming_distance(&a, &b), 2 + 4);
    }
}
