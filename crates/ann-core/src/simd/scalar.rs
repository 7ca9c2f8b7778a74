//! Pure-Rust reference implementation of [`super::SimdOps`]. Always
//! correct; used as the test oracle and the fallback when no accelerated
//! backend is available.

use super::SimdOps;

/// Scalar backend: no explicit vectorization, relies only on the
/// auto-vectorizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarOps;

impl SimdOps for ScalarOps {
    fn dot(&self, a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    fn square_l2(&self, a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
    }

    fn cosine(&self, a: &[f32], b: &[f32]) -> f32 {
        let dot = self.dot(a, b);
        let norm_a = self.dot(a, a).sqrt();
        let norm_b = self.dot(b, b).sqrt();
        dot / (norm_a * norm_b)
    }

    fn sum(&self, v: &[f32]) -> f32 {
        v.iter().sum()
    }

    fn min(&self, v: &[f32]) -> f32 {
        v.iter().copied().fold(f32::INFINITY, f32::min)
    }

    fn max(&self, v: &[f32]) -> f32 {
        v.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    fn add_in_place(&self, a: &mut [f32], b: &[f32]) {
        for (x, y) in a.iter_mut().zip(b) {
            *x += y;
        }
    }

    fn sub_in_place(&self, a: &mut [f32], b: &[f32]) {
        for (x, y) in a.iter_mut().zip(b) {
            *x -= y;
        }
    }

    fn scale(&self, a: &mut [f32], s: f32) {
        for x in a.iter_mut() {
            *x *= s;
        }
    }

    fn min_in_place(&self, a: &mut [f32], b: &[f32]) {
        for (x, y) in a.iter_mut().zip(b) {
            *x = x.min(*y);
        }
    }

    fn sub(&self, a: &[f32], b: &[f32]) -> Vec<f32> {
        a.iter().zip(b).map(|(x, y)| x - y).collect()
    }

    fn hamming_distance(&self, a: &[u64], b: &[u64]) -> u32 {
        a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
    }

    fn quantize_partials(&self, delta: f32, partials: &[f32], bases: &[f32], out_bytes: &mut [u8]) {
        quantize_partials_scalar(delta, partials, bases, out_bytes);
    }
}

/// Shared scalar implementation of `assemble_and_sum`, also used by
/// accelerated backends since the gather path loses to scalar here
/// (`spec.md` §4.1).
pub(super) fn assemble_and_sum_scalar(data: &[f32], stride: usize, offsets: &[u8]) -> f32 {
    offsets
        .iter()
        .enumerate()
        .map(|(i, &off)| data[stride * i + off as usize])
        .sum()
}

/// Shared scalar implementation of `assemble_and_sum_pq`.
pub(super) fn assemble_and_sum_pq_scalar(
    partials: &[f32],
    m: usize,
    code1: &[u8],
    off1: usize,
    code2: &[u8],
    off2: usize,
    k: usize,
) -> f32 {
    let b = k * (k + 1) / 2;
    (0..m)
        .map(|i| {
            let c1 = code1[off1 + i] as usize;
            let c2 = code2[off2 + i] as usize;
            let r = c1.min(c2);
            let c = c1.max(c2);
            let tri = r * k - r * (r.saturating_sub(1)) / 2 + (c - r);
            partials[i * b + tri]
        })
        .sum()
}

/// Shared scalar implementation of `pq_decoded_cosine_similarity`.
pub(super) fn pq_decoded_cosine_similarity_scalar(
    code: &[u8],
    offset: usize,
    length: usize,
    k: usize,
    partial_sums: &[f32],
    a_magnitudes: &[f32],
    b_magnitude: f32,
) -> f32 {
    let mut dot = 0.0f32;
    let mut a_mag = 0.0f32;
    for i in 0..length {
        let c = code[offset + i] as usize;
        dot += partial_sums[i * k + c];
        a_mag += a_magnitudes[i * k + c];
    }
    dot / (a_mag * b_magnitude).sqrt()
}

/// Shared scalar implementation of `quantize_partials`.
pub(super) fn quantize_partials_scalar(delta: f32, partials: &[f32], bases: &[f32], out_bytes: &mut [u8]) {
    debug_assert_eq!(partials.len(), bases.len());
    debug_assert_eq!(out_bytes.len(), partials.len() * 2);
    for (i, (&p, &base)) in partials.iter().zip(bases).enumerate() {
        let scaled = ((p - base) / delta).round();
        let clamped = scaled.clamp(0.0, 65535.0) as u16;
        let bytes = clamped.to_le_bytes();
        out_bytes[i * 2] = bytes[0];
        out_bytes[i * 2 + 1] = bytes[1];
    }
}
