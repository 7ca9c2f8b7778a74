//! `wide`-crate backed implementation of [`super::SimdOps`].
//!
//! Uses portable `f32x8` lanes so the same code path benefits from
//! AVX2/NEON/SIMD128 depending on target, without `unsafe` intrinsics
//! (grounded in the teacher's `simd_explicit.rs`).

use super::scalar::quantize_partials_scalar;
use super::SimdOps;
use wide::f32x8;

const LANES: usize = 8;

/// Portable SIMD backend built on the `wide` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct WideOps;

#[inline]
fn simd_len(len: usize) -> usize {
    len / LANES
}

impl SimdOps for WideOps {
    fn dot(&self, a: &[f32], b: &[f32]) -> f32 {
        let chunks = simd_len(a.len());
        let mut acc = f32x8::ZERO;
        for i in 0..chunks {
            let off = i * LANES;
            let va = f32x8::from(&a[off..off + LANES]);
            let vb = f32x8::from(&b[off..off + LANES]);
            acc = va.mul_add(vb, acc);
        }
        let mut result = acc.reduce_add();
        for i in chunks * LANES..a.len() {
            result += a[i] * b[i];
        }
        result
    }

    fn square_l2(&self, a: &[f32], b: &[f32]) -> f32 {
        let chunks = simd_len(a.len());
        let mut acc = f32x8::ZERO;
        for i in 0..chunks {
            let off = i * LANES;
            let va = f32x8::from(&a[off..off + LANES]);
            let vb = f32x8::from(&b[off..off + LANES]);
            let diff = va - vb;
            acc = diff.mul_add(diff, acc);
        }
        let mut result = acc.reduce_add();
        for i in chunks * LANES..a.len() {
            let diff = a[i] - b[i];
            result += diff * diff;
        }
        result
    }

    fn cosine(&self, a: &[f32], b: &[f32]) -> f32 {
        let chunks = simd_len(a.len());
        let mut dot_acc = f32x8::ZERO;
        let mut na_acc = f32x8::ZERO;
        let mut nb_acc = f32x8::ZERO;
        for i in 0..chunks {
            let off = i * LANES;
            let va = f32x8::from(&a[off..off + LANES]);
            let vb = f32x8::from(&b[off..off + LANES]);
            dot_acc = va.mul_add(vb, dot_acc);
            na_acc = va.mul_add(va, na_acc);
            nb_acc = vb.mul_add(vb, nb_acc);
        }
        let mut dot = dot_acc.reduce_add();
        let mut na = na_acc.reduce_add();
        let mut nb = nb_acc.reduce_add();
        for i in chunks * LANES..a.len() {
            dot += a[i] * b[i];
            na += a[i] * a[i];
            nb += b[i] * b[i];
        }
        dot / (na.sqrt() * nb.sqrt())
    }

    fn sum(&self, v: &[f32]) -> f32 {
        let chunks = simd_len(v.len());
        let mut acc = f32x8::ZERO;
        for i in 0..chunks {
            let off = i * LANES;
            acc += f32x8::from(&v[off..off + LANES]);
        }
        let mut result = acc.reduce_add();
        for &x in &v[chunks * LANES..] {
            result += x;
        }
        result
    }

    fn min(&self, v: &[f32]) -> f32 {
        v.iter().copied().fold(f32::INFINITY, f32::min)
    }

    fn max(&self, v: &[f32]) -> f32 {
        v.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    fn add_in_place(&self, a: &mut [f32], b: &[f32]) {
        let chunks = simd_len(a.len());
        for i in 0..chunks {
            let off = i * LANES;
            let sum = f32x8::from(&a[off..off + LANES]) + f32x8::from(&b[off..off + LANES]);
            a[off..off + LANES].copy_from_slice(&sum.to_array());
        }
        for i in chunks * LANES..a.len() {
            a[i] += b[i];
        }
    }

    fn sub_in_place(&self, a: &mut [f32], b: &[f32]) {
        let chunks = simd_len(a.len());
        for i in 0..chunks {
            let off = i * LANES;
            let diff = f32x8::from(&a[off..off + LANES]) - f32x8::from(&b[off..off + LANES]);
            a[off..off + LANES].copy_from_slice(&diff.to_array());
        }
        for i in chunks * LANES..a.len() {
            a[i] -= b[i];
        }
    }

    fn scale(&self, a: &mut [f32], s: f32) {
        let chunks = simd_len(a.len());
        let vs = f32x8::splat(s);
        for i in 0..chunks {
            let off = i * LANES;
            let scaled = f32x8::from(&a[off..off + LANES]) * vs;
            a[off..off + LANES].copy_from_slice(&scaled.to_array());
        }
        for i in chunks * LANES..a.len() {
            a[i] *= s;
        }
    }

    fn min_in_place(&self, a: &mut [f32], b: &[f32]) {
        for (x, y) in a.iter_mut().zip(b) {
            *x = x.min(*y);
        }
    }

    fn sub(&self, a: &[f32], b: &[f32]) -> Vec<f32> {
        let mut out = a.to_vec();
        self.sub_in_place(&mut out, b);
        out
    }

    fn hamming_distance(&self, a: &[u64], b: &[u64]) -> u32 {
        a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
    }

    fn quantize_partials(&self, delta: f32, partials: &[f32], bases: &[f32], out_bytes: &mut [u8]) {
        // Base-relative quantization is branch-heavy per-element work;
        // the scalar path is used here too (same rationale as
        // `assemble_and_sum`: gather/scatter to byte lanes doesn't pay off
        // at these widths).
        quantize_partials_scalar(delta, partials, bases, out_bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_matches_scalar_definition() {
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let b = vec![1.0; 9];
        let ops = WideOps;
        assert!((ops.dot(&a, &b) - 45.0).abs() < 1e-5);
    }

    #[test]
    fn square_l2_handles_tail() {
        let a = vec![0.0; 10];
        let b = vec![1.0; 10];
        let ops = WideOps;
        assert!((ops.square_l2(&a, &b) - 10.0).abs() < 1e-5);
    }
}
