//! Non-uniform 8-bit vector quantization (NVQ).
//!
//! Squashes each coordinate through a logistic curve `y = σ(α(x − x₀))`
//! before uniformly quantizing `y` to a byte, so that coordinates near
//! `x₀` (where most probability mass sits for roughly-Gaussian embedding
//! dimensions) get finer resolution than coordinates near the tails.
//!
//! The logistic and its inverse are evaluated through the "NQT" fast
//! approximation described in `spec.md` §4.1: `logistic(t) = m·2^p / (m·2^p + 1)`
//! with `p = ⌊t+1⌋`, `m = 1 + 0.5(t−p)`; the inverse recovers `t` by
//! splitting the IEEE-754 bit pattern of `m·2^p`'s reciprocal-complement
//! into exponent and mantissa.

/// Parameters fixing a logistic NVQ transform: steepness `alpha`, center
/// `x0`, and the expected input range `[min, max]` used to normalize the
/// transformed value into a full byte span.
#[derive(Debug, Clone, Copy)]
pub struct NvqParams {
    /// Logistic steepness.
    pub alpha: f32,
    /// Logistic center.
    pub x0: f32,
    /// Expected minimum input value (e.g. `-3σ`).
    pub min: f32,
    /// Expected maximum input value (e.g. `+3σ`).
    pub max: f32,
}

impl NvqParams {
    fn y_bounds(&self) -> (f32, f32) {
        (
            logistic_nqt(self.alpha * (self.min - self.x0)),
            logistic_nqt(self.alpha * (self.max - self.x0)),
        )
    }
}

/// Fast logistic approximation: `σ(t) ≈ m·2^p / (m·2^p + 1)`.
fn logistic_nqt(t: f32) -> f32 {
    let p = (t + 1.0).floor();
    let m = 1.0 + 0.5 * (t - p);
    let mp = m * 2f32.powf(p);
    mp / (mp + 1.0)
}

/// Inverse of [`logistic_nqt`] via IEEE-754 exponent/mantissa splitting.
///
/// `y = m·2^p / (m·2^p + 1)` implies `u := y / (1 - y) = m·2^p`; decomposing
/// `u`'s bit pattern yields `p` as its unbiased exponent and `m` as its
/// normalized mantissa in `[1, 2)`, from which `t = p + 2(m − 1)`.
fn inverse_logistic_nqt(y: f32) -> f32 {
    let y = y.clamp(1e-7, 1.0 - 1e-7);
    let u = y / (1.0 - y);
    let bits = u.to_bits();
    let exponent = ((bits >> 23) & 0xFF) as i32 - 127;
    let mantissa_bits = (bits & 0x007F_FFFF) | (127 << 23);
    let mantissa = f32::from_bits(mantissa_bits);
    exponent as f32 + 2.0 * (mantissa - 1.0)
}

/// Quantizes `vector` to one byte per coordinate using the logistic NVQ
/// transform.
#[must_use]
pub fn nvq_quantize_8bit(vector: &[f32], params: NvqParams) -> Vec<u8> {
    let (y_min, y_max) = params.y_bounds();
    let span = (y_max - y_min).max(1e-12);
    vector
        .iter()
        .map(|&x| {
            let y = logistic_nqt(params.alpha * (x - params.x0));
            let normalized = ((y - y_min) / span).clamp(0.0, 1.0);
            (normalized * 255.0).round() as u8
        })
        .collect()
}

/// Dequantizes bytes produced by [`nvq_quantize_8bit`] back to `f32`.
#[must_use]
pub fn nvq_dequantize_8bit(code: &[u8], params: NvqParams) -> Vec<f32> {
    let (y_min, y_max) = params.y_bounds();
    let span = y_max - y_min;
    code.iter()
        .map(|&b| {
            let normalized = f32::from(b) / 255.0;
            let y = normalized * span + y_min;
            let t = inverse_logistic_nqt(y);
            t / params.alpha + params.x0
        })
        .collect()
}

/// Roundtrip quantization loss: `Σ (x − dequantize(quantize(x)))²`.
#[must_use]
pub fn nvq_loss(vector: &[f32], params: NvqParams) -> f32 {
    let code = nvq_quantize_8bit(vector, params);
    let reconstructed = nvq_dequantize_8bit(&code, params);
    vector
        .iter()
        .zip(reconstructed)
        .map(|(&x, r)| (x - r) * (x - r))
        .sum()
}

/// Roundtrip loss of plain uniform (non-logistic) 8-bit quantization over
/// `[min, max]`, used as a baseline to show the logistic curve does better
/// on non-uniform coordinate distributions.
#[must_use]
pub fn nvq_uniform_loss(vector: &[f32], min: f32, max: f32) -> f32 {
    let span = (max - min).max(1e-12);
    vector
        .iter()
        .map(|&x| {
            let normalized = ((x - min) / span).clamp(0.0, 1.0);
            let byte = (normalized * 255.0).round();
            let reconstructed = byte / 255.0 * span + min;
            (x - reconstructed) * (x - reconstructed)
        })
        .sum()
}

/// Squared L2 distance between an NVQ-quantized vector and a float source,
/// computed by dequantizing on the fly.
#[must_use]
pub fn nvq_square_l2_distance_8bit(code: &[u8], source: &[f32], params: NvqParams) -> f32 {
    let reconstructed = nvq_dequantize_8bit(code, params);
    reconstructed
        .iter()
        .zip(source)
        .map(|(r, &x)| (r - x) * (r - x))
        .sum()
}

/// Dot product between an NVQ-quantized vector and a float source.
#[must_use]
pub fn nvq_dot_product_8bit(code: &[u8], source: &[f32], params: NvqParams) -> f32 {
    let reconstructed = nvq_dequantize_8bit(code, params);
    reconstructed.iter().zip(source).map(|(r, &x)| r * x).sum()
}

/// Cosine similarity between an NVQ-quantized vector and a float source.
#[must_use]
pub fn nvq_cosine_8bit(code: &[u8], source: &[f32], params: NvqParams) -> f32 {
    let reconstructed = nvq_dequantize_8bit(code, params);
    let dot: f32 = reconstructed.iter().zip(source).map(|(r, &x)| r * x).sum();
    let norm_r: f32 = reconstructed.iter().map(|r| r * r).sum::<f32>().sqrt();
    let norm_x: f32 = source.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (norm_r * norm_x)
}

/// Transposes NVQ-coded bytes every `4 * lanes` so a later SIMD
/// dequantization can recover four interleaved lanes with a single
/// broadcast: within each `4*lanes`-byte block, byte `l*lanes + j` moves to
/// `j*4 + l` for `l in 0..4`, `j in 0..lanes`.
pub fn nvq_shuffle_query_in_place_8bit(data: &mut [u8], lanes: usize) {
    let block = 4 * lanes;
    if block == 0 {
        return;
    }
    let mut scratch = vec![0u8; block];
    for chunk in data.chunks_mut(block) {
        if chunk.len() < block {
            continue;
        }
        for l in 0..4 {
            for j in 0..lanes {
                scratch[j * 4 + l] = chunk[l * lanes + j];
            }
        }
        chunk.copy_from_slice(&scratch);
    }
}
