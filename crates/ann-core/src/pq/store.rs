//! Chunked encoded-vector storage backing [`super::codebook::PqCodebook`]
//! output, sized per [`super::layout::PqLayout`] so a single allocation
//! never exceeds the platform array-size ceiling.

use super::codebook::PqCodebook;
use super::layout::PqLayout;
use crate::error::{Error, Result};
use crate::vector_source::{Ordinal, VectorSource};
use rayon::prelude::*;

/// Owns the encoded (one byte per subspace) representation of `N` vectors,
/// written once by [`Self::encode_all`] and read-only thereafter.
#[derive(Debug, Clone)]
pub struct EncodedVectorStore {
    layout: PqLayout,
    chunks: Vec<Vec<u8>>,
}

impl EncodedVectorStore {
    /// Allocates storage for `n` vectors of compressed dimension `m`, all
    /// zeroed (equivalent to every ordinal encoding a null vector).
    ///
    /// # Errors
    ///
    /// Propagates `Error::InvalidArgument` from [`PqLayout::new`].
    pub fn new(n: usize, m: usize) -> Result<Self> {
        let layout = PqLayout::new(n, m)?;
        let mut chunks = Vec::with_capacity(layout.total_chunks as usize);
        for i in 0..layout.total_chunks {
            let is_last = i == layout.total_chunks - 1 && layout.last_chunk_bytes > 0;
            let bytes = if is_last { layout.last_chunk_bytes } else { layout.full_chunk_bytes };
            chunks.push(vec![0u8; bytes as usize]);
        }
        Ok(Self { layout, chunks })
    }

    /// Encodes every vector yielded by `source` under `codebook`, in
    /// parallel over a `rayon` pool, matching the teacher's parallel
    /// `encode_all`/bulk-import fan-out idiom.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgument` if `source`'s size or dimension disagree
    /// with this store's layout or `codebook`'s trained dimension.
    pub fn encode_all<V: VectorSource + Sync>(&mut self, source: &V, codebook: &PqCodebook) -> Result<()> {
        if source.size() != self.layout.n {
            return Err(Error::InvalidArgument(format!(
                "source has {} vectors, store was sized for {}",
                source.size(),
                self.layout.n
            )));
        }
        if source.dimension() != codebook.dimension() {
            return Err(Error::InvalidArgument(format!(
                "source dimension {} does not match codebook dimension {}",
                source.dimension(),
                codebook.dimension()
            )));
        }

        let m = self.layout.m;
        let encoded: Vec<u8> = (0..source.size() as u32)
            .into_par_iter()
            .flat_map_iter(|ordinal| codebook.encode(Some(source.get_vector(ordinal))))
            .collect();

        for ordinal in 0..source.size() as u32 {
            let (chunk, offset) = self.layout.locate(ordinal);
            self.chunks[chunk][offset..offset + m]
                .copy_from_slice(&encoded[ordinal as usize * m..ordinal as usize * m + m]);
        }
        Ok(())
    }

    /// Overwrites the code stored at `ordinal`.
    ///
    /// # Errors
    ///
    /// `Error::IndexOutOfBounds` if `ordinal` exceeds this store's size, or
    /// `Error::InvalidArgument` if `code`'s length does not match `M`.
    pub fn write(&mut self, ordinal: Ordinal, code: &[u8]) -> Result<()> {
        if ordinal as usize >= self.layout.n {
            return Err(Error::IndexOutOfBounds { ordinal, size: self.layout.n as u32 });
        }
        if code.len() != self.layout.m {
            return Err(Error::InvalidArgument(format!(
                "code length {} does not match M={}",
                code.len(),
                self.layout.m
            )));
        }
        let (chunk, offset) = self.layout.locate(ordinal);
        self.chunks[chunk][offset..offset + self.layout.m].copy_from_slice(code);
        Ok(())
    }

    /// Borrows the code stored at `ordinal`.
    #[must_use]
    pub fn read(&self, ordinal: Ordinal) -> &[u8] {
        let (chunk, offset) = self.layout.locate(ordinal);
        &self.chunks[chunk][offset..offset + self.layout.m]
    }

    /// The chunk layout this store was sized against.
    #[must_use]
    pub const fn layout(&self) -> &PqLayout {
        &self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pq::codebook::PqTrainParams;
    use crate::vector_source::InMemoryVectorSource;

    #[test]
    fn write_then_read_roundtrips() {
        let mut store = EncodedVectorStore::new(5, 3).unwrap();
        store.write(2, &[1, 2, 3]).unwrap();
        assert_eq!(store.read(2), &[1, 2, 3]);
        assert_eq!(store.read(0), &[0, 0, 0]);
    }

    #[test]
    fn write_rejects_out_of_bounds_ordinal() {
        let mut store = EncodedVectorStore::new(2, 3).unwrap();
        let err = store.write(5, &[0, 0, 0]).unwrap_err();
        assert_eq!(err.code(), "ANN-002");
    }

    #[test]
    fn encode_all_matches_per_vector_encode() {
        let vectors: Vec<Vec<f32>> = (0..16).map(|i| vec![i as f32, (i * 2) as f32, (i % 3) as f32, 1.0]).collect();
        let source = InMemoryVectorSource::new(vectors.clone()).unwrap();
        let params = PqTrainParams {
            subspaces: 2,
            clusters: 4,
            anisotropic_threshold: None,
            max_iterations: 10,
            use_global_centroid: false,
        };
        let codebook = PqCodebook::train(&vectors, params).unwrap();

        let mut store = EncodedVectorStore::new(vectors.len(), 2).unwrap();
        store.encode_all(&source, &codebook).unwrap();

        for (ordinal, v) in vectors.iter().enumerate() {
            assert_eq!(store.read(ordinal as u32), codebook.encode(Some(v)));
        }
    }
}
