//! Product Quantization (C2): subspace k-means training, byte-per-subspace
//! encoding, chunked storage, and ADC/SDC scoring.

mod codebook;
mod kmeans;
mod layout;
mod scoring;
mod store;

pub use codebook::{PqCodebook, PqTrainParams};
pub use layout::PqLayout;
pub use scoring::{AdcTables, SdcTables};
pub use store::EncodedVectorStore;
