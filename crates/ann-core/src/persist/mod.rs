//! On-disk container formats (`spec.md` §6): one for the graph structure,
//! one for a trained PQ codebook. Both are hand-rolled little-endian framing
//! rather than `bincode`'s derive machinery, since the wire layout is a
//! cross-version contract and must stay stable under struct refactors —
//! the same reasoning behind the teacher's own `persistence.rs` reader/writer
//! pair for its HNSW layers.

pub mod graph_format;
pub mod pq_format;

pub use graph_format::{load_graph, save_graph};
pub use pq_format::{load_pq, save_pq, PQ_FORMAT_VERSION};
