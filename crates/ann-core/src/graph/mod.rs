//! Concurrent neighbor map (C3) and layered graph index (C4).

mod completion;
mod diversity;
mod index;
mod layer;
mod neighbors;
mod node_array;

pub use completion::CompletionTracker;
pub use diversity::{PairwiseSimilarity, VamanaDiversityProvider};
pub use index::{ConcurrentView, FrozenView, GraphIndex, GraphView};
pub use layer::GraphLayer;
pub use neighbors::Neighbors;
pub use node_array::NodeArray;
