//! A single layer of the graph index (`spec.md` §4.4): dense for layer 0,
//! sparse for everything above it, matching the density falloff of a
//! layered proximity graph (most nodes never reach layer 1).

use super::neighbors::Neighbors;
use crate::vector_source::Ordinal;
use dashmap::DashMap;
use parking_lot::RwLock;

enum Storage {
    Dense(RwLock<Vec<Neighbors>>),
    Sparse(DashMap<Ordinal, Neighbors>),
}

/// One layer's neighbor lists, indexed by ordinal.
pub struct GraphLayer {
    storage: Storage,
    max_degree: usize,
    neighbor_overflow: f32,
}

impl GraphLayer {
    /// Builds a dense layer (used for layer 0), backed by a growable
    /// `Vec` under a single write lock for structural growth.
    #[must_use]
    pub fn dense(max_degree: usize, neighbor_overflow: f32) -> Self {
        Self { storage: Storage::Dense(RwLock::new(Vec::new())), max_degree, neighbor_overflow }
    }

    /// Builds a sparse layer (used for layers `>= 1`), backed by a
    /// concurrent hash map so nodes absent from this layer cost nothing.
    #[must_use]
    pub fn sparse(max_degree: usize, neighbor_overflow: f32) -> Self {
        Self { storage: Storage::Sparse(DashMap::new()), max_degree, neighbor_overflow }
    }

    /// Inserts an empty neighbor list for `ordinal` if one is not already
    /// present.
    pub fn add_node(&self, ordinal: Ordinal) {
        match &self.storage {
            Storage::Dense(rows) => {
                let index = ordinal as usize;
                {
                    let guard = rows.read();
                    if index < guard.len() {
                        return;
                    }
                }
                let mut guard = rows.write();
                while guard.len() <= index {
                    guard.push(Neighbors::new(self.max_degree, self.neighbor_overflow));
                }
            }
            Storage::Sparse(map) => {
                map.entry(ordinal).or_insert_with(|| Neighbors::new(self.max_degree, self.neighbor_overflow));
            }
        }
    }

    /// `true` if this layer has a (possibly empty) neighbor list for
    /// `ordinal`.
    #[must_use]
    pub fn contains(&self, ordinal: Ordinal) -> bool {
        match &self.storage {
            Storage::Dense(rows) => (ordinal as usize) < rows.read().len(),
            Storage::Sparse(map) => map.contains_key(&ordinal),
        }
    }

    /// Replaces `ordinal`'s neighbor list wholesale.
    pub fn connect_node(&self, ordinal: Ordinal, neighbors: &[(Ordinal, f32)]) {
        self.add_node(ordinal);
        self.with_neighbors(ordinal, |n| n.replace_all(neighbors));
    }

    /// Runs `f` against `ordinal`'s neighbor list if present.
    pub fn with_neighbors<R>(&self, ordinal: Ordinal, f: impl FnOnce(&Neighbors) -> R) -> Option<R> {
        match &self.storage {
            Storage::Dense(rows) => rows.read().get(ordinal as usize).map(f),
            Storage::Sparse(map) => map.get(&ordinal).map(|entry| f(&entry)),
        }
    }

    /// Number of nodes with a (possibly empty) entry in this layer.
    #[must_use]
    pub fn size(&self) -> usize {
        match &self.storage {
            Storage::Dense(rows) => rows.read().len(),
            Storage::Sparse(map) => map.len(),
        }
    }

    /// All ordinals with an entry in this layer, in no particular order.
    #[must_use]
    pub fn ordinals(&self) -> Vec<Ordinal> {
        match &self.storage {
            Storage::Dense(rows) => (0..rows.read().len() as u32).collect(),
            Storage::Sparse(map) => map.iter().map(|e| *e.key()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_layer_grows_to_cover_new_ordinals() {
        let layer = GraphLayer::dense(4, 1.2);
        layer.add_node(0);
        layer.add_node(5);
        assert_eq!(layer.size(), 6);
        assert!(layer.contains(3));
    }

    #[test]
    fn sparse_layer_only_materializes_inserted_ordinals() {
        let layer = GraphLayer::sparse(4, 1.2);
        layer.add_node(1000);
        assert_eq!(layer.size(), 1);
        assert!(!layer.contains(0));
        assert!(layer.contains(1000));
    }

    #[test]
    fn connect_node_replaces_the_neighbor_list() {
        let layer = GraphLayer::dense(4, 1.2);
        layer.connect_node(0, &[(1, 0.9), (2, 0.5)]);
        let snapshot = layer.with_neighbors(0, Neighbors::snapshot).unwrap();
        assert_eq!(snapshot, vec![(1, 0.9), (2, 0.5)]);
    }
}
