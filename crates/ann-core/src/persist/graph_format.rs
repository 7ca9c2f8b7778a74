//! Graph container format (`spec.md` §6): a magic number, a version, a
//! small header of build parameters, then every layer's neighbor lists in
//! full — enough to reconstruct an equivalent `GraphIndex` with no access
//! to the original vectors.
//!
//! Layout, all fields little-endian:
//!
//! ```text
//! magic: u32             = 0x75EC4012
//! version: u32           = 4
//! layer_count: u32
//! max_degree: u32
//! neighbor_overflow: f32  (needed to size each node's neighbor-list
//!                          capacity on reload; not itself a layer field)
//! entry_ordinal: u32     (u32::MAX if the graph is empty)
//! for each layer in 0..layer_count:
//!     node_count: u32
//!     for each node, ordinal ascending:
//!         ordinal: u32
//!         neighbor_count: u32
//!         for each neighbor, score-descending (as stored):
//!             neighbor_ordinal: u32
//!             score: f32
//! ```

use crate::error::{Error, Result};
use crate::graph::GraphIndex;
use crate::vector_source::Ordinal;
use std::collections::HashMap;
use std::io::{Read, Write};

const MAGIC: u32 = 0x75EC_4012;
const VERSION: u32 = 4;
const EMPTY_ENTRY_SENTINEL: u32 = u32::MAX;

fn write_u32<W: Write>(w: &mut W, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes()).map_err(Error::from)
}

fn write_f32<W: Write>(w: &mut W, v: f32) -> Result<()> {
    w.write_all(&v.to_le_bytes()).map_err(Error::from)
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(Error::from)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_f32<R: Read>(r: &mut R) -> Result<f32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(Error::from)?;
    Ok(f32::from_le_bytes(buf))
}

/// Serializes `index` to `writer`.
///
/// # Errors
///
/// `Error::InvariantViolation` if `index` is still under construction
/// (`spec.md` §6 only defines the format for a frozen graph); `Error::IoFailure`
/// on a write failure.
pub fn save_graph<W: Write>(index: &GraphIndex, writer: &mut W) -> Result<()> {
    if !index.mutations_completed() {
        return Err(Error::InvariantViolation("cannot persist a graph still under construction".to_string()));
    }

    write_u32(writer, MAGIC)?;
    write_u32(writer, VERSION)?;

    let layer_count = index.max_level() + 1;
    write_u32(writer, layer_count as u32)?;
    write_u32(writer, index.max_degree() as u32)?;
    write_f32(writer, index.neighbor_overflow())?;

    let entry = index.entry_node().map_or(EMPTY_ENTRY_SENTINEL, |(_, ordinal)| ordinal);
    write_u32(writer, entry)?;

    for level in 0..layer_count {
        let mut ordinals = index.layer_ordinals(level);
        ordinals.sort_unstable();
        write_u32(writer, ordinals.len() as u32)?;
        for ordinal in ordinals {
            let neighbors = index.raw_neighbors(level, ordinal);
            write_u32(writer, ordinal)?;
            write_u32(writer, neighbors.len() as u32)?;
            for (n, score) in neighbors {
                write_u32(writer, n)?;
                write_f32(writer, score)?;
            }
        }
    }
    Ok(())
}

/// Reconstructs a frozen `GraphIndex` from a blob written by [`save_graph`].
///
/// # Errors
///
/// `Error::InvariantViolation` if the magic or version doesn't match;
/// `Error::IoFailure` on a truncated or unreadable stream.
pub fn load_graph<R: Read>(reader: &mut R) -> Result<GraphIndex> {
    let magic = read_u32(reader)?;
    if magic != MAGIC {
        return Err(Error::InvariantViolation(format!("bad graph magic: {magic:#010x}")));
    }
    let version = read_u32(reader)?;
    if version != VERSION {
        return Err(Error::InvariantViolation(format!("unsupported graph format version: {version}")));
    }

    let layer_count = read_u32(reader)? as usize;
    let max_degree = read_u32(reader)? as usize;
    let neighbor_overflow = read_f32(reader)?;
    let entry_ordinal = read_u32(reader)?;

    let index = GraphIndex::new(max_degree, neighbor_overflow);
    let mut top_level: HashMap<Ordinal, usize> = HashMap::new();
    let mut edges: Vec<(usize, Ordinal, Vec<(Ordinal, f32)>)> = Vec::new();

    for level in 0..layer_count {
        let node_count = read_u32(reader)?;
        for _ in 0..node_count {
            let ordinal = read_u32(reader)?;
            index.add_node(level, ordinal);
            top_level.insert(ordinal, level);

            let neighbor_count = read_u32(reader)?;
            let mut neighbors = Vec::with_capacity(neighbor_count as usize);
            for _ in 0..neighbor_count {
                let n = read_u32(reader)?;
                let score = read_f32(reader)?;
                neighbors.push((n, score));
            }
            edges.push((level, ordinal, neighbors));
        }
    }

    for (level, ordinal, neighbors) in edges {
        index.connect_node(level, ordinal, &neighbors)?;
    }
    for (ordinal, level) in &top_level {
        index.mark_complete(*ordinal, *level);
    }
    if entry_ordinal == EMPTY_ENTRY_SENTINEL {
        if layer_count > 0 && !top_level.is_empty() {
            return Err(Error::InvariantViolation("persisted graph has nodes but no entry ordinal".to_string()));
        }
    } else {
        let entry_level = *top_level
            .get(&entry_ordinal)
            .ok_or_else(|| Error::InvariantViolation("persisted entry ordinal is absent from every layer".to_string()))?;
        index.force_entry(entry_level, entry_ordinal);
    }
    index.set_all_mutations_completed();
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> GraphIndex {
        let index = GraphIndex::new(4, 1.2);
        index.add_node(0, 0);
        index.add_node(0, 1);
        index.add_node(0, 2);
        index.add_node(1, 0);
        index.connect_node(0, 0, &[(1, 0.9), (2, 0.4)]).unwrap();
        index.connect_node(0, 1, &[(0, 0.9)]).unwrap();
        index.connect_node(0, 2, &[(0, 0.4)]).unwrap();
        index.connect_node(1, 0, &[]).unwrap();
        index.mark_complete(0, 1);
        index.mark_complete(1, 0);
        index.mark_complete(2, 0);
        index.set_all_mutations_completed();
        index
    }

    /// Property 6: `load_graph(save_graph(g)) == g` for every layer,
    /// entry node, and neighbor list (order and score included).
    #[test]
    fn graph_round_trips_through_save_and_load() {
        let original = sample_index();
        let mut buf = Vec::new();
        save_graph(&original, &mut buf).unwrap();
        let loaded = load_graph(&mut buf.as_slice()).unwrap();

        assert_eq!(loaded.entry_node(), original.entry_node());
        assert_eq!(loaded.max_level(), original.max_level());
        for level in 0..=original.max_level() {
            let mut a = original.layer_ordinals(level);
            let mut b = loaded.layer_ordinals(level);
            a.sort_unstable();
            b.sort_unstable();
            assert_eq!(a, b, "layer {level} node set differs");
            for ordinal in a {
                assert_eq!(
                    original.raw_neighbors(level, ordinal),
                    loaded.raw_neighbors(level, ordinal),
                    "layer {level} node {ordinal} neighbors differ"
                );
            }
        }
    }

    #[test]
    fn empty_graph_round_trips() {
        let original = GraphIndex::new(4, 1.2);
        original.set_all_mutations_completed();
        let mut buf = Vec::new();
        save_graph(&original, &mut buf).unwrap();
        let loaded = load_graph(&mut buf.as_slice()).unwrap();
        assert_eq!(loaded.entry_node(), None);
        assert_eq!(loaded.max_level(), 0);
    }

    #[test]
    fn save_rejects_a_graph_still_under_construction() {
        let index = GraphIndex::new(4, 1.2);
        let mut buf = Vec::new();
        assert!(save_graph(&index, &mut buf).is_err());
    }

    #[test]
    fn load_rejects_bad_magic() {
        let bytes = 0xDEAD_BEEFu32.to_le_bytes();
        assert!(load_graph(&mut bytes.as_slice()).is_err());
    }
}
