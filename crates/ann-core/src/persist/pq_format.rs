//! Trained PQ codebook container format (`spec.md` §6).
//!
//! Layout, all fields little-endian; version `0` omits the anisotropic
//! threshold field entirely (a threshold-less codebook trained by plain
//! Lloyd iteration), version `1` always carries it:
//!
//! ```text
//! magic: u32                  = 0x75EC_4051
//! version: u32                = 0 | 1
//! dimension: u32
//! subspaces: u32               (M)
//! clusters: u32                (K)
//! has_anisotropic_threshold: u8   (version 1 only)
//! anisotropic_threshold: f32      (version 1 only, present iff the byte above is 1)
//! has_global_centroid: u8
//! global_centroid: dimension * f32   (present iff the byte above is 1)
//! for each of the `subspaces` subvectors:
//!     offset: u32
//!     size: u32
//! for each of the `subspaces` subvectors:
//!     clusters * size * f32   (row-major centroid matrix)
//! ```

use crate::error::{Error, Result};
use crate::pq::PqCodebook;
use std::io::{Read, Write};

const MAGIC: u32 = 0x75EC_4051;
/// Current on-disk version: always carries the anisotropic threshold flag.
pub const PQ_FORMAT_VERSION: u32 = 1;

fn write_u32<W: Write>(w: &mut W, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes()).map_err(Error::from)
}

fn write_f32<W: Write>(w: &mut W, v: f32) -> Result<()> {
    w.write_all(&v.to_le_bytes()).map_err(Error::from)
}

fn write_u8<W: Write>(w: &mut W, v: u8) -> Result<()> {
    w.write_all(&[v]).map_err(Error::from)
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

fn read_u8<R: Read>(r: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf).map_err(Error::from)?;
    Ok(buf[0])
}

/// Serializes `codebook` to `writer` at [`PQ_FORMAT_VERSION`].
///
/// # Errors
///
/// `Error::IoFailure` on a write failure.
pub fn save_pq<W: Write>(codebook: &PqCodebook, writer: &mut W) -> Result<()> {
    write_u32(writer, MAGIC)?;
    write_u32(writer, PQ_FORMAT_VERSION)?;
    write_u32(writer, codebook.dimension() as u32)?;
    write_u32(writer, codebook.subspaces() as u32)?;
    write_u32(writer, codebook.clusters() as u32)?;

    match codebook.anisotropic_threshold() {
        Some(t) => {
            write_u8(writer, 1)?;
            write_f32(writer, t)?;
        }
        None => write_u8(writer, 0)?,
    }

    match codebook.global_centroid() {
        Some(centroid) => {
            write_u8(writer, 1)?;
            for &x in centroid {
                write_f32(writer, x)?;
            }
        }
        None => write_u8(writer, 0)?,
    }

    let (offsets, sizes) = codebook.subvector_layout();
    for (&offset, &size) in offsets.iter().zip(sizes) {
        write_u32(writer, offset as u32)?;
        write_u32(writer, size as u32)?;
    }
    for row in codebook.centroid_rows() {
        for &x in row {
            write_f32(writer, x)?;
        }
    }
    Ok(())
}

/// Reconstructs a `PqCodebook` from a blob written by [`save_pq`].
///
/// # Errors
///
/// `Error::InvariantViolation` if the magic or version doesn't match;
/// `Error::IoFailure` on a truncated or unreadable stream.
pub fn load_pq<R: Read>(reader: &mut R) -> Result<PqCodebook> {
    let magic = read_u32(reader)?;
    if magic != MAGIC {
        return Err(Error::InvariantViolation(format!("bad PQ magic: {magic:#010x}")));
    }
    let version = read_u32(reader)?;
    if version > PQ_FORMAT_VERSION {
        return Err(Error::InvariantViolation(format!("unsupported PQ format version: {version}")));
    }

    let dimension = read_u32(reader)? as usize;
    let subspaces = read_u32(reader)? as usize;
    let clusters = read_u32(reader)? as usize;

    let anisotropic_threshold = if version == 0 {
        None
    } else {
        match read_u8(reader)? {
            1 => Some(read_f32(reader)?),
            _ => None,
        }
    };

    let global_centroid = match read_u8(reader)? {
        1 => {
            let mut centroid = Vec::with_capacity(dimension);
            for _ in 0..dimension {
                centroid.push(read_f32(reader)?);
            }
            Some(centroid)
        }
        _ => None,
    };

    let mut offsets = Vec::with_capacity(subspaces);
    let mut sizes = Vec::with_capacity(subspaces);
    for _ in 0..subspaces {
        offsets.push(read_u32(reader)? as usize);
        sizes.push(read_u32(reader)? as usize);
    }

    let mut centroids = Vec::with_capacity(subspaces);
    for &size in &sizes {
        let mut row = Vec::with_capacity(clusters * size);
        for _ in 0..clusters * size {
            row.push(read_f32(reader)?);
        }
        centroids.push(row);
    }

    Ok(PqCodebook::from_parts(dimension, subspaces, clusters, anisotropic_threshold, global_centroid, offsets, sizes, centroids))
}
