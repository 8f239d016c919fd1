//! Exact nearest-neighbour index over dense vectors.
//!
//! Vectors are stored row-major in a single buffer and searched by brute-force
//! squared Euclidean distance. The index is immutable once built; a corpus
//! change means building a new index and swapping it in.


use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::{RagError, Result};

/// File signature of a serialized index
pub const INDEX_MAGIC: [u8; 4] = *b"LRFI";
pub const INDEX_FORMAT_VERSION: u16 = 1;

/// magic (4) + version (2) + reserved (2) + count (8) + dimension (4)
const HEADER_LEN: usize = 20;

/// One search hit: the stored position and its squared L2 distance to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Build an index from vectors that all share the same dimension.
    ///
    /// An empty input yields an empty index whose dimension is 0.
    #[inline]
    pub fn build(vectors: &[Vec<f32>]) -> Result<Self> {
        let Some(first) = vectors.first() else {
            return Ok(Self {
                dimension: 0,
                data: Vec::new(),
            });
        };

        let dimension = first.len();
        if dimension == 0 {
            return Err(RagError::Input(
                "cannot index zero-dimensional vectors".to_string(),
            ));
        }

        let mut data = Vec::with_capacity(vectors.len() * dimension);
        for (position, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                return Err(RagError::Input(format!(
                    "vector {} has dimension {}, expected {}",
                    position,
                    vector.len(),
                    dimension
                )));
            }
            data.extend_from_slice(vector);
        }

        debug!(
            "Built flat index with {} vectors of dimension {}",
            vectors.len(),
            dimension
        );
        Ok(Self { dimension, data })
    }

    #[inline]
    pub fn count(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Stored vector at `position`, if any
    #[inline]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        if position >= self.count() {
            return None;
        }
        let start = position * self.dimension;
        self.data.get(start..start + self.dimension)
    }

    /// Return the `min(k, count)` nearest stored vectors, closest first.
    ///
    /// Equal distances keep insertion order (lowest position first).
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Err(RagError::Input("k must be a positive integer".to_string()));
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, stored)| Neighbor {
                position,
                distance: squared_l2(query, stored),
            })
            .collect();

        let keep = k.min(neighbors.len());
        if keep < neighbors.len() {
            neighbors.select_nth_unstable_by(keep - 1, compare_neighbors);
            neighbors.truncate(keep);
        }
        neighbors.sort_unstable_by(compare_neighbors);

        Ok(neighbors)
    }

    /// Serialize to the flat blob format: header then little-endian f32 rows
    #[inline]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        buffer.extend_from_slice(&INDEX_MAGIC);
        buffer.extend_from_slice(&INDEX_FORMAT_VERSION.to_le_bytes());
        buffer.extend_from_slice(&0u16.to_le_bytes());
        buffer.extend_from_slice(&(self.count() as u64).to_le_bytes());
        buffer.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        for value in &self.data {
            buffer.extend_from_slice(&value.to_le_bytes());
        }
        buffer
    }

    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header = bytes
            .get(..HEADER_LEN)
            .ok_or_else(|| RagError::IndexFormat("file shorter than header".to_string()))?;

        if header[..4] != INDEX_MAGIC {
            return Err(RagError::IndexFormat("invalid magic".to_string()));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != INDEX_FORMAT_VERSION {
            return Err(RagError::IndexFormat(format!(
                "unsupported format version {}",
                version
            )));
        }

        let count = read_u64(&header[8..16]);
        let dimension = read_u32(&header[16..20]) as usize;

        let count = usize::try_from(count)
            .map_err(|_| RagError::IndexFormat(format!("vector count {} too large", count)))?;
        let expected_bytes = count
            .checked_mul(dimension)
            .and_then(|values| values.checked_mul(4))
            .ok_or_else(|| {
                RagError::IndexFormat(format!(
                    "header declares {} vectors of dimension {}, which overflows",
                    count, dimension
                ))
            })?;

        let body = &bytes[HEADER_LEN..];
        if body.len() != expected_bytes {
            return Err(RagError::IndexFormat(format!(
                "header declares {} vectors of dimension {} ({} bytes) but body holds {} bytes",
                count,
                dimension,
                expected_bytes,
                body.len()
            )));
        }
        if count > 0 && dimension == 0 {
            return Err(RagError::IndexFormat(
                "non-empty index with zero dimension".to_string(),
            ));
        }

        let data = body
            .chunks_exact(4)
            .map(|raw| f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            .collect();

        Ok(Self { dimension, data })
    }

    #[inline]
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_bytes())?;
        info!(
            "Saved index with {} vectors (dimension {}) to {}",
            self.count(),
            self.dimension,
            path.display()
        );
        Ok(())
    }

    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let index = Self::from_bytes(&bytes).map_err(|e| match e {
            RagError::IndexFormat(msg) => {
                RagError::IndexFormat(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;
        info!(
            "Loaded index with {} vectors (dimension {}) from {}",
            index.count(),
            index.dimension,
            path.display()
        );
        Ok(index)
    }
}

/// Squared Euclidean distance between two equal-length vectors
#[inline]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn compare_neighbors(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.position.cmp(&b.position))
}

fn read_u64(raw: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(raw);
    u64::from_le_bytes(buf)
}

fn read_u32(raw: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(raw);
    u32::from_le_bytes(buf)
}
