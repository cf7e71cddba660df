//! In-memory exact nearest-neighbor index over job embeddings.
//!
//! Vectors and job records are kept in two parallel, append-only
//! sequences; the position of a vector is the join key to its record.

use serde::Serialize;

use crate::jobs::JobRecord;

/// One or many embeddings handed to [`VectorIndex::add`].
///
/// A single vector is promoted to a one-row matrix.
#[derive(Debug, Clone)]
pub enum Embeddings {
    Single(Vec<f32>),
    Batch(Vec<Vec<f32>>),
}

impl Embeddings {
    pub fn rows(&self) -> usize {
        match self {
            Embeddings::Single(_) => 1,
            Embeddings::Batch(rows) => rows.len(),
        }
    }

    fn into_rows(self) -> Vec<Vec<f32>> {
        match self {
            Embeddings::Single(vector) => vec![vector],
            Embeddings::Batch(rows) => rows,
        }
    }
}

impl From<Vec<f32>> for Embeddings {
    fn from(vector: Vec<f32>) -> Self {
        Embeddings::Single(vector)
    }
}

impl From<Vec<Vec<f32>>> for Embeddings {
    fn from(rows: Vec<Vec<f32>>) -> Self {
        Embeddings::Batch(rows)
    }
}

/// A job paired with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobMatch {
    pub job: JobRecord,
    /// `1 / (1 + squared L2 distance)`, in (0, 1]
    pub score: f32,
}

/// Raw search hit before the record is resolved.
#[derive(Debug, Clone, Copy)]
struct Neighbor {
    position: usize,
    distance: f32,
}

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Number of jobs ({records}) must match number of embeddings ({vectors})")]
    CountMismatch { records: usize, vectors: usize },

    #[error("Invalid embeddings shape: row {row} has width {width}, expected {expected}")]
    MalformedShape {
        row: usize,
        width: usize,
        expected: usize,
    },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimensions: usize,
    /// Row-major `(len, dimensions)` matrix
    vectors: Vec<f32>,
    records: Vec<JobRecord>,
}

impl VectorIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Rebuild an index from persisted halves. Lengths are not checked here;
    /// search tolerates a record store shorter than the vector store.
    pub(crate) fn from_parts(dimensions: usize, vectors: Vec<f32>, records: Vec<JobRecord>) -> Self {
        Self {
            dimensions,
            vectors,
            records,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[JobRecord] {
        &self.records
    }

    /// Stored vectors in insertion order.
    pub fn vectors(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact panics on zero, and a zero-width index holds nothing
        self.vectors.chunks_exact(self.dimensions.max(1))
    }

    /// Number of stored vectors.
    pub fn vector_count(&self) -> usize {
        if self.dimensions == 0 {
            0
        } else {
            self.vectors.len() / self.dimensions
        }
    }

    /// Append jobs and their embeddings.
    ///
    /// Everything is validated before the index is touched, so a rejected
    /// call leaves it unchanged. Duplicates are stored as-is.
    pub fn add(
        &mut self,
        records: Vec<JobRecord>,
        vectors: impl Into<Embeddings>,
    ) -> Result<(), IndexError> {
        let vectors = vectors.into();
        if records.len() != vectors.rows() {
            return Err(IndexError::CountMismatch {
                records: records.len(),
                vectors: vectors.rows(),
            });
        }

        let rows = vectors.into_rows();
        if let Some((row, v)) = rows
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != self.dimensions)
        {
            return Err(IndexError::MalformedShape {
                row,
                width: v.len(),
                expected: self.dimensions,
            });
        }

        self.vectors.reserve(rows.len() * self.dimensions);
        for row in rows {
            self.vectors.extend_from_slice(&row);
        }
        self.records.extend(records);

        Ok(())
    }

    /// Return up to `k` jobs closest to `query`, best first.
    ///
    /// Fewer than `k` stored jobs yields all of them; an empty index yields
    /// nothing. Equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<JobMatch>, IndexError> {
        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }

        let results = self
            .nearest(query, k)
            .into_iter()
            .filter_map(|neighbor| match self.records.get(neighbor.position) {
                Some(job) => Some(JobMatch {
                    job: job.clone(),
                    score: Self::similarity(neighbor.distance),
                }),
                None => {
                    log::debug!(
                        "skipping position {} past record store of {}",
                        neighbor.position,
                        self.records.len()
                    );
                    None
                }
            })
            .collect();

        Ok(results)
    }

    /// Exhaustive scan under squared L2 distance.
    fn nearest(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        if k == 0 || self.vector_count() == 0 {
            return vec![];
        }

        let mut neighbors: Vec<Neighbor> = self
            .vectors()
            .enumerate()
            .map(|(position, vector)| Neighbor {
                position,
                distance: Self::squared_l2(query, vector),
            })
            .collect();

        // stable sort: ties stay in insertion order
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        neighbors.truncate(k);

        neighbors
    }

    fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
    }

    fn similarity(distance: f32) -> f32 {
        1.0 / (1.0 + distance)
    }
}
