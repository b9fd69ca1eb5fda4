use ndarray::{Array2, ArrayView1};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    #[error("vector dimension mismatch: index holds {expected}-d vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("cannot build an index over zero vectors")]
    Empty,
}

/// One search hit. `distance` is the squared Euclidean distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f32,
}

/// Exact (flat) L2 index over the corpus embeddings.
///
/// Row `i` belongs to chunk `i` of the document store. The index is
/// read-only once built; a changed corpus means building a new one.
#[derive(Debug, Clone)]
pub struct VectorDB {
    vectors: Array2<f32>,
}

impl VectorDB {
    pub fn new(vectors: Array2<f32>) -> Result<Self, IndexError> {
        if vectors.nrows() == 0 || vectors.ncols() == 0 {
            return Err(IndexError::Empty);
        }
        Ok(VectorDB { vectors })
    }

    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn dimensions(&self) -> usize {
        self.vectors.ncols()
    }

    /// Returns the `k` nearest rows, nearest first.
    ///
    /// `k` is clamped into `[1, len]`. Equal distances are ordered by row
    /// index so results are reproducible.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if query.len() != self.dimensions() {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions(),
                actual: query.len(),
            });
        }

        let query = ArrayView1::from(query);
        let mut scored: Vec<Neighbor> = self
            .vectors
            .outer_iter()
            .enumerate()
            .map(|(index, row)| Neighbor {
                index,
                distance: squared_l2(row, query),
            })
            .collect();

        let k = k.clamp(1, scored.len());
        let order = |a: &Neighbor, b: &Neighbor| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.index.cmp(&b.index))
        };
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, order);
            scored.truncate(k);
        }
        scored.sort_unstable_by(order);

        Ok(scored)
    }
}

fn squared_l2(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
