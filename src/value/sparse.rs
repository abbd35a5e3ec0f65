//! Compressed sparse matrices (row- or column-major).

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::value::NdArray;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SparseFormat {
    /// Compressed sparse column: `indptr` walks columns, `indices` are rows.
    Csc,
    /// Compressed sparse row: `indptr` walks rows, `indices` are columns.
    Csr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    format: SparseFormat,
    shape: (usize, usize),
    data: NdArray,
    indices: Vec<i64>,
    indptr: Vec<i64>,
}

impl SparseMatrix {
    /// Validates the compressed structure against `shape`.
    pub fn new(
        format: SparseFormat,
        shape: (usize, usize),
        data: NdArray,
        indices: Vec<i64>,
        indptr: Vec<i64>,
    ) -> Result<Self> {
        let (major, minor) = match format {
            SparseFormat::Csc => (shape.1, shape.0),
            SparseFormat::Csr => (shape.0, shape.1),
        };
        if data.ndim() != 1 {
            return Err(Error::ShapeMismatch(format!("sparse data must be 1-d, got {:?}", data.shape())));
        }
        if indptr.len() != major + 1 {
            return Err(Error::ShapeMismatch(format!(
                "indptr has {} entries, expected {}",
                indptr.len(),
                major + 1
            )));
        }
        if indptr.first() != Some(&0) || indptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::ShapeMismatch("indptr must start at 0 and be non-decreasing".into()));
        }
        let nnz = indptr.last().copied().unwrap_or(0) as usize;
        if indices.len() != nnz || data.size() != nnz {
            return Err(Error::ShapeMismatch(format!(
                "indptr declares {nnz} entries, found {} indices and {} values",
                indices.len(),
                data.size()
            )));
        }
        if indices.iter().any(|&i| i < 0 || i as usize >= minor) {
            return Err(Error::ShapeMismatch(format!("sparse index out of bounds for shape {shape:?}")));
        }
        Ok(SparseMatrix { format, shape, data, indices, indptr })
    }

    /// Column-compressed matrix without an explicit shape: the column count
    /// comes from `indptr`, the row count from the largest row index.
    pub fn csc_inferred(data: NdArray, indices: Vec<i64>, indptr: Vec<i64>) -> Result<Self> {
        let cols = indptr.len().saturating_sub(1);
        let rows = indices.iter().max().map(|&m| m.max(-1) + 1).unwrap_or(0) as usize;
        Self::new(SparseFormat::Csc, (rows, cols), data, indices, indptr)
    }

    pub fn format(&self) -> SparseFormat {
        self.format
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn data(&self) -> &NdArray {
        &self.data
    }

    pub fn indices(&self) -> &[i64] {
        &self.indices
    }

    pub fn indptr(&self) -> &[i64] {
        &self.indptr
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// `(row, col) -> value` with duplicates summed and explicit zeros dropped.
    pub fn entries(&self) -> BTreeMap<(usize, usize), f64> {
        let values = self.data.to_f64_vec();
        let mut out: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for (major, bounds) in self.indptr.windows(2).enumerate() {
            for k in bounds[0] as usize..bounds[1] as usize {
                let minor = self.indices[k] as usize;
                let pos = match self.format {
                    SparseFormat::Csc => (minor, major),
                    SparseFormat::Csr => (major, minor),
                };
                *out.entry(pos).or_insert(0.0) += values[k];
            }
        }
        out.retain(|_, v| *v != 0.0);
        out
    }

    /// Number of positions where `self - other` is nonzero.
    pub fn count_differences(&self, other: &SparseMatrix) -> usize {
        let a = self.entries();
        let b = other.entries();
        let mut keys: Vec<&(usize, usize)> = a.keys().chain(b.keys()).collect();
        keys.sort();
        keys.dedup();
        keys.into_iter()
            .filter(|k| a.get(*k).copied().unwrap_or(0.0) - b.get(*k).copied().unwrap_or(0.0) != 0.0)
            .count()
    }
}
