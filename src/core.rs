//! CorrelationMatrix: a dense, symmetric, growable store of pairwise entity
//! correlations.
//!
//! Entity IDs (users or items) are used directly as row/column indices. The
//! matrix stores `f32` cells in a flattened row-major `Vec<f32>` and keeps
//! `m[i, j] == m[j, i]` at all times: every write goes through [`CorrelationMatrix::set`],
//! which writes both cells.
//!
//! - `get`/`set` are bounds-checked and return [`CorrError::IndexOutOfRange`].
//! - `grow` only ever widens the matrix; existing cells keep their coordinates
//!   and new cells start at 0.
//! - Construction and growth check `dim * dim` against the addressable size
//!   before allocating and fail with [`CorrError::Capacity`].
//!
//! # Examples
//!
//! ```
//! use corrspace::core::CorrelationMatrix;
//!
//! let mut cm = CorrelationMatrix::new(3).unwrap();
//! cm.set(0, 1, 0.8).unwrap();
//! assert_eq!(cm.get(1, 0).unwrap(), 0.8);
//!
//! cm.grow(5).unwrap();
//! assert_eq!(cm.dim(), 5);
//! assert_eq!(cm.get(0, 1).unwrap(), 0.8);
//! assert_eq!(cm.get(4, 3).unwrap(), 0.0);
//! ```
//!
//! # Concurrency
//!
//! The store has a single owner. `set` and `grow` take `&mut self`, so no
//! reader can observe a half-written symmetric pair or a partially grown
//! buffer.

use std::fmt;
use std::mem::size_of;

use log::{debug, trace, warn};

use crate::error::{CorrError, Result};

/// Dense symmetric correlation matrix over entity IDs `0..dim`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CorrelationMatrix {
    data: Vec<f32>,
    dim: usize,
}

/// Number of cells for a `dim x dim` buffer, or a capacity error if the
/// buffer could not be addressed.
pub(crate) fn checked_cells(dim: usize) -> Result<usize> {
    dim.checked_mul(dim)
        .filter(|cells| {
            cells
                .checked_mul(size_of::<f32>())
                .is_some_and(|bytes| bytes <= isize::MAX as usize)
        })
        .ok_or(CorrError::Capacity { requested: dim })
}

fn zeroed(dim: usize) -> Result<Vec<f32>> {
    let cells = checked_cells(dim)?;
    let mut data = Vec::new();
    data.try_reserve_exact(cells).map_err(|_| {
        warn!("Allocation refused for {}x{} correlation matrix", dim, dim);
        CorrError::Capacity { requested: dim }
    })?;
    data.resize(cells, 0.0);
    Ok(data)
}

impl CorrelationMatrix {
    /// Allocates a `capacity x capacity` matrix of zeros.
    ///
    /// # Errors
    ///
    /// [`CorrError::Capacity`] if `capacity * capacity` cells cannot be
    /// represented or allocated.
    pub fn new(capacity: usize) -> Result<Self> {
        debug!("Allocating {}x{} correlation matrix", capacity, capacity);
        let data = zeroed(capacity).inspect_err(|_| {
            warn!("Too many entities for a dense correlation matrix: {}", capacity);
        })?;
        Ok(Self {
            data,
            dim: capacity,
        })
    }

    /// Current dimension N (entity-ID upper bound + 1).
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dim == 0
    }

    /// True if `entity_id` has a row in this matrix.
    #[inline]
    pub fn contains(&self, entity_id: usize) -> bool {
        entity_id < self.dim
    }

    #[inline]
    fn check(&self, i: usize, j: usize) -> Result<()> {
        if i < self.dim && j < self.dim {
            Ok(())
        } else {
            Err(CorrError::IndexOutOfRange {
                i,
                j,
                dim: self.dim,
            })
        }
    }

    /// Unchecked read for hot loops that already validated both indices.
    #[inline]
    pub(crate) fn at(&self, i: usize, j: usize) -> f32 {
        self.data[i * self.dim + j]
    }

    /// Returns the correlation between entities `i` and `j`.
    pub fn get(&self, i: usize, j: usize) -> Result<f32> {
        self.check(i, j)?;
        Ok(self.at(i, j))
    }

    /// Writes `value` to both `(i, j)` and `(j, i)`.
    ///
    /// Never widens the matrix: call [`grow`](Self::grow) or
    /// [`add_entity`](Self::add_entity) first for new IDs.
    ///
    /// # Errors
    ///
    /// [`CorrError::IndexOutOfRange`] for IDs outside the matrix and
    /// [`CorrError::Argument`] for a NaN or infinite `value`.
    pub fn set(&mut self, i: usize, j: usize, value: f32) -> Result<()> {
        self.check(i, j)?;
        if !value.is_finite() {
            return Err(CorrError::Argument(format!(
                "non-finite correlation {} for ({}, {})",
                value, i, j
            )));
        }
        trace!("Setting correlation ({}, {}) = {:.6}", i, j, value);
        let dim = self.dim;
        self.data[i * dim + j] = value;
        self.data[j * dim + i] = value;
        Ok(())
    }

    /// Zero-copy view of row `i`.
    pub fn row(&self, i: usize) -> Result<&[f32]> {
        self.check(i, i)?;
        let start = i * self.dim;
        Ok(&self.data[start..start + self.dim])
    }

    /// Widens the matrix to `new_dim x new_dim`, keeping every existing cell
    /// at its coordinates. New cells read as 0. No-op if `new_dim <= dim`.
    pub fn grow(&mut self, new_dim: usize) -> Result<()> {
        if new_dim <= self.dim {
            return Ok(());
        }
        debug!("Growing correlation matrix {} -> {}", self.dim, new_dim);

        // build the new buffer completely before swapping it in, so a
        // capacity failure leaves the old matrix untouched
        let mut data = zeroed(new_dim)?;
        for (i, old_row) in self.data.chunks_exact(self.dim.max(1)).enumerate().take(self.dim) {
            let start = i * new_dim;
            data[start..start + self.dim].copy_from_slice(old_row);
        }
        self.data = data;
        self.dim = new_dim;
        Ok(())
    }

    /// Makes room for `entity_id`. The entity's correlations still need to be
    /// computed and set by the caller.
    pub fn add_entity(&mut self, entity_id: usize) -> Result<()> {
        let new_dim = entity_id
            .checked_add(1)
            .ok_or(CorrError::Capacity { requested: entity_id })?;
        self.grow(new_dim)
    }

    /// Sum of the correlations between `entity_id` and each of `entities`.
    ///
    /// Entities outside the matrix count as zero correlation, so candidate
    /// sets may mention IDs this store has never seen.
    pub fn sum_up<I>(&self, entity_id: usize, entities: I) -> Result<f64>
    where
        I: IntoIterator<Item = usize>,
    {
        self.check(entity_id, entity_id)?;
        Ok(entities
            .into_iter()
            .filter(|&e| e < self.dim)
            .map(|e| self.at(entity_id, e) as f64)
            .sum())
    }

    /// Resets every cell to 0 without changing the dimension.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Writes `value` on every diagonal cell.
    pub fn set_diagonal(&mut self, value: f32) {
        for i in 0..self.dim {
            self.data[i * self.dim + i] = value;
        }
    }

    /// Iterates the strict upper triangle as `(i, j, value)` with `i < j`.
    pub fn upper_triangle(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        (0..self.dim).flat_map(move |i| ((i + 1)..self.dim).map(move |j| (i, j, self.at(i, j))))
    }

    /// Checks `|m[i,j] - m[j,i]| <= tolerance` for all cells.
    pub fn is_symmetric(&self, tolerance: f32) -> bool {
        let violations = self
            .upper_triangle()
            .filter(|&(i, j, v)| (v - self.at(j, i)).abs() > tolerance)
            .count();
        trace!("Symmetry check: {} violations", violations);
        violations == 0
    }

    /// Summary statistics over the off-diagonal cells.
    pub fn statistics(&self) -> CorrelationStats {
        let mut nnz = 0usize;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0f64;
        for (_, _, v) in self.upper_triangle() {
            min = min.min(v);
            max = max.max(v);
            sum += v as f64;
            if v != 0.0 {
                nnz += 1;
            }
        }
        let pairs = self.dim * self.dim.saturating_sub(1) / 2;
        let (min, max, mean) = if pairs == 0 {
            (0.0, 0.0, 0.0)
        } else {
            (min, max, (sum / pairs as f64) as f32)
        };
        let sparsity = if pairs == 0 {
            1.0
        } else {
            (pairs - nnz) as f64 / pairs as f64
        };

        let stats = CorrelationStats {
            dim: self.dim,
            nnz,
            sparsity,
            min,
            max,
            mean,
        };
        debug!(
            "Correlation statistics: {} entities, {} non-zero pairs, {:.2}% sparse",
            stats.dim,
            stats.nnz,
            stats.sparsity * 100.0
        );
        stats
    }
}

/// Summary of the off-diagonal part of a [`CorrelationMatrix`].
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationStats {
    pub dim: usize,
    /// Non-zero unordered pairs `i < j`.
    pub nnz: usize,
    pub sparsity: f64,
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

impl fmt::Display for CorrelationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Correlation Statistics:")?;
        writeln!(f, "  Entities: {}", self.dim)?;
        writeln!(
            f,
            "  Non-zero pairs: {} ({:.2}% dense)",
            self.nnz,
            (1.0 - self.sparsity) * 100.0
        )?;
        writeln!(f, "  Range: [{:.4}, {:.4}]", self.min, self.max)?;
        writeln!(f, "  Mean: {:.4}", self.mean)?;
        Ok(())
    }
}

impl fmt::Display for CorrelationMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CorrelationMatrix ({}×{}):", self.dim, self.dim)?;
        if self.dim <= 10 {
            for i in 0..self.dim {
                write!(f, "Row {}: [", i)?;
                for j in 0..self.dim {
                    write!(f, "{:8.4} ", self.at(i, j))?;
                }
                writeln!(f, "]")?;
            }
            Ok(())
        } else {
            writeln!(f, "Matrix too large to display ({} entities)", self.dim)?;
            write!(f, "{}", self.statistics())
        }
    }
}
