//! Binary relations between entities and contexts (item attributes, user
//! groups, implicit feedback), used as input to the set-overlap similarities.

use std::collections::BTreeSet;

use sprs::{CsMat, TriMat};

use crate::ratings::Profile;

/// Sparse boolean matrix: row `r` holds the set of columns related to `r`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SparseBooleanMatrix {
    rows: Vec<BTreeSet<usize>>,
    ncols: usize,
}

impl SparseBooleanMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the relation from `(row, column)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let mut m = Self::new();
        for (r, c) in pairs {
            m.set(r, c, true);
        }
        m
    }

    pub fn set(&mut self, row: usize, col: usize, value: bool) {
        if value {
            if self.rows.len() <= row {
                self.rows.resize_with(row + 1, BTreeSet::new);
            }
            self.rows[row].insert(col);
            self.ncols = self.ncols.max(col + 1);
        } else if let Some(r) = self.rows.get_mut(row) {
            r.remove(&col);
        }
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        self.rows.get(row).is_some_and(|r| r.contains(&col))
    }

    /// Columns related to `row`; empty for unknown rows.
    pub fn row(&self, row: usize) -> impl Iterator<Item = usize> + '_ {
        self.rows.get(row).into_iter().flat_map(|r| r.iter().copied())
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.ncols
    }

    pub fn num_entries(&self) -> usize {
        self.rows.iter().map(BTreeSet::len).sum()
    }

    /// Rows as value profiles with every present cell set to 1.0.
    pub fn to_profiles(&self) -> Vec<Profile> {
        self.rows
            .iter()
            .map(|r| r.iter().map(|&c| (c, 1.0)).collect())
            .collect()
    }

    /// CSR copy of the relation with 1.0 for every present cell.
    pub fn to_csr(&self) -> CsMat<f32> {
        let mut triplets = TriMat::new((self.rows.len(), self.ncols));
        for (r, cols) in self.rows.iter().enumerate() {
            for &c in cols {
                triplets.add_triplet(r, c, 1.0f32);
            }
        }
        triplets.to_csr()
    }
}
