//! Neighbor queries over a [`CorrelationMatrix`] and the per-entity ranking
//! cache the predictor owns.
//!
//! Rankings are sorted by correlation descending with ties broken by
//! ascending entity ID, and never contain the query entity itself.
//!
//! [`NeighborCache`] memoizes the full sorted order per query entity so that
//! repeated predictions for the same target skip the O(N log N) sort. It holds
//! no reference to the matrix: every lookup receives the matrix explicitly,
//! and whoever mutates the matrix must call [`NeighborCache::invalidate`] or
//! [`NeighborCache::invalidate_all`] in the same exclusive section.

use std::cmp::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use log::trace;
use serde::{Deserialize, Serialize};

use crate::core::CorrelationMatrix;
use crate::error::{CorrError, Result};

/// Which ranking feeds the predictor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NeighborMode {
    /// Only entities with a strictly positive correlation.
    #[default]
    Positive,
    /// All other entities, including zero and negative correlations.
    Nearest,
}

// off-diagonal cells are finite, `CorrelationMatrix::set` rejects the rest
fn sort_by_correlation(row: &[f32], ids: &mut [usize]) {
    ids.sort_unstable_by(|&a, &b| {
        row[b]
            .partial_cmp(&row[a])
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.cmp(&b))
    });
}

/// Entities with `m[e, entity] > 0`, most correlated first.
pub fn positively_correlated(matrix: &CorrelationMatrix, entity: usize) -> Result<Vec<usize>> {
    let row = matrix.row(entity)?;
    let mut ids: Vec<usize> = (0..row.len())
        .filter(|&e| e != entity && row[e] > 0.0)
        .collect();
    sort_by_correlation(row, &mut ids);
    Ok(ids)
}

/// Every other entity, most correlated first.
pub fn ranked_entities(matrix: &CorrelationMatrix, entity: usize) -> Result<Vec<usize>> {
    let row = matrix.row(entity)?;
    let mut ids: Vec<usize> = (0..row.len()).filter(|&e| e != entity).collect();
    sort_by_correlation(row, &mut ids);
    Ok(ids)
}

fn check_k(k: usize) -> Result<()> {
    if k < 1 {
        return Err(CorrError::Argument(format!(
            "neighborhood size k must be >= 1, got {}",
            k
        )));
    }
    Ok(())
}

/// The `min(k, N - 1)` entities most correlated with `entity`.
pub fn nearest_neighbors(matrix: &CorrelationMatrix, entity: usize, k: usize) -> Result<Vec<usize>> {
    check_k(k)?;
    let mut ids = ranked_entities(matrix, entity)?;
    ids.truncate(k);
    Ok(ids)
}

/// Memoized rankings keyed by query entity.
#[derive(Debug, Default)]
pub struct NeighborCache {
    positive: DashMap<usize, Arc<Vec<usize>>>,
    ranked: DashMap<usize, Arc<Vec<usize>>>,
}

impl NeighborCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup<F>(
        map: &DashMap<usize, Arc<Vec<usize>>>,
        entity: usize,
        compute: F,
    ) -> Result<Arc<Vec<usize>>>
    where
        F: FnOnce() -> Result<Vec<usize>>,
    {
        if let Some(hit) = map.get(&entity) {
            return Ok(Arc::clone(hit.value()));
        }
        trace!("Neighbor cache miss for entity {}", entity);
        let ranking = Arc::new(compute()?);
        map.insert(entity, Arc::clone(&ranking));
        Ok(ranking)
    }

    /// Cached [`positively_correlated`].
    pub fn positively_correlated(
        &self,
        matrix: &CorrelationMatrix,
        entity: usize,
    ) -> Result<Arc<Vec<usize>>> {
        Self::lookup(&self.positive, entity, || positively_correlated(matrix, entity))
    }

    /// Cached [`ranked_entities`].
    pub fn ranked(&self, matrix: &CorrelationMatrix, entity: usize) -> Result<Arc<Vec<usize>>> {
        Self::lookup(&self.ranked, entity, || ranked_entities(matrix, entity))
    }

    /// Candidate order for the given mode.
    pub fn candidates(
        &self,
        matrix: &CorrelationMatrix,
        entity: usize,
        mode: NeighborMode,
    ) -> Result<Arc<Vec<usize>>> {
        match mode {
            NeighborMode::Positive => self.positively_correlated(matrix, entity),
            NeighborMode::Nearest => self.ranked(matrix, entity),
        }
    }

    /// Cached [`nearest_neighbors`].
    pub fn nearest_neighbors(
        &self,
        matrix: &CorrelationMatrix,
        entity: usize,
        k: usize,
    ) -> Result<Vec<usize>> {
        check_k(k)?;
        let ranked = self.ranked(matrix, entity)?;
        Ok(ranked.iter().take(k).copied().collect())
    }

    /// Drops the cached rankings of one entity.
    pub fn invalidate(&self, entity: usize) {
        self.positive.remove(&entity);
        self.ranked.remove(&entity);
    }

    /// Drops every cached ranking.
    pub fn invalidate_all(&self) {
        trace!("Invalidating {} cached rankings", self.len());
        self.positive.clear();
        self.ranked.clear();
    }

    /// Number of cached rankings across both modes.
    pub fn len(&self) -> usize {
        self.positive.len() + self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, entity: usize) -> bool {
        self.positive.contains_key(&entity) || self.ranked.contains_key(&entity)
    }
}
