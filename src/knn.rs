//! Weighted k-nearest-neighbor rating predictor over a correlation matrix.
//!
//! For item-based prediction of `(user, item)` the ranked neighbors of `item`
//! are walked in order; each neighbor the user has rated contributes
//! `w = corr(item, neighbor)` to the weight sum and `w * (r - baseline)` to the
//! numerator, until `k` neighbors have contributed. The prediction is
//! `baseline(user, item) + num / weight_sum`, or the bare baseline when no
//! neighbor contributed, clamped to the configured value range.
//!
//! User-based prediction is the mirror image: neighbors of `user` that rated
//! `item`.
//!
//! Prediction never fails. Users or items outside the known range get the
//! baseline estimate unmodified.

use std::io::{BufRead, Write};

use log::{debug, info, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::baseline::BaselinePredictor;
use crate::core::{CorrelationMatrix, CorrelationStats};
use crate::error::{CorrError, Result};
use crate::neighbors::{NeighborCache, NeighborMode};
use crate::persistence::DiagonalPolicy;
use crate::ratings::{EntityType, RatingMatrix};
use crate::similarity::Similarity;
use crate::sparse::SparseBooleanMatrix;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnParams {
    /// Contributing neighbors per prediction; `None` means unbounded.
    pub k: Option<usize>,
    pub entity_type: EntityType,
    pub neighbor_mode: NeighborMode,
    pub similarity: Similarity,
    pub min_value: f32,
    pub max_value: f32,
    /// Clamp predictions to `[min_value, max_value]`. Disable for unbounded
    /// score domains.
    pub clamp: bool,
}

impl Default for KnnParams {
    fn default() -> Self {
        Self {
            k: Some(80),
            entity_type: EntityType::Item,
            neighbor_mode: NeighborMode::Positive,
            similarity: Similarity::default(),
            min_value: 1.0,
            max_value: 5.0,
            clamp: true,
        }
    }
}

// Relative equality for the float fields, exact for the rest
impl PartialEq for KnnParams {
    fn eq(&self, other: &Self) -> bool {
        self.k == other.k
            && self.entity_type == other.entity_type
            && self.neighbor_mode == other.neighbor_mode
            && self.similarity == other.similarity
            && approx::relative_eq!(self.min_value, other.min_value)
            && approx::relative_eq!(self.max_value, other.max_value)
            && self.clamp == other.clamp
    }
}

impl KnnParams {
    pub fn validate(&self) -> Result<()> {
        if self.k == Some(0) {
            return Err(CorrError::Argument(
                "neighborhood size k must be >= 1".to_string(),
            ));
        }
        if !(self.min_value.is_finite() && self.max_value.is_finite())
            || self.min_value > self.max_value
        {
            return Err(CorrError::Argument(format!(
                "invalid value range [{}, {}]",
                self.min_value, self.max_value
            )));
        }
        self.similarity.validate()
    }
}

/// Where the correlations come from.
#[derive(Debug, Clone, Default)]
pub enum CorrelationSource {
    /// Derived from the observed ratings; kept current on every update.
    #[default]
    Ratings,
    /// Derived once from a binary attribute relation (rows = entities).
    /// Rating updates do not change these correlations.
    Attributes(SparseBooleanMatrix),
}

/// Weighted kNN predictor.
#[derive(Debug)]
pub struct KnnPredictor<B: BaselinePredictor> {
    pub(crate) params: KnnParams,
    pub(crate) correlation: CorrelationMatrix,
    pub(crate) cache: NeighborCache,
    pub(crate) ratings: RatingMatrix,
    pub(crate) baseline: B,
    pub(crate) source: CorrelationSource,
}

impl<B: BaselinePredictor> KnnPredictor<B> {
    /// Trains the baseline and computes all correlations.
    pub(crate) fn train(
        params: KnnParams,
        ratings: RatingMatrix,
        mut baseline: B,
        source: CorrelationSource,
    ) -> Result<Self> {
        params.validate()?;
        info!(
            "Training {:?}-based kNN on {} ratings ({} users, {} items)",
            params.entity_type,
            ratings.len(),
            ratings.num_users(),
            ratings.num_items()
        );
        baseline.train(&ratings);

        let mut predictor = Self {
            params,
            correlation: CorrelationMatrix::default(),
            cache: NeighborCache::new(),
            ratings,
            baseline,
            source,
        };
        predictor.compute_correlations()?;
        info!("kNN training completed");
        Ok(predictor)
    }

    /// Wraps an already computed (e.g. loaded) correlation matrix.
    pub(crate) fn with_correlation(
        params: KnnParams,
        ratings: RatingMatrix,
        mut baseline: B,
        correlation: CorrelationMatrix,
        source: CorrelationSource,
    ) -> Result<Self> {
        params.validate()?;
        baseline.train(&ratings);
        debug!(
            "kNN predictor from precomputed {}x{} correlations",
            correlation.dim(),
            correlation.dim()
        );
        Ok(Self {
            params,
            correlation,
            cache: NeighborCache::new(),
            ratings,
            baseline,
            source,
        })
    }

    /// Bulk recomputation of the whole matrix; drops every cached ranking.
    pub fn compute_correlations(&mut self) -> Result<()> {
        let similarity = self.params.similarity;
        let entities = self.ratings.by_entity(self.params.entity_type).len();
        let outcome = match &self.source {
            CorrelationSource::Ratings => similarity.compute_all(
                &mut self.correlation,
                self.ratings.by_entity(self.params.entity_type),
            ),
            CorrelationSource::Attributes(attributes) => {
                if !similarity.is_binary() {
                    return Err(CorrError::Argument(format!(
                        "attribute correlations need a binary similarity, got {:?}",
                        similarity
                    )));
                }
                similarity.compute_all(&mut self.correlation, &attributes.to_profiles())
            }
        }
        .and_then(|_| self.correlation.grow(entities));
        self.cache.invalidate_all();
        outcome?;
        debug!("{}", self.correlation.statistics());
        Ok(())
    }

    /// Maps `(user, item)` to `(source, target)`: the target is the entity
    /// whose neighbors are ranked.
    #[inline]
    fn orient(&self, user: usize, item: usize) -> (usize, usize) {
        match self.params.entity_type {
            EntityType::Item => (user, item),
            EntityType::User => (item, user),
        }
    }

    /// Inverse of [`orient`](Self::orient) for a `(source, neighbor)` pair.
    #[inline]
    fn user_item(&self, source: usize, neighbor: usize) -> (usize, usize) {
        match self.params.entity_type {
            EntityType::Item => (source, neighbor),
            EntityType::User => (neighbor, source),
        }
    }

    fn source_known(&self, source: usize) -> bool {
        let known = match self.params.entity_type {
            EntityType::Item => self.ratings.num_users(),
            EntityType::User => self.ratings.num_items(),
        };
        source < known
    }

    /// True when `(user, item)` would not fall back to the baseline because
    /// of an unseen entity.
    pub fn can_predict(&self, user: usize, item: usize) -> bool {
        let (source, target) = self.orient(user, item);
        self.source_known(source) && self.correlation.contains(target)
    }

    /// Predicted value for `(user, item)`.
    pub fn predict(&self, user: usize, item: usize) -> f32 {
        let baseline = self.baseline.predict(user, item);
        if !self.can_predict(user, item) {
            trace!("Unseen entity in ({}, {}), using baseline", user, item);
            return baseline;
        }
        let (source, target) = self.orient(user, item);

        let candidates = match self
            .cache
            .candidates(&self.correlation, target, self.params.neighbor_mode)
        {
            Ok(c) => c,
            Err(_) => return baseline,
        };

        let mut budget = self.params.k.unwrap_or(usize::MAX);
        let mut sum = 0.0f64;
        let mut weight_sum = 0.0f64;
        for &neighbor in candidates.iter() {
            let (u, i) = self.user_item(source, neighbor);
            let Some(value) = self.ratings.value(u, i) else {
                continue;
            };
            let weight = self.correlation.at(target, neighbor) as f64;
            weight_sum += weight;
            sum += weight * (value - self.baseline.predict(u, i)) as f64;

            budget -= 1;
            if budget == 0 {
                break;
            }
        }

        let mut result = baseline;
        if weight_sum != 0.0 {
            result += (sum / weight_sum) as f32;
        }
        if self.params.clamp {
            result = result.clamp(self.params.min_value, self.params.max_value);
        }
        result
    }

    /// Predictions for many pairs, computed in parallel.
    pub fn predict_batch(&self, pairs: &[(usize, usize)]) -> Vec<f32> {
        debug!("Batch prediction for {} pairs", pairs.len());
        pairs
            .par_iter()
            .map(|&(user, item)| self.predict(user, item))
            .collect()
    }

    /// Correlation between two entities of the configured type.
    pub fn correlation(&self, i: usize, j: usize) -> Result<f32> {
        self.correlation.get(i, j)
    }

    /// The `k` entities most correlated with `entity`.
    pub fn nearest_neighbors(&self, entity: usize, k: usize) -> Result<Vec<usize>> {
        self.cache.nearest_neighbors(&self.correlation, entity, k)
    }

    pub fn correlation_matrix(&self) -> &CorrelationMatrix {
        &self.correlation
    }

    pub fn correlation_stats(&self) -> CorrelationStats {
        self.correlation.statistics()
    }

    pub fn neighbor_cache(&self) -> &NeighborCache {
        &self.cache
    }

    pub fn ratings(&self) -> &RatingMatrix {
        &self.ratings
    }

    pub fn baseline(&self) -> &B {
        &self.baseline
    }

    pub fn params(&self) -> &KnnParams {
        &self.params
    }

    /// Writes the correlation matrix in the sparse text format.
    pub fn save_correlation<W: Write>(&self, writer: W) -> Result<()> {
        self.correlation.write(writer)
    }

    /// Replaces the correlation matrix with one read from `reader`.
    ///
    /// On error the current matrix is kept.
    pub fn load_correlation<R: BufRead>(&mut self, reader: R) -> Result<()> {
        let loaded = CorrelationMatrix::read(reader, DiagonalPolicy::One)?;
        info!("Loaded {}x{} correlation matrix", loaded.dim(), loaded.dim());
        self.correlation = loaded;
        self.cache.invalidate_all();
        Ok(())
    }
}
