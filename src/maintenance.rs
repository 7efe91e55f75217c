//! Online updates of a trained [`KnnPredictor`]: add, update and remove
//! ratings without a full retrain.
//!
//! Every touched entity gets its correlation row recomputed against all other
//! entities (O(touched × N) instead of O(N²)). Relationships between two
//! untouched entities are left as they are. Because a row change is also a
//! column change, every cached ranking is dropped after a recompute.
//!
//! Attribute-based correlations do not depend on ratings: updates only keep
//! the observation table and the baseline current.

use log::{debug, info};

use crate::baseline::BaselinePredictor;
use crate::core::checked_cells;
use crate::error::{CorrError, Result};
use crate::knn::{CorrelationSource, KnnPredictor};
use crate::ratings::RatingRecord;

impl<B: BaselinePredictor> KnnPredictor<B> {
    /// Records new observations and refreshes the affected correlations.
    ///
    /// # Errors
    ///
    /// [`CorrError::Capacity`] if an ID in `records` is too large for the
    /// observation table or the correlation matrix; nothing is modified in
    /// that case.
    pub fn add_ratings(&mut self, records: &[RatingRecord]) -> Result<()> {
        self.reserve_entities(records)?;
        info!("Adding {} ratings", records.len());
        for r in records {
            self.ratings.set(r.user, r.item, r.value);
        }
        self.baseline.add_ratings(&self.ratings, records);
        self.retrain_entities(records)
    }

    /// Changes the values of existing observations.
    ///
    /// # Errors
    ///
    /// [`CorrError::Argument`] if any record is not an existing observation;
    /// nothing is modified in that case.
    pub fn update_ratings(&mut self, records: &[RatingRecord]) -> Result<()> {
        if let Some(r) = records
            .iter()
            .find(|r| !self.ratings.is_observed(r.user, r.item))
        {
            return Err(CorrError::Argument(format!(
                "cannot update unobserved rating ({}, {})",
                r.user, r.item
            )));
        }
        info!("Updating {} ratings", records.len());
        for r in records {
            self.ratings.set(r.user, r.item, r.value);
        }
        self.baseline.update_ratings(&self.ratings, records);
        self.retrain_entities(records)
    }

    /// Forgets observations; values in `records` are ignored. Records that
    /// were never observed are skipped.
    pub fn remove_ratings(&mut self, records: &[RatingRecord]) -> Result<()> {
        let mut removed = Vec::with_capacity(records.len());
        for r in records {
            if let Some(value) = self.ratings.remove(r.user, r.item) {
                removed.push(RatingRecord::new(r.user, r.item, value));
            }
        }
        info!("Removed {} of {} ratings", removed.len(), records.len());
        self.baseline.remove_ratings(&self.ratings, &removed);
        self.retrain_entities(&removed)
    }

    // all allocation for new IDs happens here, before any observation changes
    fn reserve_entities(&mut self, records: &[RatingRecord]) -> Result<()> {
        let entity_type = self.params.entity_type;
        let Some(max_id) = records.iter().map(|r| r.entity(entity_type)).max() else {
            return Ok(());
        };
        let new_dim = max_id
            .checked_add(1)
            .ok_or(CorrError::Capacity { requested: max_id })?;
        checked_cells(new_dim)?;
        self.ratings.reserve(records)?;

        let dim = self.correlation.dim();
        self.correlation.add_entity(max_id)?;
        if self.correlation.dim() != dim {
            self.cache.invalidate_all();
        }
        Ok(())
    }

    fn retrain_entities(&mut self, records: &[RatingRecord]) -> Result<()> {
        let entity_type = self.params.entity_type;
        let mut touched: Vec<usize> = records.iter().map(|r| r.entity(entity_type)).collect();
        touched.sort_unstable();
        touched.dedup();

        let outcome = match self.source {
            CorrelationSource::Ratings => {
                let similarity = self.params.similarity;
                let outcome = touched.iter().try_for_each(|&entity| {
                    similarity.compute_entity(
                        &mut self.correlation,
                        self.ratings.by_entity(entity_type),
                        entity,
                    )
                });
                self.cache.invalidate_all();
                outcome
            }
            // correlations do not depend on ratings; only make room for new IDs
            CorrelationSource::Attributes(_) => {
                let dim = self.correlation.dim();
                let outcome = touched
                    .last()
                    .map_or(Ok(()), |&max_id| self.correlation.add_entity(max_id));
                if self.correlation.dim() != dim {
                    self.cache.invalidate_all();
                }
                outcome
            }
        };

        debug!(
            "Retrained {} {:?} entities, matrix is {}x{}",
            touched.len(),
            entity_type,
            self.correlation.dim(),
            self.correlation.dim()
        );
        outcome
    }
}
