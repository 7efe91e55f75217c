use crate::baseline::BaselinePredictor;
use crate::core::CorrelationMatrix;
use crate::error::Result;
use crate::knn::{CorrelationSource, KnnParams, KnnPredictor};
use crate::neighbors::NeighborMode;
use crate::ratings::{EntityType, RatingMatrix};
use crate::similarity::Similarity;
use crate::sparse::SparseBooleanMatrix;

use log::{debug, info};

/// Builder for [`KnnPredictor`].
///
/// Defaults: item-based, k = 80, shrunk Pearson correlation (shrinkage 10),
/// positively correlated neighbors only, predictions clamped to [1, 5].
///
/// ```
/// use corrspace::baseline::GlobalAverage;
/// use corrspace::builder::KnnBuilder;
/// use corrspace::ratings::{RatingMatrix, RatingRecord};
///
/// let ratings = RatingMatrix::from_records(&[
///     RatingRecord::new(0, 0, 5.0),
///     RatingRecord::new(0, 1, 4.0),
///     RatingRecord::new(1, 0, 4.0),
/// ]);
/// let knn = KnnBuilder::new()
///     .with_k(20)
///     .build(ratings, GlobalAverage::new())
///     .unwrap();
/// let p = knn.predict(1, 1);
/// assert!((1.0..=5.0).contains(&p));
/// ```
#[derive(Debug, Clone, Default)]
pub struct KnnBuilder {
    params: KnnParams,
    attributes: Option<SparseBooleanMatrix>,
}

impl KnnBuilder {
    pub fn new() -> Self {
        info!("Initializing new KnnBuilder");
        Self::default()
    }

    /// Start from a full parameter set (e.g. deserialized).
    pub fn from_params(params: KnnParams) -> Self {
        Self {
            params,
            attributes: None,
        }
    }

    /// Maximum number of contributing neighbors per prediction.
    pub fn with_k(mut self, k: usize) -> Self {
        self.params.k = Some(k);
        self
    }

    /// Let every observed correlated neighbor contribute.
    pub fn with_unbounded_k(mut self) -> Self {
        self.params.k = None;
        self
    }

    pub fn with_entity_type(mut self, entity_type: EntityType) -> Self {
        self.params.entity_type = entity_type;
        self
    }

    pub fn with_neighbor_mode(mut self, mode: NeighborMode) -> Self {
        self.params.neighbor_mode = mode;
        self
    }

    pub fn with_similarity(mut self, similarity: Similarity) -> Self {
        self.params.similarity = similarity;
        self
    }

    pub fn with_value_range(mut self, min_value: f32, max_value: f32) -> Self {
        self.params.min_value = min_value;
        self.params.max_value = max_value;
        self
    }

    pub fn with_clamp(mut self, clamp: bool) -> Self {
        self.params.clamp = clamp;
        self
    }

    /// Correlate entities by their attributes instead of their ratings.
    /// Rows of `attributes` are entity IDs of the configured type; the
    /// similarity must be a binary one.
    pub fn with_attributes(mut self, attributes: SparseBooleanMatrix) -> Self {
        info!(
            "Using attribute correlations: {} entities, {} attributes",
            attributes.num_rows(),
            attributes.num_columns()
        );
        if !self.params.similarity.is_binary() {
            debug!("Switching similarity to BinaryCosine for attribute correlations");
            self.params.similarity = Similarity::BinaryCosine;
        }
        self.attributes = Some(attributes);
        self
    }

    pub fn params(&self) -> &KnnParams {
        &self.params
    }

    /// Trains the baseline and computes all correlations.
    pub fn build<B: BaselinePredictor>(
        self,
        ratings: RatingMatrix,
        baseline: B,
    ) -> Result<KnnPredictor<B>> {
        debug!("Build configuration: {:?}", self.params);
        let source = match self.attributes {
            Some(attributes) => CorrelationSource::Attributes(attributes),
            None => CorrelationSource::Ratings,
        };
        KnnPredictor::train(self.params, ratings, baseline, source)
    }

    /// Uses a precomputed correlation matrix (e.g. loaded from disk) instead
    /// of computing one.
    pub fn build_with_correlation<B: BaselinePredictor>(
        self,
        ratings: RatingMatrix,
        baseline: B,
        correlation: CorrelationMatrix,
    ) -> Result<KnnPredictor<B>> {
        debug!("Build configuration: {:?}", self.params);
        let source = match self.attributes {
            Some(attributes) => CorrelationSource::Attributes(attributes),
            None => CorrelationSource::Ratings,
        };
        KnnPredictor::with_correlation(self.params, ratings, baseline, correlation, source)
    }
}
