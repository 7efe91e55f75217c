//! # corrspace
//!
//! A symmetric, growable correlation store over integer entity IDs with
//! cached neighbor queries, and a weighted k-nearest-neighbor rating
//! predictor that keeps its correlations current under incremental rating
//! changes.
//!
//! - [`core`]: the dense symmetric [`CorrelationMatrix`].
//! - [`similarity`]: strategies that fill a matrix from per-entity profiles.
//! - [`neighbors`]: ranked neighbor queries and the per-entity ranking cache.
//! - [`persistence`]: line-oriented text codec for correlation matrices.
//! - [`baseline`]: fallback and centering estimators.
//! - [`knn`] and [`builder`]: the predictor and its configuration.
//!
//! ```
//! use corrspace::baseline::UserItemBaseline;
//! use corrspace::builder::KnnBuilder;
//! use corrspace::ratings::{RatingMatrix, RatingRecord};
//!
//! let ratings = RatingMatrix::from_records(&[
//!     RatingRecord::new(0, 0, 5.0),
//!     RatingRecord::new(0, 1, 3.0),
//!     RatingRecord::new(1, 0, 4.0),
//!     RatingRecord::new(1, 1, 2.0),
//!     RatingRecord::new(2, 0, 1.0),
//! ]);
//! let mut knn = KnnBuilder::new()
//!     .build(ratings, UserItemBaseline::default())
//!     .unwrap();
//! knn.add_ratings(&[RatingRecord::new(2, 1, 1.0)]).unwrap();
//! let p = knn.predict(2, 0);
//! assert!((1.0..=5.0).contains(&p));
//! ```

pub mod baseline;
pub mod builder;
pub mod core;
pub mod error;
pub mod knn;
mod maintenance;
pub mod neighbors;
pub mod persistence;
pub mod ratings;
pub mod similarity;
pub mod sparse;

#[cfg(test)]
mod tests;

/// Installs a test logger once; later calls are no-ops.
#[cfg(test)]
pub(crate) fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub use crate::core::{CorrelationMatrix, CorrelationStats};
pub use crate::error::{CorrError, Result};
pub use crate::knn::{KnnParams, KnnPredictor};
