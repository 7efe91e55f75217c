//! Baseline estimators: the fallback and centering term of the kNN predictor.
//!
//! A baseline must answer for any `(user, item)` pair, including IDs it has
//! never seen, by falling back to a global or partial average.

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::ratings::{RatingMatrix, RatingRecord};

/// Contract consumed by [`crate::knn::KnnPredictor`].
pub trait BaselinePredictor: Send + Sync {
    /// Full fit on the current observations.
    fn train(&mut self, ratings: &RatingMatrix);

    /// Estimate for `(user, item)`. Never fails on unseen IDs.
    fn predict(&self, user: usize, item: usize) -> f32;

    fn retrain_user(&mut self, _ratings: &RatingMatrix, _user: usize) {}

    fn retrain_item(&mut self, _ratings: &RatingMatrix, _item: usize) {}

    /// Refit the users and items touched by `records`. `ratings` already
    /// reflects the change.
    fn retrain_touched(&mut self, ratings: &RatingMatrix, records: &[RatingRecord]) {
        let mut users: Vec<usize> = records.iter().map(|r| r.user).collect();
        let mut items: Vec<usize> = records.iter().map(|r| r.item).collect();
        users.sort_unstable();
        users.dedup();
        items.sort_unstable();
        items.dedup();
        for item in items {
            self.retrain_item(ratings, item);
        }
        for user in users {
            self.retrain_user(ratings, user);
        }
    }

    fn add_ratings(&mut self, ratings: &RatingMatrix, records: &[RatingRecord]) {
        self.retrain_touched(ratings, records);
    }

    fn update_ratings(&mut self, ratings: &RatingMatrix, records: &[RatingRecord]) {
        self.retrain_touched(ratings, records);
    }

    fn remove_ratings(&mut self, ratings: &RatingMatrix, records: &[RatingRecord]) {
        self.retrain_touched(ratings, records);
    }
}

/// Mean of all observed values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalAverage {
    average: f32,
}

impl GlobalAverage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed estimate, mostly useful in tests.
    pub fn fixed(average: f32) -> Self {
        Self { average }
    }

    pub fn average(&self) -> f32 {
        self.average
    }
}

impl BaselinePredictor for GlobalAverage {
    fn train(&mut self, ratings: &RatingMatrix) {
        self.average = ratings.average() as f32;
        debug!("Global average baseline: {:.4}", self.average);
    }

    fn predict(&self, _user: usize, _item: usize) -> f32 {
        self.average
    }

    fn retrain_touched(&mut self, ratings: &RatingMatrix, _records: &[RatingRecord]) {
        self.average = ratings.average() as f32;
    }
}

/// Global mean plus regularized user and item biases:
/// `b(u, i) = μ + b_u + b_i`, fitted by alternating least squares.
///
/// Unknown users or items contribute a zero bias. Incremental retraining
/// refits only the touched biases and keeps μ fixed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserItemBaseline {
    pub reg_u: f32,
    pub reg_i: f32,
    pub num_iter: usize,
    global_average: f32,
    user_biases: Vec<f32>,
    item_biases: Vec<f32>,
}

impl Default for UserItemBaseline {
    fn default() -> Self {
        Self::new(15.0, 10.0, 10)
    }
}

impl UserItemBaseline {
    pub fn new(reg_u: f32, reg_i: f32, num_iter: usize) -> Self {
        Self {
            reg_u,
            reg_i,
            num_iter,
            global_average: 0.0,
            user_biases: Vec::new(),
            item_biases: Vec::new(),
        }
    }

    pub fn global_average(&self) -> f32 {
        self.global_average
    }

    pub fn user_bias(&self, user: usize) -> f32 {
        self.user_biases.get(user).copied().unwrap_or(0.0)
    }

    pub fn item_bias(&self, item: usize) -> f32 {
        self.item_biases.get(item).copied().unwrap_or(0.0)
    }

    fn fit_item(&self, ratings: &RatingMatrix, item: usize) -> f32 {
        let Some(raters) = ratings.by_item().get(item) else {
            return 0.0;
        };
        let residual: f64 = raters
            .iter()
            .map(|(&u, &r)| (r - self.global_average - self.user_bias(u)) as f64)
            .sum();
        (residual / (self.reg_i as f64 + raters.len() as f64)) as f32
    }

    fn fit_user(&self, ratings: &RatingMatrix, user: usize) -> f32 {
        let Some(rated) = ratings.by_user().get(user) else {
            return 0.0;
        };
        let residual: f64 = rated
            .iter()
            .map(|(&i, &r)| (r - self.global_average - self.item_bias(i)) as f64)
            .sum();
        (residual / (self.reg_u as f64 + rated.len() as f64)) as f32
    }
}

impl BaselinePredictor for UserItemBaseline {
    fn train(&mut self, ratings: &RatingMatrix) {
        self.global_average = ratings.average() as f32;
        self.user_biases = vec![0.0; ratings.num_users()];
        self.item_biases = vec![0.0; ratings.num_items()];

        for iteration in 0..self.num_iter {
            for item in 0..ratings.num_items() {
                self.item_biases[item] = self.fit_item(ratings, item);
            }
            for user in 0..ratings.num_users() {
                self.user_biases[user] = self.fit_user(ratings, user);
            }
            trace!("User/item baseline iteration {} done", iteration);
        }
        debug!(
            "User/item baseline trained: mu={:.4}, {} users, {} items",
            self.global_average,
            self.user_biases.len(),
            self.item_biases.len()
        );
    }

    fn predict(&self, user: usize, item: usize) -> f32 {
        self.global_average + self.user_bias(user) + self.item_bias(item)
    }

    fn retrain_user(&mut self, ratings: &RatingMatrix, user: usize) {
        if self.user_biases.len() <= user {
            self.user_biases.resize(user + 1, 0.0);
        }
        self.user_biases[user] = self.fit_user(ratings, user);
    }

    fn retrain_item(&mut self, ratings: &RatingMatrix, item: usize) {
        if self.item_biases.len() <= item {
            self.item_biases.resize(item + 1, 0.0);
        }
        self.item_biases[item] = self.fit_item(ratings, item);
    }
}
