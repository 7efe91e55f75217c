//! Rating records and the sparse observation table.
//!
//! [`RatingMatrix`] is the observation membership table the predictor consults:
//! it answers "did user `u` rate item `i`" and "with what value", and exposes
//! per-entity profiles (an item's raters, a user's rated items) that the
//! correlation strategies consume.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CorrError, Result};

/// Which side of the user–item relation the correlations are computed over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    User,
    #[default]
    Item,
}

/// A single `(user, item, value)` observation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub user: usize,
    pub item: usize,
    pub value: f32,
}

impl RatingRecord {
    pub fn new(user: usize, item: usize, value: f32) -> Self {
        Self { user, item, value }
    }

    /// The ID of this record on the given side.
    #[inline]
    pub fn entity(&self, entity_type: EntityType) -> usize {
        match entity_type {
            EntityType::User => self.user,
            EntityType::Item => self.item,
        }
    }
}

/// Sparse profile of one entity: context ID -> value, ordered by context ID.
pub type Profile = BTreeMap<usize, f32>;

/// Sparse user × item table of observed values, indexed both ways.
///
/// Rows grow on demand: writing `(u, i)` extends the per-user and per-item
/// row vectors to cover `u` and `i`.
#[derive(Clone, Debug, Default)]
pub struct RatingMatrix {
    by_user: Vec<Profile>,
    by_item: Vec<Profile>,
    count: usize,
    sum: f64,
}

fn reserve_rows(rows: &mut Vec<Profile>, max_id: Option<usize>) -> Result<()> {
    let Some(id) = max_id else {
        return Ok(());
    };
    let len = id
        .checked_add(1)
        .ok_or(CorrError::Capacity { requested: id })?;
    rows.try_reserve(len.saturating_sub(rows.len()))
        .map_err(|_| CorrError::Capacity { requested: id })
}

impl RatingMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: &[RatingRecord]) -> Self {
        let mut ratings = Self::new();
        for r in records {
            ratings.set(r.user, r.item, r.value);
        }
        ratings
    }

    /// Reserves user and item rows for every ID in `records` without
    /// changing any observation.
    ///
    /// # Errors
    ///
    /// [`CorrError::Capacity`] if the rows for the largest ID cannot be
    /// allocated. The table is unchanged in that case.
    pub fn reserve(&mut self, records: &[RatingRecord]) -> Result<()> {
        reserve_rows(&mut self.by_user, records.iter().map(|r| r.user).max())?;
        reserve_rows(&mut self.by_item, records.iter().map(|r| r.item).max())
    }

    /// Inserts or overwrites the value for `(user, item)`.
    ///
    /// # Panics
    ///
    /// If the row vectors for `user` or `item` cannot be allocated; call
    /// [`reserve`](Self::reserve) first for IDs from untrusted input.
    pub fn set(&mut self, user: usize, item: usize, value: f32) {
        if self.by_user.len() <= user {
            self.by_user.resize_with(user + 1, Profile::new);
        }
        if self.by_item.len() <= item {
            self.by_item.resize_with(item + 1, Profile::new);
        }
        match self.by_user[user].insert(item, value) {
            Some(old) => self.sum -= old as f64,
            None => self.count += 1,
        }
        self.sum += value as f64;
        self.by_item[item].insert(user, value);
    }

    /// Removes `(user, item)`; returns the previous value if it was observed.
    pub fn remove(&mut self, user: usize, item: usize) -> Option<f32> {
        let old = self.by_user.get_mut(user)?.remove(&item)?;
        if let Some(row) = self.by_item.get_mut(item) {
            row.remove(&user);
        }
        self.count -= 1;
        self.sum -= old as f64;
        Some(old)
    }

    #[inline]
    pub fn is_observed(&self, user: usize, item: usize) -> bool {
        self.by_user
            .get(user)
            .is_some_and(|row| row.contains_key(&item))
    }

    #[inline]
    pub fn value(&self, user: usize, item: usize) -> Option<f32> {
        self.by_user.get(user).and_then(|row| row.get(&item)).copied()
    }

    /// Per-entity profiles: for `Item`, each item's raters; for `User`, each
    /// user's rated items.
    pub fn by_entity(&self, entity_type: EntityType) -> &[Profile] {
        match entity_type {
            EntityType::User => &self.by_user,
            EntityType::Item => &self.by_item,
        }
    }

    pub fn by_user(&self) -> &[Profile] {
        &self.by_user
    }

    pub fn by_item(&self) -> &[Profile] {
        &self.by_item
    }

    /// Number of user rows (max user ID seen + 1).
    pub fn num_users(&self) -> usize {
        self.by_user.len()
    }

    /// Number of item rows (max item ID seen + 1).
    pub fn num_items(&self) -> usize {
        self.by_item.len()
    }

    pub fn max_user_id(&self) -> Option<usize> {
        self.by_user.len().checked_sub(1)
    }

    pub fn max_item_id(&self) -> Option<usize> {
        self.by_item.len().checked_sub(1)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Mean of all observed values, 0 when empty.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    /// All observations in (user, item) order.
    pub fn iter(&self) -> impl Iterator<Item = RatingRecord> + '_ {
        self.by_user.iter().enumerate().flat_map(|(user, row)| {
            row.iter()
                .map(move |(&item, &value)| RatingRecord::new(user, item, value))
        })
    }
}
