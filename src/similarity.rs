//! Correlation strategies that populate a [`CorrelationMatrix`] from per-entity
//! profiles.
//!
//! Two families share one input shape (a slice of sparse [`Profile`]s, one per
//! entity ID):
//!
//! - **Binary** strategies only look at which contexts two entities share:
//!   `BinaryCosine` = |A∩B| / sqrt(|A|·|B|), `Jaccard` = |A∩B| / |A∪B|,
//!   `ConditionalProbability` = |A∩B| / (|A|^α · |B|^(1-α)). Values in [0, 1].
//! - **Rating** strategies compare the values on co-rated contexts:
//!   shrunk `Pearson` correlation and plain `Cosine`. Values in [-1, 1].
//!
//! Pairs without overlap, or with a zero denominator, are 0 and never NaN.
//!
//! Bulk binary computation goes through a sparse Gram product (`P · Pᵀ` gives
//! every overlap count at once); rating strategies are computed row-parallel
//! with a merge over the smaller profile.

use log::{debug, info, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sprs::{CsMat, TriMat};

use crate::core::CorrelationMatrix;
use crate::error::{CorrError, Result};
use crate::ratings::Profile;

/// Correlation strategy, chosen once when a predictor is built.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Similarity {
    BinaryCosine,
    Jaccard,
    /// Asymmetric in principle; the stored value for `i < j` is P(j | i).
    ConditionalProbability { alpha: f32 },
    /// Pearson correlation over co-rated values, scaled by n / (n + shrinkage).
    Pearson { shrinkage: f32 },
    Cosine,
}

impl Default for Similarity {
    fn default() -> Self {
        Similarity::Pearson { shrinkage: 10.0 }
    }
}

impl Similarity {
    /// True for the strategies that ignore values and use set overlap only.
    pub fn is_binary(&self) -> bool {
        matches!(
            self,
            Similarity::BinaryCosine
                | Similarity::Jaccard
                | Similarity::ConditionalProbability { .. }
        )
    }

    /// Closed range every computed value falls into.
    pub fn range(&self) -> (f32, f32) {
        if self.is_binary() {
            (0.0, 1.0)
        } else {
            (-1.0, 1.0)
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            Similarity::ConditionalProbability { alpha }
                if !(alpha.is_finite() && (0.0..=1.0).contains(&alpha)) =>
            {
                Err(CorrError::Argument(format!(
                    "conditional probability alpha must be in [0, 1], got {}",
                    alpha
                )))
            }
            Similarity::Pearson { shrinkage } if !(shrinkage.is_finite() && shrinkage >= 0.0) => {
                Err(CorrError::Argument(format!(
                    "pearson shrinkage must be finite and >= 0, got {}",
                    shrinkage
                )))
            }
            _ => Ok(()),
        }
    }

    /// Binary similarity from an overlap count and the two set sizes.
    fn from_overlap(&self, overlap: f64, size_a: usize, size_b: usize) -> f32 {
        if overlap <= 0.0 || size_a == 0 || size_b == 0 {
            return 0.0;
        }
        let (na, nb) = (size_a as f64, size_b as f64);
        let sim = match *self {
            Similarity::BinaryCosine => overlap / (na * nb).sqrt(),
            Similarity::Jaccard => overlap / (na + nb - overlap),
            Similarity::ConditionalProbability { alpha } => {
                let alpha = alpha as f64;
                overlap / (na.powf(alpha) * nb.powf(1.0 - alpha))
            }
            Similarity::Pearson { .. } | Similarity::Cosine => return 0.0,
        };
        if sim.is_finite() {
            sim.clamp(0.0, 1.0) as f32
        } else {
            0.0
        }
    }

    /// Similarity between two profiles. For `ConditionalProbability`, `a` is
    /// the conditioning entity.
    pub fn pair(&self, a: &Profile, b: &Profile) -> f32 {
        // walk the smaller profile, look up in the larger one
        let (small, large, swapped) = if a.len() <= b.len() {
            (a, b, false)
        } else {
            (b, a, true)
        };

        if self.is_binary() {
            let overlap = small.keys().filter(|c| large.contains_key(c)).count();
            return self.from_overlap(overlap as f64, a.len(), b.len());
        }

        let mut n = 0usize;
        let (mut sa, mut sb, mut saa, mut sbb, mut sab) = (0.0f64, 0.0f64, 0.0f64, 0.0f64, 0.0f64);
        for (c, &vs) in small.iter() {
            if let Some(&vl) = large.get(c) {
                let (x, y) = if swapped {
                    (vl as f64, vs as f64)
                } else {
                    (vs as f64, vl as f64)
                };
                n += 1;
                sa += x;
                sb += y;
                saa += x * x;
                sbb += y * y;
                sab += x * y;
            }
        }

        let sim = match *self {
            Similarity::Pearson { shrinkage } => {
                if n < 2 {
                    return 0.0;
                }
                let nf = n as f64;
                let num = nf * sab - sa * sb;
                let den = ((nf * saa - sa * sa) * (nf * sbb - sb * sb)).sqrt();
                if !(den > 0.0) {
                    return 0.0;
                }
                (num / den).clamp(-1.0, 1.0) * (nf / (nf + shrinkage as f64))
            }
            Similarity::Cosine => {
                let den = (saa * sbb).sqrt();
                if n == 0 || !(den > 0.0) {
                    return 0.0;
                }
                (sab / den).clamp(-1.0, 1.0)
            }
            _ => 0.0,
        };
        if sim.is_finite() {
            sim as f32
        } else {
            0.0
        }
    }

    /// Recomputes every pair from `profiles`, growing `matrix` first if the
    /// profiles name more entities than it holds. Diagonal cells are set to 1.
    pub fn compute_all(&self, matrix: &mut CorrelationMatrix, profiles: &[Profile]) -> Result<()> {
        self.validate()?;
        let n = profiles.len();
        info!("Computing {:?} correlations for {} entities", self, n);
        matrix.grow(n)?;
        matrix.clear();

        let cells = if self.is_binary() {
            self.binary_cells(profiles)
        } else {
            self.rating_cells(profiles)
        };

        let mut written = 0usize;
        for (i, j, v) in cells {
            matrix.set(i, j, v)?;
            written += 1;
        }
        matrix.set_diagonal(1.0);
        debug!("Wrote {} non-zero correlations", written);
        Ok(())
    }

    /// Recomputes the row (and, by symmetry, the column) of one entity against
    /// every other entity in `matrix`.
    pub fn compute_entity(
        &self,
        matrix: &mut CorrelationMatrix,
        profiles: &[Profile],
        entity: usize,
    ) -> Result<()> {
        self.validate()?;
        matrix.grow(profiles.len())?;
        matrix.add_entity(entity)?;
        trace!("Recomputing correlations of entity {}", entity);

        let empty = Profile::new();
        let profile_of = |e: usize| profiles.get(e).unwrap_or(&empty);
        let own = profile_of(entity);
        let row: Vec<f32> = (0..matrix.dim())
            .into_par_iter()
            .map(|other| {
                if other == entity {
                    1.0
                } else if entity < other {
                    self.pair(own, profile_of(other))
                } else {
                    self.pair(profile_of(other), own)
                }
            })
            .collect();

        for (other, v) in row.into_iter().enumerate() {
            matrix.set(entity, other, v)?;
        }
        Ok(())
    }

    /// Non-zero upper-triangle cells via the sparse Gram product.
    fn binary_cells(&self, profiles: &[Profile]) -> Vec<(usize, usize, f32)> {
        let ncols = profiles
            .iter()
            .filter_map(|p| p.keys().next_back())
            .max()
            .map_or(0, |&c| c + 1);
        let mut triplets = TriMat::new((profiles.len(), ncols));
        for (r, p) in profiles.iter().enumerate() {
            for &c in p.keys() {
                triplets.add_triplet(r, c, 1.0f32);
            }
        }
        let csr: CsMat<f32> = triplets.to_csr();
        let transposed: CsMat<f32> = csr.transpose_view().to_csr();
        let gram: CsMat<f32> = &csr * &transposed;
        debug!("Overlap matrix has {} non-zeros", gram.nnz());

        let sizes: Vec<usize> = profiles.iter().map(|p| p.len()).collect();
        let mut cells = Vec::new();
        for (i, row) in gram.outer_iterator().enumerate() {
            for (j, &overlap) in row.iter() {
                if j > i {
                    let v = self.from_overlap(overlap as f64, sizes[i], sizes[j]);
                    if v != 0.0 {
                        cells.push((i, j, v));
                    }
                }
            }
        }
        cells
    }

    /// Non-zero upper-triangle cells, one rayon task per row.
    fn rating_cells(&self, profiles: &[Profile]) -> Vec<(usize, usize, f32)> {
        let n = profiles.len();
        (0..n)
            .into_par_iter()
            .flat_map_iter(|i| {
                ((i + 1)..n).filter_map(move |j| {
                    let v = self.pair(&profiles[i], &profiles[j]);
                    (v != 0.0).then_some((i, j, v))
                })
            })
            .collect()
    }
}
