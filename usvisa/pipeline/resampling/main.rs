//! Class rebalancing: SMOTE oversampling followed by edited nearest
//! neighbours cleaning.

/// Brute-force neighbour search.
pub mod neighbors;

use std::collections::BTreeMap;

use ndarray::{Array2, Axis};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use thiserror::Error;

use neighbors::k_nearest;

/// Errors raised by the resampler.
#[derive(Debug, Error)]
pub enum ResamplingError {
    /// Features and labels disagree in length.
    #[error("{rows} feature rows but {labels} labels")]
    LabelMismatch {
        /// Feature rows.
        rows: usize,
        /// Labels.
        labels: usize,
    },
    /// A class to oversample has fewer than two rows.
    #[error("class {class} has {count} samples, SMOTE needs at least 2")]
    NotEnoughSamples {
        /// Class label.
        class: usize,
        /// Rows available.
        count: usize,
    },
    /// Invalid neighbour count.
    #[error("neighbour count must be positive")]
    InvalidK,
    /// Resampled rows could not be assembled.
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

/// Per-class row counts.
#[must_use]
pub fn class_counts(labels: &[usize]) -> BTreeMap<usize, usize> {
    let mut counts = BTreeMap::new();
    for &label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

/// Minority over majority count, 1.0 when balanced or single-class.
#[must_use]
pub fn balance_ratio(labels: &[usize]) -> f64 {
    let counts = class_counts(labels);
    let max = counts.values().copied().max().unwrap_or(0);
    let min = counts.values().copied().min().unwrap_or(0);
    if max == 0 {
        1.0
    } else {
        min as f64 / max as f64
    }
}

/// SMOTE followed by ENN, seeded for reproducibility.
#[derive(Debug, Clone, Copy)]
pub struct SmoteEnn {
    smote_k: usize,
    enn_k: usize,
    seed: u64,
}

impl Default for SmoteEnn {
    fn default() -> Self {
        Self {
            smote_k: 5,
            enn_k: 3,
            seed: 42,
        }
    }
}

impl SmoteEnn {
    /// Creates a resampler with explicit neighbour counts and seed.
    #[must_use]
    pub const fn new(smote_k: usize, enn_k: usize, seed: u64) -> Self {
        Self {
            smote_k,
            enn_k,
            seed,
        }
    }

    /// Oversamples every class up to the majority count, then removes rows
    /// whose `enn_k` nearest neighbours do not all share their class.
    pub fn fit_resample(
        &self,
        features: &Array2<f64>,
        labels: &[usize],
    ) -> Result<(Array2<f64>, Vec<usize>), ResamplingError> {
        if features.nrows() != labels.len() {
            return Err(ResamplingError::LabelMismatch {
                rows: features.nrows(),
                labels: labels.len(),
            });
        }
        if self.smote_k == 0 || self.enn_k == 0 {
            return Err(ResamplingError::InvalidK);
        }
        let (features, labels) = self.smote(features, labels)?;
        Ok(self.enn(&features, &labels))
    }

    fn smote(
        &self,
        features: &Array2<f64>,
        labels: &[usize],
    ) -> Result<(Array2<f64>, Vec<usize>), ResamplingError> {
        let counts = class_counts(labels);
        let majority = counts.values().copied().max().unwrap_or(0);
        let mut rng = SmallRng::seed_from_u64(self.seed);
        let mut rows: Vec<Vec<f64>> = Vec::new();
        let mut out_labels = labels.to_vec();

        for (&class, &count) in &counts {
            let needed = majority - count;
            if needed == 0 {
                continue;
            }
            if count < 2 {
                return Err(ResamplingError::NotEnoughSamples { class, count });
            }
            let members: Vec<usize> = labels
                .iter()
                .enumerate()
                .filter(|(_, &label)| label == class)
                .map(|(idx, _)| idx)
                .collect();
            let k = self.smote_k.min(count - 1);
            let neighbours: Vec<Vec<usize>> = members
                .iter()
                .map(|&row| {
                    k_nearest(features.view(), row, &members, k)
                        .into_iter()
                        .map(|pos| members[pos])
                        .collect()
                })
                .collect();
            for _ in 0..needed {
                let pick = rng.gen_range(0..members.len());
                let base = features.row(members[pick]);
                let partner = features.row(neighbours[pick][rng.gen_range(0..k)]);
                let gap: f64 = rng.gen();
                rows.push(
                    base.iter()
                        .zip(partner.iter())
                        .map(|(a, b)| a + gap * (b - a))
                        .collect(),
                );
                out_labels.push(class);
            }
        }

        let cols = features.ncols();
        let synthetic = rows.len();
        let mut flat: Vec<f64> = features.iter().copied().collect();
        flat.extend(rows.into_iter().flatten());
        let out = Array2::from_shape_vec((features.nrows() + synthetic, cols), flat)?;
        Ok((out, out_labels))
    }

    fn enn(&self, features: &Array2<f64>, labels: &[usize]) -> (Array2<f64>, Vec<usize>) {
        let all: Vec<usize> = (0..labels.len()).collect();
        let k = self.enn_k.min(labels.len().saturating_sub(1));
        let keep: Vec<bool> = all
            .iter()
            .map(|&row| {
                k == 0
                    || k_nearest(features.view(), row, &all, k)
                        .into_iter()
                        .all(|pos| labels[pos] == labels[row])
            })
            .collect();

        // A class may not vanish entirely.
        let mut kept_per_class: BTreeMap<usize, usize> = BTreeMap::new();
        for (row, &kept) in keep.iter().enumerate() {
            if kept {
                *kept_per_class.entry(labels[row]).or_insert(0) += 1;
            }
        }
        let selected: Vec<usize> = all
            .into_iter()
            .filter(|&row| keep[row] || !kept_per_class.contains_key(&labels[row]))
            .collect();

        let out = features.select(Axis(0), &selected);
        let out_labels = selected.iter().map(|&row| labels[row]).collect();
        (out, out_labels)
    }
}
