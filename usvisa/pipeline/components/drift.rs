use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    entity::schema::SchemaConfig,
    frame::{Column, Frame, FrameError},
};

/// Statistical test used for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftTest {
    /// Two-sample Kolmogorov-Smirnov, scored by p-value.
    KolmogorovSmirnov,
    /// Jensen-Shannon distance between category frequencies.
    JensenShannon,
}

/// Per-column drift result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDrift {
    /// Test applied.
    pub test: DriftTest,
    /// p-value (KS) or distance (JS).
    pub score: f64,
    /// Threshold the score was compared against.
    pub threshold: f64,
    /// Whether the column drifted.
    pub drift_detected: bool,
}

/// Drift between the train (reference) and test (current) splits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    /// Share of drifted columns reached the configured share.
    pub dataset_drift: bool,
    /// Columns checked.
    pub number_of_columns: usize,
    /// Columns that drifted.
    pub number_of_drifted_columns: usize,
    /// `number_of_drifted_columns / number_of_columns`.
    pub share_of_drifted_columns: f64,
    /// Per-column results in schema order.
    pub columns: IndexMap<String, ColumnDrift>,
}

/// Thresholds for [`detect_drift`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftThresholds {
    /// KS p-value below which a numerical column drifted.
    pub ks_p_value: f64,
    /// JS distance at or above which a categorical column drifted.
    pub js_distance: f64,
    /// Share of drifted columns that flags dataset drift.
    pub drift_share: f64,
}

impl Default for DriftThresholds {
    fn default() -> Self {
        Self {
            ks_p_value: 0.05,
            js_distance: 0.1,
            drift_share: 0.5,
        }
    }
}

/// Compares every schema column present in both frames. Drop columns such as
/// `case_id` are skipped.
pub fn detect_drift(
    reference: &Frame,
    current: &Frame,
    schema: &SchemaConfig,
    thresholds: DriftThresholds,
) -> Result<DriftReport, FrameError> {
    let mut columns = IndexMap::new();
    let compared = |name: &&String| !schema.drop_columns.contains(*name);
    for name in schema.numerical_columns.iter().filter(compared) {
        if let (Column::Numeric(a), Column::Numeric(b)) =
            (reference.column(name)?, current.column(name)?)
        {
            let p_value = ks_p_value(a, b);
            columns.insert(
                name.clone(),
                ColumnDrift {
                    test: DriftTest::KolmogorovSmirnov,
                    score: p_value,
                    threshold: thresholds.ks_p_value,
                    drift_detected: p_value < thresholds.ks_p_value,
                },
            );
            continue;
        }
        columns.insert(name.clone(), categorical(reference, current, name, thresholds)?);
    }
    for name in schema.categorical_columns.iter().filter(compared) {
        columns.insert(name.clone(), categorical(reference, current, name, thresholds)?);
    }

    let number_of_columns = columns.len();
    let number_of_drifted_columns = columns.values().filter(|c| c.drift_detected).count();
    let share_of_drifted_columns = if number_of_columns == 0 {
        0.0
    } else {
        number_of_drifted_columns as f64 / number_of_columns as f64
    };
    Ok(DriftReport {
        dataset_drift: number_of_columns > 0
            && share_of_drifted_columns >= thresholds.drift_share,
        number_of_columns,
        number_of_drifted_columns,
        share_of_drifted_columns,
        columns,
    })
}

fn categorical(
    reference: &Frame,
    current: &Frame,
    name: &str,
    thresholds: DriftThresholds,
) -> Result<ColumnDrift, FrameError> {
    let distance = js_distance(
        &reference.column(name)?.labels(),
        &current.column(name)?.labels(),
    );
    Ok(ColumnDrift {
        test: DriftTest::JensenShannon,
        score: distance,
        threshold: thresholds.js_distance,
        drift_detected: distance >= thresholds.js_distance,
    })
}

/// Two-sided KS statistic `D = sup |F_a - F_b|`.
#[must_use]
pub fn ks_statistic(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);
    let (n, m) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j, mut d) = (0usize, 0usize, 0f64);
    while i < a.len() && j < b.len() {
        let x = a[i].min(b[j]);
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        d = d.max((i as f64 / n - j as f64 / m).abs());
    }
    d
}

/// Asymptotic two-sample KS p-value.
#[must_use]
pub fn ks_p_value(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 1.0;
    }
    let d = ks_statistic(a, b);
    let (n, m) = (a.len() as f64, b.len() as f64);
    let en = (n * m / (n + m)).sqrt();
    kolmogorov_q((en + 0.12 + 0.11 / en) * d)
}

/// Kolmogorov survival function `Q(λ) = 2 Σ (-1)^(j-1) exp(-2 j² λ²)`.
fn kolmogorov_q(lambda: f64) -> f64 {
    if lambda < 1e-3 {
        return 1.0;
    }
    let mut sum = 0.0;
    let mut sign = 1.0;
    let mut previous = 0.0;
    for j in 1..=100 {
        let jf = f64::from(j);
        let term = sign * 2.0 * (-2.0 * jf * jf * lambda * lambda).exp();
        sum += term;
        if term.abs() <= 1e-10 * previous || term.abs() <= 1e-12 * sum.abs() {
            return sum.clamp(0.0, 1.0);
        }
        previous = term.abs();
        sign = -sign;
    }
    1.0
}

/// Jensen-Shannon distance (natural log) between two label samples.
#[must_use]
pub fn js_distance(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let mut counts: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for label in a {
        counts.entry(label.as_str()).or_default().0 += 1.0;
    }
    for label in b {
        counts.entry(label.as_str()).or_default().1 += 1.0;
    }
    let (n, m) = (a.len() as f64, b.len() as f64);
    let kl_term = |p: f64, mid: f64| if p > 0.0 { p * (p / mid).ln() } else { 0.0 };
    let divergence: f64 = counts
        .values()
        .map(|&(ca, cb)| {
            let (p, q) = (ca / n, cb / m);
            let mid = (p + q) / 2.0;
            0.5 * kl_term(p, mid) + 0.5 * kl_term(q, mid)
        })
        .sum();
    divergence.max(0.0).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn ks_identical_samples_do_not_drift() {
        let a: Vec<f64> = (0..200).map(f64::from).collect();
        assert!(ks_statistic(&a, &a).abs() < 1e-12);
        assert!((ks_p_value(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ks_shifted_samples_drift() {
        let a: Vec<f64> = (0..200).map(f64::from).collect();
        let b: Vec<f64> = (150..350).map(f64::from).collect();
        assert!((ks_statistic(&a, &b) - 0.75).abs() < 1e-12);
        assert!(ks_p_value(&a, &b) < 1e-6);
    }

    #[test]
    fn js_distance_bounds() {
        let a = labels(&["Asia", "Europe", "Asia"]);
        assert!(js_distance(&a, &a).abs() < 1e-12);
        let disjoint = js_distance(&labels(&["Y"]), &labels(&["N"]));
        assert!((disjoint - 2f64.ln().sqrt()).abs() < 1e-12);
    }

    #[test]
    fn report_flags_dataset_drift() {
        let reference = Frame::from_columns([
            ("prevailing_wage", Column::Numeric((0..100).map(f64::from).collect())),
            ("continent", Column::Text(vec!["Asia".to_string(); 100])),
        ])
        .unwrap();
        let current = Frame::from_columns([
            ("prevailing_wage", Column::Numeric((500..600).map(f64::from).collect())),
            ("continent", Column::Text(vec!["Asia".to_string(); 100])),
        ])
        .unwrap();
        let schema = SchemaConfig::from_yaml(
            "columns:\n  - prevailing_wage: float\n  - continent: category\nnumerical_columns: [prevailing_wage]\ncategorical_columns: [continent]\n",
        )
        .unwrap();
        let report = detect_drift(&reference, &current, &schema, DriftThresholds::default()).unwrap();
        assert_eq!(report.number_of_columns, 2);
        assert_eq!(report.number_of_drifted_columns, 1);
        assert!(report.columns["prevailing_wage"].drift_detected);
        assert!(!report.columns["continent"].drift_detected);
        assert!(report.dataset_drift);
    }

    #[test]
    fn drop_columns_are_not_compared() {
        let ids = |range: std::ops::Range<u32>| -> Vec<String> {
            range.map(|i| format!("EZYV{i:05}")).collect()
        };
        let reference = Frame::from_columns([
            ("case_id", Column::Text(ids(0..80))),
            ("continent", Column::Text(vec!["Asia".to_string(); 80])),
        ])
        .unwrap();
        let current = Frame::from_columns([
            ("case_id", Column::Text(ids(80..100))),
            ("continent", Column::Text(vec!["Asia".to_string(); 20])),
        ])
        .unwrap();
        let schema = SchemaConfig::from_yaml(
            "columns:\n  - case_id: category\n  - continent: category\ncategorical_columns: [case_id, continent]\ndrop_columns: [case_id]\n",
        )
        .unwrap();
        let report = detect_drift(&reference, &current, &schema, DriftThresholds::default()).unwrap();
        assert_eq!(report.number_of_columns, 1);
        assert!(!report.columns.contains_key("case_id"));
        assert_eq!(report.number_of_drifted_columns, 0);
        assert!(!report.dataset_drift);
    }
}
