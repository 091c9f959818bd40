use ndarray::{ArrayView1, ArrayView2};

/// Squared euclidean distance between two rows.
pub fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Indices (into `candidates`) of the `k` rows of `data` nearest to
/// `data[query]`, excluding the query row itself. Ties break on index.
pub fn k_nearest(
    data: ArrayView2<'_, f64>,
    query: usize,
    candidates: &[usize],
    k: usize,
) -> Vec<usize> {
    let point = data.row(query);
    let mut scored: Vec<(f64, usize)> = candidates
        .iter()
        .enumerate()
        .filter(|(_, &row)| row != query)
        .map(|(pos, &row)| (squared_distance(point, data.row(row)), pos))
        .collect();
    let order = |a: &(f64, usize), b: &(f64, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
    if k == 0 {
        return Vec::new();
    }
    if k < scored.len() {
        scored.select_nth_unstable_by(k - 1, order);
        scored.truncate(k);
    }
    scored.sort_unstable_by(order);
    scored.into_iter().map(|(_, pos)| pos).collect()
}
