use std::{fs, path::Path};

use anyhow::{Context, Result};
use ndarray::{s, Array1, Array2};
use serde::{de::DeserializeOwned, Serialize};

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    Ok(())
}

/// Reads and deserializes a YAML file.
pub fn read_yaml_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("parsing yaml {}", path.display()))
}

/// Serializes `value` as YAML, replacing any existing file.
pub fn write_yaml_file<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let raw = serde_yaml::to_string(value)?;
    fs::write(path, raw).with_context(|| format!("writing {}", path.display()))
}

/// Serializes any object as pretty JSON.
pub fn save_object<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let data = serde_json::to_vec_pretty(value)?;
    fs::write(path, data).with_context(|| format!("writing {}", path.display()))
}

/// Reads an object written by [`save_object`].
pub fn load_object<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("decoding {}", path.display()))
}

/// Persists a dense numeric array.
pub fn save_array(path: impl AsRef<Path>, array: &Array2<f64>) -> Result<()> {
    save_object(path, array)
}

/// Loads a dense numeric array written by [`save_array`].
pub fn load_array(path: impl AsRef<Path>) -> Result<Array2<f64>> {
    load_object(path)
}

/// Splits a `[features | label]` array into features and integer labels.
pub fn split_features_labels(array: &Array2<f64>) -> Result<(Array2<f64>, Vec<usize>)> {
    let cols = array.ncols();
    anyhow::ensure!(cols >= 1, "array has no label column");
    let features = array.slice(s![.., ..cols - 1]).to_owned();
    let labels = array
        .column(cols - 1)
        .iter()
        .map(|&value| {
            anyhow::ensure!(
                value >= 0.0 && value.fract() == 0.0,
                "label {value} is not a class index"
            );
            Ok(value as usize)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((features, labels))
}

/// Appends labels as the last column of `features`.
pub fn join_features_labels(features: &Array2<f64>, labels: &[usize]) -> Result<Array2<f64>> {
    anyhow::ensure!(
        features.nrows() == labels.len(),
        "{} feature rows but {} labels",
        features.nrows(),
        labels.len()
    );
    let label_col: Array1<f64> = labels.iter().map(|&label| label as f64).collect();
    let mut out = Array2::zeros((features.nrows(), features.ncols() + 1));
    out.slice_mut(s![.., ..features.ncols()]).assign(features);
    out.column_mut(features.ncols()).assign(&label_col);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::tempdir;

    #[test]
    fn array_file_keeps_shape() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("transformed/train.json");
        let arr = array![[0.5, -1.0, 1.0], [2.0, 0.0, 0.0]];
        save_array(&path, &arr).unwrap();
        assert_eq!(load_array(&path).unwrap(), arr);
    }

    #[test]
    fn array_file_restores_values_exactly() {
        use rand::{rngs::SmallRng, Rng, SeedableRng};

        let dir = tempdir().unwrap();
        let path = dir.path().join("transformed/test.json");
        let mut rng = SmallRng::seed_from_u64(7);
        let arr = Array2::from_shape_fn((100, 10), |_| rng.gen_range(-1e4..1e4) / 3.0);
        save_array(&path, &arr).unwrap();
        let loaded = load_array(&path).unwrap();
        let differing = arr
            .iter()
            .zip(loaded.iter())
            .filter(|(a, b)| a.to_bits() != b.to_bits())
            .count();
        assert_eq!(differing, 0);
    }

    #[test]
    fn label_column_is_split_off() {
        let features = array![[0.5, -1.0], [2.0, 0.0]];
        let joined = join_features_labels(&features, &[1, 0]).unwrap();
        let (x, y) = split_features_labels(&joined).unwrap();
        assert_eq!(x, features);
        assert_eq!(y, vec![1, 0]);
        assert!(join_features_labels(&features, &[1]).is_err());
    }

    #[test]
    fn fractional_label_is_rejected() {
        assert!(split_features_labels(&array![[1.0, 0.5]]).is_err());
    }
}
