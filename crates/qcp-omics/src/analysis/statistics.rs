//! Descriptive statistics per numeric column.

use crate::dataset::Dataset;
use crate::error::Result;
use crate::types::ColumnStatistics;
use crate::utils::{is_constant, mean, present, quantile_sorted, sorted, std_dev};

/// Sample skewness with the Fisher-Pearson bias adjustment (G1).
///
/// `None` below three values, 0 for constant data.
pub(crate) fn skewness(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 3 {
        return None;
    }
    if is_constant(values) {
        return Some(0.0);
    }
    let (m2, m3, _) = central_moments(values)?;
    let g1 = m3 / m2.powf(1.5);
    let n = n as f64;
    Some(g1 * (n * (n - 1.0)).sqrt() / (n - 2.0))
}

/// Bias-adjusted excess kurtosis (G2).
///
/// `None` below four values, 0 for constant data.
pub(crate) fn kurtosis(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 4 {
        return None;
    }
    if is_constant(values) {
        return Some(0.0);
    }
    let (m2, _, m4) = central_moments(values)?;
    let g2 = m4 / (m2 * m2) - 3.0;
    let n = n as f64;
    Some(((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0)))
}

/// Second, third and fourth central moments (population).
fn central_moments(values: &[f64]) -> Option<(f64, f64, f64)> {
    let m = mean(values)?;
    let n = values.len() as f64;
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for v in values {
        let d = v - m;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    Some((m2 / n, m3 / n, m4 / n))
}

/// Summary of one column; missing values are ignored.
pub fn column_statistics(column: &str, values: &[Option<f64>]) -> ColumnStatistics {
    let observed = present(values);
    let s = sorted(&observed);
    ColumnStatistics {
        column: column.to_string(),
        count: observed.len(),
        mean: mean(&observed),
        std: std_dev(&observed, 1),
        min: s.first().copied(),
        q25: quantile_sorted(&s, 0.25),
        median: quantile_sorted(&s, 0.5),
        q75: quantile_sorted(&s, 0.75),
        max: s.last().copied(),
        skewness: skewness(&observed),
        kurtosis: kurtosis(&observed),
    }
}

pub fn descriptive_statistics(dataset: &Dataset) -> Result<Vec<ColumnStatistics>> {
    Ok(dataset
        .numeric_columns()?
        .iter()
        .map(|(name, values)| column_statistics(name, values))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn close(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-9)
    }

    #[test]
    fn test_column_statistics() {
        let values = [Some(1.0), Some(2.0), None, Some(3.0), Some(4.0), Some(10.0)];
        let stats = column_statistics("gene_a", &values);
        assert_eq!(stats.count, 5);
        assert_eq!(stats.mean, Some(4.0));
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.q25, Some(2.0));
        assert_eq!(stats.median, Some(3.0));
        assert_eq!(stats.q75, Some(4.0));
        assert_eq!(stats.max, Some(10.0));
        assert!(close(stats.std, 12.5f64.sqrt()));
    }

    #[test]
    fn test_symmetric_data_has_zero_skew() {
        assert!(close(skewness(&[1.0, 2.0, 3.0, 4.0, 5.0]), 0.0));
    }

    #[test]
    fn test_skewness_and_kurtosis_reference_values() {
        let values = [1.0, 2.0, 3.0, 4.0, 10.0];
        assert!((skewness(&values).unwrap() - 1.6970562748477143).abs() < 1e-9);
        assert!((kurtosis(&values).unwrap() - 3.152).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_columns() {
        assert_eq!(skewness(&[1.0, 2.0]), None);
        assert_eq!(kurtosis(&[1.0, 2.0, 3.0]), None);
        assert_eq!(skewness(&[4.0, 4.0, 4.0]), Some(0.0));
        assert_eq!(kurtosis(&[4.0, 4.0, 4.0, 4.0]), Some(0.0));

        let empty = column_statistics("e", &[None, None]);
        assert_eq!(empty.count, 0);
        assert_eq!(empty.mean, None);
        assert_eq!(empty.median, None);
    }

    #[test]
    fn test_descriptive_statistics_covers_numeric_view() {
        let df = df![
            "gene_a" => [1.0, 2.0, 3.0],
            "group" => ["x", "y", "z"],
            "gene_b" => [1i64, 1, 2],
        ]
        .unwrap();
        let ds = Dataset::new(vec!["a".into(), "b".into(), "c".into()], df).unwrap();
        let stats = descriptive_statistics(&ds).unwrap();
        let names: Vec<_> = stats.iter().map(|s| s.column.as_str()).collect();
        assert_eq!(names, vec!["gene_a", "gene_b"]);
    }
}
