//! Fit-once/apply-many feature pipeline

use super::{MedianImputer, ModeImputer, OneHotEncoder, PreprocessMethod, StandardScaler};
use crate::error::{BuilderError, Result};
use crate::frame::FeatureTable;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Numeric block (median impute, optional standard scaling) followed by the
/// categorical block (most-frequent impute, one-hot), each in declared column
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePreprocessor {
    method: PreprocessMethod,
    numeric_columns: Vec<String>,
    categorical_columns: Vec<String>,
    numeric_imputer: MedianImputer,
    scaler: Option<StandardScaler>,
    categorical_imputer: ModeImputer,
    encoder: OneHotEncoder,
    is_fitted: bool,
}

impl FeaturePreprocessor {
    /// Create an unfitted pipeline
    pub fn new(
        method: PreprocessMethod,
        numeric_columns: Vec<String>,
        categorical_columns: Vec<String>,
    ) -> Self {
        Self {
            method,
            numeric_columns,
            categorical_columns,
            numeric_imputer: MedianImputer::new(),
            scaler: method.scales_numeric().then(StandardScaler::new),
            categorical_imputer: ModeImputer::new(),
            encoder: OneHotEncoder::new(),
            is_fitted: false,
        }
    }

    /// Fresh unfitted copy with the same method and columns
    pub fn unfitted(&self) -> Self {
        Self::new(
            self.method,
            self.numeric_columns.clone(),
            self.categorical_columns.clone(),
        )
    }

    pub fn method(&self) -> PreprocessMethod {
        self.method
    }

    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric_columns
    }

    pub fn categorical_columns(&self) -> &[String] {
        &self.categorical_columns
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn fit(&mut self, table: &FeatureTable) -> Result<&mut Self> {
        let numeric = self.numeric_block(table)?;
        self.numeric_imputer.fit(&numeric);

        if let Some(scaler) = self.scaler.as_mut() {
            let imputed = numeric
                .iter()
                .enumerate()
                .map(|(j, values)| self.numeric_imputer.transform_column(j, values))
                .collect::<Result<Vec<_>>>()?;
            let views: Vec<&[f64]> = imputed.iter().map(|c| c.as_slice()).collect();
            scaler.fit(&views);
        }

        let categorical = self.categorical_block(table)?;
        self.categorical_imputer.fit(&categorical);
        let imputed = categorical
            .iter()
            .enumerate()
            .map(|(k, values)| self.categorical_imputer.transform_column(k, values))
            .collect::<Result<Vec<_>>>()?;
        let views: Vec<&[String]> = imputed.iter().map(|c| c.as_slice()).collect();
        self.encoder.fit(&views);

        self.is_fitted = true;
        Ok(self)
    }

    /// Produce the fixed-width design matrix
    pub fn transform(&self, table: &FeatureTable) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(BuilderError::ModelNotFitted);
        }

        let n_rows = table.n_rows();
        let mut x = Array2::<f64>::zeros((n_rows, self.output_width()?));

        for (j, values) in self.numeric_block(table)?.into_iter().enumerate() {
            let mut imputed = self.numeric_imputer.transform_column(j, values)?;
            if let Some(scaler) = &self.scaler {
                scaler.transform_column(j, &mut imputed)?;
            }
            for (i, v) in imputed.into_iter().enumerate() {
                x[[i, j]] = v;
            }
        }

        let mut offset = self.numeric_columns.len();
        for (k, values) in self.categorical_block(table)?.into_iter().enumerate() {
            let imputed = self.categorical_imputer.transform_column(k, values)?;
            for (i, value) in imputed.iter().enumerate() {
                if let Some(pos) = self.encoder.category_index(k, value)? {
                    x[[i, offset + pos]] = 1.0;
                }
            }
            offset += self.encoder.vocabulary(k).map_or(0, |v| v.len());
        }

        Ok(x)
    }

    pub fn fit_transform(&mut self, table: &FeatureTable) -> Result<Array2<f64>> {
        self.fit(table)?;
        self.transform(table)
    }

    pub fn output_width(&self) -> Result<usize> {
        if !self.is_fitted {
            return Err(BuilderError::ModelNotFitted);
        }
        Ok(self.numeric_columns.len() + self.encoder.output_width())
    }

    /// Output column names: `<col>` for numeric, `<col>=<category>` for
    /// indicators
    pub fn feature_names(&self) -> Result<Vec<String>> {
        if !self.is_fitted {
            return Err(BuilderError::ModelNotFitted);
        }
        let mut names = self.numeric_columns.clone();
        for (k, col) in self.categorical_columns.iter().enumerate() {
            if let Some(vocab) = self.encoder.vocabulary(k) {
                names.extend(vocab.iter().map(|c| format!("{}={}", col, c)));
            }
        }
        Ok(names)
    }

    fn numeric_block<'a>(&self, table: &'a FeatureTable) -> Result<Vec<&'a [Option<f64>]>> {
        self.numeric_columns
            .iter()
            .map(|name| {
                table.numeric_column(name).ok_or_else(|| {
                    BuilderError::DataError(format!("Numeric column '{}' not found", name))
                })
            })
            .collect()
    }

    fn categorical_block<'a>(&self, table: &'a FeatureTable) -> Result<Vec<&'a [Option<String>]>> {
        self.categorical_columns
            .iter()
            .map(|name| {
                table.categorical_column(name).ok_or_else(|| {
                    BuilderError::DataError(format!("Categorical column '{}' not found", name))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn sample_table() -> FeatureTable {
        let df = df! {
            "age" => &[Some(20.0), None, Some(40.0), Some(60.0)],
            "color" => &[Some("red"), Some("blue"), None, Some("red")],
        }
        .unwrap();
        FeatureTable::from_frame(&df, &["age".to_string()], &["color".to_string()]).unwrap()
    }

    #[test]
    fn test_normalization_layout() {
        let table = sample_table();
        let mut pre = FeaturePreprocessor::new(
            PreprocessMethod::Normalization,
            vec!["age".into()],
            vec!["color".into()],
        );
        let x = pre.fit_transform(&table).unwrap();

        assert_eq!(x.dim(), (4, 3));
        assert_eq!(pre.feature_names().unwrap(), vec!["age", "color=blue", "color=red"]);
        // missing color imputes to the mode "red"
        assert_eq!(x.row(2).to_vec()[1..], [0.0, 1.0]);
        let col_mean: f64 = x.column(0).sum() / 4.0;
        assert!(col_mean.abs() < 1e-12);
    }

    #[test]
    fn test_onehot_keeps_raw_numeric() {
        let table = sample_table();
        let mut pre = FeaturePreprocessor::new(
            PreprocessMethod::OneHot,
            vec!["age".into()],
            vec!["color".into()],
        );
        let x = pre.fit_transform(&table).unwrap();
        assert_eq!(x.column(0).to_vec(), vec![20.0, 40.0, 40.0, 60.0]);
    }

    #[test]
    fn test_unknown_category_encodes_to_zeros() {
        let mut pre = FeaturePreprocessor::new(PreprocessMethod::OneHot, vec![], vec!["color".into()]);
        pre.fit(&sample_table()).unwrap();

        let df = df! { "color" => &["green"] }.unwrap();
        let unseen = FeatureTable::from_frame(&df, &[], &["color".to_string()]).unwrap();
        let x = pre.transform(&unseen).unwrap();
        assert_eq!(x.row(0).to_vec(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_unfitted_transform_fails() {
        let pre = FeaturePreprocessor::new(PreprocessMethod::OneHot, vec!["age".into()], vec![]);
        assert!(matches!(pre.transform(&sample_table()), Err(BuilderError::ModelNotFitted)));
        assert!(pre.output_width().is_err());
    }

    #[test]
    fn test_all_missing_numeric_column() {
        let df = df! { "n" => &[None::<f64>, None] }.unwrap();
        let table = FeatureTable::from_frame(&df, &["n".to_string()], &[]).unwrap();
        let mut pre = FeaturePreprocessor::new(PreprocessMethod::Normalization, vec!["n".into()], vec![]);
        let x = pre.fit_transform(&table).unwrap();
        assert_eq!(x.column(0).to_vec(), vec![0.0, 0.0]);
    }
}
