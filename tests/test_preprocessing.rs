//! Integration test: schema analysis and preprocessing end-to-end

use ml_builder::error::BuilderError;
use ml_builder::frame::FeatureTable;
use ml_builder::preprocessing::{PreprocessMethod, PreprocessingPlanner, SchemaAnalyzer};
use polars::prelude::*;
use std::collections::HashSet;

fn sample_df() -> DataFrame {
    df!(
        "age" => &[Some(25.0), Some(30.0), None, Some(40.0), Some(45.0), Some(50.0)],
        "visits" => &[1i64, 3, 2, 5, 4, 6],
        "city" => &[Some("paris"), Some("rome"), Some("paris"), None, Some("oslo"), Some("rome")],
        "member" => &[true, false, true, true, false, false],
        "label" => &[Some("yes"), Some("no"), None, Some("yes"), Some("no"), Some("yes")],
    )
    .unwrap()
}

#[test]
fn test_schema_partitions_features() {
    let df = sample_df();
    let config = SchemaAnalyzer::analyze(&df, "label").unwrap();

    assert_eq!(config.feature_columns, vec!["age", "visits", "city", "member"]);
    assert_eq!(config.numeric_columns, vec!["age", "visits"]);
    assert_eq!(config.categorical_columns, vec!["city", "member"]);
    assert!(config.method.is_none());

    let numeric: HashSet<_> = config.numeric_columns.iter().collect();
    let categorical: HashSet<_> = config.categorical_columns.iter().collect();
    assert!(numeric.is_disjoint(&categorical));
    let union: HashSet<_> = numeric.union(&categorical).cloned().collect();
    let features: HashSet<_> = config.feature_columns.iter().collect();
    assert_eq!(union, features);
}

#[test]
fn test_unknown_target() {
    let err = SchemaAnalyzer::analyze(&sample_df(), "missing").unwrap_err();
    assert!(matches!(err, BuilderError::InvalidTarget(_)));
    assert_eq!(err.to_string(), "Target column 'missing' not found in dataset.");
}

#[test]
fn test_build_is_repeatable() {
    let df = sample_df();
    let config = SchemaAnalyzer::analyze(&df, "label").unwrap();
    let table = FeatureTable::from_frame(&df, &config.numeric_columns, &config.categorical_columns).unwrap();

    let (mut first, _) = PreprocessingPlanner::build(&config, "onehot").unwrap();
    let (mut second, _) = PreprocessingPlanner::build(&config, "ONEHOT").unwrap();
    first.fit(&table).unwrap();
    second.fit(&table).unwrap();

    assert_eq!(first.output_width().unwrap(), second.output_width().unwrap());
    assert_eq!(first.feature_names().unwrap(), second.feature_names().unwrap());
    assert_eq!(
        first.feature_names().unwrap(),
        vec![
            "age",
            "visits",
            "city=oslo",
            "city=paris",
            "city=rome",
            "member=false",
            "member=true"
        ]
    );
}

#[test]
fn test_normalization_scales_and_imputes() {
    let df = sample_df();
    let config = SchemaAnalyzer::analyze(&df, "label").unwrap();
    let (mut pre, config) = PreprocessingPlanner::build(&config, "normalization").unwrap();
    assert_eq!(config.method, Some(PreprocessMethod::Normalization));

    let table = FeatureTable::from_frame(&df, &config.numeric_columns, &config.categorical_columns).unwrap();
    let x = pre.fit_transform(&table).unwrap();

    assert_eq!(x.nrows(), 6);
    assert!(x.iter().all(|v| v.is_finite()));
    // standardized numeric block has zero mean
    for col in 0..2 {
        let mean: f64 = x.column(col).sum() / 6.0;
        assert!(mean.abs() < 1e-9);
    }
    // each categorical block has exactly one indicator set per row
    for row in x.rows() {
        let city: f64 = row.iter().skip(2).take(3).sum();
        assert_eq!(city, 1.0);
    }
}

#[test]
fn test_prepare_drops_missing_target() {
    let df = sample_df();
    let prepared = PreprocessingPlanner::prepare(&df, "label", "normalization").unwrap();

    assert_eq!(prepared.dropped_rows, 1);
    assert_eq!(prepared.dataset.height(), df.height() - prepared.dropped_rows);
    assert_eq!(prepared.features.height(), prepared.dataset.height());
    assert_eq!(prepared.target.len(), prepared.dataset.height());
    assert_eq!(prepared.target.null_count(), 0);
    assert!(!prepared.preprocessor.is_fitted());
}

#[test]
fn test_prepare_rejects_bad_method_before_dropping() {
    let err = PreprocessingPlanner::prepare(&sample_df(), "label", "pca").unwrap_err();
    assert!(matches!(err, BuilderError::InvalidMethod(_)));
}

#[test]
fn test_unseen_category_is_all_zero() {
    let train = df!("c" => &["a", "b", "a"], "y" => &["p", "q", "p"]).unwrap();
    let config = SchemaAnalyzer::analyze(&train, "y").unwrap();
    let (mut pre, _) = PreprocessingPlanner::build(&config, "onehot").unwrap();
    pre.fit(&FeatureTable::from_frame(&train, &[], &["c".to_string()]).unwrap()).unwrap();

    let fresh = df!("c" => &["z"]).unwrap();
    let x = pre
        .transform(&FeatureTable::from_frame(&fresh, &[], &["c".to_string()]).unwrap())
        .unwrap();
    assert_eq!(x.row(0).to_vec(), vec![0.0, 0.0]);
}
