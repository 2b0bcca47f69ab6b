//! Integration test: training engine, hyperparameters and artifacts

use ml_builder::error::BuilderError;
use ml_builder::export::ArtifactPersister;
use ml_builder::preprocessing::PreprocessingPlanner;
use ml_builder::training::metrics::{accuracy, confusion_matrix, macro_scores, observed_labels};
use ml_builder::training::{HiddenLayers, ModelKind, ModelSpec, TrainingEngine};
use ndarray::array;
use polars::prelude::*;
use serde_json::{json, Map, Value};

/// Three loosely separated classes over two numeric and one categorical column
fn three_class_df(n_per_class: usize) -> DataFrame {
    let mut a = Vec::new();
    let mut b = Vec::new();
    let mut shade = Vec::new();
    let mut label = Vec::new();
    for class in 0..3 {
        for i in 0..n_per_class {
            let jitter = ((i * 37 + class * 11) % 17) as f64 / 17.0;
            a.push(class as f64 * 3.0 + jitter);
            b.push((class as f64 - 1.0) * 2.0 - jitter);
            shade.push(if (i + class) % 3 == 0 { "dark" } else { "light" });
            label.push(["setosa", "versicolor", "virginica"][class]);
        }
    }
    df!("a" => &a, "b" => &b, "shade" => &shade, "species" => &label).unwrap()
}

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn run(spec: &ModelSpec, method: &str) -> (ml_builder::training::FittedPipeline, ml_builder::training::TrainResult, DataFrame) {
    let df = three_class_df(20);
    let prepared = PreprocessingPlanner::prepare(&df, "species", method).unwrap();
    let (pipeline, result) = TrainingEngine::new()
        .train(&prepared.features, &prepared.target, &prepared.preprocessor, spec, 0.3)
        .unwrap();
    (pipeline, result, prepared.features)
}

#[test]
fn test_hidden_layer_inputs_agree() {
    let expected = vec![64, 32];
    for input in [json!("64,32"), json!([64, 32]), json!("64 32"), json!(" ;64;, 32 ")] {
        assert_eq!(HiddenLayers::parse(&input).unwrap().into_vec(), expected, "input {}", input);
    }
    assert_eq!(HiddenLayers::parse(&json!(16)).unwrap().into_vec(), vec![16]);
}

#[test]
fn test_hidden_layer_rejections() {
    for bad in [
        json!(0),
        json!(-1),
        json!("64,abc"),
        json!(""),
        json!([8, 0]),
        json!({"a": 1}),
        json!(1_000_000),
        json!(vec![2; 65]),
        json!([4096, 4096]),
    ] {
        let err = HiddenLayers::parse(&bad).unwrap_err();
        assert!(
            matches!(err, BuilderError::InvalidHyperparameter { ref field, .. } if field == "hidden_layers"),
            "input {} gave {:?}",
            bad,
            err
        );
    }
}

#[test]
fn test_hidden_layer_resolution_order() {
    let default = HiddenLayers::resolve(&Map::new()).unwrap();
    assert_eq!(default.into_vec(), vec![100]);

    let pair = HiddenLayers::resolve(&params(json!({"num_layers": 3, "nuearals": 8}))).unwrap();
    assert_eq!(pair.into_vec(), vec![8, 8, 8]);

    let explicit = HiddenLayers::resolve(&params(json!({"hidden_layers": "5", "num_layers": 3, "neurons": 8})))
        .unwrap();
    assert_eq!(explicit.into_vec(), vec![5]);

    let half = HiddenLayers::resolve(&params(json!({"num_layers": 3}))).unwrap();
    assert_eq!(half.into_vec(), vec![100]);
}

#[test]
fn test_model_spec_validation() {
    let err = ModelSpec::from_params(ModelKind::Mlp, &params(json!({"learning_rate": -0.1}))).unwrap_err();
    assert!(matches!(err, BuilderError::InvalidHyperparameter { .. }));

    let err = ModelSpec::from_params(ModelKind::DecisionTree, &params(json!({"max_depth": 2.5}))).unwrap_err();
    assert!(matches!(err, BuilderError::InvalidHyperparameter { .. }));

    // keys for other models are ignored
    let spec = ModelSpec::from_params(ModelKind::Perceptron, &params(json!({"hidden_layers": 0}))).unwrap();
    assert_eq!(spec, ModelSpec::Perceptron);

    assert!("svm".parse::<ModelKind>().is_err());
}

#[test]
fn test_training_is_deterministic() {
    let specs = [
        ModelSpec::Perceptron,
        ModelSpec::DecisionTree { max_depth: None },
        ModelSpec::from_params(ModelKind::Mlp, &params(json!({"hidden_layers": [8], "max_iter": 40}))).unwrap(),
    ];
    for spec in &specs {
        let (_, first, _) = run(spec, "normalization");
        let (_, second, _) = run(spec, "normalization");
        assert_eq!(first, second, "{:?} is not reproducible", spec.kind());
    }
}

#[test]
fn test_confusion_matrix_matches_support() {
    let (_, result, _) = run(&ModelSpec::DecisionTree { max_depth: None }, "onehot");

    // 20 per class, ceil(0.3 * 60) = 18 test rows, 6 per class
    assert_eq!(result.n_test, 18);
    assert_eq!(result.n_train, 42);
    assert_eq!(result.labels, vec!["setosa", "versicolor", "virginica"]);
    assert_eq!(result.confusion_matrix.len(), 3);
    for row in &result.confusion_matrix {
        assert_eq!(row.len(), 3);
        assert_eq!(row.iter().sum::<u64>(), 6);
    }
    assert!((0.0..=1.0).contains(&result.accuracy));
}

#[test]
fn test_macro_f1_below_accuracy_when_class_ignored() {
    // class 2 has support but is never predicted
    let y_true = array![0usize, 0, 0, 0, 1, 1, 1, 1, 2, 2];
    let y_pred = array![0usize, 0, 0, 0, 1, 1, 1, 1, 0, 1];
    let labels = observed_labels(&y_true, &y_pred);
    let scores = macro_scores(&y_true, &y_pred, &labels);
    let acc = accuracy(&y_true, &y_pred);

    assert_eq!(acc, 0.8);
    assert!(scores.f1 < acc);
    let cm = confusion_matrix(&y_true, &y_pred, &labels);
    assert_eq!(cm[2], vec![1, 1, 0]);
}

#[test]
fn test_artifact_round_trip_predicts_identically() {
    let dir = tempfile::tempdir().unwrap();
    let persister = ArtifactPersister::new(dir.path());
    let mlp = ModelSpec::from_params(ModelKind::Mlp, &params(json!({"hidden_layers": "6,4", "max_iter": 30}))).unwrap();

    for spec in [ModelSpec::Perceptron, ModelSpec::DecisionTree { max_depth: Some(3) }, mlp] {
        let (pipeline, _, features) = run(&spec, "normalization");
        let path = persister.save(&pipeline, &format!("model-{}", spec.kind())).unwrap();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("json"));

        let artifact = ArtifactPersister::load(&path).unwrap();
        assert_eq!(artifact.model_type, spec.kind());
        assert_eq!(artifact.feature_columns, vec!["a", "b", "shade"]);
        assert_eq!(
            artifact.pipeline.predict_indices(&features).unwrap(),
            pipeline.predict_indices(&features).unwrap()
        );
        assert_eq!(
            artifact.pipeline.predict_frame(&features).unwrap(),
            pipeline.predict_frame(&features).unwrap()
        );
    }
}

#[test]
fn test_numeric_target_labels_sort_numerically() {
    let x: Vec<f64> = (0..30).map(|i| i as f64).collect();
    let y: Vec<i64> = (0..30).map(|i| if i < 10 { 2 } else if i < 20 { 10 } else { 9 }).collect();
    let df = df!("x" => &x, "y" => &y).unwrap();
    let prepared = PreprocessingPlanner::prepare(&df, "y", "onehot").unwrap();
    let (_, result) = TrainingEngine::new()
        .train(
            &prepared.features,
            &prepared.target,
            &prepared.preprocessor,
            &ModelSpec::DecisionTree { max_depth: None },
            0.2,
        )
        .unwrap();
    assert_eq!(result.labels, vec!["2", "9", "10"]);
}

#[test]
fn test_class_with_one_member_fails() {
    let df = df!(
        "x" => &[1.0, 2.0, 3.0, 4.0, 5.0],
        "y" => &["a", "a", "b", "b", "c"]
    )
    .unwrap();
    let prepared = PreprocessingPlanner::prepare(&df, "y", "normalization").unwrap();
    let err = TrainingEngine::new()
        .train(&prepared.features, &prepared.target, &prepared.preprocessor, &ModelSpec::Perceptron, 0.5)
        .unwrap_err();
    assert!(matches!(err, BuilderError::DataError(_)));
}
