//! Model selection and hyperparameter parsing
//!
//! Request parameters arrive as loosely-typed JSON. Everything is validated
//! here, before any training work starts, and normalized into a [`ModelSpec`].

use super::neural_network::{parameter_count, MAX_PARAMETERS};
use super::{DecisionTreeClassifier, Estimator, MLPClassifier, MLPConfig, Perceptron};
use crate::error::{BuilderError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Upper bound on the number of hidden layers
pub const MAX_HIDDEN_LAYERS: usize = 64;
/// Upper bound on the width of one hidden layer
pub const MAX_LAYER_WIDTH: usize = 16_384;

/// Supported model families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Perceptron,
    DecisionTree,
    Mlp,
}

impl ModelKind {
    /// Canonical name, used as the session storage key
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Perceptron => "perceptron",
            ModelKind::DecisionTree => "decision_tree",
            ModelKind::Mlp => "mlp",
        }
    }
}

impl FromStr for ModelKind {
    type Err = BuilderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "perceptron" => Ok(ModelKind::Perceptron),
            "decision_tree" => Ok(ModelKind::DecisionTree),
            "mlp" | "multilayer_perceptron" | "backpropagation" => Ok(ModelKind::Mlp),
            _ => Err(BuilderError::InvalidInput("Unknown model_type".to_string())),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepted shapes of the `hidden_layers` parameter
#[derive(Debug, Clone, PartialEq)]
pub enum LayerSpecInput {
    /// `[64, 32]`
    Sizes(Vec<Value>),
    /// `"64,32"`, `"64 32"`, `"64; 32"`
    Delimited(String),
    /// `64`
    Width(Value),
}

impl LayerSpecInput {
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Array(items) => Ok(LayerSpecInput::Sizes(items.clone())),
            Value::String(s) => Ok(LayerSpecInput::Delimited(s.clone())),
            Value::Number(_) => Ok(LayerSpecInput::Width(value.clone())),
            _ => Err(BuilderError::hyperparameter(
                "hidden_layers",
                "unsupported format; use a list, a delimited string or an integer",
            )),
        }
    }
}

/// Validated hidden layer sizes, never empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiddenLayers(Vec<usize>);

impl Default for HiddenLayers {
    fn default() -> Self {
        HiddenLayers(vec![100])
    }
}

impl HiddenLayers {
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<usize> {
        self.0
    }

    /// Parse an explicit `hidden_layers` value
    pub fn parse(value: &Value) -> Result<Self> {
        const FIELD: &str = "hidden_layers";

        let sizes = match LayerSpecInput::from_value(value)? {
            LayerSpecInput::Sizes(items) => {
                if items.is_empty() {
                    return Err(BuilderError::hyperparameter(FIELD, "list is empty"));
                }
                check_layer_count(FIELD, items.len())?;
                items
                    .iter()
                    .map(|v| layer_width(FIELD, v))
                    .collect::<Result<Vec<_>>>()?
            }
            LayerSpecInput::Delimited(text) => {
                let separators = Regex::new(r"[,;\s]+")
                    .map_err(|e| BuilderError::Internal(e.to_string()))?;
                let parts: Vec<&str> = separators
                    .split(text.trim())
                    .filter(|p| !p.is_empty())
                    .collect();
                if parts.is_empty() {
                    return Err(BuilderError::hyperparameter(FIELD, "string is empty"));
                }
                check_layer_count(FIELD, parts.len())?;
                parts
                    .into_iter()
                    .map(|p| layer_width(FIELD, &Value::String(p.to_string())))
                    .collect::<Result<Vec<_>>>()?
            }
            LayerSpecInput::Width(v) => vec![layer_width(FIELD, &v)?],
        };

        Self::bounded(FIELD, sizes)
    }

    /// Reject layer stacks whose hidden-to-hidden connections alone exceed
    /// the network size limit
    fn bounded(field: &str, sizes: Vec<usize>) -> Result<Self> {
        let n_parameters = parameter_count(1, &sizes, 1);
        if n_parameters > MAX_PARAMETERS {
            return Err(BuilderError::hyperparameter(
                field,
                format!(
                    "network would have at least {} parameters, at most {} are allowed",
                    n_parameters, MAX_PARAMETERS
                ),
            ));
        }
        Ok(HiddenLayers(sizes))
    }

    /// Resolve from request parameters in priority order: explicit
    /// `hidden_layers`, then a `num_layers` x `neurons` pair, then the default
    /// single layer of 100. A falsy `neurons` (`0`, `""`, `false`) falls
    /// through to its misspelled synonym `nuearals`.
    pub fn resolve(params: &Map<String, Value>) -> Result<Self> {
        if let Some(value) = present(params, "hidden_layers") {
            return Self::parse(value);
        }

        let neurons = present(params, "neurons")
            .filter(|v| truthy(v))
            .or_else(|| present(params, "nuearals"));
        let num_layers = present(params, "num_layers");
        match (num_layers, neurons) {
            (Some(layers), Some(width)) => {
                let layers = positive_int("num_layers", layers)?;
                check_layer_count("num_layers", layers)?;
                let width = layer_width("neurons", width)?;
                Self::bounded("neurons", vec![width; layers])
            }
            (None, None) => Ok(Self::default()),
            _ => {
                warn!("Only one of num_layers/neurons given; using default hidden layers (100,)");
                Ok(Self::default())
            }
        }
    }
}

/// A fully validated model choice
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSpec {
    Perceptron,
    DecisionTree { max_depth: Option<usize> },
    Mlp(MLPConfig),
}

impl ModelSpec {
    /// Validate the parameters relevant to `kind`; unrelated keys are ignored
    pub fn from_params(kind: ModelKind, params: &Map<String, Value>) -> Result<Self> {
        match kind {
            ModelKind::Perceptron => Ok(ModelSpec::Perceptron),
            ModelKind::DecisionTree => {
                let max_depth = present(params, "max_depth")
                    .map(|v| positive_int("max_depth", v))
                    .transpose()?;
                Ok(ModelSpec::DecisionTree { max_depth })
            }
            ModelKind::Mlp => {
                let defaults = MLPConfig::default();
                let hidden_layers = HiddenLayers::resolve(params)?.into_vec();

                let learning_rate = match present(params, "learning_rate") {
                    Some(v) => positive_float("learning_rate", v)?,
                    None => defaults.learning_rate,
                };
                let max_iter = match present(params, "max_iter") {
                    Some(v) => positive_int("max_iter", v)?,
                    None => defaults.max_iter,
                };
                let tol = match present(params, "tol") {
                    Some(v) => non_negative_float("tol", v)?,
                    None => defaults.tol,
                };
                let n_iter_no_change = match present(params, "n_iter_no_change") {
                    Some(v) => positive_int("n_iter_no_change", v)?,
                    None => defaults.n_iter_no_change,
                };
                let early_stopping = match present(params, "early_stopping") {
                    Some(v) => boolean("early_stopping", v)?,
                    None => defaults.early_stopping,
                };

                Ok(ModelSpec::Mlp(MLPConfig {
                    hidden_layers,
                    learning_rate,
                    max_iter,
                    tol,
                    n_iter_no_change,
                    early_stopping,
                    ..defaults
                }))
            }
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            ModelSpec::Perceptron => ModelKind::Perceptron,
            ModelSpec::DecisionTree { .. } => ModelKind::DecisionTree,
            ModelSpec::Mlp(_) => ModelKind::Mlp,
        }
    }

    /// Construct the unfitted estimator
    pub fn build(&self) -> Estimator {
        match self {
            ModelSpec::Perceptron => Estimator::Perceptron(Perceptron::new()),
            ModelSpec::DecisionTree { max_depth } => {
                let tree = DecisionTreeClassifier::new();
                Estimator::DecisionTree(match max_depth {
                    Some(d) => tree.with_max_depth(*d),
                    None => tree,
                })
            }
            ModelSpec::Mlp(config) => Estimator::Mlp(MLPClassifier::new(config.clone())),
        }
    }
}

/// Parameter value, treating JSON `null` as absent
fn present<'a>(params: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    params.get(key).filter(|v| !v.is_null())
}

/// False for null, zero, `false`, the empty string and empty containers
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn check_layer_count(field: &str, count: usize) -> Result<()> {
    if count > MAX_HIDDEN_LAYERS {
        return Err(BuilderError::hyperparameter(
            field,
            format!("at most {} hidden layers are allowed, got {}", MAX_HIDDEN_LAYERS, count),
        ));
    }
    Ok(())
}

fn layer_width(field: &str, value: &Value) -> Result<usize> {
    let width = positive_int(field, value)?;
    if width > MAX_LAYER_WIDTH {
        return Err(BuilderError::hyperparameter(
            field,
            format!("layer width must be at most {}, got {}", MAX_LAYER_WIDTH, width),
        ));
    }
    Ok(width)
}

/// Positive integer; integral floats (`64.0`) and integer strings (`"64"`)
/// are accepted
pub fn positive_int(field: &str, value: &Value) -> Result<usize> {
    let parsed: i64 = match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i
            } else if let Some(u) = n.as_u64() {
                i64::try_from(u).map_err(|_| BuilderError::hyperparameter(field, "value too large"))?
            } else {
                let f = n.as_f64().unwrap_or(f64::NAN);
                if !f.is_finite() || f.fract() != 0.0 {
                    return Err(BuilderError::hyperparameter(
                        field,
                        format!("expected an integer, got {}", n),
                    ));
                }
                f as i64
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| {
            BuilderError::hyperparameter(field, format!("'{}' is not an integer", s))
        })?,
        other => {
            return Err(BuilderError::hyperparameter(
                field,
                format!("expected a positive integer, got {}", other),
            ))
        }
    };

    if parsed <= 0 {
        return Err(BuilderError::hyperparameter(
            field,
            format!("must be a positive integer, got {}", parsed),
        ));
    }
    usize::try_from(parsed).map_err(|_| BuilderError::hyperparameter(field, "value too large"))
}

fn float_value(field: &str, value: &Value) -> Result<f64> {
    let f = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| BuilderError::hyperparameter(field, format!("expected a number, got {}", value)))?;

    if !f.is_finite() {
        return Err(BuilderError::hyperparameter(field, "must be finite"));
    }
    Ok(f)
}

pub fn positive_float(field: &str, value: &Value) -> Result<f64> {
    let f = float_value(field, value)?;
    if f <= 0.0 {
        return Err(BuilderError::hyperparameter(field, format!("must be positive, got {}", f)));
    }
    Ok(f)
}

fn non_negative_float(field: &str, value: &Value) -> Result<f64> {
    let f = float_value(field, value)?;
    if f < 0.0 {
        return Err(BuilderError::hyperparameter(field, format!("must not be negative, got {}", f)));
    }
    Ok(f)
}

fn boolean(field: &str, value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) if n.as_i64() == Some(0) => Ok(false),
        Value::Number(n) if n.as_i64() == Some(1) => Ok(true),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(BuilderError::hyperparameter(field, format!("expected a boolean, got '{}'", s))),
        },
        other => Err(BuilderError::hyperparameter(field, format!("expected a boolean, got {}", other))),
    }
}
