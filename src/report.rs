//! Presentation of training results

use crate::error::{BuilderError, Result};
use crate::training::TrainResult;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::str::FromStr;

/// Requested presentation of stored metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Html,
}

impl FromStr for ReportFormat {
    type Err = BuilderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "json" => Ok(ReportFormat::Json),
            "html" => Ok(ReportFormat::Html),
            other => Err(BuilderError::InvalidInput(format!(
                "format must be 'json' or 'html', got '{}'",
                other
            ))),
        }
    }
}

/// Rendered metrics: the numeric fields verbatim plus the confusion matrix
/// as a nested grid and as an HTML table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub model_type: String,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub confusion_matrix: Vec<Vec<u64>>,
    pub confusion_matrix_html: String,
    pub test_size: f64,
    pub labels: Vec<String>,
    pub n_train: usize,
    pub n_test: usize,
}

impl MetricsReport {
    pub fn render(result: &TrainResult) -> Self {
        Self {
            model_type: result.model_type.clone(),
            accuracy: result.accuracy,
            precision: result.precision,
            recall: result.recall,
            f1: result.f1,
            confusion_matrix: result.confusion_matrix.clone(),
            confusion_matrix_html: confusion_matrix_html(&result.confusion_matrix),
            test_size: result.test_size,
            labels: result.labels.clone(),
            n_train: result.n_train,
            n_test: result.n_test,
        }
    }
}

/// HTML table with `Pred_i` column headers and `Actual_i` row headers
pub fn confusion_matrix_html(matrix: &[Vec<u64>]) -> String {
    let mut html = String::from(
        "<table class='confusion-matrix' border='1' cellspacing='0' cellpadding='4'>",
    );
    html.push_str("<thead><tr><th></th>");
    for j in 0..matrix.len() {
        let _ = write!(html, "<th>Pred_{}</th>", j);
    }
    html.push_str("</tr></thead><tbody>");
    for (i, row) in matrix.iter().enumerate() {
        let _ = write!(html, "<tr><th>Actual_{}</th>", i);
        for v in row {
            let _ = write!(html, "<td>{}</td>", v);
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

/// Fixed-width text grid with the same headers, for terminals
pub fn confusion_matrix_text(matrix: &[Vec<u64>]) -> String {
    let n = matrix.len();
    let row_header = format!("Actual_{}", n.saturating_sub(1)).len();
    let cell = matrix
        .iter()
        .flatten()
        .map(|v| v.to_string().len())
        .chain(std::iter::once(format!("Pred_{}", n.saturating_sub(1)).len()))
        .max()
        .unwrap_or(0);

    let mut out = format!("{:width$}", "", width = row_header);
    for j in 0..n {
        let _ = write!(out, "  {:>width$}", format!("Pred_{}", j), width = cell);
    }
    out.push('\n');
    for (i, row) in matrix.iter().enumerate() {
        let _ = write!(out, "{:<width$}", format!("Actual_{}", i), width = row_header);
        for v in row {
            let _ = write!(out, "  {:>width$}", v, width = cell);
        }
        out.push('\n');
    }
    out
}
