//! HTTP request handlers

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Multipart, Query, State},
    Json,
};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::frame::{read_bytes, DataFormat};
use crate::report::ReportFormat;
use crate::workflow::{
    IngestResponse, MetricsResponse, PreprocessRequest, PreprocessResponse, SaveRequest,
    SaveResponse, TrainRequest, TrainResponse,
};

use super::error::{ApiError, Result};
use super::state::AppState;

/// Fields of a train request that are not hyperparameters
const TRAIN_FIELDS: [&str; 3] = ["session_id", "model_type", "test_size"];

/// Parse a JSON object body regardless of the declared content type
fn json_object(body: &Bytes) -> Result<Map<String, Value>> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(ApiError::BadRequest(
            "Request body must be a JSON object.".to_string(),
        )),
    }
}

fn required_str(body: &Map<String, Value>, field: &str) -> Result<String> {
    match body.get(field) {
        None | Some(Value::Null) => Err(ApiError::MissingField(field.to_string())),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(ApiError::BadRequest(format!("Field '{}' must be a string.", field))),
    }
}

/// `test_size` as a number or numeric string
fn optional_fraction(body: &Map<String, Value>, field: &str) -> Result<Option<f64>> {
    let invalid = || ApiError::BadRequest(format!("{} must be a number.", field));
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(Some).ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse::<f64>().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

// ============================================================================
// Workflow Handlers
// ============================================================================

/// Upload a dataset as multipart field `file` and start a session
pub async fn upload_dataset(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(ApiError::BadRequest("No selected file.".to_string()));
        }
        let format = DataFormat::from_file_name(&file_name)?;
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        info!(file = %file_name, bytes = data.len(), "Received dataset upload");

        let df = read_bytes(&data, format)
            .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;
        let response = state.workflow.ingest(df).await?;
        return Ok(Json(response));
    }

    Err(ApiError::BadRequest(
        "No file part named 'file' in request.".to_string(),
    ))
}

pub async fn preprocess(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<PreprocessResponse>> {
    let body = json_object(&body)?;
    let request = PreprocessRequest {
        session_id: required_str(&body, "session_id")?,
        method: required_str(&body, "method")?,
        target_column: required_str(&body, "target_column")?,
    };
    Ok(Json(state.workflow.preprocess(&request).await?))
}

/// Train one model type; every field besides the request keys is passed on
/// as a hyperparameter
pub async fn train(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<TrainResponse>> {
    let body = json_object(&body)?;
    let session_id = required_str(&body, "session_id")?;
    let model_type = required_str(&body, "model_type")?;
    let test_size = optional_fraction(&body, "test_size")?;
    let params: Map<String, Value> = body
        .into_iter()
        .filter(|(k, _)| !TRAIN_FIELDS.contains(&k.as_str()))
        .collect();

    let request = TrainRequest {
        session_id,
        model_type,
        test_size,
        params,
    };
    Ok(Json(state.workflow.train(&request).await?))
}

/// `?session_id=..&model_type=..&format=json|html`
pub async fn confusion_matrix(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<MetricsResponse>> {
    let session_id = query.get("session_id").filter(|s| !s.is_empty());
    let model_type = query.get("model_type").filter(|s| !s.is_empty());
    let (session_id, model_type) = match (session_id, model_type) {
        (Some(s), Some(m)) => (s, m),
        _ => {
            return Err(ApiError::BadRequest(
                "Missing session_id or model_type query parameter.".to_string(),
            ))
        }
    };
    let format: ReportFormat = query
        .get("format")
        .map(|f| f.parse::<ReportFormat>())
        .transpose()?
        .unwrap_or_default();

    Ok(Json(
        state
            .workflow
            .metrics(session_id, model_type, format)
            .await?,
    ))
}

pub async fn save_model(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<SaveResponse>> {
    let body = json_object(&body)?;
    let request = SaveRequest {
        session_id: required_str(&body, "session_id")?,
        model_type: required_str(&body, "model_type")?,
        model_name: required_str(&body, "model_name")?,
    };
    Ok(Json(state.workflow.save_model(&request).await?))
}

// ============================================================================
// System Handlers
// ============================================================================

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Session summaries keyed by id; only when explicitly enabled
pub async fn debug_sessions(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    if !state.config.allow_debug_sessions {
        return Err(ApiError::Forbidden(
            "Debug sessions endpoint not allowed.".to_string(),
        ));
    }

    let out: Map<String, Value> = state
        .workflow
        .list_sessions()
        .await
        .into_iter()
        .map(|s| {
            (
                s.session_id,
                json!({
                    "rows": s.rows,
                    "has_preprocessor": s.has_preprocessor,
                    "num_models": s.num_models,
                    "models": s.models,
                }),
            )
        })
        .collect();
    Ok(Json(Value::Object(out)))
}
