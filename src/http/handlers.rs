//! Request handlers.

use std::path::Path as FsPath;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::registry::{directory, RegistryError, SchemaOrigin, SchemaSummary};
use crate::validation::{BatchReport, ValidationReport};

#[derive(Serialize)]
pub struct ServiceStatus {
    pub version: &'static str,
    pub schemas: usize,
    pub uptime_secs: u64,
}

#[derive(Deserialize)]
struct InlineValidation {
    schema: Value,
    document: Value,
}

fn parse_json(body: &Bytes) -> Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::invalid_json(&e))
}

/// Schema directory to write through to, when persistence is on.
fn persist_dir(state: &AppState) -> Option<&FsPath> {
    let schemas = &state.config.schemas;
    schemas
        .directory
        .as_deref()
        .filter(|_| schemas.persist)
        .map(FsPath::new)
}

fn report_status(report: &ValidationReport) -> StatusCode {
    if report.valid {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub async fn status(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(ServiceStatus {
        version: env!("CARGO_PKG_VERSION"),
        schemas: state.registry.len(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

pub async fn list_schemas(State(state): State<AppState>) -> Json<Vec<SchemaSummary>> {
    Json(state.registry.entries().iter().map(|e| e.summary()).collect())
}

pub async fn get_schema(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match state.registry.get(&name) {
        Some(entry) => Ok(Json(entry.source.clone())),
        None => Err(RegistryError::NotFound(name).into()),
    }
}

pub async fn put_schema(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<SchemaSummary>), ApiError> {
    let source = parse_json(&body?)?;
    let previous = state.registry.get(&name);
    let entry = state.registry.register(&name, source, SchemaOrigin::Api)?;

    if let Some(dir) = persist_dir(&state) {
        if let Err(e) = directory::persist(dir, &name, &entry.source) {
            state.registry.restore(&name, previous);
            return Err(e.into());
        }
    }

    let status = if previous.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(entry.summary())))
}

pub async fn delete_schema(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.registry.contains(&name) {
        return Err(RegistryError::NotFound(name).into());
    }
    // The file goes first, otherwise a later reload would bring the schema back.
    if let Some(dir) = persist_dir(&state) {
        directory::unpersist(dir, &name)?;
    }

    state.registry.remove(&name)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reload_schemas(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let Some(dir) = &state.config.schemas.directory else {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            "no_schema_directory",
            "No schema directory is configured",
        ));
    };

    let loaded = state.registry.load_directory(FsPath::new(dir))?;
    Ok(Json(json!({"loaded": loaded, "total": state.registry.len()})))
}

pub async fn validate_named(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<ValidationReport>), ApiError> {
    let document = parse_json(&body?)?;
    let report = state.engine.validate_named(&name, &document)?;
    Ok((report_status(&report), Json(report)))
}

pub async fn validate_batch(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<BatchReport>, ApiError> {
    let Value::Array(documents) = parse_json(&body?)? else {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "not_an_array",
            "Batch body must be a JSON array of documents",
        ));
    };

    let max = state.config.limits.max_batch_size;
    if documents.len() > max {
        return Err(ApiError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "batch_too_large",
            format!("Batch holds {} documents, the limit is {max}", documents.len()),
        ));
    }

    Ok(Json(state.engine.validate_batch(&name, &documents)?))
}

pub async fn validate_inline(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<ValidationReport>), ApiError> {
    let request: InlineValidation = serde_json::from_value(parse_json(&body?)?).map_err(|e| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            format!("Expected {{\"schema\": ..., \"document\": ...}}: {e}"),
        )
    })?;

    let report = state.engine.validate_adhoc(&request.schema, &request.document)?;
    Ok((report_status(&report), Json(report)))
}
