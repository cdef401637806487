//! In-memory double of the datasets API for integration testing.
//!
//! Implements the slice of the service the client speaks: basic-auth
//! enforcement, dataset declaration with schema comparison, append with
//! merge-on-`unique_by` and `delete_by` pruning, wholesale replace and
//! delete. Every failure response carries the service's
//! `{"error": {"message": ...}}` envelope. One extra endpoint the real
//! service does not offer, `GET /datasets/{id}/data`, lets tests observe
//! stored rows.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, put},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};

/// A declared dataset: the raw field descriptors as received, the composite
/// merge key, and the stored rows.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    pub fields: Map<String, Value>,
    pub unique_by: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

#[derive(Deserialize)]
pub struct CreateDataset {
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub unique_by: Vec<String>,
}

#[derive(Deserialize)]
pub struct WriteData {
    pub data: Vec<Map<String, Value>>,
    #[serde(default)]
    pub delete_by: Vec<String>,
}

pub type Db = Arc<RwLock<HashMap<String, Dataset>>>;

#[derive(Clone)]
pub struct AppState {
    expected_auth: String,
    datasets: Db,
}

type ApiResponse = (StatusCode, Json<Value>);

pub fn app(auth_key: &str) -> Router {
    let state = AppState {
        expected_auth: format!("Basic {}", STANDARD.encode(format!("{auth_key}:"))),
        datasets: Arc::new(RwLock::new(HashMap::new())),
    };
    Router::new()
        .route("/", get(root))
        .route("/datasets/{id}", put(create_dataset).delete(delete_dataset))
        .route(
            "/datasets/{id}/data",
            get(read_data).post(append_data).put(replace_data),
        )
        .with_state(state)
}

pub async fn run(listener: TcpListener, auth_key: &str) -> Result<(), std::io::Error> {
    axum::serve(listener, app(auth_key)).await
}

fn failure(status: StatusCode, message: &str) -> ApiResponse {
    (status, Json(json!({"error": {"message": message}})))
}

fn ok() -> ApiResponse {
    (StatusCode::OK, Json(json!({})))
}

/// Basic auth with the key as username and an empty password.
fn authorized(state: &AppState, headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == state.expected_auth)
}

async fn root(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    if !authorized(&state, &headers) {
        return failure(StatusCode::UNAUTHORIZED, "your API key is invalid");
    }
    ok()
}

async fn create_dataset(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> ApiResponse {
    if !authorized(&state, &headers) {
        return failure(StatusCode::UNAUTHORIZED, "your API key is invalid");
    }
    let input: CreateDataset = match serde_json::from_str(&body) {
        Ok(input) => input,
        Err(_) => return failure(StatusCode::BAD_REQUEST, "request body is not a valid schema"),
    };
    for name in &input.unique_by {
        if !input.fields.contains_key(name) {
            return failure(
                StatusCode::BAD_REQUEST,
                &format!("unique_by field \"{name}\" is not in fields"),
            );
        }
    }

    let mut datasets = state.datasets.write().await;
    if let Some(existing) = datasets.get(&id) {
        if existing.fields != input.fields || existing.unique_by != input.unique_by {
            return failure(
                StatusCode::CONFLICT,
                "dataset already exists with a different schema",
            );
        }
        return ok();
    }
    datasets.insert(
        id,
        Dataset {
            fields: input.fields,
            unique_by: input.unique_by,
            rows: Vec::new(),
        },
    );
    ok()
}

async fn append_data(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> ApiResponse {
    if !authorized(&state, &headers) {
        return failure(StatusCode::UNAUTHORIZED, "your API key is invalid");
    }
    let input: WriteData = match serde_json::from_str(&body) {
        Ok(input) => input,
        Err(_) => return failure(StatusCode::BAD_REQUEST, "request body is not a valid payload"),
    };

    let mut datasets = state.datasets.write().await;
    let Some(dataset) = datasets.get_mut(&id) else {
        return failure(StatusCode::NOT_FOUND, "dataset not found");
    };
    if let Err(message) = validate_records(&dataset.fields, &input.data) {
        return failure(StatusCode::BAD_REQUEST, &message);
    }
    for name in &input.delete_by {
        if !dataset.fields.contains_key(name) {
            return failure(
                StatusCode::BAD_REQUEST,
                &format!("delete_by field \"{name}\" is not in fields"),
            );
        }
    }

    // Prune rows matching any incoming record on the delete_by fields,
    // then merge on unique_by (update in place) or append.
    if !input.delete_by.is_empty() {
        let incoming: Vec<Vec<Value>> = input
            .data
            .iter()
            .map(|record| key_of(record, &input.delete_by))
            .collect();
        dataset
            .rows
            .retain(|row| !incoming.contains(&key_of(row, &input.delete_by)));
    }
    for record in input.data {
        let merged = if dataset.unique_by.is_empty() {
            None
        } else {
            let key = key_of(&record, &dataset.unique_by);
            dataset
                .rows
                .iter()
                .position(|row| key_of(row, &dataset.unique_by) == key)
        };
        match merged {
            Some(i) => dataset.rows[i] = record,
            None => dataset.rows.push(record),
        }
    }
    ok()
}

async fn replace_data(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> ApiResponse {
    if !authorized(&state, &headers) {
        return failure(StatusCode::UNAUTHORIZED, "your API key is invalid");
    }
    let input: WriteData = match serde_json::from_str(&body) {
        Ok(input) => input,
        Err(_) => return failure(StatusCode::BAD_REQUEST, "request body is not a valid payload"),
    };

    let mut datasets = state.datasets.write().await;
    let Some(dataset) = datasets.get_mut(&id) else {
        return failure(StatusCode::NOT_FOUND, "dataset not found");
    };
    if let Err(message) = validate_records(&dataset.fields, &input.data) {
        return failure(StatusCode::BAD_REQUEST, &message);
    }
    // delete_by has no meaning when replacing; like the real service,
    // tolerate and ignore it.
    dataset.rows = input.data;
    ok()
}

async fn delete_dataset(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResponse {
    if !authorized(&state, &headers) {
        return failure(StatusCode::UNAUTHORIZED, "your API key is invalid");
    }
    let mut datasets = state.datasets.write().await;
    match datasets.remove(&id) {
        Some(_) => ok(),
        None => failure(StatusCode::NOT_FOUND, "dataset not found"),
    }
}

/// Test-harness extra: the real service offers no way to read data back.
async fn read_data(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResponse {
    if !authorized(&state, &headers) {
        return failure(StatusCode::UNAUTHORIZED, "your API key is invalid");
    }
    let datasets = state.datasets.read().await;
    match datasets.get(&id) {
        Some(dataset) => (StatusCode::OK, Json(json!({"data": dataset.rows}))),
        None => failure(StatusCode::NOT_FOUND, "dataset not found"),
    }
}

/// Values of `names` in `row`, missing fields reading as null.
fn key_of(row: &Map<String, Value>, names: &[String]) -> Vec<Value> {
    names
        .iter()
        .map(|name| row.get(name).cloned().unwrap_or(Value::Null))
        .collect()
}

/// Check every record against the declared descriptors: no unknown fields,
/// required fields present and non-null, values matching the declared type.
fn validate_records(
    fields: &Map<String, Value>,
    records: &[Map<String, Value>],
) -> Result<(), String> {
    for record in records {
        for name in record.keys() {
            if !fields.contains_key(name) {
                return Err(format!("unknown field \"{name}\""));
            }
        }
        for (name, descriptor) in fields {
            let optional = descriptor
                .get("optional")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            match record.get(name) {
                None | Some(Value::Null) if !optional => {
                    return Err(format!("missing required field \"{name}\""));
                }
                None | Some(Value::Null) => {}
                Some(value) => {
                    let kind = descriptor.get("type").and_then(Value::as_str).unwrap_or("");
                    if !value_matches(kind, value) {
                        return Err(format!("value for field \"{name}\" is not a {kind}"));
                    }
                }
            }
        }
    }
    Ok(())
}

/// JSON-type check per descriptor type; string contents (date and datetime
/// formats) are not inspected. Descriptor types not modeled here accept
/// anything.
fn value_matches(kind: &str, value: &Value) -> bool {
    match kind {
        "string" | "date" | "datetime" => value.is_string(),
        "number" | "money" | "percentage" => value.is_number(),
        _ => true,
    }
}
