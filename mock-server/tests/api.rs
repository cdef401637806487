use axum::http::{self, Request, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use http_body_util::BodyExt;
use mock_server::app;
use serde_json::{json, Value};
use tower::ServiceExt;

const AUTH_KEY: &str = "mock-api-key";

const SCHEMA: &str = r#"{
    "fields": {
        "name": {"name": "Name", "type": "string"},
        "amount": {"name": "Amount", "type": "number", "optional": false},
        "note": {"name": "Note", "type": "string", "optional": true}
    },
    "unique_by": ["name"]
}"#;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn request(method: &str, uri: &str, body: &str) -> Request<String> {
    let token = STANDARD.encode(format!("{AUTH_KEY}:"));
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, format!("Basic {token}"))
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn rows(body: &Value) -> Vec<Value> {
    body["data"].as_array().unwrap().clone()
}

fn amount_for(rows: &[Value], name: &str) -> Value {
    rows.iter()
        .find(|row| row["name"] == json!(name))
        .map(|row| row["amount"].clone())
        .unwrap_or_else(|| panic!("no row named {name} in {rows:?}"))
}

// --- auth ---

#[tokio::test]
async fn requests_without_credentials_are_rejected() {
    let app = app(AUTH_KEY);
    let resp = app
        .oneshot(Request::builder().uri("/").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["message"], "your API key is invalid");
}

#[tokio::test]
async fn requests_with_the_wrong_key_are_rejected() {
    let app = app(AUTH_KEY);
    let token = STANDARD.encode("other-key:");
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/")
                .header(http::header::AUTHORIZATION, format!("Basic {token}"))
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn root_answers_authenticated_probes() {
    let app = app(AUTH_KEY);
    let resp = app.oneshot(request("GET", "/", "")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
}

// --- create ---

#[tokio::test]
async fn create_rejects_unique_by_outside_fields() {
    let app = app(AUTH_KEY);
    let schema = r#"{"fields": {"name": {"name": "Name", "type": "string"}}, "unique_by": ["other"]}"#;
    let resp = app
        .oneshot(request("PUT", "/datasets/d1", schema))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["message"], "unique_by field \"other\" is not in fields");
}

#[tokio::test]
async fn create_rejects_malformed_bodies() {
    let app = app(AUTH_KEY);
    let resp = app
        .oneshot(request("PUT", "/datasets/d1", "not json"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["message"], "request body is not a valid schema");
}

#[tokio::test]
async fn create_conflicts_on_schema_change() {
    use tower::Service;

    let mut app = app(AUTH_KEY).into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("PUT", "/datasets/d1", SCHEMA))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // An identical redeclaration is accepted.
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("PUT", "/datasets/d1", SCHEMA))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // A different unique_by conflicts.
    let changed = SCHEMA.replace(r#"["name"]"#, "[]");
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("PUT", "/datasets/d1", &changed))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body = body_json(resp).await;
    assert_eq!(
        body["error"]["message"],
        "dataset already exists with a different schema"
    );
}

// --- append ---

#[tokio::test]
async fn append_validates_against_the_schema() {
    use tower::Service;

    let mut app = app(AUTH_KEY).into_service();
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("PUT", "/datasets/d1", SCHEMA))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let cases = [
        (
            r#"{"data": [{"name": "a", "amount": 1, "extra": true}]}"#,
            "unknown field \"extra\"",
        ),
        (
            r#"{"data": [{"name": "a"}]}"#,
            "missing required field \"amount\"",
        ),
        (
            r#"{"data": [{"name": "a", "amount": "lots"}]}"#,
            "value for field \"amount\" is not a number",
        ),
        (
            r#"{"data": [{"name": "a", "amount": 1}], "delete_by": ["other"]}"#,
            "delete_by field \"other\" is not in fields",
        ),
    ];
    for (payload, message) in cases {
        let resp = ServiceExt::ready(&mut app)
            .await
            .unwrap()
            .call(request("POST", "/datasets/d1/data", payload))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["message"], message);
    }

    // Null is fine where the descriptor says optional.
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request(
            "POST",
            "/datasets/d1/data",
            r#"{"data": [{"name": "a", "amount": 1, "note": null}]}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn append_merges_on_the_unique_key() {
    use tower::Service;

    let mut app = app(AUTH_KEY).into_service();
    ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("PUT", "/datasets/d1", SCHEMA))
        .await
        .unwrap();

    ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request(
            "POST",
            "/datasets/d1/data",
            r#"{"data": [{"name": "a", "amount": 1}]}"#,
        ))
        .await
        .unwrap();
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request(
            "POST",
            "/datasets/d1/data",
            r#"{"data": [{"name": "a", "amount": 2}, {"name": "b", "amount": 3}]}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("GET", "/datasets/d1/data", ""))
        .await
        .unwrap();
    let body = body_json(resp).await;
    let rows = rows(&body);
    assert_eq!(rows.len(), 2);
    assert_eq!(amount_for(&rows, "a"), json!(2));
    assert_eq!(amount_for(&rows, "b"), json!(3));
}

#[tokio::test]
async fn append_merges_duplicates_within_one_batch() {
    use tower::Service;

    let mut app = app(AUTH_KEY).into_service();
    ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("PUT", "/datasets/d1", SCHEMA))
        .await
        .unwrap();

    // The second record shares the first one's key; the last write wins.
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request(
            "POST",
            "/datasets/d1/data",
            r#"{"data": [{"name": "c", "amount": 1}, {"name": "c", "amount": 4}]}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("GET", "/datasets/d1/data", ""))
        .await
        .unwrap();
    let body = body_json(resp).await;
    let rows = rows(&body);
    assert_eq!(rows.len(), 1);
    assert_eq!(amount_for(&rows, "c"), json!(4));
}

#[tokio::test]
async fn append_prunes_rows_matching_delete_by() {
    use tower::Service;

    let mut app = app(AUTH_KEY).into_service();
    ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("PUT", "/datasets/d1", SCHEMA))
        .await
        .unwrap();
    ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request(
            "POST",
            "/datasets/d1/data",
            r#"{"data": [{"name": "a", "amount": 1}, {"name": "b", "amount": 2}]}"#,
        ))
        .await
        .unwrap();

    // "b" shares the incoming record's amount and is pruned before the
    // append lands.
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request(
            "POST",
            "/datasets/d1/data",
            r#"{"data": [{"name": "c", "amount": 2}], "delete_by": ["amount"]}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("GET", "/datasets/d1/data", ""))
        .await
        .unwrap();
    let body = body_json(resp).await;
    let rows = rows(&body);
    assert_eq!(rows.len(), 2);
    assert_eq!(amount_for(&rows, "a"), json!(1));
    assert_eq!(amount_for(&rows, "c"), json!(2));
}

// --- replace ---

#[tokio::test]
async fn replace_swaps_contents_and_ignores_delete_by() {
    use tower::Service;

    let mut app = app(AUTH_KEY).into_service();
    ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("PUT", "/datasets/d1", SCHEMA))
        .await
        .unwrap();
    ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request(
            "POST",
            "/datasets/d1/data",
            r#"{"data": [{"name": "a", "amount": 1}, {"name": "b", "amount": 2}]}"#,
        ))
        .await
        .unwrap();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request(
            "PUT",
            "/datasets/d1/data",
            r#"{"data": [{"name": "z", "amount": 9}], "delete_by": ["name"]}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("GET", "/datasets/d1/data", ""))
        .await
        .unwrap();
    let body = body_json(resp).await;
    let rows = rows(&body);
    assert_eq!(rows.len(), 1);
    assert_eq!(amount_for(&rows, "z"), json!(9));
}

// --- delete / missing datasets ---

#[tokio::test]
async fn delete_removes_the_dataset() {
    use tower::Service;

    let mut app = app(AUTH_KEY).into_service();
    ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("PUT", "/datasets/d1", SCHEMA))
        .await
        .unwrap();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("DELETE", "/datasets/d1", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("DELETE", "/datasets/d1", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["message"], "dataset not found");
}

#[tokio::test]
async fn data_operations_on_missing_datasets_are_not_found() {
    for (method, uri, body) in [
        ("POST", "/datasets/nope/data", r#"{"data": []}"#),
        ("PUT", "/datasets/nope/data", r#"{"data": []}"#),
        ("GET", "/datasets/nope/data", ""),
    ] {
        let app = app(AUTH_KEY);
        let resp = app.oneshot(request(method, uri, body)).await.unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["message"], "dataset not found");
    }
}
