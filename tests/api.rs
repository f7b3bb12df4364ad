//! End-to-end tests: the full router over an in-memory store.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use model_rest::config::{resolve, AppConfig, FieldConfig, FieldKind, ModelConfig, ModelSet};
use model_rest::error::GENERIC_ERROR_MESSAGE;
use model_rest::hooks::{Hook, ResponseData};
use model_rest::query::{Filter, FilterOp, ListQuery, PaginationStrategy};
use model_rest::routes::{common_routes, ApiBuilder, ExclusionConfig, RouteOptions};
use model_rest::{ApiError, AppState, Controller, MemoryStore, ModelRegistry, Record};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn models() -> Arc<ModelSet> {
    Arc::new(
        resolve(&[
            AppConfig::new(
                "shop",
                vec![
                    ModelConfig::new(
                        "TestModel",
                        vec![
                            FieldConfig::new("name", FieldKind::Char).max_length(100),
                            FieldConfig::new("count", FieldKind::Integer).default_value(json!(0)),
                            FieldConfig::new("active", FieldKind::Boolean).default_value(json!(true)),
                        ],
                    ),
                    ModelConfig::new(
                        "Tag",
                        vec![
                            FieldConfig::new("label", FieldKind::Text),
                            FieldConfig::new("published_on", FieldKind::Date).nullable(),
                        ],
                    ),
                    ModelConfig::new(
                        "Product",
                        vec![
                            FieldConfig::new("name", FieldKind::Text),
                            FieldConfig::new("image", FieldKind::File).nullable(),
                            FieldConfig::new("gallery", FieldKind::Files).default_value(json!([])),
                        ],
                    ),
                ],
            ),
            AppConfig::new(
                "auth",
                vec![ModelConfig::new("User", vec![FieldConfig::new("name", FieldKind::Text)])],
            ),
        ])
        .unwrap(),
    )
}

fn builder(registry: &ModelRegistry) -> ApiBuilder<'_> {
    ApiBuilder::new(Arc::new(MemoryStore::new()), models(), registry)
}

async fn read_json(res: Response<Body>) -> (StatusCode, Value) {
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };
    let res = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    read_json(res).await
}

const BOUNDARY: &str = "model-rest-boundary";

/// `multipart/form-data` body from text parts and `(field, file name, bytes)` file parts.
fn multipart_body(texts: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in texts {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    for (name, file_name, data) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn send_multipart(app: &Router, method: Method, uri: &str, body: Vec<u8>) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap();
    read_json(app.clone().oneshot(req).await.unwrap()).await
}

async fn create(app: &Router, body: Value) -> Value {
    let (status, json) = send(app, Method::POST, "/api/test-models/", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json
}

#[tokio::test]
async fn empty_list() {
    let registry = ModelRegistry::new();
    let app = builder(&registry).build();
    for uri in ["/api/test-models/", "/api/test-models"] {
        let (status, json) = send(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({"count": 0, "items": []}));
    }
}

#[tokio::test]
async fn crud_round_trip() {
    let registry = ModelRegistry::new();
    let app = builder(&registry).build();

    let created = create(&app, json!({"name": "Alpha"})).await;
    assert_eq!(created, json!({"id": 1, "name": "Alpha", "count": 0, "active": true}));

    let (status, json) = send(&app, Method::GET, "/api/test-models/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, created);

    let (status, json) = send(&app, Method::PATCH, "/api/test-models/1", Some(json!({"count": "5"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 5);
    assert_eq!(json["name"], "Alpha");

    let (status, json) = send(&app, Method::DELETE, "/api/test-models/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"message": "TestModel with ID 1 has been deleted."}));

    let (status, json) = send(&app, Method::GET, "/api/test-models/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["type"], "NotFoundError");
}

#[tokio::test]
async fn missing_and_malformed_ids_are_not_found() {
    let registry = ModelRegistry::new();
    let app = builder(&registry).build();
    for (method, uri) in [
        (Method::GET, "/api/test-models/42"),
        (Method::GET, "/api/test-models/abc"),
        (Method::DELETE, "/api/test-models/42"),
    ] {
        let (status, json) = send(&app, method, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(json["error"]["message"], "No TestModel matches the given query.");
    }
    let (status, _) = send(&app, Method::PATCH, "/api/test-models/42", Some(json!({"count": 1}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn validation_errors_are_structured() {
    let registry = ModelRegistry::new();
    let app = builder(&registry).build();

    let (status, json) = send(&app, Method::POST, "/api/test-models/", Some(json!({"count": "many"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["type"], "ValidationError");
    let message = json["error"]["message"].as_str().unwrap();
    assert!(message.contains("name: field required"), "{message}");
    assert!(message.contains("count: value is not a valid integer"), "{message}");

    let long = "x".repeat(101);
    let (status, _) = send(&app, Method::POST, "/api/test-models/", Some(json!({"name": long}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(&app, Method::POST, "/api/test-models/", Some(json!([1, 2]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["type"], "ValidationError");
}

#[tokio::test]
async fn unknown_route_is_structured_404() {
    let registry = ModelRegistry::new();
    let app = builder(&registry).build();
    let (status, json) = send(&app, Method::GET, "/api/nothing-here", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["type"], "NotFoundError");
}

#[tokio::test]
async fn list_filters_sorting_and_pagination() {
    let registry = ModelRegistry::new();
    let app = builder(&registry).build();
    create(&app, json!({"name": "Alpha", "count": 3})).await;
    create(&app, json!({"name": "Beta", "count": 1, "active": false})).await;
    create(&app, json!({"name": "Gamma", "count": 2})).await;

    let names = |json: &Value| -> Vec<String> {
        json["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["name"].as_str().unwrap().to_string())
            .collect()
    };

    let (_, json) = send(&app, Method::GET, "/api/test-models/?sort=count&order=DESC", None).await;
    assert_eq!(names(&json), ["Alpha", "Gamma", "Beta"]);

    let (status, json) = send(&app, Method::GET, "/api/test-models/?sort=nonexistent_field", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&json), ["Alpha", "Beta", "Gamma"]);

    let (_, json) = send(&app, Method::GET, "/api/test-models/?limit=1&offset=1", None).await;
    assert_eq!(json["count"], 3);
    assert_eq!(names(&json), ["Beta"]);

    let (_, json) = send(&app, Method::GET, "/api/test-models/?q=amm", None).await;
    assert_eq!(names(&json), ["Gamma"]);

    let (_, json) = send(&app, Method::GET, "/api/test-models/?q=count%3E1", None).await;
    assert_eq!(names(&json), ["Alpha", "Gamma"]);

    let (_, json) = send(&app, Method::GET, "/api/test-models/?active=false&unknown=1", None).await;
    assert_eq!(names(&json), ["Beta"]);

    let (status, json) = send(&app, Method::GET, "/api/test-models/?count=abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "Invalid value for integer field 'count'");

    let (status, _) = send(&app, Method::GET, "/api/test-models/?limit=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn page_number_pagination() {
    let registry = ModelRegistry::new();
    let app = builder(&registry).pagination(PaginationStrategy::PageNumber).build();
    for name in ["a", "b", "c"] {
        create(&app, json!({"name": name})).await;
    }
    let (status, json) = send(&app, Method::GET, "/api/test-models/?page=2&page_size=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 3);
    assert_eq!(json["items"].as_array().unwrap().len(), 1);
    assert_eq!(json["items"][0]["name"], "c");
}

#[tokio::test]
async fn hooks_run_around_operations() {
    let registry = ModelRegistry::new();
    registry.register(
        "TestModel",
        Controller::new()
            .with_before_create(Hook::sync(|_ctx, mut payload: Record, _schema| {
                let upper = payload["name"].as_str().unwrap_or_default().to_uppercase();
                payload.insert("name".into(), json!(upper));
                Ok(payload)
            }))
            .with_pre_list(Hook::sync(|_ctx, query: ListQuery, _| {
                Ok(query.filter(Filter::new("active", FilterOp::Eq, json!(true))))
            }))
            .with_post_list(Hook::sync(|_ctx, rows: Vec<Record>, _| Ok(rows.into_iter().rev().collect())))
            .with_after_update(Hook::future(|_ctx, mut row: Record, _| async move {
                let name = format!("{} (edited)", row["name"].as_str().unwrap_or_default());
                row.insert("name".into(), json!(name));
                Ok(row)
            }))
            .with_before_delete(Hook::sync(|_ctx, row: Record, _| {
                if row["name"] == "LOCKED" {
                    Err(ApiError::PermissionDenied("this item is locked".into()))
                } else {
                    Ok(row)
                }
            })),
    );
    let app = builder(&registry).build();

    assert_eq!(create(&app, json!({"name": "first"})).await["name"], "FIRST");
    create(&app, json!({"name": "hidden", "active": false})).await;
    create(&app, json!({"name": "locked"})).await;

    let (_, json) = send(&app, Method::GET, "/api/test-models/", None).await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["items"][0]["name"], "LOCKED");
    assert_eq!(json["items"][1]["name"], "FIRST");

    let (_, json) = send(&app, Method::PATCH, "/api/test-models/1", Some(json!({"count": 2}))).await;
    assert_eq!(json["name"], "FIRST (edited)");

    let (status, json) = send(&app, Method::DELETE, "/api/test-models/3", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["type"], "PermissionDeniedError");
    let (status, _) = send(&app, Method::GET, "/api/test-models/3", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn custom_response_replaces_serialization() {
    let registry = ModelRegistry::new();
    registry.register(
        "Tag",
        Controller::new().with_custom_response(|ctx, data| match data {
            ResponseData::One(row) => json!({"tag": row["label"], "method": ctx.method.as_str()}),
            ResponseData::Many(rows) => json!(rows.len()),
        }),
    );
    let app = builder(&registry).build();

    let (status, json) = send(&app, Method::POST, "/api/tags", Some(json!({"label": "rust"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json, json!({"tag": "rust", "method": "POST"}));

    let (_, json) = send(&app, Method::GET, "/api/tags/", None).await;
    assert_eq!(json, json!({"count": 1, "items": 1}));
}

#[tokio::test]
async fn hook_errors_with_explicit_status_pass_through() {
    let registry = ModelRegistry::new();
    registry.register(
        "Tag",
        Controller::new().with_before_create(Hook::blocking(|_ctx, _payload: Record, _schema| {
            Err(ApiError::http(StatusCode::CONFLICT, "duplicate tag"))
        })),
    );
    let app = builder(&registry).build();
    let (status, json) = send(&app, Method::POST, "/api/tags", Some(json!({"label": "rust"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json, json!({"error": {"type": "ApiError", "message": "duplicate tag"}}));
}

#[tokio::test]
async fn panicking_hook_yields_500_body() {
    let registry = ModelRegistry::new();
    registry.register(
        "Tag",
        Controller::new().with_after_create(Hook::sync(|_ctx, _row: Record, _| -> Result<Record, ApiError> {
            panic!("hook exploded")
        })),
    );
    let app = builder(&registry).build();
    let (status, json) = send(&app, Method::POST, "/api/tags", Some(json!({"label": "x"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["type"], "ApiError");
    assert_eq!(json["error"]["message"], GENERIC_ERROR_MESSAGE);
}

#[tokio::test]
async fn exclusions_and_read_only_models() {
    let registry = ModelRegistry::new();
    let tag_options = {
        let set = models();
        RouteOptions::for_model(set.get("Tag").unwrap())
            .base_url("/labels")
            .read_only()
    };
    let app = builder(&registry).route_options("Tag", tag_options).build();

    let (status, _) = send(&app, Method::GET, "/api/users/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::GET, "/api/labels/", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::POST, "/api/labels/", Some(json!({"label": "x"}))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let registry = ModelRegistry::new();
    let app = builder(&registry)
        .exclude(ExclusionConfig::new().exclude_models("shop", ["TestModel"]))
        .build();
    let (status, _) = send(&app, Method::GET, "/api/test-models/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::GET, "/api/tags/", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let registry = ModelRegistry::new();
    let app = builder(&registry).build();
    let (status, json) = send(&app, Method::GET, "/api/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["paths"]["/api/test-models/"]["get"]["operationId"], "list_testmodel");
    assert!(json["paths"].get("/api/users/").is_none());
}

#[tokio::test]
async fn body_limit_rejects_large_payloads() {
    let registry = ModelRegistry::new();
    let app = builder(&registry).body_limit(64).build();
    let (status, _) = send(&app, Method::POST, "/api/tags", Some(json!({"label": "y".repeat(200)}))).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn common_routes_report_health() {
    let app = common_routes(AppState::new(Arc::new(MemoryStore::new()), models()));
    let (status, json) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    let (status, json) = send(&app, Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["models"], 4);
    let (_, json) = send(&app, Method::GET, "/version", None).await;
    assert_eq!(json["name"], "model-rest");
}

#[tokio::test]
async fn declared_oversized_body_gets_error_body() {
    let registry = ModelRegistry::new();
    let app = builder(&registry).body_limit(64).build();
    let body = serde_json::to_vec(&json!({"label": "y".repeat(200)})).unwrap();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/tags")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(
        res.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    let (status, json) = read_json(res).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["error"]["type"], "ApiError");
    assert!(json["error"]["message"].is_string());
}

#[tokio::test]
async fn out_of_range_pages_are_rejected() {
    let registry = ModelRegistry::new();
    let app = builder(&registry).pagination(PaginationStrategy::PageNumber).build();
    let (status, json) = send(&app, Method::GET, "/api/tags/?page=18446744073709551615&page_size=2", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json, json!({"error": {"type": "ValidationError", "message": "page: out of range"}}));

    let registry = ModelRegistry::new();
    let app = builder(&registry).build();
    let (status, json) = send(&app, Method::GET, "/api/tags/?offset=18446744073709551615", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"count": 0, "items": []}));
}

#[tokio::test]
async fn malformed_typed_filters_are_validation_errors() {
    let registry = ModelRegistry::new();
    let app = builder(&registry).build();
    for uri in ["/api/tags/?published_on=notadate", "/api/tags/?q=published_on%3Exyz"] {
        let (status, json) = send(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json["error"]["type"], "ValidationError");
        assert_eq!(json["error"]["message"], "Invalid value for date field 'published_on'");
    }

    send(&app, Method::POST, "/api/tags", Some(json!({"label": "a", "published_on": "2024-05-01"}))).await;
    let (status, json) = send(&app, Method::GET, "/api/tags/?published_on=2024-05-01", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);
}

#[tokio::test]
async fn delete_message_uses_parsed_id() {
    let registry = ModelRegistry::new();
    let app = builder(&registry).build();
    create(&app, json!({"name": "Alpha"})).await;
    let (status, json) = send(&app, Method::DELETE, "/api/test-models/01", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"message": "TestModel with ID 1 has been deleted."}));
}

#[tokio::test]
async fn multipart_uploads_store_files() {
    let media = tempfile::tempdir().unwrap();
    let registry = ModelRegistry::new();
    let app = builder(&registry).media_root(media.path()).build();

    let body = multipart_body(&[], &[("name", "x.txt", b"x")]);
    let (status, json) = send_multipart(&app, Method::POST, "/api/products", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "name: not a file field");
    assert!(!media.path().join("shop").exists());

    let body = multipart_body(
        &[("name", "Lamp")],
        &[
            ("image", "lamp.png", b"png-bytes"),
            ("gallery", "front.jpg", b"front"),
            ("gallery", "back.jpg", b"back"),
        ],
    );
    let (status, json) = send_multipart(&app, Method::POST, "/api/products", body).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["name"], "Lamp");
    let image = json["image"].as_str().unwrap();
    assert!(image.starts_with("shop/product/") && image.ends_with("_lamp.png"), "{image}");
    assert_eq!(std::fs::read(media.path().join(image)).unwrap(), b"png-bytes");
    let gallery = json["gallery"].as_array().unwrap();
    assert_eq!(gallery.len(), 2);
    assert_eq!(
        std::fs::read(media.path().join(gallery[1].as_str().unwrap())).unwrap(),
        b"back"
    );

    let body = multipart_body(&[], &[("image", "new.png", b"new")]);
    let (status, json) = send_multipart(&app, Method::PATCH, "/api/products/1", body).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_ne!(json["image"], image);
    assert_eq!(json["gallery"].as_array().unwrap().len(), 2);

    let (status, json) = send(&app, Method::POST, "/api/products", Some(json!({"name": "Plain"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["gallery"], json!([]));
    assert_eq!(json["image"], Value::Null);
}

#[tokio::test]
async fn rejected_create_leaves_no_files() {
    let media = tempfile::tempdir().unwrap();
    let registry = ModelRegistry::new();
    registry.register(
        "Product",
        Controller::new().with_before_create(Hook::sync(|_ctx, _payload: Record, _schema| {
            Err(ApiError::PermissionDenied("uploads are closed".into()))
        })),
    );
    let app = builder(&registry).media_root(media.path()).build();
    let body = multipart_body(&[("name", "Lamp")], &[("image", "lamp.png", b"png")]);
    let (status, _) = send_multipart(&app, Method::POST, "/api/products", body).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(!media.path().join("shop").exists());
}
