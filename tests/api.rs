//! HTTP adapter tests over the in-memory stores

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware, Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use food_delivery_core::api::{self, AppState};

mod common;

fn app(harness: &common::Harness) -> Router {
    let routes = api::create_router()
        .layer(middleware::from_fn(api::middleware::context_middleware));

    Router::new()
        .nest("/api/v1", routes)
        .with_state(AppState::new(
            harness.service.clone(),
            harness.read_models.clone(),
        ))
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-actor-id", "staff-1")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_create_order_returns_entity() {
    let harness = common::Harness::new();

    let response = app(&harness)
        .oneshot(post(
            "/api/v1/orders",
            json!({ "user_id": "u1", "restaurant_id": "r1", "items": [] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["entity"]["status"], "pending");
    assert_eq!(body["entity"]["version"], 1);

    let events = harness.events.all_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].created_by.as_deref(), Some("staff-1"));
}

#[tokio::test]
async fn test_validation_failure_is_bad_request() {
    let harness = common::Harness::new();

    let response = app(&harness)
        .oneshot(post(
            "/api/v1/orders",
            json!({ "restaurant_id": "r1", "items": [] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error_code"], "validation_error");
    assert!(harness.events.all_events().is_empty());
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let harness = common::Harness::new();

    let response = app(&harness)
        .oneshot(post(
            &format!("/api/v1/orders/{}/confirm", Uuid::new_v4()),
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(response).await["error_code"], "not_found");
}

#[tokio::test]
async fn test_malformed_correlation_id_is_rejected() {
    let harness = common::Harness::new();

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/orders")
        .header("content-type", "application/json")
        .header("x-correlation-id", "not-a-uuid")
        .body(Body::from(
            json!({ "user_id": "u1", "restaurant_id": "r1", "items": [] }).to_string(),
        ))
        .unwrap();
    let response = app(&harness).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(harness.events.all_events().is_empty());
}

#[tokio::test]
async fn test_view_query_after_projection() {
    let harness = common::Harness::new();
    let app = app(&harness);

    let response = app
        .clone()
        .oneshot(post(
            "/api/v1/restaurants",
            json!({
                "name": "Curry House",
                "address": "12 King St",
                "phone": "555-0123",
                "email": "hello@curry.test"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = read_json(response).await["entity"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    harness.projector().catch_up().await.unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/views/restaurants/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let row = read_json(response).await;
    assert_eq!(row["status"], "open");
    assert_eq!(row["data"]["name"], "Curry House");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/views/restaurants?status=closed")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(read_json(response).await["count"], 0);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/views/widgets")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
