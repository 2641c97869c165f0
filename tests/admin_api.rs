//! End-to-end tests for the admin API.

use axum::extract::State;
use axum::http::{header, Method, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use tenacity::http::{AppState, DependencyFailure};
use std::future::Future;
use std::pin::Pin;

use tenacity::{DependencyKey, ExecutionResult, ResilienceConfiguration, ResilienceError};

mod common;

const PAYMENTS: &str = r#"
[dependencies.payments]
"#;

fn payments() -> DependencyKey {
    DependencyKey::new("PAYMENTS").unwrap()
}

async fn succeed(app: &tenacity::Tenacity) {
    let result = app
        .facade()
        .execute_async(&payments(), || async { Ok("paid") }, None)
        .await
        .unwrap();
    assert!(result.is_successful());
}

#[tokio::test]
async fn test_breaker_appears_after_first_execution() {
    let app = common::app(PAYMENTS);
    let router = app.router();

    let (status, body) = common::get(&router, "/tenacity/circuitbreakers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    succeed(&app).await;

    let (status, body) = common::get(&router, "/tenacity/circuitbreakers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"id": "PAYMENTS", "open": false}]));

    let (status, body) = common::get(&router, "/tenacity/circuitbreakers/payments").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"id": "PAYMENTS", "open": false}));
}

#[tokio::test]
async fn test_force_open_before_first_call_is_404_but_sticks() {
    let app = common::app(PAYMENTS);
    let router = app.router();

    let (status, body) =
        common::put(&router, "/tenacity/circuitbreakers/PAYMENTS", r#"{"state":"FORCED_OPEN"}"#).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);

    let ran = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flag = ran.clone();
    let result = app
        .facade()
        .execute_async(
            &payments(),
            move || async move {
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok(1i32)
            },
            Some(Box::new(|| Ok(0)) as tenacity::Fallback<i32>),
        )
        .await
        .unwrap();

    assert!(result.is_short_circuited());
    assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));

    let (status, body) = common::get(&router, "/tenacity/circuitbreakers/PAYMENTS").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"id": "PAYMENTS", "open": true}));
}

#[tokio::test]
async fn test_force_cycle_on_live_breaker() {
    let app = common::app(PAYMENTS);
    let router = app.router();
    succeed(&app).await;

    let uri = "/tenacity/circuitbreakers/PAYMENTS";
    let (status, body) = common::put(&router, uri, r#"{"state":"FORCED_OPEN"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["open"], true);

    let (_, body) = common::put(&router, uri, r#"{"state":"FORCED_CLOSED"}"#).await;
    assert_eq!(body["open"], false);

    let (_, body) = common::put(&router, uri, r#"{"state":"FORCED_RESET"}"#).await;
    assert_eq!(body["open"], false);
}

#[tokio::test]
async fn test_malformed_force_body_is_400() {
    let app = common::app(PAYMENTS);
    let router = app.router();
    succeed(&app).await;

    for body in [r#"{"state":"OPEN"}"#, "not json", "{}"] {
        let (status, json) = common::put(&router, "/tenacity/circuitbreakers/PAYMENTS", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(json["code"], 400);
    }
}

#[tokio::test]
async fn test_property_keys_and_configuration() {
    let app = common::app(
        r#"
        [dependencies.payments]
        executionTimeoutMs = 250

        [dependencies.ledger]
        "#,
    );
    let router = app.router();

    let (status, body) = common::get(&router, "/tenacity/propertykeys").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["LEDGER", "PAYMENTS"]));

    let (status, body) = common::get(&router, "/tenacity/configuration/payments").await;
    assert_eq!(status, StatusCode::OK);
    let config: ResilienceConfiguration = serde_json::from_value(body).unwrap();
    assert_eq!(config.execution_timeout_ms(), 250);

    let (status, body) = common::get(&router, "/tenacity/configuration/unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);

    let (status, _) = common::get(&router, "/tenacity/configuration/bad%20key").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_every_response_is_uncacheable_json() {
    let app = common::app(PAYMENTS);
    let router = app.router();

    for uri in ["/tenacity/propertykeys", "/tenacity/circuitbreakers/PAYMENTS", "/nowhere"] {
        let (_, headers, body) = common::call(&router, Method::GET, uri, None, &[]).await;
        assert_eq!(
            headers.get(header::CACHE_CONTROL).unwrap(),
            "must-revalidate,no-cache,no-store",
            "{uri}"
        );
        assert!(headers
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("application/json"));
        assert!(!body.is_null());
        assert!(headers.contains_key("x-request-id"));
    }
}

#[tokio::test]
async fn test_api_key_guards_admin_routes() {
    let app = common::app(
        r#"
        [admin]
        api_key = "s3cret"

        [dependencies.payments]
        "#,
    );
    let router = app.router();

    let (status, _) = common::get(&router, "/tenacity/propertykeys").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = common::call(
        &router,
        Method::GET,
        "/tenacity/propertykeys",
        None,
        &[("authorization", "Bearer wrong")],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) = common::call(
        &router,
        Method::GET,
        "/tenacity/propertykeys",
        None,
        &[("authorization", "Bearer s3cret")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["PAYMENTS"]));
}

#[tokio::test]
async fn test_custom_prefix_and_disabled_admin() {
    let app = common::app("[admin]\npath_prefix = \"/ops/\"\n[dependencies.a]");
    let (status, _) = common::get(&app.router(), "/ops/propertykeys").await;
    assert_eq!(status, StatusCode::OK);

    let app = common::app("[admin]\nenabled = false");
    let (status, _) = common::get(&app.router(), "/tenacity/propertykeys").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

async fn charge(State(state): State<AppState>) -> Result<Json<Value>, DependencyFailure> {
    // Pin as a `Send` trait object so the handler's `Send` check does not
    // trip rustc's higher-ranked lifetime erasure inside async state.
    let key = payments();
    let work: Pin<Box<dyn Future<Output = Result<ExecutionResult<&str>, ResilienceError>> + Send + '_>> =
        Box::pin(state.facade.execute_async(&key, || async { Ok("charged") }, None));
    let result = work.await.map_err(|e| state.throttling.reject(e))?;
    Ok(Json(json!({ "result": result.into_value() })))
}

#[tokio::test]
async fn test_application_route_maps_throttling_to_configured_status() {
    let app = common::app("[http]\nthrottle_status_code = 503\n[dependencies.payments]");
    let router = app.router_with(Router::new().route("/charge", post(charge)));

    let (status, _, body) = common::call(&router, Method::POST, "/charge", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": "charged"}));

    app.admin()
        .force_state(&payments(), tenacity::ForceCommand::ForcedOpen);
    let (status, headers, body) = common::call(&router, Method::POST, "/charge", None, &[]).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], 503);
    assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "must-revalidate,no-cache,no-store");

    let (status, _) = common::get(&router, "/tenacity/circuitbreakers/PAYMENTS").await;
    assert_eq!(status, StatusCode::OK, "admin routes stay mounted next to application routes");
}
