// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::time::Duration;

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::require_auth,
    models::{AddBookRequest, Book, BookListResponse, MessageResponse},
    state::AppState,
};

pub mod books;
pub mod health;

const ALLOWED_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];
const ALLOW_METHODS_VALUE: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const ALLOW_HEADERS_VALUE: &str = "authorization, content-type";

pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let protected = Router::new()
        .route("/books", get(books::list_books).post(books::add_book))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health::health))
        .merge(protected)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|request: &Request| {
                            let request_id = request
                                .headers()
                                .get("x-request-id")
                                .and_then(|v| v.to_str().ok())
                                .unwrap_or("-");
                            tracing::info_span!(
                                "http_request",
                                method = %request.method(),
                                uri = %request.uri(),
                                request_id,
                            )
                        })
                        .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
                )
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(middleware::from_fn(preflight_no_content))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::ACCESS_CONTROL_ALLOW_METHODS,
                    HeaderValue::from_static(ALLOW_METHODS_VALUE),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::ACCESS_CONTROL_ALLOW_HEADERS,
                    HeaderValue::from_static(ALLOW_HEADERS_VALUE),
                ))
                .layer(cors_layer())
                // Inside CORS so a 408 still carries the CORS headers.
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    request_timeout,
                )),
        )
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(ALLOWED_METHODS)
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// `CorsLayer` answers preflights with 200; clients of this API expect 204.
async fn preflight_no_content(request: Request, next: Next) -> Response {
    let is_preflight = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if is_preflight && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health::health, books::list_books, books::add_book),
    components(
        schemas(
            Book,
            AddBookRequest,
            BookListResponse,
            MessageResponse,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness check"),
        (name = "Books", description = "Per-user book shelf")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verifier::testing::StaticTokenVerifier;
    use crate::storage::memory::testing::FlakyStore;
    use crate::storage::{paths, DocumentStore, MemoryStore};
    use axum::body::{to_bytes, Body};
    use axum::http::Request as HttpRequest;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn verifier() -> Arc<StaticTokenVerifier> {
        Arc::new(
            StaticTokenVerifier::default()
                .with_token("token-u1", "u1")
                .with_token("token-u2", "u2"),
        )
    }

    fn app_with(store: Arc<dyn DocumentStore>, verifier: Arc<StaticTokenVerifier>) -> Router {
        router(AppState::new(store, verifier), TIMEOUT)
    }

    async fn send(app: &Router, request: Request) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get_books(token: Option<&str>) -> Request {
        let mut builder = HttpRequest::builder().uri("/books");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_books(token: &str, body: &str) -> Request {
        HttpRequest::builder()
            .method(Method::POST)
            .uri("/books")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let app = app_with(Arc::new(MemoryStore::new()), verifier());
        let request = HttpRequest::builder().uri("/health").body(Body::empty()).unwrap();

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn missing_or_foreign_scheme_is_rejected_before_verification() {
        let verifier = verifier();
        let app = app_with(Arc::new(MemoryStore::new()), verifier.clone());

        let (status, body) = send(&app, get_books(None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "missing_auth_header");

        let request = HttpRequest::builder()
            .uri("/books")
            .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        assert_eq!(verifier.calls(), 0);
    }

    #[tokio::test]
    async fn rejected_token_is_unauthorized() {
        let store = Arc::new(MemoryStore::new());
        let app = app_with(store.clone(), verifier());

        let (status, body) = send(&app, post_books("forged", r#"{"title":"x","status":"y"}"#)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());
        assert_eq!(store.len(&paths::user_books("u1")).await, 0);
    }

    #[tokio::test]
    async fn saved_book_is_listed() {
        let app = app_with(Arc::new(MemoryStore::new()), verifier());

        let (status, body) = send(&app, get_books(Some("token-u1"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "books": [] }));

        let (status, body) =
            send(&app, post_books("token-u1", r#"{"title":"Dune","status":"reading"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "book saved" }));

        let (status, body) = send(&app, get_books(Some("token-u1"))).await;
        assert_eq!(status, StatusCode::OK);
        let books = body["books"].as_array().unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0]["title"], "Dune");
        assert_eq!(books[0]["status"], "reading");
        assert!(!books[0]["id"].as_str().unwrap().is_empty());
        assert!(books[0]["createdAt"].is_string());
    }

    #[tokio::test]
    async fn users_only_see_their_own_books() {
        let app = app_with(Arc::new(MemoryStore::new()), verifier());

        send(&app, post_books("token-u1", r#"{"title":"Emma","status":"finished"}"#)).await;
        send(&app, post_books("token-u2", r#"{"title":"Ulysses","status":"reading"}"#)).await;

        let (_, body) = send(&app, get_books(Some("token-u2"))).await;
        let books = body["books"].as_array().unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0]["title"], "Ulysses");
    }

    #[tokio::test]
    async fn invalid_body_is_bad_request_and_not_stored() {
        let store = Arc::new(MemoryStore::new());
        let app = app_with(store.clone(), verifier());

        for body in ["not json", r#"{"title":"Dune"}"#, r#"{"title":3,"status":"x"}"#] {
            let (status, response) = send(&app, post_books("token-u1", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
            assert_eq!(response, json!({ "error": "invalid json" }));
        }

        assert_eq!(store.len(&paths::user_books("u1")).await, 0);
    }

    #[tokio::test]
    async fn json_body_is_accepted_without_json_content_type() {
        let store = Arc::new(MemoryStore::new());
        let app = app_with(store.clone(), verifier());

        for content_type in [None, Some("text/plain;charset=UTF-8")] {
            let mut builder = HttpRequest::builder()
                .method(Method::POST)
                .uri("/books")
                .header(header::AUTHORIZATION, "Bearer token-u1");
            if let Some(content_type) = content_type {
                builder = builder.header(header::CONTENT_TYPE, content_type);
            }
            let request = builder
                .body(Body::from(r#"{"title":"Dune","status":"reading"}"#))
                .unwrap();

            let (status, body) = send(&app, request).await;
            assert_eq!(status, StatusCode::OK, "content type: {content_type:?}");
            assert_eq!(body, json!({ "message": "book saved" }));
        }

        assert_eq!(store.len(&paths::user_books("u1")).await, 2);
    }

    #[tokio::test]
    async fn preflight_is_no_content_everywhere() {
        let verifier = verifier();
        let app = app_with(Arc::new(MemoryStore::new()), verifier.clone());

        for uri in ["/books", "/does-not-exist"] {
            let request = HttpRequest::builder()
                .method(Method::OPTIONS)
                .uri(uri)
                .header(header::ORIGIN, "https://app.example.com")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::NO_CONTENT, "uri: {uri}");
            assert_eq!(
                response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
                "*"
            );
            assert!(response
                .headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
        }
        assert_eq!(verifier.calls(), 0);
    }

    #[tokio::test]
    async fn cors_headers_on_regular_responses() {
        let app = app_with(Arc::new(MemoryStore::new()), verifier());
        let request = HttpRequest::builder()
            .uri("/health")
            .header(header::ORIGIN, "https://app.example.com")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], ALLOW_METHODS_VALUE);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], ALLOW_HEADERS_VALUE);
        assert!(headers.contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn listing_failure_is_server_error() {
        let store = Arc::new(FlakyStore::failing_after_first_page(1));
        for title in ["One", "Two"] {
            seed(store.inner(), "u1", title).await;
        }
        let app = app_with(store, verifier());

        let (status, body) = send(&app, get_books(Some("token-u1"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "failed to load books" }));
    }

    #[tokio::test]
    async fn write_failure_is_server_error() {
        let app = app_with(Arc::new(FlakyStore::failing_writes()), verifier());

        let (status, body) =
            send(&app, post_books("token-u1", r#"{"title":"Dune","status":"reading"}"#)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "failed to save book" }));
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let app = app_with(Arc::new(MemoryStore::new()), verifier());
        let request = HttpRequest::builder()
            .uri("/api-doc/openapi.json")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/books"].is_object());
        assert!(body["components"]["securitySchemes"]["bearer_auth"].is_object());
    }

    struct StalledStore;

    #[async_trait::async_trait]
    impl DocumentStore for StalledStore {
        async fn add(
            &self,
            _collection: &crate::storage::CollectionPath,
            _fields: crate::storage::Fields,
        ) -> crate::storage::StoreResult<String> {
            std::future::pending().await
        }

        async fn list_page(
            &self,
            _collection: &crate::storage::CollectionPath,
            _page_token: Option<&str>,
        ) -> crate::storage::StoreResult<crate::storage::DocumentPage> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn stalled_backend_hits_request_deadline() {
        let app = router(
            AppState::new(Arc::new(StalledStore), verifier()),
            Duration::from_millis(50),
        );

        let mut request = get_books(Some("token-u1"));
        request
            .headers_mut()
            .insert(header::ORIGIN, HeaderValue::from_static("https://app.example.com"));
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
            ALLOW_METHODS_VALUE
        );
    }

    async fn seed(store: &MemoryStore, user_id: &str, title: &str) {
        crate::storage::BookRepository::new(store)
            .add(
                user_id,
                AddBookRequest {
                    title: title.to_string(),
                    status: "reading".to_string(),
                },
            )
            .await
            .unwrap();
    }
}
