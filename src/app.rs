use std::net::SocketAddr;

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Method, Request},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use time::OffsetDateTime;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::error::AppError;
use crate::state::AppState;
use crate::{auth, users};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: OffsetDateTime::now_utc(),
    })
}

async fn banner() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "User management API is running. Static assets are not configured."
    }))
}

async fn not_found() -> AppError {
    AppError::NotFound("Endpoint not found")
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

fn request_span<B>(req: &Request<B>) -> tracing::Span {
    let method = req.method().clone();
    let uri = req.uri().clone();
    tracing::info_span!(
        "http_request",
        %method,
        uri = %uri,
        status = tracing::field::Empty
    )
}

pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::router(state.login_limiter.clone()))
        .merge(users::router())
        .fallback(not_found);

    let router = Router::new()
        .nest("/api", api)
        .route("/health", get(health));

    let router = match state.config.static_dir.as_deref() {
        Some(dir) => router.fallback_service(
            ServeDir::new(dir).fallback(ServeFile::new(format!("{dir}/index.html"))),
        ),
        None => router.route("/", get(banner)).fallback(not_found),
    };

    router
        .with_state(state.clone())
        .layer(cors_layer(&state.config.cors_origins))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("cross-origin-opener-policy"),
            HeaderValue::from_static("same-origin"),
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span::<Body>)
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    })
    .await?;
    Ok(())
}
