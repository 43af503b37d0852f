//! HTTP adapter.
//!
//! | Route | Action |
//! |---|---|
//! | `GET /api/records` | `getRecords` |
//! | `GET /api/records/:index` | `getRecord` |
//! | `POST /api/submit` | `submit` |
//! | `GET /api/info` | `getInfo` |
//!
//! Everything else, including a known path with the wrong method, is a
//! 404 failure envelope.
//!
//! Status codes: 200 on success, 400 for validation failures and
//! undecodable requests, 404 for unknown routes and missing records, 500
//! for everything else.

use std::future::Future;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use formlog::{Dispatcher, Envelope, ErrorKind, HttpConfig};
use formlog_store::Log;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{Result, TransportError};

/// Request header whose value is echoed back as the correlation id.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Build the router for a dispatcher.
pub fn router<L: Log + 'static>(dispatcher: Dispatcher<L>, config: &HttpConfig) -> Router {
    let router = Router::new()
        .route("/api/records", get(get_records::<L>).fallback(not_found))
        .route("/api/records/:index", get(get_record::<L>).fallback(not_found))
        .route("/api/submit", post(submit::<L>).fallback(not_found))
        .route("/api/info", get(get_info::<L>).fallback(not_found))
        .fallback(not_found)
        .with_state(dispatcher)
        .layer(TraceLayer::new_for_http());

    if config.permissive_cors {
        router.layer(cors())
    } else {
        router
    }
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Bind the configured listen address.
pub async fn bind(config: &HttpConfig) -> Result<TcpListener> {
    TcpListener::bind(config.listen_addr)
        .await
        .map_err(|source| TransportError::Bind {
            addr: config.listen_addr,
            source,
        })
}

/// Serve until `shutdown` resolves, then finish in-flight requests.
pub async fn serve<L, F>(
    listener: TcpListener,
    dispatcher: Dispatcher<L>,
    config: &HttpConfig,
    shutdown: F,
) -> Result<()>
where
    L: Log + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "http adapter listening");

    axum::serve(listener, router(dispatcher, config))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("http adapter stopped");
    Ok(())
}

/// HTTP status for an envelope.
pub fn status_for(envelope: &Envelope) -> StatusCode {
    match envelope.error_kind() {
        None => StatusCode::OK,
        Some(ErrorKind::ValidationError | ErrorKind::MalformedRequest) => StatusCode::BAD_REQUEST,
        Some(ErrorKind::NotFound | ErrorKind::IndexOutOfRange) => StatusCode::NOT_FOUND,
        Some(
            ErrorKind::StoreUnavailable
            | ErrorKind::PersistenceError
            | ErrorKind::UnknownAction
            | ErrorKind::Internal,
        ) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond(envelope: Envelope) -> Response {
    (status_for(&envelope), Json(envelope.to_value())).into_response()
}

fn correlation_id(headers: &HeaderMap) -> Value {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| Value::String(s.to_string()))
        .unwrap_or(Value::Null)
}

async fn get_records<L: Log + 'static>(
    State(dispatcher): State<Dispatcher<L>>,
    headers: HeaderMap,
) -> Response {
    respond(
        dispatcher
            .dispatch("getRecords", Value::Null, correlation_id(&headers))
            .await,
    )
}

async fn get_record<L: Log + 'static>(
    State(dispatcher): State<Dispatcher<L>>,
    Path(raw): Path<String>,
    headers: HeaderMap,
) -> Response {
    // Non-numeric segments are passed through and rejected by the dispatcher.
    let index = serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw));
    respond(
        dispatcher
            .dispatch("getRecord", json!({ "index": index }), correlation_id(&headers))
            .await,
    )
}

async fn submit<L: Log + 'static>(
    State(dispatcher): State<Dispatcher<L>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let id = correlation_id(&headers);
    match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => respond(dispatcher.dispatch("submit", payload, id).await),
        Err(e) => respond(Envelope::failure(
            id,
            ErrorKind::MalformedRequest,
            format!("invalid JSON body: {}", e),
        )),
    }
}

async fn get_info<L: Log + 'static>(
    State(dispatcher): State<Dispatcher<L>>,
    headers: HeaderMap,
) -> Response {
    respond(
        dispatcher
            .dispatch("getInfo", Value::Null, correlation_id(&headers))
            .await,
    )
}

async fn not_found(method: Method, uri: axum::http::Uri, headers: HeaderMap) -> Response {
    respond(Envelope::failure(
        correlation_id(&headers),
        ErrorKind::NotFound,
        format!("no route for {} {}", method, uri.path()),
    ))
}
