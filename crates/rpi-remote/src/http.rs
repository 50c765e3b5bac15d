//! HTTP listener for rpi-remote.
//!
//! Every request, whatever its method or path, is handed to the
//! [`Dispatcher`]; routing happens there on the exact request target.

use crate::dispatch::Dispatcher;
use crate::protocol::{RequestEnvelope, ResponseEnvelope};
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Request, State},
    http::{header::CONTENT_TYPE, HeaderValue},
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the HTTP router for the agent.
///
/// The returned router can be served directly with axum or composed
/// into a larger application.
pub fn build_router(dispatcher: Dispatcher) -> Router {
    tracing::debug!("Building HTTP router");

    Router::new()
        .fallback(dispatch_handler)
        .with_state(Arc::new(dispatcher))
        // Request bodies are not size-limited.
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
}

async fn dispatch_handler(State(dispatcher): State<Arc<Dispatcher>>, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let envelope = RequestEnvelope::new(parts.method, path, parts.headers, body);
    dispatcher.handle(envelope).await.into_response()
}

impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        if let Some(content_type) = self.content_type {
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        response
    }
}

/// Start the HTTP server.
///
/// This function runs until the server is shut down via the provided
/// shutdown signal.
pub async fn serve(
    dispatcher: Dispatcher,
    addr: std::net::SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let router = build_router(dispatcher);

    tracing::info!(%addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::debug!(%addr, "TCP listener bound");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
