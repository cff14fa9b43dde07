//! HTTP front end over a shared [`Recommender`].

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

use crate::{
    embedding::Embedder,
    error::{Error, Result},
    generation::Generator,
    model::{Query, ScoredItem},
    pipeline::Recommender,
};

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub recommendations: Vec<ScoredItem>,
}

/// Build the router. Every response carries permissive CORS headers.
pub fn router<E, G>(recommender: Arc<Recommender<E, G>>) -> Router
where
    E: Embedder + 'static,
    G: Generator + 'static,
{
    Router::new()
        .route("/health", get(health).options(preflight))
        .route(
            "/recommend",
            axum::routing::post(recommend::<E, G>).options(preflight),
        )
        .layer(middleware::map_response(allow_any_origin))
        .with_state(recommender)
}

/// Bind `addr` and serve until Ctrl+C.
pub async fn serve<E, G>(addr: SocketAddr, recommender: Arc<Recommender<E, G>>) -> Result<()>
where
    E: Embedder + 'static,
    G: Generator + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router(recommender))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "cannot listen for Ctrl+C, shutting down");
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "healthy"}))
}

async fn recommend<E: Embedder, G: Generator>(
    State(recommender): State<Arc<Recommender<E, G>>>,
    Json(query): Json<Query>,
) -> Response {
    match recommender.recommend(&query).await {
        Ok(recommendations) => Json(RecommendResponse { recommendations }).into_response(),
        Err(Error::InvalidQuery(reason)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": reason})),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, source = ?std::error::Error::source(&e), "recommendation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "failed to generate recommendations"})),
            )
                .into_response()
        }
    }
}

async fn preflight() -> Response {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "*"),
        ],
    )
        .into_response()
}

async fn allow_any_origin(mut response: Response) -> Response {
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}
