//! Inbound HTTP surface.
//!
//! `GET /v1/movies/:id` returns the composite movie, or the status the
//! failure taxonomy maps to. `GET /v1/recent-movies` lists what has been
//! retrieved recently, oldest first, and `GET /v1/recent-movies/stream`
//! replays that history as NDJSON before following new retrievals live.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::stream;
use tracing::{debug, error};

use movie_types::{Movie, UpstreamError};

use crate::aggregator::MovieAggregator;
use crate::replay::ReplayLog;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: MovieAggregator,
    pub recent: ReplayLog<Movie>,
}

impl AppState {
    pub fn new(aggregator: MovieAggregator) -> Self {
        Self {
            aggregator,
            recent: ReplayLog::default(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/movies/:id", get(retrieve_movie_by_id))
        .route("/v1/recent-movies", get(recent_movies))
        .route("/v1/recent-movies/stream", get(stream_movies))
        .with_state(state)
}

async fn retrieve_movie_by_id(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
) -> Result<Json<Movie>, ApiError> {
    let movie = state.aggregator.retrieve_movie(&movie_id).await?;
    state.recent.publish(movie.clone());
    Ok(Json(movie))
}

async fn recent_movies(State(state): State<AppState>) -> Json<Vec<Movie>> {
    Json(state.recent.snapshot())
}

/// One JSON movie per line, history first. Ends when the client leaves.
async fn stream_movies(State(state): State<AppState>) -> Response {
    let subscription = state.recent.subscribe();
    debug!("Movie stream opened");

    let lines = stream::unfold(subscription, |mut subscription| async move {
        let movie = subscription.recv().await;
        let line = serde_json::to_vec(&movie).map(|mut bytes| {
            bytes.push(b'\n');
            bytes
        });
        Some((line, subscription))
    });

    (
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(lines),
    )
        .into_response()
}

/// Taxonomy error rendered as a plain-text response.
#[derive(Debug)]
pub struct ApiError(pub UpstreamError);

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            UpstreamError::NotFound { status, .. } | UpstreamError::ClientRejected { status, .. } => {
                StatusCode::from_u16(*status)
                    .ok()
                    .filter(StatusCode::is_client_error)
                    .unwrap_or(StatusCode::BAD_REQUEST)
            }
            UpstreamError::Unavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        error!(
            "Request failed with {} ({}): {}",
            self.0.kind(),
            status.as_u16(),
            self.0
        );
        (status, self.0.to_string()).into_response()
    }
}
