//! # Movie Aggregator
//!
//! Builds the composite [`Movie`] for one id:
//! 1. Fetch the metadata (the movie-info client retries an unhealthy upstream)
//! 2. Fetch every review for that metadata's id
//! 3. Combine both
//!
//! The two calls are strictly sequential. A metadata failure is returned
//! unchanged and the reviews upstream is never called. An empty review
//! list, or a reviews-upstream 404, is a successful aggregation with zero
//! reviews; any other reviews failure fails the aggregation.

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info};

use movie_types::{Movie, UpstreamError};
use rest_client::{http_client, MovieInfoClient, ReviewsClient, DEFAULT_REQUEST_TIMEOUT};

use crate::config::AppConfig;

/// Combines the movie-info and reviews upstreams.
///
/// Cheap to clone; both clients share one connection pool.
#[derive(Debug, Clone)]
pub struct MovieAggregator {
    movie_info: MovieInfoClient,
    reviews: ReviewsClient,
}

impl MovieAggregator {
    pub fn new(movie_info: MovieInfoClient, reviews: ReviewsClient) -> Self {
        Self {
            movie_info,
            reviews,
        }
    }

    /// Validate `config` and build both clients over one shared pool.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        let http = http_client(DEFAULT_REQUEST_TIMEOUT).context("Building HTTP client")?;

        let movie_info = MovieInfoClient::new(
            http.clone(),
            config.movie_info_url.clone(),
            config.movie_info_retry(),
        )?;
        let reviews = ReviewsClient::new(http, config.reviews_url.clone(), config.reviews_retry());

        info!(
            "Upstreams: movie-info={} reviews={} (movie-info attempts: {}, delay: {:?})",
            movie_info.base_url(),
            reviews.base_url(),
            movie_info.retry_spec().max_attempts(),
            movie_info.retry_spec().delay()
        );
        Ok(Self::new(movie_info, reviews))
    }

    /// Main entry point: metadata plus all of its reviews.
    ///
    /// Dropping the returned future aborts the in-flight call or pending
    /// retry wait.
    pub async fn retrieve_movie(&self, movie_id: &str) -> Result<Movie, UpstreamError> {
        let start_time = Instant::now();

        let metadata = self.movie_info.retrieve_movie_info(movie_id).await?;
        debug!("Fetched metadata for {}: {}", movie_id, metadata.title);

        let reviews = self.reviews.retrieve_reviews(&metadata.id).await?;
        info!(
            "Retrieved movie {} with {} reviews in {:.2?}",
            movie_id,
            reviews.len(),
            start_time.elapsed()
        );

        Ok(Movie::new(metadata, reviews))
    }
}
