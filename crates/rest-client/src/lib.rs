//! REST clients for the movie-info and reviews upstreams.
//!
//! This crate issues the outbound calls of the movies service. It handles:
//! - One shared `reqwest::Client` (connection pool, per-call timeout)
//! - Classifying raw responses into the `UpstreamError` taxonomy
//! - Bounded fixed-delay retry of unhealthy upstreams (`RetrySpec`)
//!
//! ## Example Usage
//!
//! ```ignore
//! use rest_client::{http_client, MovieInfoClient, RetrySpec, DEFAULT_REQUEST_TIMEOUT};
//!
//! let http = http_client(DEFAULT_REQUEST_TIMEOUT)?;
//! let movie_info = MovieInfoClient::new(http, base_url, RetrySpec::default())?;
//! let metadata = movie_info.retrieve_movie_info("abc").await?;
//! ```

pub mod movie_info;
pub mod response;
pub mod retry;
pub mod reviews;

#[cfg(any(test, feature = "test-support"))]
pub mod mock_upstream;

pub use movie_info::{InvalidBaseUrl, MovieInfoClient, MOVIE_INFO_SERVICE};
pub use response::{http_client, DEFAULT_REQUEST_TIMEOUT};
pub use retry::{RetryBudget, RetryPredicate, RetrySpec};
pub use reviews::{ReviewsClient, REVIEWS_SERVICE};

pub use reqwest::{Client, Url};
