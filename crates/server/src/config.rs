//! Configuration surface of the movies service.
//!
//! Only the upstream base URLs and the retry budget are configurable.
//! Every flag can also be supplied through its environment variable.

use std::time::Duration;

use clap::Args;
use rest_client::{RetrySpec, Url};
use thiserror::Error;

pub const DEFAULT_MOVIE_INFO_URL: &str = "http://localhost:8080/v1/movieinfos";
pub const DEFAULT_REVIEWS_URL: &str = "http://localhost:8081/v1/reviews";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be an http or https URL, got {url}")]
    UnsupportedScheme { name: &'static str, url: String },

    #[error("retry attempts must be at least 1")]
    ZeroAttempts,
}

/// Upstream locations and retry budget.
#[derive(Debug, Clone, Args)]
pub struct AppConfig {
    /// Base URL of the movie-info service; the id is appended as a path segment
    #[arg(long, env = "MOVIE_INFO_URL", default_value = DEFAULT_MOVIE_INFO_URL)]
    pub movie_info_url: Url,

    /// Base URL of the reviews service
    #[arg(long, env = "REVIEWS_URL", default_value = DEFAULT_REVIEWS_URL)]
    pub reviews_url: Url,

    /// Total attempts against the movie-info service, initial try included
    #[arg(long, env = "RETRY_ATTEMPTS", default_value_t = 4)]
    pub retry_attempts: u32,

    /// Fixed wait between attempts, in milliseconds
    #[arg(long, env = "RETRY_DELAY_MS", default_value_t = 1000)]
    pub retry_delay_ms: u64,
}

impl AppConfig {
    /// Config for the given upstreams with the default retry budget.
    pub fn new(movie_info_url: Url, reviews_url: Url) -> Self {
        Self {
            movie_info_url,
            reviews_url,
            retry_attempts: 4,
            retry_delay_ms: 1000,
        }
    }

    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_scheme("movie-info-url", &self.movie_info_url)?;
        check_scheme("reviews-url", &self.reviews_url)?;
        if self.retry_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Retry budget of the movie-info client.
    pub fn movie_info_retry(&self) -> RetrySpec {
        RetrySpec::with_max_attempts(self.retry_attempts, self.retry_delay())
    }

    /// The reviews client makes a single attempt.
    pub fn reviews_retry(&self) -> RetrySpec {
        RetrySpec::no_retry()
    }
}

fn check_scheme(name: &'static str, url: &Url) -> Result<(), ConfigError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(ConfigError::UnsupportedScheme {
            name,
            url: url.to_string(),
        }),
    }
}
