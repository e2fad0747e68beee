//! Client for the reviews upstream (`GET <base>?metadataId=<id>`).

use reqwest::{Client, StatusCode, Url};
use tracing::debug;

use movie_types::{Review, UpstreamError};

use crate::response::{decode_json, failure, transport_error};
use crate::retry::RetrySpec;

pub const REVIEWS_SERVICE: &str = "ReviewsService";

/// Query parameter selecting the reviews of one metadata record.
pub const METADATA_ID_PARAM: &str = "metadataId";

/// Fetches review collections.
///
/// A 404 from the reviews upstream means "no reviews for this id" and is
/// returned as an empty list, never as `UpstreamNotFound`.
#[derive(Debug, Clone)]
pub struct ReviewsClient {
    http: Client,
    base_url: Url,
    retry: RetrySpec,
}

impl ReviewsClient {
    pub fn new(http: Client, base_url: Url, retry: RetrySpec) -> Self {
        Self {
            http,
            base_url,
            retry,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn retry_spec(&self) -> &RetrySpec {
        &self.retry
    }

    /// All reviews referencing `metadata_id`, in upstream order.
    pub async fn retrieve_reviews(&self, metadata_id: &str) -> Result<Vec<Review>, UpstreamError> {
        self.retry.run(|| self.fetch_once(Some(metadata_id))).await
    }

    /// Every review the upstream holds.
    pub async fn retrieve_all_reviews(&self) -> Result<Vec<Review>, UpstreamError> {
        self.retry.run(|| self.fetch_once(None)).await
    }

    async fn fetch_once(&self, metadata_id: Option<&str>) -> Result<Vec<Review>, UpstreamError> {
        let mut request = self.http.get(self.base_url.clone());
        if let Some(id) = metadata_id {
            request = request.query(&[(METADATA_ID_PARAM, id)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(REVIEWS_SERVICE, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(
                "{} has no reviews for {}",
                REVIEWS_SERVICE,
                metadata_id.unwrap_or("<all>")
            );
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(failure(REVIEWS_SERVICE, response).await);
        }

        let reviews: Vec<Review> = decode_json(REVIEWS_SERVICE, response).await?;
        debug!("{} returned {} reviews", REVIEWS_SERVICE, reviews.len());
        Ok(reviews)
    }
}
