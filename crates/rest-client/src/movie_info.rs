//! Client for the movie-info upstream (`GET <base>/<id>`).

use reqwest::{Client, StatusCode, Url};
use thiserror::Error;
use tracing::{debug, info};

use movie_types::{MovieMetadata, UpstreamError};

use crate::response::{decode_json, failure, transport_error};
use crate::retry::RetrySpec;

pub const MOVIE_INFO_SERVICE: &str = "MovieInfoService";

/// The base URL has no path to append an id to (`mailto:`, `data:` ...).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("movie-info base URL {0} cannot take an id path segment")]
pub struct InvalidBaseUrl(pub String);

/// Fetches metadata records, retrying an unhealthy upstream per its
/// [`RetrySpec`].
///
/// Holds no per-call state; clone it or share it behind a reference
/// across any number of in-flight requests.
#[derive(Debug, Clone)]
pub struct MovieInfoClient {
    http: Client,
    base_url: Url,
    retry: RetrySpec,
}

impl MovieInfoClient {
    pub fn new(http: Client, base_url: Url, retry: RetrySpec) -> Result<Self, InvalidBaseUrl> {
        if base_url.cannot_be_a_base() {
            return Err(InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self {
            http,
            base_url,
            retry,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn retry_spec(&self) -> &RetrySpec {
        &self.retry
    }

    /// Fetch the metadata for `movie_id`, retrying `UpstreamUnavailable`.
    ///
    /// The id is forwarded as a single path segment without validation.
    pub async fn retrieve_movie_info(&self, movie_id: &str) -> Result<MovieMetadata, UpstreamError> {
        self.retry.run(|| self.fetch_once(movie_id)).await
    }

    async fn fetch_once(&self, movie_id: &str) -> Result<MovieMetadata, UpstreamError> {
        let url = self.movie_info_url(movie_id);
        debug!("GET {}", url);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(MOVIE_INFO_SERVICE, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            info!("Status code from {} is: {}", MOVIE_INFO_SERVICE, status.as_u16());
            return Err(UpstreamError::movie_info_not_found(movie_id, status.as_u16()));
        }
        if !status.is_success() {
            return Err(failure(MOVIE_INFO_SERVICE, response).await);
        }
        decode_json(MOVIE_INFO_SERVICE, response).await
    }

    fn movie_info_url(&self, movie_id: &str) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejected cannot-be-a-base URLs, so this always succeeds
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(movie_id);
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_upstream::{batman_begins_json, MockReply, MockUpstream};
    use crate::response::http_client;
    use movie_types::ErrorKind;
    use std::time::Duration;

    fn fast_retry() -> RetrySpec {
        RetrySpec::fixed_delay(3, Duration::from_millis(5))
    }

    /// One-shot server that promises a 100-byte body, sends part of it,
    /// then hangs up.
    async fn truncated_upstream(status_line: &'static str) -> Url {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let head = format!("{}\r\nContent-Length: 100\r\n\r\npartial", status_line);
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        Url::parse(&format!("http://{}/v1/movieinfos", addr)).unwrap()
    }

    fn client_for(upstream: &MockUpstream, retry: RetrySpec) -> MovieInfoClient {
        let http = http_client(Duration::from_secs(2)).unwrap();
        MovieInfoClient::new(http, upstream.movie_info_url(), retry).unwrap()
    }

    #[tokio::test]
    async fn test_decodes_metadata_on_success() {
        let upstream = MockUpstream::start().await.unwrap();
        upstream.on_movie_info(MockReply::json(batman_begins_json("abc")));
        let client = client_for(&upstream, fast_retry());

        let metadata = client.retrieve_movie_info("abc").await.unwrap();

        assert_eq!(metadata.id, "abc");
        assert_eq!(metadata.title, "Batman Begins");
        assert_eq!(metadata.year, Some(2005));
        assert_eq!(metadata.cast.len(), 2);
        assert_eq!(upstream.movie_info_requests(), vec!["abc".to_string()]);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let upstream = MockUpstream::start().await.unwrap();
        upstream.on_movie_info(MockReply::status(404, ""));
        let client = client_for(&upstream, fast_retry());

        let err = client.retrieve_movie_info("abc").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UpstreamNotFound);
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(
            err.message(),
            "There is no MovieInfo available for the given Id: abc"
        );
        assert_eq!(upstream.movie_info_hits(), 1);
    }

    #[tokio::test]
    async fn test_other_client_error_keeps_upstream_body() {
        let upstream = MockUpstream::start().await.unwrap();
        upstream.on_movie_info(MockReply::status(400, "movieInfo.name must be present"));
        let client = client_for(&upstream, fast_retry());

        let err = client.retrieve_movie_info("abc").await.unwrap_err();

        assert_eq!(
            err,
            UpstreamError::ClientRejected {
                status: 400,
                message: "movieInfo.name must be present".to_string(),
            }
        );
        assert_eq!(upstream.movie_info_hits(), 1);
    }

    #[tokio::test]
    async fn test_server_error_retried_until_exhausted() {
        let upstream = MockUpstream::start().await.unwrap();
        upstream.on_movie_info(MockReply::status(500, "MovieInfo Service Unavailable"));
        let client = client_for(&upstream, fast_retry());

        let err = client.retrieve_movie_info("abc").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert_eq!(err.status_code(), Some(500));
        assert_eq!(
            err.message(),
            "Server error in MovieInfoService MovieInfo Service Unavailable"
        );
        // 1 original call + 3 retries
        assert_eq!(upstream.movie_info_hits(), 4);
    }

    #[tokio::test]
    async fn test_recovers_when_upstream_heals() {
        let upstream = MockUpstream::start().await.unwrap();
        upstream.script_movie_info([
            MockReply::status(503, "warming up"),
            MockReply::status(502, "still warming up"),
        ]);
        upstream.on_movie_info(MockReply::json(batman_begins_json("abc")));
        let client = client_for(&upstream, fast_retry());

        let metadata = client.retrieve_movie_info("abc").await.unwrap();

        assert_eq!(metadata.title, "Batman Begins");
        assert_eq!(upstream.movie_info_hits(), 3);
    }

    #[tokio::test]
    async fn test_slow_attempt_times_out_and_is_retried() {
        let upstream = MockUpstream::start().await.unwrap();
        upstream.script_movie_info([
            MockReply::json(batman_begins_json("abc")).delayed(Duration::from_millis(500)),
        ]);
        upstream.on_movie_info(MockReply::json(batman_begins_json("abc")));
        let http = http_client(Duration::from_millis(100)).unwrap();
        let client = MovieInfoClient::new(http, upstream.movie_info_url(), fast_retry()).unwrap();

        let metadata = client.retrieve_movie_info("abc").await.unwrap();

        assert_eq!(metadata.id, "abc");
        assert_eq!(upstream.movie_info_hits(), 2);
    }

    #[tokio::test]
    async fn test_timeout_classified_as_unavailable_without_status() {
        let upstream = MockUpstream::start().await.unwrap();
        upstream.on_movie_info(
            MockReply::json(batman_begins_json("abc")).delayed(Duration::from_millis(500)),
        );
        let http = http_client(Duration::from_millis(50)).unwrap();
        let client =
            MovieInfoClient::new(http, upstream.movie_info_url(), RetrySpec::no_retry()).unwrap();

        let err = client.retrieve_movie_info("abc").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert_eq!(err.status_code(), None);
        assert!(err.message().starts_with("Server error in MovieInfoService"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_unavailable() {
        let upstream = MockUpstream::start().await.unwrap();
        upstream.on_movie_info(MockReply::json(r#"{"id": "abc"}"#));
        let client = client_for(&upstream, RetrySpec::no_retry());

        let err = client.retrieve_movie_info("abc").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert_eq!(err.status_code(), Some(200));
        assert!(err.message().starts_with("Malformed response from MovieInfoService"));
    }

    #[tokio::test]
    async fn test_unusual_ids_are_forwarded_verbatim() {
        let upstream = MockUpstream::start().await.unwrap();
        let client = client_for(&upstream, fast_retry());

        let err = client.retrieve_movie_info("not a/valid id").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UpstreamNotFound);
        assert_eq!(upstream.movie_info_requests(), vec!["not a/valid id".to_string()]);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_unavailable() {
        let upstream = MockUpstream::start().await.unwrap();
        let url = upstream.movie_info_url();
        drop(upstream);
        // Give the aborted listener a moment to close
        tokio::time::sleep(Duration::from_millis(20)).await;

        let http = http_client(Duration::from_millis(500)).unwrap();
        let client =
            MovieInfoClient::new(http, url, RetrySpec::fixed_delay(1, Duration::ZERO)).unwrap();

        let err = client.retrieve_movie_info("abc").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn test_rejects_base_url_without_path() {
        let base = Url::parse("mailto:movies@example.com").unwrap();
        let err = MovieInfoClient::new(Client::new(), base, RetrySpec::no_retry()).unwrap_err();
        assert_eq!(err, InvalidBaseUrl("mailto:movies@example.com".to_string()));
    }

    #[tokio::test]
    async fn test_truncated_error_body_is_unavailable() {
        let url = truncated_upstream("HTTP/1.1 400 Bad Request").await;
        let http = http_client(Duration::from_secs(2)).unwrap();
        let client = MovieInfoClient::new(http, url, RetrySpec::no_retry()).unwrap();

        let err = client.retrieve_movie_info("abc").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert_eq!(err.status_code(), None);
        assert!(err.message().starts_with("Server error in MovieInfoService"));
    }

    #[test]
    fn test_url_handles_trailing_slash() {
        let http = Client::new();
        let base = Url::parse("http://localhost:8080/v1/movieinfos/").unwrap();
        let client = MovieInfoClient::new(http, base, RetrySpec::no_retry()).unwrap();
        assert_eq!(
            client.movie_info_url("abc").as_str(),
            "http://localhost:8080/v1/movieinfos/abc"
        );
    }
}
