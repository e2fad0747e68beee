//! End-to-end tests of the movies API against mocked upstreams.

use std::net::SocketAddr;
use std::time::Duration;

use rest_client::mock_upstream::{batman_begins_json, two_reviews_json, MockReply, MockUpstream};
use server::{create_router, AppConfig, AppState, MovieAggregator};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

struct TestApp {
    addr: SocketAddr,
    upstream: MockUpstream,
    handle: JoinHandle<()>,
}

impl TestApp {
    async fn start() -> Self {
        let upstream = MockUpstream::start().await.expect("Failed to start mock upstream");
        let config = AppConfig::new(upstream.movie_info_url(), upstream.reviews_url())
            .with_retry(4, Duration::from_millis(5));
        let aggregator = MovieAggregator::from_config(&config).expect("Failed to build aggregator");
        let app = create_router(AppState::new(aggregator));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get local address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Movies API failed");
        });

        Self { addr, upstream, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        reqwest::get(self.url(path)).await.expect("Request to movies API failed")
    }
}

/// Read the next NDJSON record, buffering partial chunks.
async fn next_record(response: &mut reqwest::Response, buffer: &mut Vec<u8>) -> serde_json::Value {
    loop {
        if let Some(end) = buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=end).collect();
            return serde_json::from_slice(&line).expect("stream line should be a JSON movie");
        }
        let chunk = response
            .chunk()
            .await
            .expect("Failed to read movie stream")
            .expect("movie stream ended early");
        buffer.extend_from_slice(&chunk);
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn retrieve_movie_by_id() {
    let app = TestApp::start().await;
    app.upstream.on_movie_info(MockReply::json(batman_begins_json("abc")));
    app.upstream.on_reviews(MockReply::json(two_reviews_json()));

    let response = app.get("/v1/movies/abc").await;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["movieInfo"]["title"], "Batman Begins");
    assert_eq!(body["reviewList"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn retrieve_movie_by_id_404_movie_info() {
    let app = TestApp::start().await;
    app.upstream.on_movie_info(MockReply::status(404, ""));
    app.upstream.on_reviews(MockReply::json(two_reviews_json()));

    let response = app.get("/v1/movies/abc").await;
    assert_eq!(response.status(), 404);
    assert_eq!(
        response.text().await.unwrap(),
        "There is no MovieInfo available for the given Id: abc"
    );
    assert_eq!(app.upstream.reviews_hits(), 0);
}

#[tokio::test]
async fn retrieve_movie_by_id_404_reviews() {
    let app = TestApp::start().await;
    app.upstream.on_movie_info(MockReply::json(batman_begins_json("abc")));
    app.upstream.on_reviews(MockReply::status(404, ""));

    let response = app.get("/v1/movies/abc").await;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["movieInfo"]["title"], "Batman Begins");
    assert_eq!(body["reviewList"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn retrieve_movie_by_id_500_movie_info() {
    let app = TestApp::start().await;
    app.upstream
        .on_movie_info(MockReply::status(500, "MovieInfo Service Unavailable"));

    let response = app.get("/v1/movies/abc").await;
    assert!(response.status().is_server_error());
    assert_eq!(
        response.text().await.unwrap(),
        "Server error in MovieInfoService MovieInfo Service Unavailable"
    );
    // first call + 3 retries
    assert_eq!(app.upstream.movie_info_hits(), 4);
}

#[tokio::test]
async fn retrieve_movie_by_id_500_reviews() {
    let app = TestApp::start().await;
    app.upstream.on_movie_info(MockReply::json(batman_begins_json("abc")));
    app.upstream
        .on_reviews(MockReply::status(500, "Review Service Unavailable"));

    let response = app.get("/v1/movies/abc").await;
    assert_eq!(response.status(), 500);
    assert_eq!(
        response.text().await.unwrap(),
        "Server error in ReviewsService Review Service Unavailable"
    );
    assert_eq!(app.upstream.reviews_hits(), 1);
}

#[tokio::test]
async fn retrieve_movie_by_id_400_passes_through() {
    let app = TestApp::start().await;
    app.upstream
        .on_movie_info(MockReply::status(400, "movieInfo.year must be a positive value"));

    let response = app.get("/v1/movies/abc").await;
    assert_eq!(response.status(), 400);
    assert_eq!(
        response.text().await.unwrap(),
        "movieInfo.year must be a positive value"
    );
    assert_eq!(app.upstream.movie_info_hits(), 1);
}

#[tokio::test]
async fn recent_movies_lists_successful_retrievals() {
    let app = TestApp::start().await;
    app.upstream.on_movie_info(MockReply::json(batman_begins_json("abc")));
    app.upstream.on_reviews(MockReply::json(two_reviews_json()));

    assert_eq!(app.get("/v1/movies/abc").await.status(), 200);
    app.upstream.on_movie_info(MockReply::status(404, ""));
    assert_eq!(app.get("/v1/movies/missing").await.status(), 404);

    let response = app.get("/v1/recent-movies").await;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    let recent = body.as_array().expect("recent movies should be an array");
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0]["movieInfo"]["id"], "abc");
}

#[tokio::test]
async fn movie_id_recent_is_aggregated() {
    let app = TestApp::start().await;
    app.upstream.on_movie_info(MockReply::json(batman_begins_json("recent")));

    let response = app.get("/v1/movies/recent").await;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["movieInfo"]["id"], "recent");
    assert_eq!(app.upstream.movie_info_requests(), vec!["recent".to_string()]);
}

#[tokio::test]
async fn movie_stream_replays_history_then_follows_live() {
    let app = TestApp::start().await;
    app.upstream.on_movie_info(MockReply::json(batman_begins_json("abc")));
    app.upstream.on_reviews(MockReply::json(two_reviews_json()));
    assert_eq!(app.get("/v1/movies/abc").await.status(), 200);

    let mut stream = app.get("/v1/recent-movies/stream").await;
    assert_eq!(stream.status(), 200);
    assert_eq!(stream.headers()["content-type"], "application/x-ndjson");
    let mut buffer = Vec::new();

    let replayed = tokio::time::timeout(
        Duration::from_secs(2),
        next_record(&mut stream, &mut buffer),
    )
    .await
    .expect("history should be replayed");
    assert_eq!(replayed["movieInfo"]["id"], "abc");
    assert_eq!(replayed["reviewList"].as_array().map(Vec::len), Some(2));

    app.upstream.on_movie_info(MockReply::json(batman_begins_json("xyz")));
    assert_eq!(app.get("/v1/movies/xyz").await.status(), 200);

    let live = tokio::time::timeout(
        Duration::from_secs(2),
        next_record(&mut stream, &mut buffer),
    )
    .await
    .expect("live retrieval should be streamed");
    assert_eq!(live["movieInfo"]["id"], "xyz");
}
