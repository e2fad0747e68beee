//! In-process stand-in for the movie-info and reviews services.
//!
//! Binds a real axum server to `127.0.0.1:0` and serves scripted replies,
//! counting every hit so tests can assert how many calls a client made.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, RawQuery};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use reqwest::Url;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const MOVIE_INFO_PATH: &str = "/v1/movieinfos";
pub const REVIEWS_PATH: &str = "/v1/reviews";

/// One canned response.
#[derive(Debug, Clone)]
pub struct MockReply {
    status: StatusCode,
    content_type: &'static str,
    body: String,
    delay: Duration,
}

impl MockReply {
    /// 200 with a JSON body.
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: "application/json",
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    /// Any status with a plain-text body.
    pub fn status(code: u16, body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            content_type: "text/plain",
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    /// Hold the response back for `delay` before sending it.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Replies and bookkeeping for one upstream route.
struct Route {
    scripted: Mutex<VecDeque<MockReply>>,
    fallback: Mutex<MockReply>,
    hits: AtomicUsize,
    requests: Mutex<Vec<Option<String>>>,
}

impl Route {
    fn new(fallback: MockReply) -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            hits: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    async fn respond(&self, request: Option<String>) -> Response {
        self.hits.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request);

        let scripted = lock(&self.scripted).pop_front();
        let reply = scripted.unwrap_or_else(|| lock(&self.fallback).clone());
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        (
            reply.status,
            [(header::CONTENT_TYPE, reply.content_type)],
            reply.body,
        )
            .into_response()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Running mock of both upstreams. Aborted on drop.
pub struct MockUpstream {
    addr: SocketAddr,
    movie_info: Arc<Route>,
    reviews: Arc<Route>,
    handle: JoinHandle<()>,
}

impl MockUpstream {
    /// Start on a random port. Unscripted movie-info calls answer 404,
    /// unscripted reviews calls answer `[]`.
    pub async fn start() -> std::io::Result<Self> {
        let movie_info = Arc::new(Route::new(MockReply::status(404, "")));
        let reviews = Arc::new(Route::new(MockReply::json("[]")));

        let app = Router::new()
            .route(
                &format!("{}/*id", MOVIE_INFO_PATH),
                get({
                    let route = movie_info.clone();
                    move |Path(id): Path<String>| async move { route.respond(Some(id)).await }
                }),
            )
            .route(
                REVIEWS_PATH,
                get({
                    let route = reviews.clone();
                    move |RawQuery(query): RawQuery| async move { route.respond(query).await }
                }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Mock upstream failed: {}", e);
            }
        });

        Ok(Self {
            addr,
            movie_info,
            reviews,
            handle,
        })
    }

    pub fn movie_info_url(&self) -> Url {
        self.url(MOVIE_INFO_PATH)
    }

    pub fn reviews_url(&self) -> Url {
        self.url(REVIEWS_PATH)
    }

    fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://{}{}", self.addr, path))
            .expect("socket address forms a valid URL")
    }

    /// Reply used once the script for movie-info calls is used up.
    pub fn on_movie_info(&self, reply: MockReply) {
        *lock(&self.movie_info.fallback) = reply;
    }

    /// Replies served in order to the next movie-info calls.
    pub fn script_movie_info(&self, replies: impl IntoIterator<Item = MockReply>) {
        lock(&self.movie_info.scripted).extend(replies);
    }

    pub fn on_reviews(&self, reply: MockReply) {
        *lock(&self.reviews.fallback) = reply;
    }

    pub fn script_reviews(&self, replies: impl IntoIterator<Item = MockReply>) {
        lock(&self.reviews.scripted).extend(replies);
    }

    pub fn movie_info_hits(&self) -> usize {
        self.movie_info.hits.load(Ordering::SeqCst)
    }

    pub fn reviews_hits(&self) -> usize {
        self.reviews.hits.load(Ordering::SeqCst)
    }

    /// Decoded ids requested from movie-info, in arrival order.
    pub fn movie_info_requests(&self) -> Vec<String> {
        lock(&self.movie_info.requests).iter().flatten().cloned().collect()
    }

    /// Raw query strings sent to reviews, in arrival order.
    pub fn reviews_queries(&self) -> Vec<Option<String>> {
        lock(&self.reviews.requests).clone()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Movie-info payload for "Batman Begins" under `id`.
pub fn batman_begins_json(id: &str) -> String {
    format!(
        r#"{{"movieInfoId":"{}","name":"Batman Begins","year":2005,"cast":["Christian Bale","Michael Cane"],"release_date":"2005-06-15"}}"#,
        id
    )
}

/// Two reviews referencing movie-info id 1.
pub fn two_reviews_json() -> String {
    r#"[{"reviewId":"1","movieInfoId":1,"comment":"Awesome Movie","rating":9.0},{"reviewId":"2","movieInfoId":1,"comment":"Excellent Movie","rating":8.0}]"#
        .to_string()
}
