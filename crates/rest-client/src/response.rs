//! Turning raw upstream responses into entities or taxonomy errors.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use movie_types::UpstreamError;

/// Deadline for one outbound call, independent of any retry budget.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the connection pool shared by both upstream clients.
///
/// `reqwest::Client` is reference counted internally; clone it freely
/// across clients and tasks.
pub fn http_client(request_timeout: Duration) -> reqwest::Result<Client> {
    Client::builder().timeout(request_timeout).build()
}

/// No response arrived (connect failure, reset, per-call timeout).
pub(crate) fn transport_error(service: &str, err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        warn!("Call to {} timed out: {}", service, err);
    } else {
        warn!("Call to {} failed before a response: {}", service, err);
    }
    UpstreamError::server_error(service, None, &err.to_string())
}

/// Classify a non-success response that the caller did not handle itself.
///
/// 4xx keeps the upstream body verbatim, 5xx embeds it in the message.
pub(crate) async fn failure(service: &str, response: Response) -> UpstreamError {
    let status = response.status();
    info!("Status code from {} is: {}", service, status.as_u16());
    let body = match response.text().await {
        Ok(body) => body,
        // The upstream answered but the body was cut off
        Err(e) => return transport_error(service, e),
    };

    if status.is_client_error() {
        UpstreamError::ClientRejected {
            status: status.as_u16(),
            message: body,
        }
    } else if status.is_server_error() {
        UpstreamError::server_error(service, Some(status.as_u16()), &body)
    } else {
        UpstreamError::Unavailable {
            status: Some(status.as_u16()),
            message: format!("Unexpected status {} from {} {}", status, service, body),
        }
    }
}

/// Decode a 2xx body, reporting the JSON path of the first bad field.
pub(crate) async fn decode_json<T: DeserializeOwned>(
    service: &str,
    response: Response,
) -> Result<T, UpstreamError> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(service, e))?;

    let deserializer = &mut serde_json::Deserializer::from_str(&body);
    serde_path_to_error::deserialize(deserializer).map_err(|e| {
        warn!("Undecodable body from {} at {}: {}", service, e.path(), e.inner());
        UpstreamError::Unavailable {
            status: Some(status),
            message: format!(
                "Malformed response from {}: {}: {}",
                service,
                e.path(),
                e.inner()
            ),
        }
    })
}
