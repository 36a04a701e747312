//! `/.netlify/functions/notify-wallet`: forwards wallet notifications to the
//! upstream webhook with the shared key attached.

use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::metrics::{RELAY_LATENCY, RELAY_REQUESTS, RELAY_UPSTREAM_ERRORS};
use log::{debug, error, warn};
use reqwest::Client;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use futures::{Stream, StreamExt};
use warp::http::{HeaderValue, Method, StatusCode};
use warp::hyper::body::Buf;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

pub const KEY_HEADER: &str = "x-key";

#[derive(Debug, Clone)]
pub struct RelayForwarder {
    client: Client,
    upstream_url: String,
    broadcast_key: String,
}

impl RelayForwarder {
    pub fn new(upstream_url: &str, broadcast_key: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            upstream_url: upstream_url.to_string(),
            broadcast_key: broadcast_key.to_string(),
        })
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        Self::new(
            &config.upstream_url,
            &config.broadcast_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Posts `payload` as-is and returns whatever JSON the upstream answers.
    pub async fn forward(&self, payload: &Value) -> Result<Value> {
        let response = self
            .client
            .post(&self.upstream_url)
            .header(KEY_HEADER, &self.broadcast_key)
            .json(payload)
            .send()
            .await?;
        debug!("Upstream answered {}", response.status());
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| Error::RelayError(format!("upstream sent invalid JSON: {}", e)))
    }
}

/// Loose truthiness of a JSON value: `false`, `0`, `""`, `null` and absence are false.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert("access-control-allow-headers", HeaderValue::from_static("Content-Type"));
    headers.insert("access-control-allow-methods", HeaderValue::from_static("POST,OPTIONS"));
    response
}

fn json_response(status: StatusCode, body: &Value) -> Response {
    with_cors(warp::reply::with_status(warp::reply::json(body), status).into_response())
}

fn json_error(status: StatusCode, message: &str) -> Response {
    json_response(status, &json!({ "ok": false, "error": message }))
}

/// Reads the request body chunk by chunk; `None` once it grows past `max_body_bytes`.
async fn read_limited<S, B>(body: S, max_body_bytes: u64) -> Option<std::result::Result<Vec<u8>, warp::Error>>
where
    S: Stream<Item = std::result::Result<B, warp::Error>>,
    B: Buf,
{
    tokio::pin!(body);
    let mut buffer = Vec::new();
    while let Some(chunk) = body.next().await {
        let mut chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => return Some(Err(e)),
        };
        if (buffer.len() + chunk.remaining()) as u64 > max_body_bytes {
            return None;
        }
        while chunk.has_remaining() {
            let slice = chunk.chunk();
            let n = slice.len();
            buffer.extend_from_slice(slice);
            chunk.advance(n);
        }
    }
    Some(Ok(buffer))
}

async fn relay_post(body: &[u8], relay: &RelayForwarder) -> Response {
    let payload: Value = if body.is_empty() {
        json!({})
    } else {
        match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(e) => {
                debug!("Rejecting relay body: {}", e);
                return json_error(StatusCode::BAD_REQUEST, "Invalid JSON");
            }
        }
    };

    let timer = RELAY_LATENCY.start_timer();
    let result = relay.forward(&payload).await;
    timer.observe_duration();

    match result {
        Ok(data) => {
            let ok = is_truthy(data.get("ok"));
            if !ok {
                warn!("Upstream did not acknowledge the notification: {}", data);
            }
            json_response(StatusCode::OK, &json!({ "ok": ok, "relay": data }))
        }
        Err(e) => {
            RELAY_UPSTREAM_ERRORS.inc();
            error!("Relay to upstream failed: {}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

pub async fn handle_notify<S, B>(
    method: Method,
    body: S,
    relay: Arc<RelayForwarder>,
    max_body_bytes: u64,
) -> std::result::Result<Response, Infallible>
where
    S: Stream<Item = std::result::Result<B, warp::Error>>,
    B: Buf,
{
    let response = match method {
        Method::OPTIONS => with_cors(StatusCode::NO_CONTENT.into_response()),
        Method::POST => match read_limited(body, max_body_bytes).await {
            Some(Ok(bytes)) => relay_post(&bytes, &relay).await,
            Some(Err(e)) => {
                warn!("Failed to read relay body: {}", e);
                json_error(StatusCode::BAD_REQUEST, "Invalid JSON")
            }
            None => json_error(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large"),
        },
        _ => json_error(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"),
    };
    RELAY_REQUESTS
        .with_label_values(&[response.status().as_str()])
        .inc();
    Ok(response)
}

/// Every method is accepted here so that non-POST requests get the JSON 405.
/// The body is only streamed for POST, and never past `max_body_bytes`.
pub fn notify_route(
    relay: Arc<RelayForwarder>,
    max_body_bytes: u64,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!(".netlify" / "functions" / "notify-wallet")
        .and(warp::method())
        .and(warp::body::stream())
        .and(warp::any().map(move || relay.clone()))
        .and(warp::any().map(move || max_body_bytes))
        .and_then(handle_notify)
}
