// HTTP transport shared by the embedding, vector store and chat completion clients.
// Requests go through ureq on the blocking pool so callers can stay async.


use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
/// A single attempt: failures are surfaced to the caller, not retried.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 1;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("HTTP {status} from {url}: {body}")]
    Status { status: u16, url: String, body: String },
    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },
    #[error("Failed to encode request body: {0}")]
    Encode(String),
    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("Request task failed: {0}")]
    Join(String),
}

impl HttpError {
    /// Whether a later attempt could plausibly succeed
    #[inline]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 500,
            Self::Transport { .. } => true,
            Self::Encode(_) | Self::Decode { .. } | Self::Join(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Get,
    Post,
    Put,
}

/// JSON client with fixed headers, a global timeout and an optional retry policy
#[derive(Debug, Clone)]
pub struct JsonHttpClient {
    agent: ureq::Agent,
    headers: Vec<(String, String)>,
    retry_attempts: u32,
}

impl JsonHttpClient {
    #[inline]
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: build_agent(timeout),
            headers: Vec::new(),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Attach a header to every request made by this client
    #[inline]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    #[inline]
    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    #[inline]
    pub fn has_header(&self, name: &str) -> bool {
        self.headers
            .iter()
            .any(|(key, _)| key.eq_ignore_ascii_case(name))
    }

    #[inline]
    pub async fn get<T: DeserializeOwned>(&self, url: &Url) -> Result<T, HttpError> {
        let text = self.execute(Method::Get, url, None).await?;
        decode(url, &text)
    }

    #[inline]
    pub async fn post<B, T>(&self, url: &Url, body: &B) -> Result<T, HttpError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let body = encode(body)?;
        let text = self.execute(Method::Post, url, Some(body)).await?;
        decode(url, &text)
    }

    #[inline]
    pub async fn put<B, T>(&self, url: &Url, body: &B) -> Result<T, HttpError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let body = encode(body)?;
        let text = self.execute(Method::Put, url, Some(body)).await?;
        decode(url, &text)
    }

    async fn execute(
        &self,
        method: Method,
        url: &Url,
        body: Option<String>,
    ) -> Result<String, HttpError> {
        let agent = self.agent.clone();
        let headers = self.headers.clone();
        let retry_attempts = self.retry_attempts;
        let url = url.clone();

        tokio::task::spawn_blocking(move || {
            request_with_retry(retry_attempts, &url, || {
                send_once(&agent, method, &url, &headers, body.as_deref())
            })
        })
        .await
        .map_err(|e| HttpError::Join(e.to_string()))?
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

fn encode<B: Serialize>(body: &B) -> Result<String, HttpError> {
    serde_json::to_string(body).map_err(|e| HttpError::Encode(e.to_string()))
}

fn decode<T: DeserializeOwned>(url: &Url, text: &str) -> Result<T, HttpError> {
    serde_json::from_str(text).map_err(|e| HttpError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

fn send_once(
    agent: &ureq::Agent,
    method: Method,
    url: &Url,
    headers: &[(String, String)],
    body: Option<&str>,
) -> Result<String, HttpError> {
    debug!("{:?} {}", method, url);

    let response = match method {
        Method::Get => {
            let mut request = agent.get(url.as_str());
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }
            request.call()
        }
        Method::Post | Method::Put => {
            let mut request = if method == Method::Post {
                agent.post(url.as_str())
            } else {
                agent.put(url.as_str())
            };
            request = request.header("Content-Type", "application/json");
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }
            request.send(body.unwrap_or("{}"))
        }
    };

    let mut response = response.map_err(|e| HttpError::Transport {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let status = response.status().as_u16();
    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|e| HttpError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    if status >= 400 {
        return Err(HttpError::Status {
            status,
            url: url.to_string(),
            body: text,
        });
    }

    Ok(text)
}

fn request_with_retry<F>(
    retry_attempts: u32,
    url: &Url,
    mut request_fn: F,
) -> Result<String, HttpError>
where
    F: FnMut() -> Result<String, HttpError>,
{
    let attempts = retry_attempts.max(1);
    let mut attempt = 1;

    loop {
        debug!("HTTP request attempt {}/{}", attempt, attempts);

        match request_fn() {
            Ok(text) => return Ok(text),
            Err(err) if err.is_retryable() && attempt < attempts => {
                warn!("{}, attempt {}/{}", err, attempt, attempts);

                let delay = Duration::from_millis(EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000);
                debug!("Waiting {:?} before retry", delay);
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(err) => {
                if attempts > 1 {
                    error!("All {} attempts failed for request to {}", attempt, url);
                }
                return Err(err);
            }
        }
    }
}

/// Ensure a base URL ends with `/` so that `Url::join` appends instead of replacing
#[inline]
pub fn normalize_base_url(raw: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
