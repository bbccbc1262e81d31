//! The API client
//!
//! [`Client::send`] runs the whole request pipeline: tag the request,
//! attach the cached access token, dispatch, classify the outcome, and on
//! an expired session run one single-flight refresh and one replay. All
//! other failures surface unchanged, body and status intact.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use uuid::Uuid;
use worklane_auth::{AuthGateway, HttpGateway, TokenSet, TokenStore};

use crate::classify::{self, FailureClass};
use crate::config::ClientConfig;
use crate::coordinator::{RefreshCoordinator, SessionExpiredHook};
use crate::error::{Error, Result};
use crate::metrics;
use crate::tag;

/// Correlation header sent with every request. Replays reuse the value of
/// the original attempt so the server sees one logical request.
const REQUEST_ID_HEADER: &str = "x-request-id";

/// One request, described independently of the transport so it can be
/// replayed verbatim after a token refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<serde_json::Value>,
    /// Set when the request has been replayed once after a refresh; a
    /// second unauthenticated response then surfaces instead of looping.
    pub(crate) retried: bool,
}

impl ApiRequest {
    /// A request for `path`, which must start with `/` and is joined to
    /// the client's base URL.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            retried: false,
        }
    }

    /// Extra header sent with every attempt of this request.
    ///
    /// The pipeline owns `Authorization` and `x-request-id`: values set
    /// here under those names are replaced when the pipeline attaches its
    /// own.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A successful (2xx) response. Failures never reach this type; they are
/// classified and surfaced as [`Error`].
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub struct ClientBuilder {
    base_url: String,
    timeout: Duration,
    gateway: Option<Arc<dyn AuthGateway>>,
    on_session_expired: Option<SessionExpiredHook>,
    http: Option<reqwest::Client>,
}

impl ClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            gateway: None,
            on_session_expired: None,
            http: None,
        }
    }

    /// Per-request timeout, applied to the original attempt and to the
    /// replay independently.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The gateway that owns credentials. Required.
    pub fn gateway(mut self, gateway: Arc<dyn AuthGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Called once per failed refresh episode, after credentials are
    /// cleared. Typical use: route the application to its login screen.
    pub fn on_session_expired(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_session_expired = Some(Arc::new(hook));
        self
    }

    /// Reuse an existing reqwest client (connection pool sharing with the
    /// gateway). A fresh one is built when not set.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn build(self) -> Result<Client> {
        let base_url = self.base_url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "base_url must start with http:// or https://, got {base_url:?}"
            )));
        }
        if self.timeout.is_zero() {
            return Err(Error::Config(
                "timeout must be greater than zero".to_string(),
            ));
        }
        let gateway = self.gateway.ok_or_else(|| {
            Error::Config("an auth gateway is required, set one with ClientBuilder::gateway".to_string())
        })?;
        let http = match self.http {
            Some(http) => http,
            None => reqwest::Client::builder()
                .timeout(self.timeout)
                .build()
                .map_err(|e| Error::Config(format!("http client: {e}")))?,
        };
        let coordinator = RefreshCoordinator::new(gateway.clone(), self.on_session_expired);
        Ok(Client {
            http,
            base_url,
            timeout: self.timeout,
            gateway,
            coordinator,
        })
    }
}

/// Authenticated API client. Cloning is cheap; clones share the connection
/// pool, the gateway, and the refresh coordinator.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    gateway: Arc<dyn AuthGateway>,
    coordinator: RefreshCoordinator,
}

impl Client {
    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    /// Builder preloaded from configuration: the token store is loaded (or
    /// bootstrapped), an [`HttpGateway`] is wired against the same API, and
    /// one connection pool is shared between the two.
    ///
    /// Finish with [`ClientBuilder::build`], registering a session-expired
    /// hook first if the application wants the sign-out signal.
    pub async fn builder_from_config(config: ClientConfig) -> Result<ClientBuilder> {
        let timeout = config.timeout();
        let store = TokenStore::load(config.auth.credentials_path.clone())
            .await
            .map_err(|e| Error::Config(format!("credential store: {e}")))?;
        if let Some(bootstrap) = &config.auth.refresh_token {
            if !store.is_signed_in().await {
                // A bootstrap pair has no access token yet; the first 401
                // spends the refresh token and fills the store.
                let seed = TokenSet {
                    access_token: String::new(),
                    refresh_token: bootstrap.expose().clone(),
                    expires_at: 0,
                };
                store
                    .set(seed)
                    .await
                    .map_err(|e| Error::Config(format!("credential store: {e}")))?;
            }
        }
        // One pool for API and refresh traffic. The client-level timeout
        // bounds the refresh call too: a refresh that times out settles
        // the episode as a failure instead of hanging its waiters.
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;
        let gateway = Arc::new(HttpGateway::new(
            http.clone(),
            config.api.base_url.clone(),
            Arc::new(store),
        ));
        Ok(Client::builder(config.api.base_url)
            .timeout(timeout)
            .http_client(http)
            .gateway(gateway))
    }

    /// Wire a client from configuration. Shorthand for
    /// [`Client::builder_from_config`] + [`ClientBuilder::build`] when no
    /// session-expired hook is needed.
    pub async fn from_config(config: ClientConfig) -> Result<Client> {
        Self::builder_from_config(config).await?.build()
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.send(ApiRequest::new(Method::GET, path)).await
    }

    pub async fn post(&self, path: &str, body: serde_json::Value) -> Result<ApiResponse> {
        self.send(ApiRequest::new(Method::POST, path).json(body)).await
    }

    pub async fn put(&self, path: &str, body: serde_json::Value) -> Result<ApiResponse> {
        self.send(ApiRequest::new(Method::PUT, path).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.send(ApiRequest::new(Method::DELETE, path)).await
    }

    /// Send a request through the full pipeline.
    ///
    /// A 401 on an ordinary endpoint triggers one refresh episode and one
    /// replay with the rotated token; the second 401, if any, surfaces.
    /// Auth endpoints and verification-required responses never enter the
    /// refresh path.
    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        if !request.path.starts_with('/') {
            return Err(Error::Config(format!(
                "request path must start with '/', got {:?}",
                request.path
            )));
        }

        let started = Instant::now();
        let tag = tag::tag_request(&request.method, &request.path);
        let request_id = format!("req_{}", Uuid::new_v4().as_simple());
        let url = format!("{}{}", self.base_url, request.path);

        // Auth endpoints authenticate themselves. Everything else carries
        // the cached access token when one exists; a miss is not an error,
        // the server may still accept the session cookie.
        let mut bearer: Option<String> = if tag.is_auth() {
            None
        } else {
            self.gateway
                .token_no_refresh()
                .await
                .filter(|token| !token.is_empty())
        };

        loop {
            let headers = attempt_headers(&request, &request_id, bearer.as_deref())?;
            let response = match self.dispatch(&request, &url, headers).await {
                Ok(response) => response,
                Err(e) => {
                    let class = classify::classify_transport(&e);
                    warn!(%request_id, error = %e, ?class, "no response received");
                    record(&request.method, "network", started);
                    return Err(Error::Network(e.to_string()));
                }
            };

            let status = response.status();
            if status.is_success() {
                let headers = response.headers().clone();
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| Error::Network(e.to_string()))?;
                record(&request.method, "ok", started);
                return Ok(ApiResponse { status, headers, body });
            }

            let headers = response.headers().clone();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            let class = classify::classify_response(status.as_u16(), &headers, &body);
            debug!(
                %request_id,
                status = status.as_u16(),
                criticality = tag.criticality_label(),
                ?class,
                "request failed"
            );

            match class {
                FailureClass::Unauthenticated { verification_required } => {
                    if tag.is_auth() || verification_required || request.retried {
                        record(&request.method, "unauthenticated", started);
                        return Err(Error::Unauthenticated { body });
                    }
                    // Mark before the refresh starts: whatever happens in
                    // the episode, this request replays at most once.
                    request.retried = true;
                    let token = match self.coordinator.refresh().await {
                        Ok(token) => token,
                        Err(e) => {
                            record(&request.method, "refresh_failed", started);
                            return Err(e);
                        }
                    };
                    bearer = Some(token);
                    debug!(%request_id, "replaying with refreshed token");
                }
                FailureClass::Forbidden => {
                    record(&request.method, "forbidden", started);
                    return Err(Error::Forbidden { body });
                }
                FailureClass::RateLimited { retry_after } => {
                    record(&request.method, "rate_limited", started);
                    return Err(Error::RateLimited { retry_after, body });
                }
                FailureClass::Network => {
                    record(&request.method, "network", started);
                    return Err(Error::Network(body));
                }
                FailureClass::Other => {
                    record(&request.method, "error", started);
                    return Err(Error::Status {
                        status: status.as_u16(),
                        body,
                    });
                }
            }
        }
    }

    /// One transport attempt with a finalized header set. Replays call
    /// this again with the same request id and the rotated bearer token
    /// baked into `headers`.
    async fn dispatch(
        &self,
        request: &ApiRequest,
        url: &str,
        headers: HeaderMap,
    ) -> std::result::Result<reqwest::Response, reqwest::Error> {
        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .timeout(self.timeout)
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        builder.send().await
    }
}

/// Final header set for one attempt. The correlation and `Authorization`
/// headers are pipeline-owned; `insert` replaces any caller-supplied value
/// rather than appending a second one.
fn attempt_headers(
    request: &ApiRequest,
    request_id: &str,
    bearer: Option<&str>,
) -> Result<HeaderMap> {
    let mut headers = request.headers.clone();
    let id = HeaderValue::from_str(request_id)
        .map_err(|e| Error::Config(format!("request id header: {e}")))?;
    headers.insert(REQUEST_ID_HEADER, id);
    if let Some(token) = bearer {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| Error::Config(format!("bearer token is not a valid header value: {e}")))?;
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

fn record(method: &Method, outcome: &str, started: Instant) {
    metrics::record_request(method.as_str(), outcome, started.elapsed().as_secs_f64());
}
