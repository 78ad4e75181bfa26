//! HTTP client that mints call handles and owns the connection pool.
//!
//! The [`Client`] type is the entry point: it hands out [`Call`] handles and
//! is the resource a [`Teardown`] releases. Use [`ClientBuilder`] to
//! configure and create clients.

use crate::{metadata::RequestMetadata, teardown::Teardown, Call, Error, Response, Result};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use url::Url;

/// An HTTP client for creating calls.
///
/// Clones share one connection pool. [`Client::shutdown`] releases that pool
/// for every clone at once.
///
/// # Examples
///
/// ```no_run
/// use callx::Client;
/// use std::time::Duration;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// struct CreateUser {
///     name: String,
/// }
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), callx::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(30))
///     .build()?;
///
/// let user = client.get::<User>("/users/123").execute().await?;
/// println!("Status: {}", user.status);
///
/// let new_user = CreateUser { name: "Alice".to_string() };
/// let created = client.post::<_, User>("/users", &new_user)?.execute().await?;
/// if let Some(user) = created.body() {
///     println!("Created user with ID: {}", user.id);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: RwLock<Option<reqwest::Client>>,
    base_url: Url,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a call for a request without a body.
    pub fn new_call<T>(&self, metadata: RequestMetadata) -> Call<T> {
        Call::new(self.clone(), metadata, None)
    }

    /// Creates a call that sends `body` as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SerializationFailed`] if the body cannot be serialized.
    pub fn new_call_with_body<Req, T>(
        &self,
        metadata: RequestMetadata,
        body: &Req,
    ) -> Result<Call<T>>
    where
        Req: Serialize,
    {
        let json =
            serde_json::to_value(body).map_err(|e| Error::SerializationFailed(e.to_string()))?;
        Ok(Call::new(self.clone(), metadata, Some(json)))
    }

    /// Creates a GET call for the specified path.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use callx::Client;
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct Post { title: String }
    ///
    /// # async fn example() -> Result<(), callx::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://jsonplaceholder.typicode.com")?
    ///     .build()?;
    ///
    /// let posts = client.get::<Vec<Post>>("/posts").execute().await?;
    /// println!("Fetched {} posts", posts.body().map_or(0, Vec::len));
    /// # Ok(())
    /// # }
    /// ```
    pub fn get<T>(&self, path: impl Into<String>) -> Call<T> {
        self.new_call(RequestMetadata::new(Method::GET, path))
    }

    /// Creates a DELETE call for the specified path.
    pub fn delete<T>(&self, path: impl Into<String>) -> Call<T> {
        self.new_call(RequestMetadata::new(Method::DELETE, path))
    }

    /// Creates a POST call with a JSON body.
    pub fn post<Req, T>(&self, path: impl Into<String>, body: &Req) -> Result<Call<T>>
    where
        Req: Serialize,
    {
        self.new_call_with_body(RequestMetadata::new(Method::POST, path), body)
    }

    /// Creates a PUT call with a JSON body.
    pub fn put<Req, T>(&self, path: impl Into<String>, body: &Req) -> Result<Call<T>>
    where
        Req: Serialize,
    {
        self.new_call_with_body(RequestMetadata::new(Method::PUT, path), body)
    }

    /// Creates a PATCH call with a JSON body.
    pub fn patch<Req, T>(&self, path: impl Into<String>, body: &Req) -> Result<Call<T>>
    where
        Req: Serialize,
    {
        self.new_call_with_body(RequestMetadata::new(Method::PATCH, path), body)
    }

    /// Returns the timeout a call with `metadata` would run under.
    pub(crate) fn effective_timeout(&self, metadata: &RequestMetadata) -> Option<Duration> {
        metadata.timeout.or(self.inner.timeout)
    }

    /// Releases the connection pool.
    ///
    /// Every clone of this client is affected: calls started afterwards fail
    /// with [`Error::ClientShutdown`]. Requests already on the wire finish
    /// on the connections they hold, which are dropped afterwards.
    ///
    /// Shutdown is meant to be performed by a single owner. Calling it again
    /// is a no-op, but nothing stops one call site from shutting down a
    /// client another call site still relies on.
    pub fn shutdown(&self) {
        let previous = self
            .inner
            .http_client
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match previous {
            Some(_) => tracing::info!(
                base_url = %self.inner.base_url,
                "Client shut down, connection pool released"
            ),
            None => tracing::debug!(
                base_url = %self.inner.base_url,
                "Client already shut down"
            ),
        }
    }

    /// Returns `true` once [`Client::shutdown`] has run.
    pub fn is_shutdown(&self) -> bool {
        self.inner
            .http_client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn http_client(&self) -> Result<reqwest::Client> {
        self.inner
            .http_client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::ClientShutdown)
    }

    /// Sends one request and reads its response.
    pub(crate) async fn send<T>(
        &self,
        metadata: &RequestMetadata,
        body: Option<&serde_json::Value>,
    ) -> Result<Response<Option<T>>>
    where
        T: DeserializeOwned,
    {
        let http_client = self.http_client()?;
        let start_time = Instant::now();

        let mut url = self.inner.base_url.clone();
        url.set_path(&metadata.path);

        for (key, value) in &metadata.query_params {
            url.query_pairs_mut().append_pair(key, value);
        }

        tracing::debug!(
            method = %metadata.method,
            url = %url,
            "Executing HTTP request"
        );

        let mut request = http_client.request(metadata.method.clone(), url);

        for (name, value) in &self.inner.default_headers {
            request = request.header(name, value);
        }

        for (name, value) in &metadata.headers {
            request = request.header(name, value);
        }

        if let Some(timeout) = self.effective_timeout(metadata) {
            request = request.timeout(timeout);
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        self.parse_response(response, start_time).await
    }

    /// Reads the body and deserializes it for 2xx statuses.
    async fn parse_response<T>(
        &self,
        response: reqwest::Response,
        start_time: Instant,
    ) -> Result<Response<Option<T>>>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        let headers = response.headers().clone();
        let raw_body = response.text().await?;
        let latency = start_time.elapsed();

        tracing::info!(
            status = status.as_u16(),
            latency_ms = latency.as_millis(),
            "Received HTTP response"
        );

        if !status.is_success() {
            if status.is_client_error() {
                tracing::error!(
                    status = status.as_u16(),
                    response = %raw_body,
                    "Client error (4xx)"
                );
            } else if status.is_server_error() {
                tracing::warn!(
                    status = status.as_u16(),
                    response = %raw_body,
                    "Server error (5xx)"
                );
            }
            return Ok(Response::new(None, raw_body, status, headers, latency));
        }

        if raw_body.trim().is_empty() {
            return Ok(Response::new(None, raw_body, status, headers, latency));
        }

        match serde_json::from_str::<Option<T>>(&raw_body) {
            Ok(data) => Ok(Response::new(data, raw_body, status, headers, latency)),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    raw_response = %raw_body,
                    "Failed to deserialize response"
                );

                Err(Error::DeserializationFailed {
                    raw_response: raw_body,
                    serde_error: e.to_string(),
                    status,
                })
            }
        }
    }
}

impl Teardown for Client {
    fn teardown(&self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url.as_str())
            .field("timeout", &self.inner.timeout)
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use callx::ClientBuilder;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), callx::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(30))
///     .pool_idle_timeout(Duration::from_secs(60))
///     .default_header("User-Agent", "my-app/1.0")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
    pool_idle_timeout: Option<Duration>,
    pool_max_idle_per_host: Option<usize>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            timeout: None,
            pool_idle_timeout: None,
            pool_max_idle_per_host: None,
        }
    }

    /// Sets the base URL for all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets how long idle pooled connections are kept.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Caps the number of idle pooled connections per host.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = Some(max);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was provided or if the client
    /// configuration is invalid.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::ConfigurationError("Base URL is required".to_string()))?;

        let mut http_builder = reqwest::Client::builder();
        if let Some(idle) = self.pool_idle_timeout {
            http_builder = http_builder.pool_idle_timeout(idle);
        }
        if let Some(max) = self.pool_max_idle_per_host {
            http_builder = http_builder.pool_max_idle_per_host(max);
        }

        let http_client = http_builder.build().map_err(|e| {
            Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Client {
            inner: Arc::new(ClientInner {
                http_client: RwLock::new(Some(http_client)),
                base_url,
                default_headers: self.default_headers,
                timeout: self.timeout,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
