//! Response envelope handed to call callbacks.
//!
//! A [`Response`] passes through what the server sent: status, headers, the
//! raw body text, and the typed body. Calls produce `Response<Option<T>>`,
//! where the body is `None` for non-2xx statuses and for empty or `null`
//! successful bodies.

use crate::{Error, Result};
use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// A received HTTP response.
///
/// # Examples
///
/// ```no_run
/// use callx::Client;
/// use serde::Deserialize;
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
///     .build()?;
///
/// let response = client.get::<User>("/users/123").execute().await?;
///
/// if let Some(user) = response.body() {
///     println!("User: {}", user.name);
/// }
/// println!("Request took {:?}", response.latency);
/// println!("Status: {}", response.status);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The typed response data.
    pub data: T,

    /// The raw response body as a string.
    pub raw_body: String,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from sending the request until the body was read.
    pub latency: Duration,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(
        data: T,
        raw_body: String,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
    ) -> Self {
        Self {
            data,
            raw_body,
            status,
            headers,
            latency,
        }
    }

    /// Maps the response data to a different type, keeping the metadata.
    ///
    /// # Examples
    ///
    /// ```
    /// # use callx::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::new(
    ///     42,
    ///     "42".to_string(),
    ///     StatusCode::OK,
    ///     HeaderMap::new(),
    ///     Duration::from_millis(100),
    /// );
    ///
    /// let string_response = response.map(|n| n.to_string());
    /// assert_eq!(string_response.data, "42");
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
        }
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns a header value by name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Turns a non-2xx response into [`Error::HttpError`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use callx::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response: Response<Option<u32>> = Response::new(
    ///     None,
    ///     "not here".to_string(),
    ///     StatusCode::NOT_FOUND,
    ///     HeaderMap::new(),
    ///     Duration::ZERO,
    /// );
    ///
    /// let err = response.error_for_status().unwrap_err();
    /// assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    /// ```
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(Error::HttpError {
            status: self.status,
            raw_response: self.raw_body,
            headers: self.headers,
        })
    }
}

impl<T> Response<Option<T>> {
    /// Returns the typed body, if there is one.
    pub fn body(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// Consumes the response and returns the typed body.
    pub fn into_body(self) -> Option<T> {
        self.data
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn response(data: Option<u32>, status: StatusCode) -> Response<Option<u32>> {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        Response::new(data, String::new(), status, headers, Duration::ZERO)
    }

    #[test]
    fn test_body_accessors() {
        let ok = response(Some(7), StatusCode::OK);
        assert_eq!(ok.body(), Some(&7));
        assert_eq!(ok.header("content-type"), Some("application/json"));
        assert_eq!(ok.into_body(), Some(7));

        let empty = response(None, StatusCode::NO_CONTENT);
        assert!(empty.is_success());
        assert_eq!(empty.body(), None);
    }

    #[test]
    fn test_error_for_status_passes_success() {
        let ok = response(Some(1), StatusCode::CREATED);
        assert!(ok.error_for_status().is_ok());

        let failed = response(None, StatusCode::BAD_GATEWAY);
        assert!(matches!(
            failed.error_for_status(),
            Err(Error::HttpError { status, .. }) if status == StatusCode::BAD_GATEWAY
        ));
    }
}
