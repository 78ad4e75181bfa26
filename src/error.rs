//! Error types for HTTP calls and callback dispatch.
//!
//! Every failure a call can run into ends up as an [`Error`]. Awaited calls
//! return it directly; callback registrations hand it to the failure path.

use http::{HeaderMap, StatusCode};

/// The main error type for calls.
///
/// # Examples
///
/// ```no_run
/// use callx::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// match client.get::<serde_json::Value>("/endpoint").execute().await {
///     Ok(response) => println!("Status: {}", response.status),
///     Err(e) if e.is_canceled() => println!("Gave up on the request"),
///     Err(Error::DeserializationFailed { raw_response, serde_error, .. }) => {
///         eprintln!("Failed to deserialize. Raw response: {}", raw_response);
///         eprintln!("Serde error: {}", serde_error);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A network-level error occurred (connection failed, DNS lookup failed, etc.).
    #[error("Network error: {0}")]
    Network(reqwest::Error),

    /// The request took longer than the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// Failed to deserialize a successful response body into the expected type.
    ///
    /// The raw body is kept so the payload can be inspected in logs.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// The server returned a non-2xx HTTP status code.
    ///
    /// Calls deliver such responses on the success path; this variant is
    /// produced by [`Response::error_for_status`](crate::Response::error_for_status).
    #[error("HTTP error {status}: {raw_response}")]
    HttpError {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// The response headers
        headers: HeaderMap,
    },

    /// Invalid configuration was provided, such as a bad header value.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Failed to serialize the request body.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The call was canceled before its outcome was delivered.
    #[error("{request} Canceled")]
    Canceled {
        /// The request line of the canceled call, e.g. `GET /posts`.
        request: String,
    },

    /// The call handle has already been executed.
    ///
    /// Clone the handle to issue the same request again.
    #[error("Already executed")]
    AlreadyExecuted,

    /// The client was torn down before the call could use it.
    #[error("Client has been shut down")]
    ClientShutdown,

    /// A call was enqueued from outside a tokio runtime.
    #[error("No tokio runtime available to run the call")]
    NoRuntime,
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(e)
        }
    }
}

impl Error {
    pub(crate) fn canceled(request: impl ToString) -> Self {
        Error::Canceled {
            request: request.to_string(),
        }
    }

    /// Returns `true` if this error reports a canceled call.
    ///
    /// # Examples
    ///
    /// ```
    /// use callx::Error;
    ///
    /// let err = Error::Canceled { request: "GET /posts".to_string() };
    /// assert!(err.is_canceled());
    /// assert_eq!(err.to_string(), "GET /posts Canceled");
    /// assert!(!Error::Timeout.is_canceled());
    /// ```
    pub fn is_canceled(&self) -> bool {
        matches!(self, Error::Canceled { .. })
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpError { status, .. } => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::HttpError { raw_response, .. } => Some(raw_response),
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }
}

/// A specialized `Result` type for calls.
pub type Result<T> = std::result::Result<T, Error>;
