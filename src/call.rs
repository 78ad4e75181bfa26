//! Single-use call handles.
//!
//! A [`Call`] describes one request against a [`Client`]. It can be awaited
//! with [`Call::execute`] or handed a [`Callback`] with [`Call::enqueue`],
//! and it can be canceled from any thread at any time.

use crate::{adapter::CallAdapter, metadata::RequestMetadata, Client, Error, Response, Result};
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;

/// Receives the outcome of an enqueued call.
///
/// Exactly one of the two methods is called, exactly once.
pub trait Callback<T>: Send + 'static {
    /// An HTTP response arrived. Non-2xx statuses land here too.
    fn on_response(self, call: &Call<T>, response: Response<Option<T>>);

    /// The request failed or was canceled.
    fn on_failure(self, call: &Call<T>, error: Error);
}

/// One request, executed at most once.
///
/// Cloning produces a fresh call for the same request that has been
/// neither executed nor canceled.
///
/// # Examples
///
/// ```no_run
/// use callx::Client;
///
/// # async fn example() -> Result<(), callx::Error> {
/// let client = Client::builder()
///     .base_url("https://jsonplaceholder.typicode.com")?
///     .build()?;
///
/// let call = client.get::<serde_json::Value>("/posts/1");
/// let first = call.execute().await?;
///
/// // A handle runs once; clone it to repeat the request.
/// let again = call.clone().execute().await?;
/// assert_eq!(first.status, again.status);
/// # Ok(())
/// # }
/// ```
pub struct Call<T> {
    client: Client,
    metadata: RequestMetadata,
    body: Option<serde_json::Value>,
    state: Arc<CallState>,
    _response: PhantomData<fn() -> T>,
}

struct CallState {
    executed: AtomicBool,
    canceled: watch::Sender<bool>,
}

impl<T> Call<T> {
    pub(crate) fn new(
        client: Client,
        metadata: RequestMetadata,
        body: Option<serde_json::Value>,
    ) -> Self {
        let (canceled, _) = watch::channel(false);
        Self {
            client,
            metadata,
            body,
            state: Arc::new(CallState {
                executed: AtomicBool::new(false),
                canceled,
            }),
            _response: PhantomData,
        }
    }

    /// Another handle to this same call, sharing its execution state.
    pub(crate) fn share(&self) -> Self {
        Self {
            client: self.client.clone(),
            metadata: self.metadata.clone(),
            body: self.body.clone(),
            state: self.state.clone(),
            _response: PhantomData,
        }
    }

    /// The request this call sends.
    pub fn request(&self) -> &RequestMetadata {
        &self.metadata
    }

    /// The timeout this call runs under, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.client.effective_timeout(&self.metadata)
    }

    /// Cancels the call. Safe to call from any thread, any number of times.
    pub fn cancel(&self) {
        if !self.state.canceled.send_replace(true) {
            tracing::debug!(request = %self.metadata, "Call canceled");
        }
    }

    pub fn is_canceled(&self) -> bool {
        *self.state.canceled.borrow()
    }

    /// Returns `true` once the call has been executed or enqueued.
    pub fn is_executed(&self) -> bool {
        self.state.executed.load(Ordering::SeqCst)
    }

    /// Wraps this call with `adapter`.
    pub fn adapt<A>(self, adapter: &A) -> A::Output
    where
        A: CallAdapter<T>,
    {
        adapter.adapt(self)
    }

    /// Resolves once [`Call::cancel`] has been called.
    async fn canceled(&self) {
        let mut receiver = self.state.canceled.subscribe();
        while !*receiver.borrow_and_update() {
            if receiver.changed().await.is_err() {
                // The sender lives in `self.state`; this cannot close first.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl<T> Call<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Sends the request and waits for the response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExecuted`] on a second execution,
    /// [`Error::Canceled`] if the call is canceled before the response is
    /// read, and the transport's error otherwise.
    pub async fn execute(&self) -> Result<Response<Option<T>>> {
        if self.state.executed.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyExecuted);
        }

        if self.is_canceled() {
            return Err(Error::canceled(&self.metadata));
        }

        tokio::select! {
            biased;
            _ = self.canceled() => {
                tracing::warn!(request = %self.metadata, "Call canceled while in flight");
                Err(Error::canceled(&self.metadata))
            }
            result = self.client.send::<T>(&self.metadata, self.body.as_ref()) => result,
        }
    }

    /// Runs the call on the current tokio runtime and reports to `callback`.
    ///
    /// Outside a runtime the callback's failure path receives
    /// [`Error::NoRuntime`] immediately.
    pub fn enqueue<C>(&self, callback: C)
    where
        C: Callback<T>,
    {
        match Handle::try_current() {
            Ok(handle) => self.enqueue_on(&handle, callback),
            Err(_) => callback.on_failure(self, Error::NoRuntime),
        }
    }

    pub(crate) fn enqueue_on<C>(&self, handle: &Handle, callback: C)
    where
        C: Callback<T>,
    {
        let call = self.share();
        handle.spawn(async move {
            match call.execute().await {
                Ok(response) => callback.on_response(&call, response),
                Err(error) => callback.on_failure(&call, error),
            }
        });
    }
}

impl<T> Clone for Call<T> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone(), self.metadata.clone(), self.body.clone())
    }
}

impl<T> fmt::Debug for Call<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("request", &self.metadata.to_string())
            .field("executed", &self.is_executed())
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client::builder()
            .base_url("http://localhost")
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_cancel_is_idempotent_and_shared() {
        let call = client().get::<()>("/posts");
        let shared = call.share();

        assert!(!call.is_canceled());
        shared.cancel();
        shared.cancel();
        assert!(call.is_canceled());
    }

    #[test]
    fn test_clone_is_fresh() {
        let call = client().get::<()>("/posts");
        call.cancel();
        call.state.executed.store(true, Ordering::SeqCst);

        let fresh = call.clone();
        assert!(!fresh.is_canceled());
        assert!(!fresh.is_executed());
        assert_eq!(fresh.request().to_string(), "GET /posts");
    }

    #[tokio::test]
    async fn test_execute_after_cancel_fails_without_sending() {
        let call = client().get::<()>("/posts");
        call.cancel();

        let error = call.execute().await.unwrap_err();
        assert!(error.is_canceled());
        assert_eq!(error.to_string(), "GET /posts Canceled");
        assert!(call.is_executed());
    }

    #[test]
    fn test_enqueue_outside_runtime_reports_failure() {
        struct Expect(std::sync::mpsc::Sender<bool>);

        impl Callback<()> for Expect {
            fn on_response(self, _call: &Call<()>, _response: Response<Option<()>>) {
                self.0.send(false).unwrap();
            }

            fn on_failure(self, _call: &Call<()>, error: Error) {
                self.0.send(matches!(error, Error::NoRuntime)).unwrap();
            }
        }

        let (tx, rx) = std::sync::mpsc::channel();
        client().get::<()>("/posts").enqueue(Expect(tx));
        assert!(rx.try_recv().unwrap());
    }
}
