//! Closure-based callbacks on top of [`Call`].
//!
//! [`CallX`] keeps the execute/cancel/clone contract of the call it wraps
//! and adds one registration primitive, [`CallX::on_complete`]. Every other
//! registration method is a thin shape around it.
//!
//! # Dispatch
//!
//! Callbacks run on the executor of the [`CallXAdapterFactory`](crate::CallXAdapterFactory)
//! that produced the handle. Once the callback returns, the factory's
//! teardown resource is released if the callback asked for it.
//!
//! # Cancellation
//!
//! A call canceled before its callback runs on the executor reports
//! [`Error::Canceled`] on the failure path, even when a response had
//! already arrived.

use crate::call::Callback;
use crate::executor::Executor;
use crate::lifecycle::{Lifecycle, LifecycleEvent};
use crate::metadata::RequestMetadata;
use crate::teardown::Teardown;
use crate::{Call, Error, Response, Result};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// What a completion callback receives.
pub type Outcome<T> = Result<Response<Option<T>>>;

/// A call handle with closure-based callback registration.
///
/// Created by [`CallXAdapterFactory::adapt`](crate::CallXAdapterFactory::adapt).
pub struct CallX<T> {
    call: Call<T>,
    executor: Arc<dyn Executor>,
    teardown: Option<Arc<dyn Teardown>>,
}

impl<T> CallX<T> {
    pub(crate) fn new(
        call: Call<T>,
        executor: Arc<dyn Executor>,
        teardown: Option<Arc<dyn Teardown>>,
    ) -> Self {
        Self {
            call,
            executor,
            teardown,
        }
    }

    /// The wrapped call.
    pub fn call(&self) -> &Call<T> {
        &self.call
    }

    /// The request the wrapped call sends.
    pub fn request(&self) -> &RequestMetadata {
        self.call.request()
    }

    /// The timeout the wrapped call runs under, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.call.timeout()
    }

    /// Cancels the wrapped call. Safe from any thread, any number of times.
    pub fn cancel(&self) {
        self.call.cancel()
    }

    /// Returns `true` once the call has been canceled.
    pub fn is_canceled(&self) -> bool {
        self.call.is_canceled()
    }

    /// Returns `true` once the call has been executed or enqueued.
    pub fn is_executed(&self) -> bool {
        self.call.is_executed()
    }

    /// Cancels this call when `lifecycle` is destroyed.
    ///
    /// A lifecycle that is already destroyed cancels the call right away.
    pub fn bind(self, lifecycle: &Lifecycle) -> Self
    where
        T: 'static,
    {
        self.cancel_on_destroy(lifecycle);
        self
    }

    fn cancel_on_destroy(&self, lifecycle: &Lifecycle)
    where
        T: 'static,
    {
        let call = self.call.share();
        lifecycle.do_on_event(LifecycleEvent::Destroy, move || call.cancel());

        if lifecycle.is_destroyed() {
            self.call.cancel();
        }
    }
}

impl<T> CallX<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Sends the request and waits for the response, like [`Call::execute`].
    pub async fn execute(&self) -> Outcome<T> {
        self.call.execute().await
    }

    /// Enqueues the wrapped call with a [`Callback`] implementation.
    ///
    /// The enqueue itself is posted to the executor. The callback is
    /// invoked wherever the call completes.
    pub fn enqueue<C>(&self, callback: C)
    where
        C: Callback<T>,
    {
        let Ok(handle) = Handle::try_current() else {
            return callback.on_failure(&self.call, Error::NoRuntime);
        };

        let call = self.call.share();
        self.executor
            .execute(Box::new(move || call.enqueue_on(&handle, callback)));
    }

    /// Registers `callback` for the outcome of this call and starts it.
    ///
    /// `callback` runs exactly once, on the dispatch executor. Returning
    /// `true` asks for the factory's teardown resource to be released right
    /// after; without a teardown resource the flag is ignored.
    ///
    /// When the factory holds a teardown resource, starting the request is
    /// itself posted to the executor, on the runtime that was current at
    /// registration. If that runtime shuts down before the executor gets to
    /// the posted task, the request never starts and `callback` is dropped
    /// without running.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use callx::{CallXAdapterFactory, Client};
    ///
    /// # async fn example() -> Result<(), callx::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://jsonplaceholder.typicode.com")?
    ///     .build()?;
    /// let factory = CallXAdapterFactory::with_client(client.clone());
    ///
    /// factory
    ///     .adapt(client.get::<serde_json::Value>("/posts"))
    ///     .on_complete(|outcome| {
    ///         match &outcome {
    ///             Ok(response) => println!("{}", response.status),
    ///             Err(e) => eprintln!("{}", e),
    ///         }
    ///         // Last request of the program: release the pool.
    ///         true
    ///     });
    /// # Ok(())
    /// # }
    /// ```
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(Outcome<T>) -> bool + Send + 'static,
    {
        let dispatch = Dispatch {
            executor: self.executor.clone(),
            teardown: self.teardown.clone(),
            callback,
        };

        let Ok(handle) = Handle::try_current() else {
            return dispatch.on_failure(&self.call, Error::NoRuntime);
        };

        if self.teardown.is_some() {
            let call = self.call.share();
            self.executor
                .execute(Box::new(move || call.enqueue_on(&handle, dispatch)));
        } else {
            self.call.enqueue_on(&handle, dispatch);
        }
    }

    /// Like [`CallX::on_complete`] with a fixed teardown decision.
    pub fn on_complete_with<F>(&self, teardown: bool, callback: F)
    where
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        self.on_complete(move |outcome| {
            callback(outcome);
            teardown
        });
    }

    /// Always tears down after `callback`.
    pub fn atomic<F>(&self, callback: F)
    where
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        self.on_complete_with(true, callback);
    }

    /// Never tears down after `callback`.
    pub fn then<F>(&self, callback: F)
    where
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        self.on_complete_with(false, callback);
    }

    /// [`CallX::then`] (never tears down), canceling the call when `lifecycle` is destroyed.
    pub fn then_in<F>(&self, lifecycle: &Lifecycle, callback: F)
    where
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        self.cancel_on_destroy(lifecycle);
        self.then(callback);
    }

    /// Hands `callback` only the body. Tears down when `teardown` is `true`.
    pub fn body_with<F>(&self, teardown: bool, callback: F)
    where
        F: FnOnce(Result<Option<T>>) + Send + 'static,
    {
        self.on_complete_with(teardown, move |outcome| {
            callback(outcome.map(Response::into_body))
        });
    }

    /// Body only, never tears down.
    pub fn then_body<F>(&self, callback: F)
    where
        F: FnOnce(Result<Option<T>>) + Send + 'static,
    {
        self.body_with(false, callback);
    }

    /// Body only, always tears down.
    pub fn atomic_body<F>(&self, callback: F)
    where
        F: FnOnce(Result<Option<T>>) + Send + 'static,
    {
        self.body_with(true, callback);
    }

    /// [`CallX::then_body`] (never tears down), canceling the call when `lifecycle` is destroyed.
    pub fn then_body_in<F>(&self, lifecycle: &Lifecycle, callback: F)
    where
        F: FnOnce(Result<Option<T>>) + Send + 'static,
    {
        self.cancel_on_destroy(lifecycle);
        self.then_body(callback);
    }

    /// Separate success and failure closures. Tears down when `teardown`
    /// is `true`.
    pub fn split_with<S, E>(&self, teardown: bool, on_success: S, on_failure: E)
    where
        S: FnOnce(Response<Option<T>>) + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
    {
        self.on_complete_with(teardown, move |outcome| match outcome {
            Ok(response) => on_success(response),
            Err(error) => on_failure(error),
        });
    }

    /// Separate closures, always tears down.
    pub fn atomic_split<S, E>(&self, on_success: S, on_failure: E)
    where
        S: FnOnce(Response<Option<T>>) + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
    {
        self.split_with(true, on_success, on_failure);
    }

    /// Separate closures, never tears down.
    pub fn then_split<S, E>(&self, on_success: S, on_failure: E)
    where
        S: FnOnce(Response<Option<T>>) + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
    {
        self.split_with(false, on_success, on_failure);
    }

    /// Separate closures, with the success side seeing only the body.
    /// Tears down when `teardown` is `true`.
    pub fn body_split_with<S, E>(&self, teardown: bool, on_success: S, on_failure: E)
    where
        S: FnOnce(Option<T>) + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
    {
        self.split_with(
            teardown,
            move |response| on_success(response.into_body()),
            on_failure,
        );
    }

    /// Separate closures over the body, never tears down.
    pub fn then_body_split<S, E>(&self, on_success: S, on_failure: E)
    where
        S: FnOnce(Option<T>) + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
    {
        self.body_split_with(false, on_success, on_failure);
    }

    /// Like [`CallX::then_body_split`], with a missing body replaced by
    /// `default()`. Never tears down.
    pub fn then_body_or<S, E, D>(&self, on_success: S, on_failure: E, default: D)
    where
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
        D: FnOnce() -> T + Send + 'static,
    {
        self.then_body_split(move |body| on_success(body.unwrap_or_else(default)), on_failure);
    }

    /// Closures that also receive the call, dispatched on the executor.
    ///
    /// Unlike the other registrations, the outcome is passed on as the call
    /// reported it, with no cancellation check and no teardown.
    pub fn enqueue_with<R, E>(&self, on_response: R, on_failure: E)
    where
        R: FnOnce(&Call<T>, Response<Option<T>>) + Send + 'static,
        E: FnOnce(&Call<T>, Error) + Send + 'static,
    {
        let relay = Relay {
            executor: self.executor.clone(),
            on_response,
            on_failure,
        };

        match Handle::try_current() {
            Ok(handle) => self.call.enqueue_on(&handle, relay),
            Err(_) => relay.on_failure(&self.call, Error::NoRuntime),
        }
    }
}

/// A fresh, unexecuted call on the same executor and teardown resource.
impl<T> Clone for CallX<T> {
    fn clone(&self) -> Self {
        Self::new(
            self.call.clone(),
            self.executor.clone(),
            self.teardown.clone(),
        )
    }
}

impl<T> fmt::Debug for CallX<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallX")
            .field("call", &self.call)
            .field("teardown", &self.teardown.is_some())
            .finish_non_exhaustive()
    }
}

/// Posts the outcome to the executor, then tears down if asked to.
struct Dispatch<F> {
    executor: Arc<dyn Executor>,
    teardown: Option<Arc<dyn Teardown>>,
    callback: F,
}

impl<F> Dispatch<F> {
    /// The canceled check runs on the executor, right before `callback`.
    fn deliver<T>(self, call: Call<T>, outcome: Outcome<T>)
    where
        F: FnOnce(Outcome<T>) -> bool + Send + 'static,
        T: Send + 'static,
    {
        let Dispatch {
            executor,
            teardown,
            callback,
        } = self;

        tracing::debug!(request = %call.request(), success = outcome.is_ok(), "Dispatching call outcome");

        executor.execute(Box::new(move || {
            let outcome = match outcome {
                Ok(_) if call.is_canceled() => {
                    tracing::warn!(request = %call.request(), "Response arrived for canceled call");
                    Err(Error::canceled(call.request()))
                }
                outcome => outcome,
            };

            if !callback(outcome) {
                return;
            }
            if let Some(teardown) = teardown {
                tracing::info!("Tearing down client after callback");
                teardown.teardown();
            }
        }));
    }
}

impl<T, F> Callback<T> for Dispatch<F>
where
    T: Send + 'static,
    F: FnOnce(Outcome<T>) -> bool + Send + 'static,
{
    fn on_response(self, call: &Call<T>, response: Response<Option<T>>) {
        self.deliver(call.share(), Ok(response));
    }

    fn on_failure(self, call: &Call<T>, error: Error) {
        self.deliver(call.share(), Err(error));
    }
}

/// Posts raw call outcomes to the executor.
struct Relay<R, E> {
    executor: Arc<dyn Executor>,
    on_response: R,
    on_failure: E,
}

impl<T, R, E> Callback<T> for Relay<R, E>
where
    T: Send + 'static,
    R: FnOnce(&Call<T>, Response<Option<T>>) + Send + 'static,
    E: FnOnce(&Call<T>, Error) + Send + 'static,
{
    fn on_response(self, call: &Call<T>, response: Response<Option<T>>) {
        let call = call.share();
        let on_response = self.on_response;
        self.executor
            .execute(Box::new(move || on_response(&call, response)));
    }

    fn on_failure(self, call: &Call<T>, error: Error) {
        let call = call.share();
        let on_failure = self.on_failure;
        self.executor
            .execute(Box::new(move || on_failure(&call, error)));
    }
}
