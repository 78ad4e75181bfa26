//! Adapters that turn native [`Call`]s into the handle type a caller wants.
//!
//! The output type of a [`CallAdapter`] decides what a call becomes:
//! [`CallXAdapterFactory`] produces [`CallX`] handles, while
//! [`DirectCallAdapter`] leaves the call as it is.

use crate::executor::{Executor, MainThreadExecutor};
use crate::teardown::Teardown;
use crate::{Call, CallX};
use std::fmt;
use std::sync::Arc;

/// Converts a native call into another handle type.
pub trait CallAdapter<T> {
    /// The handle type produced.
    type Output;

    fn adapt(&self, call: Call<T>) -> Self::Output;
}

/// Passes calls through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectCallAdapter;

impl<T> CallAdapter<T> for DirectCallAdapter {
    type Output = Call<T>;

    fn adapt(&self, call: Call<T>) -> Call<T> {
        call
    }
}

/// Produces [`CallX`] handles bound to a dispatch executor and, optionally,
/// a resource to tear down after callbacks that ask for it.
///
/// # Examples
///
/// ```no_run
/// use callx::{CallXAdapterFactory, Client};
/// use callx::executor::InlineExecutor;
///
/// # async fn example() -> Result<(), callx::Error> {
/// let client = Client::builder()
///     .base_url("https://jsonplaceholder.typicode.com")?
///     .build()?;
///
/// let factory = CallXAdapterFactory::with_client_and_executor(client.clone(), InlineExecutor);
/// let call = factory.adapt(client.get::<serde_json::Value>("/posts/1"));
///
/// // Prints the status, then shuts the client down.
/// call.atomic(|outcome| match outcome {
///     Ok(response) => println!("{}", response.status),
///     Err(e) => eprintln!("{}", e),
/// });
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CallXAdapterFactory {
    teardown: Option<Arc<dyn Teardown>>,
    executor: Arc<dyn Executor>,
}

impl CallXAdapterFactory {
    /// Dispatches on the shared [`MainThreadExecutor`] and never tears down.
    pub fn new() -> Self {
        Self {
            teardown: None,
            executor: Arc::new(MainThreadExecutor::shared()),
        }
    }

    /// Dispatches on the shared [`MainThreadExecutor`] and tears down
    /// `client` when a callback asks for it.
    pub fn with_client(client: impl Teardown + 'static) -> Self {
        Self {
            teardown: Some(Arc::new(client)),
            executor: Arc::new(MainThreadExecutor::shared()),
        }
    }

    /// Dispatches on `executor` and tears down `client` when a callback
    /// asks for it.
    pub fn with_client_and_executor(
        client: impl Teardown + 'static,
        executor: impl Executor + 'static,
    ) -> Self {
        Self {
            teardown: Some(Arc::new(client)),
            executor: Arc::new(executor),
        }
    }

    /// Dispatches on `executor` and never tears down.
    pub fn with_executor(executor: impl Executor + 'static) -> Self {
        Self {
            teardown: None,
            executor: Arc::new(executor),
        }
    }

    /// Wraps `call`.
    pub fn adapt<T>(&self, call: Call<T>) -> CallX<T> {
        CallX::new(call, self.executor.clone(), self.teardown.clone())
    }
}

impl Default for CallXAdapterFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CallAdapter<T> for CallXAdapterFactory {
    type Output = CallX<T>;

    fn adapt(&self, call: Call<T>) -> CallX<T> {
        CallXAdapterFactory::adapt(self, call)
    }
}

impl fmt::Debug for CallXAdapterFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallXAdapterFactory")
            .field("teardown", &self.teardown.is_some())
            .finish_non_exhaustive()
    }
}
