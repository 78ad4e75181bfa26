//! # callx - closure callbacks for HTTP calls
//!
//! callx wraps single-use HTTP [`Call`] handles in [`CallX`], which takes
//! plain closures for success and failure instead of a callback trait
//! implementation. Completion callbacks run on a chosen [`Executor`], calls
//! can be tied to a [`Lifecycle`] so they are canceled when it is
//! destroyed, and a callback can ask for the shared [`Client`] to be torn
//! down once it has run.
//!
//! ## Quick Start
//!
//! ```no_run
//! use callx::{CallXAdapterFactory, Client, Lifecycle, LifecycleEvent};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Post {
//!     id: u64,
//!     title: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), callx::Error> {
//!     let client = Client::builder()
//!         .base_url("https://jsonplaceholder.typicode.com")?
//!         .build()?;
//!
//!     // Callbacks run on the shared main thread executor.
//!     let factory = CallXAdapterFactory::with_client(client.clone());
//!     let screen = Lifecycle::new();
//!
//!     factory
//!         .adapt(client.get::<Vec<Post>>("/posts"))
//!         .then_in(&screen, |outcome| match outcome {
//!             Ok(response) => println!("Got {} posts", response.body().map_or(0, Vec::len)),
//!             Err(e) if e.is_canceled() => println!("Screen closed first"),
//!             Err(e) => eprintln!("Request failed: {}", e),
//!         });
//!
//!     // Closing the screen cancels the request if it is still running.
//!     screen.emit(LifecycleEvent::Destroy);
//!     Ok(())
//! }
//! ```
//!
//! ## Callback shapes
//!
//! All registration methods on [`CallX`] funnel into
//! [`CallX::on_complete`], whose closure returns whether to tear down the
//! client. The other shapes fix that decision (`then*` never, `atomic*`
//! always, `*_with` by argument), narrow the outcome to the body
//! (`*body*`), or split success and failure into two closures (`*split*`).
//!
//! ## Logging
//!
//! callx logs through `tracing` and never installs a subscriber. Request
//! execution and dispatch log at `debug`, responses and teardown at `info`,
//! cancellations and 5xx responses at `warn`, 4xx responses and
//! deserialization failures at `error`.

pub mod adapter;
pub mod call;
pub mod callx;
pub mod client;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod metadata;
pub mod response;
pub mod teardown;

pub use adapter::{CallAdapter, CallXAdapterFactory, DirectCallAdapter};
pub use call::{Call, Callback};
pub use callx::{CallX, Outcome};
pub use client::{Client, ClientBuilder};
pub use error::{Error, Result};
pub use executor::{Executor, MainThreadExecutor};
pub use lifecycle::{Lifecycle, LifecycleEvent};
pub use metadata::RequestMetadata;
pub use response::Response;
pub use teardown::Teardown;
