//! Fetches posts on behalf of a screen and cancels when the screen closes.
//!
//! This example shows how to:
//! - Build a factory that dispatches callbacks on the main thread executor
//! - Bind a call to a lifecycle so destroying it cancels the request
//! - Read the status and body from the callback
//!
//! Run with: `cargo run --example fetch_posts`

use callx::{CallXAdapterFactory, Client, Error, Lifecycle, LifecycleEvent};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("callx=debug,fetch_posts=info")
        .init();

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .build()?;
    let factory = CallXAdapterFactory::new();

    println!("=== Screen open ===");
    let screen = Lifecycle::new();
    screen.emit(LifecycleEvent::Create);

    let (done, finished) = oneshot::channel();
    factory
        .adapt(client.get::<Vec<Post>>("/posts"))
        .then_in(&screen, move |outcome| {
            match outcome {
                Ok(response) => {
                    let posts = response.body().map_or(0, Vec::len);
                    println!("Status {} with {} posts", response.status, posts);
                }
                Err(e) => println!("Request failed: {}", e),
            }
            let _ = done.send(());
        });

    let _ = finished.await;

    println!("\n=== Screen closed before the response ===");
    let screen = Lifecycle::new();
    let (done, finished) = oneshot::channel();
    factory
        .adapt(client.get::<Vec<Post>>("/posts"))
        .then_in(&screen, move |outcome| {
            match outcome {
                Err(e) if e.is_canceled() => println!("Canceled as expected: {}", e),
                Err(e) => println!("Request failed: {}", e),
                Ok(response) => println!("Finished before the screen closed: {}", response.status),
            }
            let _ = done.send(());
        });

    screen.emit(LifecycleEvent::Destroy);
    let _ = tokio::time::timeout(Duration::from_secs(10), finished).await;

    Ok(())
}
