//! A one-shot console program that releases the client after its only call.
//!
//! This example shows how to:
//! - Dispatch callbacks on the runtime instead of the main thread executor
//! - Use `atomic_split` so the client is torn down after the callback
//! - Decide teardown from inside the callback with `on_complete`
//!
//! Run with: `cargo run --example atomic_call`

use callx::executor::RuntimeExecutor;
use callx::{CallXAdapterFactory, Client, Error};
use serde::Deserialize;
use tokio::sync::oneshot;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Todo {
    id: u32,
    title: String,
    completed: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("callx=debug,atomic_call=info")
        .init();

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .build()?;

    let executor = RuntimeExecutor::current()
        .ok_or_else(|| Error::ConfigurationError("no tokio runtime".to_string()))?;
    let factory = CallXAdapterFactory::with_client_and_executor(client.clone(), executor);

    println!("=== Keep the client when the todo is open ===");
    let (done, finished) = oneshot::channel();
    factory
        .adapt(client.get::<Todo>("/todos/1"))
        .on_complete(move |outcome| {
            let keep = match &outcome {
                Ok(response) => response.body().is_some_and(|todo| !todo.completed),
                Err(_) => false,
            };
            println!("Keeping client: {}", keep);
            let _ = done.send(());
            !keep
        });
    let _ = finished.await;

    // If the first callback released the client, this call reports
    // ClientShutdown on its failure path.
    println!("\n=== Last call, then release ===");
    let (done, finished) = oneshot::channel();
    factory.adapt(client.get::<Todo>("/todos/2")).atomic_split(
        move |response| {
            println!("Todo: {:?}", response.body());
            let _ = done.send(());
        },
        |error| eprintln!("Request failed: {}", error),
    );
    // On failure the sender is dropped unused, which also ends the wait.
    let _ = finished.await;

    // Teardown runs right after the callback on the same executor.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    println!("Client shut down: {}", client.is_shutdown());

    Ok(())
}
