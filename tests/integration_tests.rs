//! Integration tests using wiremock to simulate HTTP servers.

use callx::executor::{InlineExecutor, Task, MAIN_THREAD_NAME};
use callx::{
    Call, CallXAdapterFactory, Callback, Client, Error, Lifecycle, LifecycleEvent,
    MainThreadExecutor, Response, Teardown,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct TestData {
    id: u32,
    name: String,
}

fn test_data() -> TestData {
    TestData {
        id: 1,
        name: "Test".to_string(),
    }
}

/// Counts teardown requests instead of releasing anything.
#[derive(Clone, Default)]
struct CountingTeardown(Arc<AtomicUsize>);

impl CountingTeardown {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl Teardown for CountingTeardown {
    fn teardown(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

async fn mock_get(server: &MockServer, route: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(server)
        .await;
}

fn client_for(server: &MockServer) -> Client {
    Client::builder()
        .base_url(server.uri())
        .unwrap()
        .build()
        .unwrap()
}

async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("callback did not fire in time")
        .expect("callback sender dropped without firing")
}

/// A factory whose executor holds tasks until the test runs them.
fn deferred_factory() -> (CallXAdapterFactory, mpsc::UnboundedReceiver<Task>) {
    let (task_tx, task_rx) = mpsc::unbounded_channel::<Task>();
    let factory = CallXAdapterFactory::with_executor(move |task: Task| {
        let _ = task_tx.send(task);
    });
    (factory, task_rx)
}

#[tokio::test]
async fn test_execute_returns_typed_body() {
    let mock_server = MockServer::start().await;
    mock_get(
        &mock_server,
        "/test",
        ResponseTemplate::new(200).set_body_json(test_data()),
    )
    .await;

    let client = client_for(&mock_server);
    let response = client.get::<TestData>("/test").execute().await.unwrap();

    assert_eq!(response.body(), Some(&test_data()));
    assert_eq!(response.status.as_u16(), 200);
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let mock_server = MockServer::start().await;
    let request_data = TestData {
        id: 0,
        name: "New".to_string(),
    };

    Mock::given(method("POST"))
        .and(path("/test"))
        .and(body_json(&request_data))
        .respond_with(ResponseTemplate::new(201).set_body_json(test_data()))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let response = client
        .post::<_, TestData>("/test", &request_data)
        .unwrap()
        .execute()
        .await
        .unwrap();

    assert_eq!(response.status.as_u16(), 201);
    assert_eq!(response.into_body(), Some(test_data()));
}

#[tokio::test]
async fn test_second_execute_fails_but_clone_runs() {
    let mock_server = MockServer::start().await;
    mock_get(
        &mock_server,
        "/test",
        ResponseTemplate::new(200).set_body_json(test_data()),
    )
    .await;

    let client = client_for(&mock_server);
    let call = client.get::<TestData>("/test");

    assert!(call.execute().await.is_ok());
    assert!(matches!(call.execute().await, Err(Error::AlreadyExecuted)));
    assert!(call.clone().execute().await.is_ok());
}

#[tokio::test]
async fn test_http_error_passes_through_without_body() {
    let mock_server = MockServer::start().await;
    mock_get(
        &mock_server,
        "/test",
        ResponseTemplate::new(404).set_body_string("Not found"),
    )
    .await;

    let client = client_for(&mock_server);
    let response = client.get::<TestData>("/test").execute().await.unwrap();

    assert!(!response.is_success());
    assert_eq!(response.body(), None);
    assert_eq!(response.raw_body, "Not found");

    let err = response.error_for_status().unwrap_err();
    assert_eq!(err.status().unwrap().as_u16(), 404);
    assert_eq!(err.raw_response(), Some("Not found"));
}

#[tokio::test]
async fn test_deserialization_failure_keeps_raw_body() {
    let mock_server = MockServer::start().await;
    mock_get(
        &mock_server,
        "/test",
        ResponseTemplate::new(200).set_body_string("{\"invalid\": \"data\"}"),
    )
    .await;

    let client = client_for(&mock_server);
    let result = client.get::<TestData>("/test").execute().await;

    match result {
        Err(Error::DeserializationFailed { raw_response, .. }) => {
            assert_eq!(raw_response, "{\"invalid\": \"data\"}");
        }
        other => panic!("Expected DeserializationFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_request_timeout() {
    let mock_server = MockServer::start().await;
    mock_get(
        &mock_server,
        "/slow",
        ResponseTemplate::new(200)
            .set_body_json(test_data())
            .set_delay(Duration::from_secs(2)),
    )
    .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();

    let result = client.get::<TestData>("/slow").execute().await;
    assert!(matches!(result, Err(Error::Timeout)));
}

#[tokio::test]
async fn test_success_fires_once_without_teardown() {
    let mock_server = MockServer::start().await;
    mock_get(
        &mock_server,
        "/test",
        ResponseTemplate::new(200).set_body_json(test_data()),
    )
    .await;

    let client = client_for(&mock_server);
    let teardown = CountingTeardown::default();
    let factory = CallXAdapterFactory::with_client_and_executor(teardown.clone(), InlineExecutor);

    let successes = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let (s, f) = (successes.clone(), failures.clone());
    factory.adapt(client.get::<TestData>("/test")).then_split(
        move |response| {
            s.fetch_add(1, Ordering::SeqCst);
            tx.send(response.into_body()).unwrap();
        },
        move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        },
    );

    assert_eq!(recv(&mut rx).await, Some(test_data()));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert_eq!(failures.load(Ordering::SeqCst), 0);
    assert_eq!(teardown.count(), 0);
}

#[tokio::test]
async fn test_cancel_before_completion_reports_canceled_once() {
    let mock_server = MockServer::start().await;
    mock_get(
        &mock_server,
        "/slow",
        ResponseTemplate::new(200)
            .set_body_json(test_data())
            .set_delay(Duration::from_secs(2)),
    )
    .await;

    let client = client_for(&mock_server);
    let factory = CallXAdapterFactory::with_executor(InlineExecutor);
    let call = factory.adapt(client.get::<TestData>("/slow"));

    let successes = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let s = successes.clone();
    call.then_split(
        move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        },
        move |error| tx.send(error).unwrap(),
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    call.cancel();

    let error = recv(&mut rx).await;
    assert!(error.is_canceled());
    assert_eq!(error.to_string(), "GET /slow Canceled");
    assert!(rx.try_recv().is_err());
    assert_eq!(successes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancel_before_start_reports_canceled() {
    let mock_server = MockServer::start().await;
    mock_get(
        &mock_server,
        "/test",
        ResponseTemplate::new(200).set_body_json(test_data()),
    )
    .await;

    let client = client_for(&mock_server);
    let factory = CallXAdapterFactory::with_executor(InlineExecutor);
    let call = factory.adapt(client.get::<TestData>("/test"));
    let (tx, mut rx) = mpsc::unbounded_channel();

    call.then(move |outcome| tx.send(outcome.map(|r| r.status)).unwrap());
    call.cancel();

    let outcome = recv(&mut rx).await;
    assert!(matches!(outcome, Err(ref e) if e.is_canceled()));
}

#[tokio::test]
async fn test_teardown_by_flag() {
    let mock_server = MockServer::start().await;
    mock_get(
        &mock_server,
        "/test",
        ResponseTemplate::new(200).set_body_json(test_data()),
    )
    .await;

    let client = client_for(&mock_server);

    for (flag, expected) in [(true, 1), (false, 0)] {
        let teardown = CountingTeardown::default();
        let factory =
            CallXAdapterFactory::with_client_and_executor(teardown.clone(), InlineExecutor);
        let (tx, mut rx) = mpsc::unbounded_channel();

        factory
            .adapt(client.get::<TestData>("/test"))
            .body_with(flag, move |body| tx.send(body.is_ok()).unwrap());

        assert!(recv(&mut rx).await);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(teardown.count(), expected, "teardown flag {}", flag);
    }
}

#[tokio::test]
async fn test_teardown_by_callback_return_value() {
    let mock_server = MockServer::start().await;
    mock_get(
        &mock_server,
        "/test",
        ResponseTemplate::new(200).set_body_json(test_data()),
    )
    .await;

    let client = client_for(&mock_server);
    let teardown = CountingTeardown::default();
    let factory = CallXAdapterFactory::with_client_and_executor(teardown.clone(), InlineExecutor);
    let (tx, mut rx) = mpsc::unbounded_channel();

    factory
        .adapt(client.get::<TestData>("/test"))
        .on_complete(move |outcome| {
            let ok = outcome.is_ok();
            tx.send(()).unwrap();
            ok
        });

    recv(&mut rx).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(teardown.count(), 1);
}

#[tokio::test]
async fn test_atomic_failure_still_tears_down() {
    let mock_server = MockServer::start().await;
    let client = client_for(&mock_server);
    // Release the pool first so the call fails without a network round trip.
    client.shutdown();

    let teardown = CountingTeardown::default();
    let factory = CallXAdapterFactory::with_client_and_executor(teardown.clone(), InlineExecutor);
    let (tx, mut rx) = mpsc::unbounded_channel();

    factory
        .adapt(client.get::<TestData>("/test"))
        .atomic_split(|_| {}, move |error| tx.send(error).unwrap());

    assert!(matches!(recv(&mut rx).await, Error::ClientShutdown));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(teardown.count(), 1);
}

#[tokio::test]
async fn test_atomic_shuts_client_down() {
    let mock_server = MockServer::start().await;
    mock_get(
        &mock_server,
        "/test",
        ResponseTemplate::new(200).set_body_json(test_data()),
    )
    .await;

    let client = client_for(&mock_server);
    let factory = CallXAdapterFactory::with_client_and_executor(client.clone(), InlineExecutor);
    let (tx, mut rx) = mpsc::unbounded_channel();

    factory
        .adapt(client.get::<TestData>("/test"))
        .atomic_body(move |body| tx.send(body.unwrap()).unwrap());

    assert_eq!(recv(&mut rx).await, Some(test_data()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(client.is_shutdown());

    let after = client.get::<TestData>("/test").execute().await;
    assert!(matches!(after, Err(Error::ClientShutdown)));
}

#[tokio::test]
async fn test_lifecycle_destroy_cancels_pending_call() {
    let mock_server = MockServer::start().await;
    mock_get(
        &mock_server,
        "/slow",
        ResponseTemplate::new(200)
            .set_body_json(test_data())
            .set_delay(Duration::from_secs(2)),
    )
    .await;

    let client = client_for(&mock_server);
    let factory = CallXAdapterFactory::with_executor(InlineExecutor);
    let lifecycle = Lifecycle::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let call = factory.adapt(client.get::<TestData>("/slow"));
    call.then_in(&lifecycle, move |outcome| tx.send(outcome.is_err()).unwrap());

    lifecycle.emit(LifecycleEvent::Create);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!call.is_canceled());

    lifecycle.emit(LifecycleEvent::Destroy);
    lifecycle.emit(LifecycleEvent::Destroy);

    assert!(recv(&mut rx).await);
    assert!(call.is_canceled());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_bind_to_destroyed_lifecycle_cancels_immediately() {
    let mock_server = MockServer::start().await;
    let client = client_for(&mock_server);
    let factory = CallXAdapterFactory::with_executor(InlineExecutor);

    let lifecycle = Lifecycle::new();
    lifecycle.emit(LifecycleEvent::Destroy);

    let call = factory
        .adapt(client.get::<TestData>("/test"))
        .bind(&lifecycle);
    assert!(call.is_canceled());
}

#[tokio::test]
async fn test_missing_body_uses_default() {
    let mock_server = MockServer::start().await;
    mock_get(&mock_server, "/empty", ResponseTemplate::new(204)).await;
    mock_get(
        &mock_server,
        "/null",
        ResponseTemplate::new(200).set_body_string("null"),
    )
    .await;

    let client = client_for(&mock_server);
    let factory = CallXAdapterFactory::with_executor(InlineExecutor);

    for route in ["/empty", "/null"] {
        let defaults = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let counter = defaults.clone();
        factory.adapt(client.get::<TestData>(route)).then_body_or(
            move |data| tx.send(data).unwrap(),
            |error| panic!("unexpected failure: {}", error),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                TestData {
                    id: 0,
                    name: "default".to_string(),
                }
            },
        );

        assert_eq!(recv(&mut rx).await.name, "default");
        assert_eq!(defaults.load(Ordering::SeqCst), 1, "route {}", route);
    }
}

#[tokio::test]
async fn test_present_body_skips_default() {
    let mock_server = MockServer::start().await;
    mock_get(
        &mock_server,
        "/test",
        ResponseTemplate::new(200).set_body_json(test_data()),
    )
    .await;

    let client = client_for(&mock_server);
    let factory = CallXAdapterFactory::with_executor(InlineExecutor);
    let (tx, mut rx) = mpsc::unbounded_channel();

    factory.adapt(client.get::<TestData>("/test")).then_body_or(
        move |data| tx.send(data).unwrap(),
        |error| panic!("unexpected failure: {}", error),
        || panic!("default should not be used"),
    );

    assert_eq!(recv(&mut rx).await, test_data());
}

#[tokio::test]
async fn test_main_thread_dispatch() {
    let mock_server = MockServer::start().await;
    mock_get(
        &mock_server,
        "/test",
        ResponseTemplate::new(200).set_body_json(test_data()),
    )
    .await;

    let client = client_for(&mock_server);
    let factory = CallXAdapterFactory::with_client_and_executor(
        CountingTeardown::default(),
        MainThreadExecutor::new(),
    );
    let (tx, mut rx) = mpsc::unbounded_channel();

    factory.adapt(client.get::<TestData>("/test")).then(move |outcome| {
        let thread = std::thread::current().name().map(str::to_string);
        tx.send((outcome.is_ok(), thread)).unwrap();
    });

    let (ok, thread) = recv(&mut rx).await;
    assert!(ok);
    assert_eq!(thread.as_deref(), Some(MAIN_THREAD_NAME));
}

#[tokio::test]
async fn test_default_factory_dispatches_on_shared_main_thread() {
    let mock_server = MockServer::start().await;
    mock_get(
        &mock_server,
        "/test",
        ResponseTemplate::new(200).set_body_json(test_data()),
    )
    .await;

    let client = client_for(&mock_server);
    let (tx, mut rx) = mpsc::unbounded_channel();

    CallXAdapterFactory::new()
        .adapt(client.get::<TestData>("/test"))
        .then_body(move |body| {
            let thread = std::thread::current().name().map(str::to_string);
            tx.send((body.unwrap(), thread)).unwrap();
        });

    let (body, thread) = recv(&mut rx).await;
    assert_eq!(body, Some(test_data()));
    assert_eq!(thread.as_deref(), Some(MAIN_THREAD_NAME));
}

#[tokio::test]
async fn test_enqueue_with_callback_trait() {
    struct Forward(mpsc::UnboundedSender<Result<u16, String>>);

    impl Callback<TestData> for Forward {
        fn on_response(self, call: &Call<TestData>, response: Response<Option<TestData>>) {
            assert!(call.is_executed());
            self.0.send(Ok(response.status.as_u16())).unwrap();
        }

        fn on_failure(self, _call: &Call<TestData>, error: Error) {
            self.0.send(Err(error.to_string())).unwrap();
        }
    }

    let mock_server = MockServer::start().await;
    mock_get(
        &mock_server,
        "/test",
        ResponseTemplate::new(200).set_body_json(test_data()),
    )
    .await;

    let client = client_for(&mock_server);
    let factory = CallXAdapterFactory::with_executor(InlineExecutor);
    let (tx, mut rx) = mpsc::unbounded_channel();

    factory
        .adapt(client.get::<TestData>("/test"))
        .enqueue(Forward(tx));

    assert_eq!(recv(&mut rx).await, Ok(200));
}

#[tokio::test]
async fn test_cancel_while_outcome_queued_reports_canceled() {
    let mock_server = MockServer::start().await;
    mock_get(
        &mock_server,
        "/test",
        ResponseTemplate::new(200).set_body_json(test_data()),
    )
    .await;

    let client = client_for(&mock_server);
    let (factory, mut tasks) = deferred_factory();
    let call = factory.adapt(client.get::<TestData>("/test"));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let tx_failure = tx.clone();
    call.then_split(
        move |_| tx.send("success").unwrap(),
        move |error| {
            assert!(error.is_canceled());
            tx_failure.send("canceled").unwrap();
        },
    );

    // The response is in and its callback is queued, but has not run.
    let dispatch = recv(&mut tasks).await;
    assert!(!call.is_canceled());
    call.cancel();
    dispatch();

    assert_eq!(recv(&mut rx).await, "canceled");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_enqueue_with_relays_raw_response_after_cancel() {
    let mock_server = MockServer::start().await;
    mock_get(
        &mock_server,
        "/test",
        ResponseTemplate::new(500).set_body_string("Server error"),
    )
    .await;

    let client = client_for(&mock_server);
    let (factory, mut tasks) = deferred_factory();
    let call = factory.adapt(client.get::<TestData>("/test"));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let tx_failure = tx.clone();

    call.enqueue_with(
        move |call, response| {
            tx.send((call.request().to_string(), Some(response.status.as_u16())))
                .unwrap()
        },
        move |call, _error| {
            tx_failure
                .send((call.request().to_string(), None))
                .unwrap()
        },
    );

    let relay = recv(&mut tasks).await;
    call.cancel();
    relay();

    let (request, status) = recv(&mut rx).await;
    assert_eq!(request, "GET /test");
    assert_eq!(status, Some(500));
}
