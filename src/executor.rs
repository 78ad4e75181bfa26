//! Executors that run completion callbacks.
//!
//! Callbacks never run on whatever task happened to finish the request;
//! they are posted to an [`Executor`]. The default is the process-wide
//! [`MainThreadExecutor`], a single thread that runs posted tasks in order.

use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// A unit of work posted to an executor.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs posted tasks.
///
/// Any `Fn(Task)` closure is an executor, which makes wrapping an existing
/// event loop a one-liner:
///
/// ```
/// use callx::executor::{Executor, Task};
///
/// let run_now = |task: Task| task();
/// run_now.execute(Box::new(|| println!("ran")));
/// ```
pub trait Executor: Send + Sync {
    /// Posts `task` for execution.
    fn execute(&self, task: Task);
}

impl<F> Executor for F
where
    F: Fn(Task) + Send + Sync,
{
    fn execute(&self, task: Task) {
        self(task)
    }
}

/// Runs tasks immediately on the posting thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, task: Task) {
        task()
    }
}

/// Runs each task as its own job on a tokio runtime.
///
/// Tasks are independent; there is no ordering between them.
#[derive(Debug, Clone)]
pub struct RuntimeExecutor {
    handle: Handle,
}

impl RuntimeExecutor {
    /// Uses the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Uses the runtime the caller is running on.
    ///
    /// Returns `None` outside a tokio runtime.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Executor for RuntimeExecutor {
    fn execute(&self, task: Task) {
        self.handle.spawn_blocking(task);
    }
}

/// Name of the dispatch thread behind [`MainThreadExecutor`].
pub const MAIN_THREAD_NAME: &str = "callx-main";

/// Posts tasks to a single dedicated dispatch thread.
///
/// Tasks run one at a time, in the order they were posted. A task that
/// panics is logged and the thread moves on to the next one. The thread
/// exits once every handle to the executor is dropped.
#[derive(Debug, Clone)]
pub struct MainThreadExecutor {
    sender: mpsc::UnboundedSender<Task>,
}

impl MainThreadExecutor {
    /// Starts a new dispatch thread.
    ///
    /// # Panics
    ///
    /// Panics if the operating system refuses to create the thread.
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Task>();

        std::thread::Builder::new()
            .name(MAIN_THREAD_NAME.to_string())
            .spawn(move || {
                while let Some(task) = receiver.blocking_recv() {
                    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                        tracing::warn!("Dispatched task panicked");
                    }
                }
                tracing::debug!("Main thread executor stopped");
            })
            .unwrap_or_else(|e| panic!("failed to spawn {MAIN_THREAD_NAME} thread: {e}"));

        Self { sender }
    }

    /// Returns the process-wide main thread executor, starting it on first use.
    pub fn shared() -> Self {
        static MAIN: OnceLock<MainThreadExecutor> = OnceLock::new();
        MAIN.get_or_init(MainThreadExecutor::new).clone()
    }
}

impl Default for MainThreadExecutor {
    fn default() -> Self {
        Self::shared()
    }
}

impl Executor for MainThreadExecutor {
    fn execute(&self, task: Task) {
        if self.sender.send(task).is_err() {
            tracing::warn!("Main thread executor is gone, dropping task");
        }
    }
}
