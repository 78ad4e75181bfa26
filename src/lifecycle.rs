//! Component lifecycles that calls can be bound to.
//!
//! A [`Lifecycle`] is a cancellation context with named events. Calls bound
//! to it through [`CallX::bind`](crate::CallX::bind) are canceled when the
//! lifecycle emits [`LifecycleEvent::Destroy`].

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

/// Events a lifecycle moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Create,
    Start,
    Resume,
    Pause,
    Stop,
    /// Terminal. Cancels every bound call.
    Destroy,
}

type Observer = Arc<dyn Fn(LifecycleEvent) + Send + Sync>;

/// A shareable lifecycle. Clones observe and emit on the same lifecycle.
///
/// # Examples
///
/// ```
/// use callx::{Lifecycle, LifecycleEvent};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let lifecycle = Lifecycle::new();
/// let stops = Arc::new(AtomicUsize::new(0));
///
/// let counter = stops.clone();
/// lifecycle.do_on_event(LifecycleEvent::Stop, move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// lifecycle.emit(LifecycleEvent::Start);
/// lifecycle.emit(LifecycleEvent::Stop);
/// lifecycle.emit(LifecycleEvent::Destroy);
///
/// assert_eq!(stops.load(Ordering::SeqCst), 1);
/// assert!(lifecycle.is_destroyed());
/// ```
#[derive(Clone)]
pub struct Lifecycle {
    inner: Arc<LifecycleInner>,
}

struct LifecycleInner {
    observers: Mutex<Vec<Observer>>,
    destroyed: watch::Sender<bool>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (destroyed, _) = watch::channel(false);
        Self {
            inner: Arc::new(LifecycleInner {
                observers: Mutex::new(Vec::new()),
                destroyed,
            }),
        }
    }

    /// Delivers `event` to every observer, in registration order.
    ///
    /// Observers run on the calling thread. They may register further
    /// observers; those only see later events.
    pub fn emit(&self, event: LifecycleEvent) {
        tracing::debug!(?event, "Lifecycle event");

        if event == LifecycleEvent::Destroy {
            self.inner.destroyed.send_replace(true);
        }

        let observers = self
            .inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for observer in observers {
            observer(event);
        }
    }

    /// Registers an observer for every future event.
    pub fn observe<F>(&self, observer: F)
    where
        F: Fn(LifecycleEvent) + Send + Sync + 'static,
    {
        self.inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(observer));
    }

    /// Runs `action` each time `event` is emitted.
    pub fn do_on_event<F>(&self, event: LifecycleEvent, action: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.observe(move |emitted| {
            if emitted == event {
                action();
            }
        });
    }

    /// Returns `true` once [`LifecycleEvent::Destroy`] has been emitted.
    pub fn is_destroyed(&self) -> bool {
        *self.inner.destroyed.borrow()
    }

    /// Resolves once the lifecycle is destroyed.
    pub async fn destroyed(&self) {
        let mut receiver = self.inner.destroyed.subscribe();
        // The sender lives as long as `self`, so this only ends on destroy.
        let _ = receiver.wait_for(|destroyed| *destroyed).await;
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let observers = self
            .inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("Lifecycle")
            .field("observers", &observers)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
