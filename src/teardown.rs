//! Teardown of shared client resources after a callback completes.

use std::sync::Arc;

/// A resource that can release its pooled connections on request.
///
/// [`Client`](crate::Client) implements this; the adapter factory holds one
/// and runs it after a callback that asked for teardown.
///
/// # Ownership
///
/// Teardown affects every holder of the resource, not only the call that
/// requested it. Exactly one owner should request it, after which the
/// resource must not be reused. Implementations must tolerate being torn
/// down more than once.
pub trait Teardown: Send + Sync {
    /// Releases the resource.
    fn teardown(&self);
}

impl<T: Teardown + ?Sized> Teardown for Arc<T> {
    fn teardown(&self) {
        (**self).teardown();
    }
}
