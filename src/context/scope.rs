//! Task-local request scope.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::Either;
use tokio::task::futures::TaskLocalFuture;
use tokio::task::JoinHandle;

tokio::task_local! {
    static REQUEST_ID: Arc<str>;
}

/// Run `future` with `id` as the ambient request id.
///
/// The id is visible at every poll of `future`, including after it suspends,
/// and is restored to the enclosing value (if any) when `future` yields.
pub fn run<F>(id: impl Into<Arc<str>>, future: F) -> TaskLocalFuture<Arc<str>, F>
where
    F: Future,
{
    REQUEST_ID.scope(id.into(), future)
}

/// Run a synchronous closure with `id` as the ambient request id.
pub fn run_sync<R>(id: impl Into<Arc<str>>, f: impl FnOnce() -> R) -> R {
    REQUEST_ID.sync_scope(id.into(), f)
}

/// The ambient request id, or `None` outside any request scope.
pub fn current_id() -> Option<String> {
    REQUEST_ID.try_with(|id| id.to_string()).ok()
}

/// Same as [`current_id`] without allocating a `String`.
pub fn current() -> Option<Arc<str>> {
    REQUEST_ID.try_with(Arc::clone).ok()
}

/// Spawn `future` on the runtime, carrying the current request id with it.
///
/// Outside a request scope this is a plain `tokio::spawn`.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(future.in_current_request())
}

/// Run a blocking closure on the blocking pool inside the current request scope.
pub fn spawn_blocking<F, R>(f: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let id = current();
    tokio::task::spawn_blocking(move || match id {
        Some(id) => run_sync(id, f),
        None => f(),
    })
}

/// Future returned by [`Propagate::in_current_request`].
pub type Scoped<F> = Either<TaskLocalFuture<Arc<str>, F>, F>;

/// Extension for binding deferred work to the request that created it.
pub trait Propagate: Future + Sized {
    /// Capture the current request id now and re-establish it whenever the
    /// returned future is polled, wherever that happens.
    fn in_current_request(self) -> Scoped<Self> {
        match current() {
            Some(id) => Either::Left(run(id, self)),
            None => Either::Right(self),
        }
    }
}

impl<F: Future> Propagate for F {}
