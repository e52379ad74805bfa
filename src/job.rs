//! The job capability.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

/// A unit of work invoked by the scheduler.
///
/// `run` is called once per activation, each time on its own task, so an
/// invocation may take arbitrarily long without delaying the dispatcher or
/// other jobs. Successive activations of the same job are NOT serialised;
/// wrap the job with [`crate::chain::delay_if_still_running`] or
/// [`crate::chain::skip_if_still_running`] when that is required.
pub trait Job: Send + Sync + 'static {
    fn run(&self) -> BoxFuture<'static, ()>;
}

impl<J: Job + ?Sized> Job for Arc<J> {
    fn run(&self) -> BoxFuture<'static, ()> {
        (**self).run()
    }
}

/// Adapter turning an async closure into a [`Job`].
pub struct FuncJob<F>(F);

impl<F, Fut> FuncJob<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        FuncJob(f)
    }
}

impl<F, Fut> Job for FuncJob<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn run(&self) -> BoxFuture<'static, ()> {
        Box::pin((self.0)())
    }
}
