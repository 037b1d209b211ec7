use crate::message::IncomingMessage;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;

/// Receives the messages of a consumer. Every delivery is handled in its own task, so handlers of
/// the same consumer can run concurrently.
pub trait ConsumerHandler: Send + Sync + 'static {
    fn handle(&self, message: IncomingMessage) -> BoxFuture<'static, ()>;
}

struct SyncHandler<F>(F);

impl<F> ConsumerHandler for SyncHandler<F>
where
    F: Fn(IncomingMessage) + Send + Sync + 'static,
{
    fn handle(&self, message: IncomingMessage) -> BoxFuture<'static, ()> {
        (self.0)(message);

        futures::future::ready(()).boxed()
    }
}

struct AsyncHandler<F>(F);

impl<F, Fut> ConsumerHandler for AsyncHandler<F>
where
    F: Fn(IncomingMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn handle(&self, message: IncomingMessage) -> BoxFuture<'static, ()> {
        (self.0)(message).boxed()
    }
}

/// Handler from a plain function. It runs on the delivery task, so it shouldn't block for long.
///
/// ```no_run
/// use burrow_client::handler_fn;
///
/// let handler = handler_fn(|message| {
///     println!("Got {} bytes", message.body.len());
/// });
/// ```
pub fn handler_fn<F>(f: F) -> Arc<dyn ConsumerHandler>
where
    F: Fn(IncomingMessage) + Send + Sync + 'static,
{
    Arc::new(SyncHandler(f))
}

/// Handler from an async function.
///
/// ```no_run
/// use burrow_client::async_handler_fn;
///
/// let handler = async_handler_fn(|message| async move {
///     if let Err(e) = message.ack().await {
///         eprintln!("Ack failed {:?}", e);
///     }
/// });
/// ```
pub fn async_handler_fn<F, Fut>(f: F) -> Arc<dyn ConsumerHandler>
where
    F: Fn(IncomingMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(AsyncHandler(f))
}
