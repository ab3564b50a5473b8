use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::config::Candidate;

/// A source that can answer a query when pointed at a candidate address.
///
/// One backend value is shared by every attempt of every call, so it must be
/// `Send + Sync + 'static`. `fetch` should return promptly once `cancel` fires;
/// the coordinator never waits for it to do so.
pub trait Backend<Q>: Send + Sync + 'static {
    type Value: Send + 'static;
    type Error: Send + 'static;

    fn fetch(
        &self,
        cancel: CancellationToken,
        candidate: &Candidate,
        query: &Q,
    ) -> impl Future<Output = Result<Self::Value, Self::Error>> + Send;
}

/// Wraps a closure as a [`Backend`].
///
/// ```no_run
/// use hedged_fanout::{backend_fn, Candidate, Coordinator, FanoutConfig};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = backend_fn(|_cancel: CancellationToken, addr: Candidate, key: String| async move {
///     Ok::<_, std::io::Error>(format!("{key}@{addr}"))
/// });
/// let coordinator = Coordinator::new(backend, FanoutConfig::default())?;
/// let _answer = coordinator
///     .resolve(&CancellationToken::new(), &[Candidate::from("a"), Candidate::from("b")], "key".to_string())
///     .await?;
/// # Ok(())
/// # }
/// ```
pub fn backend_fn<F>(f: F) -> BackendFn<F> {
    BackendFn(f)
}

/// [`Backend`] built from a closure, see [`backend_fn`].
#[derive(Clone)]
pub struct BackendFn<F>(F);

impl<Q, F, Fut, T, E> Backend<Q> for BackendFn<F>
where
    Q: Clone,
    F: Fn(CancellationToken, Candidate, Q) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send,
    T: Send + 'static,
    E: Send + 'static,
{
    type Value = T;
    type Error = E;

    fn fetch(
        &self,
        cancel: CancellationToken,
        candidate: &Candidate,
        query: &Q,
    ) -> impl Future<Output = Result<T, E>> + Send {
        (self.0)(cancel, candidate.clone(), query.clone())
    }
}
