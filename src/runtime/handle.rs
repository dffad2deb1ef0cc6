//! Cloneable front end to the engine task.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, trace, warn};

use crate::core::{Epoch, Mutation, Stamped};
use crate::overlay::{MutationHandle, Resolution};
use crate::view::ViewSnapshot;

use super::command::{Command, Reply};
use super::error::{OptimisticError, RuntimeError};

/// Handle for talking to a running [`EngineTask`](super::EngineTask).
///
/// Every method is a round trip through the task's command queue, so
/// operations issued from one handle are applied in the order they were
/// awaited.
///
/// # Example
///
/// ```
/// use speculative_view::config::EngineConfig;
/// use speculative_view::runtime::spawn;
/// use speculative_view::view::SpeculativeView;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine: SpeculativeView<&str, u32> = SpeculativeView::new(EngineConfig::default())?;
/// let (handle, _task) = spawn(engine);
///
/// handle.set_base("likes", 10).await?;
/// let confirmed = handle
///     .optimistic("likes", |n| n + 1, async { Ok::<_, std::io::Error>(11) })
///     .await?;
///
/// assert_eq!(confirmed, 11);
/// assert_eq!(handle.snapshot("likes").await?.view, Some(11));
/// # Ok(())
/// # }
/// ```
pub struct EngineHandle<K, T, U> {
    tx: mpsc::Sender<Command<K, T, U>>,
}

impl<K, T, U> Clone for EngineHandle<K, T, U> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<K, T, U> fmt::Debug for EngineHandle<K, T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<K, T, U> EngineHandle<K, T, U>
where
    K: Clone + fmt::Debug + Send + 'static,
    T: Clone + Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    pub(crate) fn new(tx: mpsc::Sender<Command<K, T, U>>) -> Self {
        Self { tx }
    }

    async fn request<R>(
        &self,
        make: impl FnOnce(Reply<R>) -> Command<K, T, U>,
    ) -> Result<R, RuntimeError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| RuntimeError::Shutdown)?;
        response.await.map_err(|_| RuntimeError::Shutdown)
    }

    /// Whether the engine task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Propose a speculative mutation.
    pub async fn propose<F>(&self, channel: K, apply: F) -> Result<MutationHandle<K>, RuntimeError>
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        self.propose_shared(channel, None, Arc::new(apply)).await
    }

    /// Propose a speculative mutation with a presentation label.
    pub async fn propose_labeled<F>(
        &self,
        channel: K,
        label: impl Into<String>,
        apply: F,
    ) -> Result<MutationHandle<K>, RuntimeError>
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        self.propose_shared(channel, Some(label.into()), Arc::new(apply))
            .await
    }

    /// Propose an already shared mutation.
    pub async fn propose_shared(
        &self,
        channel: K,
        label: Option<String>,
        mutation: Arc<dyn Mutation<T>>,
    ) -> Result<MutationHandle<K>, RuntimeError> {
        let result = self
            .request(|reply| Command::Propose {
                channel,
                label,
                mutation,
                reply,
            })
            .await?;
        Ok(result?)
    }

    /// Confirm a mutation with its authoritative result.
    pub async fn reconcile(&self, handle: &MutationHandle<K>, base: T) -> Result<Resolution, RuntimeError> {
        self.request(|reply| Command::Reconcile {
            handle: handle.clone(),
            base,
            reply,
        })
        .await
    }

    /// Drop a mutation whose operation failed.
    pub async fn revert(&self, handle: &MutationHandle<K>) -> Result<Resolution, RuntimeError> {
        self.request(|reply| Command::Revert {
            handle: handle.clone(),
            reply,
        })
        .await
    }

    /// Set the authoritative base of a channel.
    pub async fn set_base(&self, channel: K, base: T) -> Result<(), RuntimeError> {
        let result = self
            .request(|reply| Command::SetBase {
                channel,
                base,
                reply,
            })
            .await?;
        Ok(result?)
    }

    /// Stamp a new authoritative fetch on a channel.
    pub async fn begin_fetch(&self, channel: K) -> Result<Epoch, RuntimeError> {
        let result = self
            .request(|reply| Command::BeginFetch { channel, reply })
            .await?;
        Ok(result?)
    }

    /// Apply an epoch-stamped fetch result; `Ok(false)` if it was stale.
    pub async fn refresh(&self, channel: K, result: Stamped<T>) -> Result<bool, RuntimeError> {
        let result = self
            .request(|reply| Command::Refresh {
                channel,
                result,
                reply,
            })
            .await?;
        Ok(result?)
    }

    /// Update the live value of a channel.
    pub async fn set_live(&self, channel: K, value: T) -> Result<Epoch, RuntimeError> {
        let result = self
            .request(|reply| Command::SetLive {
                channel,
                value,
                reply,
            })
            .await?;
        Ok(result?)
    }

    /// Current snapshot of a channel.
    pub async fn snapshot(&self, channel: K) -> Result<ViewSnapshot<T, U>, RuntimeError> {
        self.request(|reply| Command::Snapshot { channel, reply })
            .await
    }

    /// Subscribe to snapshots of a channel.
    ///
    /// The receiver starts with the current snapshot and sees a new one after
    /// every change to the channel.
    pub async fn subscribe(&self, channel: K) -> Result<watch::Receiver<ViewSnapshot<T, U>>, RuntimeError> {
        self.request(|reply| Command::Subscribe { channel, reply })
            .await
    }

    /// Stop the engine task.
    ///
    /// Derivations still running are left to finish; their results are
    /// dropped.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.tx
            .send(Command::Shutdown)
            .await
            .map_err(|_| RuntimeError::Shutdown)
    }

    /// Run a write optimistically.
    ///
    /// Proposes `apply` on `channel`, awaits `perform`, then reconciles with
    /// the authoritative value it returns or reverts on failure. The
    /// collaborator's error is returned only to this caller.
    ///
    /// Dropping the returned future before it completes (an outer timeout, a
    /// losing `select!` branch) reverts the mutation.
    pub async fn optimistic<F, Fut, E>(
        &self,
        channel: K,
        apply: F,
        perform: Fut,
    ) -> Result<T, OptimisticError<E>>
    where
        F: Fn(T) -> T + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>>,
    {
        let handle = self.propose(channel, apply).await?;
        let guard = RevertOnDrop::new(self.tx.clone(), handle);
        let outcome = perform.await;
        let result = self.resolve(guard.handle(), outcome).await;
        guard.disarm();
        result
    }

    /// [`optimistic`](Self::optimistic) with a deadline.
    ///
    /// If `perform` has not finished after `timeout` it is dropped and the
    /// mutation is reverted.
    pub async fn optimistic_with_timeout<F, Fut, E>(
        &self,
        channel: K,
        apply: F,
        perform: Fut,
        timeout: Duration,
    ) -> Result<T, OptimisticError<E>>
    where
        F: Fn(T) -> T + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>>,
    {
        let handle = self.propose(channel, apply).await?;
        let guard = RevertOnDrop::new(self.tx.clone(), handle);
        let result = match tokio::time::timeout(timeout, perform).await {
            Ok(outcome) => self.resolve(guard.handle(), outcome).await,
            Err(_) => {
                let handle = guard.handle();
                warn!(channel = ?handle.channel, id = %handle.id, ?timeout, "optimistic write timed out");
                match self.revert(handle).await {
                    Ok(_) => Err(OptimisticError::Timeout(timeout)),
                    Err(err) => Err(err.into()),
                }
            }
        };
        guard.disarm();
        result
    }

    async fn resolve<E>(
        &self,
        handle: &MutationHandle<K>,
        outcome: Result<T, E>,
    ) -> Result<T, OptimisticError<E>> {
        match outcome {
            Ok(base) => {
                self.reconcile(handle, base.clone()).await?;
                Ok(base)
            }
            Err(err) => {
                debug!(channel = ?handle.channel, id = %handle.id, "optimistic write failed");
                self.revert(handle).await?;
                Err(OptimisticError::Failed(err))
            }
        }
    }
}

/// Reverts a proposed mutation if the optimistic call is dropped before it
/// has resolved the mutation itself.
///
/// Resolution is idempotent, so a revert racing a reconcile that already
/// went through is a no-op.
struct RevertOnDrop<K, T, U>
where
    K: Clone + fmt::Debug + Send + 'static,
    T: Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    tx: mpsc::Sender<Command<K, T, U>>,
    handle: MutationHandle<K>,
    armed: bool,
}

impl<K, T, U> RevertOnDrop<K, T, U>
where
    K: Clone + fmt::Debug + Send + 'static,
    T: Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    fn new(tx: mpsc::Sender<Command<K, T, U>>, handle: MutationHandle<K>) -> Self {
        Self {
            tx,
            handle,
            armed: true,
        }
    }

    fn handle(&self) -> &MutationHandle<K> {
        &self.handle
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<K, T, U> Drop for RevertOnDrop<K, T, U>
where
    K: Clone + fmt::Debug + Send + 'static,
    T: Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let handle = self.handle.clone();
        trace!(channel = ?handle.channel, id = %handle.id, "optimistic call dropped, reverting");

        // Nobody waits for the reply.
        let (reply, _) = oneshot::channel();
        match self.tx.try_send(Command::Revert { handle, reply }) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(command)) => {
                if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                    let tx = self.tx.clone();
                    runtime.spawn(async move {
                        let _ = tx.send(command).await;
                    });
                }
            }
        }
    }
}
