//! Commands processed by the engine task.

use std::sync::Arc;

use tokio::sync::{oneshot, watch};

use crate::core::{Epoch, Mutation, Stamped};
use crate::deferred::Completion;
use crate::overlay::{MutationHandle, Resolution};
use crate::view::{EngineError, ViewSnapshot};

/// Reply channel for a command.
pub(crate) type Reply<R> = oneshot::Sender<R>;

/// A request to the engine task.
pub(crate) enum Command<K, T, U> {
    Propose {
        channel: K,
        label: Option<String>,
        mutation: Arc<dyn Mutation<T>>,
        reply: Reply<Result<MutationHandle<K>, EngineError>>,
    },
    Reconcile {
        handle: MutationHandle<K>,
        base: T,
        reply: Reply<Resolution>,
    },
    Revert {
        handle: MutationHandle<K>,
        reply: Reply<Resolution>,
    },
    SetBase {
        channel: K,
        base: T,
        reply: Reply<Result<(), EngineError>>,
    },
    BeginFetch {
        channel: K,
        reply: Reply<Result<Epoch, EngineError>>,
    },
    Refresh {
        channel: K,
        result: Stamped<T>,
        reply: Reply<Result<bool, EngineError>>,
    },
    SetLive {
        channel: K,
        value: T,
        reply: Reply<Result<Epoch, EngineError>>,
    },
    Snapshot {
        channel: K,
        reply: Reply<ViewSnapshot<T, U>>,
    },
    Subscribe {
        channel: K,
        reply: Reply<watch::Receiver<ViewSnapshot<T, U>>>,
    },
    /// A dispatched derivation finished.
    Completed(Completion<K, U>),
    Shutdown,
}
