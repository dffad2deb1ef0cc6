//! Engine consumer task.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::core::COMMAND_QUEUE_CAPACITY;
use crate::deferred::ReadyComputation;
use crate::view::{SpeculativeView, ViewSnapshot};

use super::command::Command;
use super::handle::EngineHandle;

/// The single consumer of engine state.
///
/// Owns the [`SpeculativeView`] and applies commands in arrival order.
/// Debounce deadlines are awaited in the same loop, and derivation results
/// come back as commands, so nothing touches the engine concurrently.
pub struct EngineTask<K, T, U> {
    /// Engine state
    engine: SpeculativeView<K, T, U>,

    /// Incoming commands
    rx: mpsc::Receiver<Command<K, T, U>>,

    /// Used by derivation jobs to post results without keeping the task alive
    completions: mpsc::WeakSender<Command<K, T, U>>,

    /// Snapshot publishers per subscribed channel
    watchers: HashMap<K, watch::Sender<ViewSnapshot<T, U>>>,
}

/// Spawn an engine task on the current tokio runtime.
///
/// Returns the handle used to talk to it and the task's join handle. The
/// task stops when [`EngineHandle::shutdown`] is called or every handle has
/// been dropped.
pub fn spawn<K, T, U>(engine: SpeculativeView<K, T, U>) -> (EngineHandle<K, T, U>, JoinHandle<()>)
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    let (task, handle) = EngineTask::new(engine);
    let join = tokio::spawn(task.run());
    (handle, join)
}

impl<K, T, U> EngineTask<K, T, U>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    /// Create a task and its handle without spawning it.
    pub fn new(engine: SpeculativeView<K, T, U>) -> (Self, EngineHandle<K, T, U>) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let task = Self {
            engine,
            rx,
            completions: tx.downgrade(),
            watchers: HashMap::new(),
        };
        (task, EngineHandle::new(tx))
    }

    /// Process commands until shutdown.
    pub async fn run(mut self) {
        info!("engine task started");

        loop {
            let deadline = self
                .engine
                .time_until_due_at(Instant::now().into_std())
                .map(|wait| Instant::now() + wait);

            let command = match deadline {
                Some(deadline) => tokio::select! {
                    command = self.rx.recv() => command,
                    () = tokio::time::sleep_until(deadline) => {
                        self.dispatch_due();
                        continue;
                    }
                },
                None => self.rx.recv().await,
            };

            let Some(command) = command else {
                break;
            };
            if !self.handle(command) {
                break;
            }
        }

        info!("engine task stopped");
    }

    /// Apply one command. Returns `false` on shutdown.
    fn handle(&mut self, command: Command<K, T, U>) -> bool {
        match command {
            Command::Propose {
                channel,
                label,
                mutation,
                reply,
            } => {
                let result = self.engine.propose_shared(channel.clone(), label, mutation);
                self.notify(&channel);
                let _ = reply.send(result);
            }
            Command::Reconcile {
                handle,
                base,
                reply,
            } => {
                let resolution = self.engine.reconcile(&handle, base);
                self.notify(&handle.channel);
                let _ = reply.send(resolution);
            }
            Command::Revert { handle, reply } => {
                let resolution = self.engine.revert(&handle);
                self.notify(&handle.channel);
                let _ = reply.send(resolution);
            }
            Command::SetBase {
                channel,
                base,
                reply,
            } => {
                let result = self.engine.set_base(channel.clone(), base);
                self.notify(&channel);
                let _ = reply.send(result);
            }
            Command::BeginFetch { channel, reply } => {
                let _ = reply.send(self.engine.begin_fetch(&channel));
            }
            Command::Refresh {
                channel,
                result,
                reply,
            } => {
                let result = self.engine.refresh(&channel, result);
                self.notify(&channel);
                let _ = reply.send(result);
            }
            Command::SetLive {
                channel,
                value,
                reply,
            } => {
                let now = Instant::now().into_std();
                let result = self.engine.set_live_at(channel.clone(), value, now);
                self.notify(&channel);
                let _ = reply.send(result);
            }
            Command::Snapshot { channel, reply } => {
                let _ = reply.send(self.engine.snapshot(&channel));
            }
            Command::Subscribe { channel, reply } => {
                let receiver = match self.watchers.get(&channel) {
                    Some(sender) => sender.subscribe(),
                    None => {
                        let (sender, receiver) = watch::channel(self.engine.snapshot(&channel));
                        self.watchers.insert(channel, sender);
                        receiver
                    }
                };
                let _ = reply.send(receiver);
            }
            Command::Completed(completion) => {
                let channel = completion.channel.clone();
                let outcome = self.engine.publish(completion);
                debug!(?channel, ?outcome, "derivation completed");
                self.notify(&channel);
            }
            Command::Shutdown => return false,
        }
        true
    }

    /// Dispatch every due derivation onto the blocking pool.
    fn dispatch_due(&mut self) {
        let ready = self.engine.poll_at(Instant::now().into_std());
        for computation in ready {
            self.spawn_computation(computation);
        }
    }

    fn spawn_computation(&self, computation: ReadyComputation<K, T, U>) {
        let completions = self.completions.clone();
        let channel = computation.channel().clone();
        let epoch = computation.epoch();

        tokio::spawn(async move {
            match tokio::task::spawn_blocking(move || computation.run()).await {
                Ok(completion) => {
                    // The engine task may be gone; the result is irrelevant then.
                    if let Some(tx) = completions.upgrade() {
                        let _ = tx.send(Command::Completed(completion)).await;
                    }
                }
                Err(err) => {
                    warn!(?channel, %epoch, error = %err, "derivation panicked");
                }
            }
        });
    }

    /// Push a fresh snapshot to the channel's subscribers, if any.
    fn notify(&mut self, channel: &K) {
        let Some(sender) = self.watchers.get(channel) else {
            return;
        };
        if sender.is_closed() {
            self.watchers.remove(channel);
            return;
        }
        sender.send_replace(self.engine.snapshot(channel));
    }
}
