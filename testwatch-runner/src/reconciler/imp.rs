// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{MessageStream, Transport};
use crate::{
    errors::{DisplayErrorChain, TransportError},
    store::{ApplyOutcome, StateHandle, WriterToken},
};
use debug_ignore::DebugIgnore;
use futures::StreamExt;
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use testwatch_metadata::Event;
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{debug, info, trace, warn};

/// How long to wait before subscribing again after the stream drops.
///
/// The delay is fixed: it does not grow across consecutive failures, and
/// attempts are never capped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// The delay between a failure and the next subscription attempt.
    pub delay: Duration,
}

impl ReconnectPolicy {
    /// The default reconnect delay.
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

    /// Creates a policy with the given delay.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY)
    }
}

/// Counters describing a reconciler's connection history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcilerStats {
    /// The number of subscriptions successfully opened.
    pub subscriptions: u64,

    /// The number of decoded events handed to the store, including ones it dropped.
    pub events_applied: u64,

    /// The number of messages dropped because they could not be decoded.
    pub decode_failures: u64,

    /// The number of failed subscription attempts and broken streams.
    pub transport_failures: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
    subscriptions: AtomicU64,
    events_applied: AtomicU64,
    decode_failures: AtomicU64,
    transport_failures: AtomicU64,
}

impl StatsCounters {
    fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn snapshot(&self) -> ReconcilerStats {
        ReconcilerStats {
            subscriptions: self.subscriptions.load(Ordering::Relaxed),
            events_applied: self.events_applied.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
        }
    }
}

/// Mirrors an event stream into a [`StateHandle`].
///
/// Must be used within a tokio runtime. Dropping a running reconciler aborts
/// its task without waiting for it.
#[derive(Debug)]
pub struct Reconciler<T: Transport> {
    transport: DebugIgnore<Arc<T>>,
    state: StateHandle,
    policy: ReconnectPolicy,
    stats: Arc<StatsCounters>,
    task: Option<RunningTask>,
}

#[derive(Debug)]
struct RunningTask {
    shutdown: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl<T: Transport> Reconciler<T> {
    /// Creates a new reconciler. Nothing happens until [`start`](Self::start) is called.
    pub fn new(transport: T, state: StateHandle, policy: ReconnectPolicy) -> Self {
        Self {
            transport: DebugIgnore(Arc::new(transport)),
            state,
            policy,
            stats: Arc::new(StatsCounters::default()),
            task: None,
        }
    }

    /// Returns the state this reconciler writes to.
    pub fn state(&self) -> &StateHandle {
        &self.state
    }

    /// Returns the reconnect policy.
    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Returns the connection counters accumulated so far, across restarts.
    pub fn stats(&self) -> ReconcilerStats {
        self.stats.snapshot()
    }

    /// Returns true if the background task is running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.join.is_finished())
    }

    /// Starts mirroring the stream in a background task.
    ///
    /// If a task is already running it is stopped first, so at most one
    /// subscription is ever open.
    pub async fn start(&mut self) {
        self.stop().await;

        let token = self.state.claim_writer();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let worker = Worker {
            transport: Arc::clone(&self.transport),
            state: self.state.clone(),
            policy: self.policy,
            stats: Arc::clone(&self.stats),
            token,
        };
        debug!(
            transport = %self.transport.describe(),
            generation = token.generation(),
            "starting reconciler"
        );
        let join = tokio::spawn(worker.run(shutdown_rx));
        self.task = Some(RunningTask {
            shutdown: shutdown_tx,
            join,
        });
    }

    /// Stops the background task and waits for it to exit.
    ///
    /// Once this returns, the store is not written to again until the next
    /// [`start`](Self::start). Does nothing if the reconciler is not running.
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        // Fence first, so a message already being applied cannot land afterwards.
        self.state.revoke_writer();
        // The task may have already exited and dropped its receiver.
        let _ = task.shutdown.send(());
        if let Err(error) = task.join.await
            && error.is_panic()
        {
            warn!("reconciler task panicked");
        }
        debug!("reconciler stopped");
    }
}

impl<T: Transport> Drop for Reconciler<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            self.state.revoke_writer();
            task.join.abort();
        }
    }
}

struct Worker<T> {
    transport: Arc<T>,
    state: StateHandle,
    policy: ReconnectPolicy,
    stats: Arc<StatsCounters>,
    token: WriterToken,
}

enum StreamEnd {
    Shutdown,
    Closed,
    Failed(TransportError),
}

impl<T: Transport> Worker<T> {
    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let transport = self.transport.describe();
        loop {
            let subscribed = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                result = self.transport.subscribe() => result,
            };

            match subscribed {
                Ok(messages) => {
                    let subscription = StatsCounters::bump(&self.stats.subscriptions);
                    info!(%transport, subscription, "subscribed to event stream");
                    match self.pump(messages, &mut shutdown).await {
                        StreamEnd::Shutdown => break,
                        StreamEnd::Closed => {
                            info!(%transport, subscription, "event stream closed");
                        }
                        StreamEnd::Failed(error) => {
                            StatsCounters::bump(&self.stats.transport_failures);
                            warn!(
                                %transport,
                                subscription,
                                error = %DisplayErrorChain::new(&error),
                                "event stream failed"
                            );
                        }
                    }
                }
                Err(error) => {
                    StatsCounters::bump(&self.stats.transport_failures);
                    warn!(
                        %transport,
                        error = %DisplayErrorChain::new(&error),
                        "failed to subscribe to event stream"
                    );
                }
            }

            warn!(%transport, delay = ?self.policy.delay, "reconnecting after delay");
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                () = tokio::time::sleep(self.policy.delay) => {}
            }
        }
    }

    async fn pump(
        &self,
        mut messages: MessageStream,
        shutdown: &mut oneshot::Receiver<()>,
    ) -> StreamEnd {
        loop {
            let next = tokio::select! {
                biased;
                _ = &mut *shutdown => return StreamEnd::Shutdown,
                next = messages.next() => next,
            };
            match next {
                Some(Ok(text)) => {
                    if !self.handle_message(&text) {
                        return StreamEnd::Shutdown;
                    }
                }
                Some(Err(error)) => return StreamEnd::Failed(error),
                None => return StreamEnd::Closed,
            }
        }
    }

    /// Returns false if this worker has lost write access.
    fn handle_message(&self, text: &str) -> bool {
        let event = match Event::decode(text) {
            Ok(event) => event,
            Err(error) => {
                StatsCounters::bump(&self.stats.decode_failures);
                warn!(
                    preview = error.preview(),
                    error = %error.json_error(),
                    "dropping event that could not be decoded"
                );
                return true;
            }
        };

        let kind = event.kind();
        let Some(outcome) = self.state.apply(self.token, event) else {
            debug!(%kind, "writer revoked, dropping event");
            return false;
        };
        StatsCounters::bump(&self.stats.events_applied);

        match outcome {
            ApplyOutcome::UnknownFile { filename } => {
                debug!(%kind, filename, "dropping event for unknown file");
            }
            ApplyOutcome::Ignored { .. } => {
                debug!(%kind, "ignoring event");
            }
            outcome => {
                trace!(%kind, ?outcome, "applied event");
            }
        }
        true
    }
}
