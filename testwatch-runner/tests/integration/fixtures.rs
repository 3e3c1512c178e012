// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use color_eyre::eyre::{Result, bail, eyre};
use futures::StreamExt;
use std::{
    collections::{BTreeMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use testwatch_metadata::{ErrorRecord, Event, FileState, SubTestState};
use testwatch_runner::{
    errors::TransportError,
    reconciler::{MessageStream, ReconnectPolicy, Transport},
    store::{File, StateHandle, StateStore},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

type Message = Result<String, TransportError>;

pub(crate) const TIMEOUT: Duration = Duration::from_secs(10);

/// A short delay, so reconnect tests run quickly.
pub(crate) const FAST_RECONNECT: ReconnectPolicy = ReconnectPolicy {
    delay: Duration::from_millis(10),
};

pub(crate) fn test_init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// An in-memory transport. Each subscription consumes the next queued
/// [`Connection`]; with none queued, subscribing fails.
#[derive(Clone, Debug, Default)]
pub(crate) struct ChannelTransport {
    queue: Arc<Mutex<VecDeque<mpsc::UnboundedReceiver<Message>>>>,
    attempts: Arc<AtomicUsize>,
}

impl ChannelTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queues a connection for a future subscription.
    pub(crate) fn connection(&self) -> Connection {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.queue
            .lock()
            .expect("lock not poisoned")
            .push_back(receiver);
        Connection { sender }
    }

    /// Returns the number of subscription attempts, successful or not.
    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Transport for ChannelTransport {
    fn describe(&self) -> String {
        "in-memory channel".to_owned()
    }

    async fn subscribe(&self) -> Result<MessageStream, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self.queue.lock().expect("lock not poisoned").pop_front();
        let receiver = next.ok_or_else(|| TransportError::unreachable("no connection queued"))?;
        Ok(UnboundedReceiverStream::new(receiver).boxed())
    }
}

/// The producer side of one queued subscription.
///
/// Dropping it closes the stream.
#[derive(Debug)]
pub(crate) struct Connection {
    sender: mpsc::UnboundedSender<Message>,
}

impl Connection {
    pub(crate) fn send(&self, event: &Event) {
        let text = serde_json::to_string(event).expect("events serialize");
        self.send_raw(&text);
    }

    pub(crate) fn send_raw(&self, text: &str) {
        // The receiver is gone once the reconciler stops; that's fine.
        let _ = self.sender.send(Ok(text.to_owned()));
    }

    pub(crate) fn fail(&self, reason: &str) {
        let _ = self.sender.send(Err(TransportError::unreachable(reason)));
    }

    /// Returns true once the subscriber has released this connection.
    pub(crate) fn is_released(&self) -> bool {
        self.sender.is_closed()
    }
}

pub(crate) fn file(name: &str, duration: u64, sub_tests: Vec<SubTestState>) -> FileState {
    FileState {
        name: name.to_owned(),
        duration,
        sub_tests,
        infos: Vec::new(),
    }
}

pub(crate) fn sub_test(filename: &str, name: &str, duration: u64) -> SubTestState {
    SubTestState {
        filename: filename.to_owned(),
        name: name.to_owned(),
        duration,
        ..Default::default()
    }
}

pub(crate) fn failed_sub_test(filename: &str, name: &str, message: &str) -> SubTestState {
    SubTestState {
        errors: vec![ErrorRecord::new(message)],
        ..sub_test(filename, name, 1)
    }
}

pub(crate) fn init(files: Vec<FileState>) -> Event {
    let snapshot: BTreeMap<_, _> = files
        .into_iter()
        .map(|file| (file.name.clone(), file))
        .collect();
    Event::Init(snapshot)
}

pub(crate) fn file_names(state: &StateHandle) -> Vec<String> {
    state
        .snapshot()
        .iter()
        .map(|file| file.name().to_owned())
        .collect()
}

pub(crate) fn has_file(name: &str) -> impl FnMut(&StateStore) -> bool + '_ {
    move |store| store.file(name).is_some()
}

pub(crate) fn file_matches<'a>(
    name: &'a str,
    mut pred: impl FnMut(&File) -> bool + 'a,
) -> impl FnMut(&StateStore) -> bool + 'a {
    move |store| store.file(name).is_some_and(&mut pred)
}

/// Waits until `pred` holds for the store, re-checking on every revision.
pub(crate) async fn wait_for(
    state: &StateHandle,
    pred: impl FnMut(&StateStore) -> bool,
) -> Result<()> {
    tokio::time::timeout(TIMEOUT, wait_for_inner(state, pred))
        .await
        .map_err(|_| eyre!("timed out waiting for store condition"))?
}

async fn wait_for_inner(
    state: &StateHandle,
    mut pred: impl FnMut(&StateStore) -> bool,
) -> Result<()> {
    // Subscribe before checking, so no revision is missed in between.
    let mut revisions = state.subscribe();
    loop {
        if state.read(&mut pred) {
            return Ok(());
        }
        revisions.changed().await?;
    }
}

/// Polls `cond` until it holds, for conditions that are not store revisions.
pub(crate) async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) -> Result<()> {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while !cond() {
        if tokio::time::Instant::now() >= deadline {
            bail!("timed out waiting until {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    Ok(())
}
