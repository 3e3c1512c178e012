// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::TransportError;
use futures::stream::BoxStream;
use std::future::Future;

/// The messages produced by one subscription, as raw text.
///
/// The stream ends when the producer closes the connection. Dropping the
/// stream releases the connection.
pub type MessageStream = BoxStream<'static, Result<String, TransportError>>;

/// A source of event-stream subscriptions.
pub trait Transport: Send + Sync + 'static {
    /// Returns a short description of where messages come from, for logging.
    fn describe(&self) -> String;

    /// Opens a new subscription.
    fn subscribe(&self) -> impl Future<Output = Result<MessageStream, TransportError>> + Send;
}
