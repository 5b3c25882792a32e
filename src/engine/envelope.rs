// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fmt, sync::Arc};

use anyhow::{Result, anyhow};
use tokio::sync::oneshot;

use crate::engine::state::State;

/// Outcome delivered for one posted event: the current state after the event
/// fully processed (including any transition), or the handler error.
pub(crate) type Outcome<O, E, T> = Result<Arc<dyn State<O, E, T>>>;

/// One queued event: the event value paired with its completion sender.
///
/// Owned exclusively by the pump from enqueue until dispatch completion, at
/// which point the outcome passes to whoever holds the [`EventTicket`].
pub(crate) struct Envelope<O, E, T> {
    pub event: E,
    pub done: oneshot::Sender<Outcome<O, E, T>>,
}

impl<O, E, T> Envelope<O, E, T> {
    pub fn new(event: E) -> (Self, EventTicket<O, E, T>) {
        let (done, rx) = oneshot::channel();
        (Self { event, done }, EventTicket { rx })
    }
}

/// Completion handle for one posted event.
pub struct EventTicket<O, E, T> {
    rx: oneshot::Receiver<Outcome<O, E, T>>,
}

impl<O, E, T> fmt::Debug for EventTicket<O, E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTicket").finish_non_exhaustive()
    }
}

impl<O, E, T> EventTicket<O, E, T> {
    /// Waits until this specific event has been fully processed and returns
    /// the resulting current state, or the error its handler raised.
    pub async fn outcome(self) -> Result<Arc<dyn State<O, E, T>>> {
        self.rx
            .await
            .map_err(|_| anyhow!("state machine dropped before the event was dispatched"))?
    }
}
