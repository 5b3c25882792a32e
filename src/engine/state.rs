// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    fmt::{self, Debug},
    hash::Hash,
    pin::Pin,
};

use anyhow::Result;

use crate::engine::machine::Processor;

/// Boxed future returned by state callbacks so the trait stays
/// dyn-compatible.
pub type StateFuture<'a, R> = Pin<Box<dyn Future<Output = R> + Send + 'a>>;

/// Discriminant identifying one state within a machine shape. Typically a
/// small user-defined enum; external observers branch on it instead of
/// testing type identity.
pub trait StateTag: Copy + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> StateTag for T where T: Copy + Eq + Hash + Debug + Send + Sync + 'static {}

/// A flyweight behavior unit for one state of one `(O, E, T)` shape.
///
/// A single instance is shared by every owner of the shape, so
/// implementations must hold no per-owner mutable data; anything mutable
/// belongs on the owner, which is passed into every callback. Fields on the
/// state itself are global configuration at most.
///
/// Long-running work must not be awaited inside a callback for its full
/// duration: spawn it, return promptly, and let the spawned task post a
/// follow-up event through the [`Processor`] when it finishes. The follow-up
/// re-enters through the queue, so the one-dispatch-at-a-time discipline is
/// preserved.
pub trait State<O, E, T>: Send + Sync + 'static
where T: StateTag
{
    /// Plain discriminant of this state.
    fn tag(&self) -> T;

    /// Invoked exactly once when the pump transitions into this state.
    /// `from` is `None` only at initial entry.
    fn on_entry<'a>(
        &'a self,
        owner: &'a O,
        from: Option<T>,
        events: &'a Processor<O, E, T>,
    ) -> StateFuture<'a, Result<()>> {
        let _ = (owner, from, events);
        Box::pin(async { Ok(()) })
    }

    /// Invoked exactly once before leaving this state for `to`.
    fn on_exit<'a>(
        &'a self,
        owner: &'a O,
        to: T,
        events: &'a Processor<O, E, T>,
    ) -> StateFuture<'a, Result<()>> {
        let _ = (owner, to, events);
        Box::pin(async { Ok(()) })
    }

    /// Handles one event. `Ok(Some(tag))` requests a transition to the state
    /// registered under `tag`; `Ok(None)` stays (the contract for event kinds
    /// this state does not handle). Errors reject the posted event's ticket
    /// and leave the machine in the state it occupied before the attempt.
    fn on_event<'a>(
        &'a self,
        owner: &'a O,
        event: E,
        events: &'a Processor<O, E, T>,
    ) -> StateFuture<'a, Result<Option<T>>>;
}

impl<O, E, T> Debug for dyn State<O, E, T>
where
    O: 'static,
    E: 'static,
    T: StateTag,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State").field("tag", &self.tag()).finish()
    }
}
