// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::VecDeque, sync::Arc};

use crate::engine::{envelope::Envelope, state::State};

/// Default number of priority levels (priorities 0 through 10, 0 highest).
pub const DEFAULT_PRIORITY_LEVELS: usize = 11;

/// Lifecycle phase of one owner's event pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpPhase {
    /// Constructed, `init_state` not called yet.
    Uninitialized,
    /// Initial state set; events queue up but are not dispatched.
    Ready,
    /// Queued events are dispatched one at a time.
    Pumping,
    /// Dispatch of further events is suspended; an in-flight cycle finishes.
    Stopped,
}

/// Mutable pump bookkeeping, guarded by the facade's mutex. The guard is
/// never held across an await; the `dispatching` flag is what serializes
/// dispatch cycles per owner.
pub(crate) struct PumpInner<O, E, T> {
    queues: Vec<VecDeque<Envelope<O, E, T>>>,
    pending: usize,
    pub phase: PumpPhase,
    pub dispatching: bool,
    pub current: Option<Arc<dyn State<O, E, T>>>,
}

impl<O, E, T> PumpInner<O, E, T> {
    /// Creates the fixed set of FIFO queues; the level count never changes
    /// afterwards.
    pub fn new(priority_levels: usize) -> Self {
        let mut queues = Vec::with_capacity(priority_levels);
        queues.resize_with(priority_levels, VecDeque::new);
        Self {
            queues,
            pending: 0,
            phase: PumpPhase::Uninitialized,
            dispatching: false,
            current: None,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Appends to the FIFO queue of `priority`. Caller validates the range.
    pub fn enqueue(&mut self, priority: usize, envelope: Envelope<O, E, T>) {
        self.queues[priority].push_back(envelope);
        self.pending += 1;
    }

    /// Pops the oldest envelope of the highest-priority non-empty queue.
    /// Lower-numbered queues always drain first.
    pub fn dequeue(&mut self) -> Option<Envelope<O, E, T>> {
        for queue in &mut self.queues {
            if let Some(envelope) = queue.pop_front() {
                self.pending -= 1;
                return Some(envelope);
            }
        }
        None
    }
}
