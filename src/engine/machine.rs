// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::engine::{
    envelope::{Envelope, EventTicket, Outcome},
    error::PumpError,
    factory::StateFactory,
    pump::{DEFAULT_PRIORITY_LEVELS, PumpInner, PumpPhase},
    state::{State, StateTag},
};

/// Per-owner state machine facade.
///
/// Binds one owner to the shared flyweight factory of its shape and drives
/// sequential, non-overlapping dispatch of posted events against the current
/// state. Different owners' machines run fully in parallel on the tokio
/// worker pool; within one machine at most one event is ever in flight.
pub struct StateMachine<O, E, T> {
    owner: Arc<O>,
    factory: Arc<StateFactory<O, E, T>>,
    max_priority: usize,
    inner: Mutex<PumpInner<O, E, T>>,
    self_weak: OnceCell<Weak<Self>>,
}

impl<O, E, T> StateMachine<O, E, T>
where
    O: Send + Sync + 'static,
    E: Send + 'static,
    T: StateTag,
{
    /// Creates a machine with the default priority range 0..=10.
    pub fn new(owner: Arc<O>, factory: Arc<StateFactory<O, E, T>>) -> Arc<Self> {
        Self::with_priority_levels(owner, factory, DEFAULT_PRIORITY_LEVELS)
    }

    /// Creates a machine with `priority_levels` FIFO queues (priority 0 is
    /// the highest, `priority_levels - 1` the lowest). The queue set is fixed
    /// for the machine's lifetime.
    ///
    /// # Panics
    /// If `priority_levels` is zero.
    pub fn with_priority_levels(
        owner: Arc<O>,
        factory: Arc<StateFactory<O, E, T>>,
        priority_levels: usize,
    ) -> Arc<Self> {
        assert!(priority_levels > 0, "at least one priority level required");
        let machine = Arc::new(Self {
            owner,
            factory,
            max_priority: priority_levels - 1,
            inner: Mutex::new(PumpInner::new(priority_levels)),
            self_weak: OnceCell::new(),
        });
        let _ = machine.self_weak.set(Arc::downgrade(&machine));
        machine
    }

    /// The owner this machine governs.
    pub fn owner(&self) -> &Arc<O> {
        &self.owner
    }

    /// The shared factory of this machine's shape.
    pub fn factory(&self) -> &Arc<StateFactory<O, E, T>> {
        &self.factory
    }

    /// Highest accepted priority number (lowest urgency).
    pub fn max_priority(&self) -> usize {
        self.max_priority
    }

    /// Current pump lifecycle phase.
    pub fn phase(&self) -> PumpPhase {
        self.lock().phase
    }

    /// Currently occupied state; `None` before `init_state`.
    pub fn current_state(&self) -> Option<Arc<dyn State<O, E, T>>> {
        self.lock().current.clone()
    }

    /// Tag of the currently occupied state; `None` before `init_state`.
    pub fn current_tag(&self) -> Option<T> {
        self.lock().current.as_ref().map(|s| s.tag())
    }

    /// A re-posting capability bound to this machine, as handed to every
    /// state callback. Clone it into background tasks that need to post
    /// follow-up events.
    pub fn processor(&self) -> Processor<O, E, T> {
        Processor {
            machine: self.self_weak.get().cloned().unwrap_or_default(),
        }
    }

    /// Sets the initial state and moves the pump to `Ready`.
    ///
    /// With `run_entry` the initial state's `on_entry` (with no predecessor)
    /// is awaited before returning; pass `false` to skip re-running entry
    /// side effects when restoring a persisted state. An entry failure is
    /// returned but leaves the machine initialized in `initial`.
    pub async fn init_state(&self, initial: T, run_entry: bool) -> Result<()> {
        let state = self.factory.get(initial);
        {
            let mut inner = self.lock();
            if inner.phase != PumpPhase::Uninitialized {
                return Err(PumpError::AlreadyInitialized.into());
            }
            inner.current = Some(state.clone());
            inner.phase = PumpPhase::Ready;
        }
        debug!(state = ?initial, run_entry, "state machine initialized");
        if run_entry {
            let events = self.processor();
            state.on_entry(&self.owner, None, &events).await?;
        }
        Ok(())
    }

    /// Starts dispatching queued events. Idempotent; if envelopes are
    /// already queued a dispatch cycle is scheduled immediately.
    pub fn start_pump_events(&self) -> Result<(), PumpError> {
        {
            let mut inner = self.lock();
            match inner.phase {
                PumpPhase::Uninitialized => return Err(PumpError::NotInitialized),
                PumpPhase::Pumping => return Ok(()),
                PumpPhase::Ready | PumpPhase::Stopped => {
                    inner.phase = PumpPhase::Pumping;
                },
            }
        }
        self.kick();
        Ok(())
    }

    /// Stops dispatching. Idempotent and asynchronous: an event currently
    /// being handled runs to completion, no new cycle is scheduled after it.
    pub fn stop_pump_events(&self) {
        let mut inner = self.lock();
        if inner.phase == PumpPhase::Pumping {
            inner.phase = PumpPhase::Stopped;
        }
    }

    /// Enqueues `event` at `priority` (0 = highest) and returns a ticket
    /// resolving to the current state once this specific event has been
    /// processed, or to the error its handler raised.
    pub fn post_event(
        &self,
        event: E,
        priority: usize,
    ) -> Result<EventTicket<O, E, T>, PumpError> {
        if priority > self.max_priority {
            return Err(PumpError::InvalidPriority {
                priority,
                max: self.max_priority,
            });
        }
        let (envelope, ticket) = Envelope::new(event);
        let kick = {
            let mut inner = self.lock();
            if inner.phase == PumpPhase::Uninitialized {
                return Err(PumpError::NotInitialized);
            }
            inner.enqueue(priority, envelope);
            inner.phase == PumpPhase::Pumping && !inner.dispatching
        };
        if kick {
            self.kick();
        }
        Ok(ticket)
    }

    fn lock(&self) -> MutexGuard<'_, PumpInner<O, E, T>> {
        self.inner.lock().expect("pump lock poisoned")
    }

    /// Schedules the dispatch loop onto the shared worker pool if the pump
    /// is pumping, has work and no loop is active. The `dispatching` flag is
    /// flipped under the same lock that guards the queues, so exactly one
    /// loop runs per machine.
    fn kick(&self) {
        let Some(machine) = self.self_weak.get().and_then(Weak::upgrade) else {
            return;
        };
        {
            let mut inner = machine.lock();
            if inner.dispatching
                || inner.phase != PumpPhase::Pumping
                || inner.pending() == 0
            {
                return;
            }
            inner.dispatching = true;
        }
        tokio::spawn(async move { machine.pump_loop().await });
    }

    /// Drains envelopes one at a time until the queues empty or the pump
    /// leaves `Pumping`. Each envelope runs to completion (including any
    /// exit/entry pair) before the next is considered.
    async fn pump_loop(self: Arc<Self>) {
        loop {
            let (envelope, state) = {
                let mut inner = self.lock();
                if inner.phase != PumpPhase::Pumping || inner.pending() == 0 {
                    inner.dispatching = false;
                    return;
                }
                let envelope = inner.dequeue().expect("pending count out of sync");
                let state = inner
                    .current
                    .clone()
                    .expect("pumping without a current state");
                (envelope, state)
            };

            let outcome = self.dispatch(state, envelope.event).await;
            if let Err(e) = &outcome {
                debug!("event handler failed: {e:#}");
            }
            if envelope.done.send(outcome).is_err() {
                warn!("event ticket dropped before its outcome was delivered");
            }
        }
    }

    /// Runs one envelope against the state captured at dequeue time and
    /// performs the resulting transition, if any. The current state pointer
    /// is updated after `on_exit` resolves and before `on_entry` begins; on
    /// failure it is restored to what it was before the attempt.
    async fn dispatch(&self, from: Arc<dyn State<O, E, T>>, event: E) -> Outcome<O, E, T> {
        let events = self.processor();

        let Some(next_tag) = from.on_event(&self.owner, event, &events).await? else {
            return Ok(from);
        };

        let next = self.factory.get(next_tag);
        debug!(from = ?from.tag(), to = ?next_tag, "state transition");

        from.on_exit(&self.owner, next_tag, &events).await?;
        self.lock().current = Some(next.clone());

        if let Err(e) = next.on_entry(&self.owner, Some(from.tag()), &events).await {
            self.lock().current = Some(from);
            return Err(e);
        }
        Ok(next)
    }
}

/// Capability handed to state callbacks, restricted to re-posting events.
///
/// Holds only a weak reference, so background tasks keeping a clone do not
/// prolong the machine's life; posting after the machine is gone yields
/// [`PumpError::MachineGone`].
pub struct Processor<O, E, T> {
    machine: Weak<StateMachine<O, E, T>>,
}

impl<O, E, T> Clone for Processor<O, E, T> {
    fn clone(&self) -> Self {
        Self {
            machine: self.machine.clone(),
        }
    }
}

impl<O, E, T> Processor<O, E, T>
where
    O: Send + Sync + 'static,
    E: Send + 'static,
    T: StateTag,
{
    /// Posts an event into the owning machine's queue, exactly like
    /// [`StateMachine::post_event`].
    pub fn post_event(
        &self,
        event: E,
        priority: usize,
    ) -> Result<EventTicket<O, E, T>, PumpError> {
        let machine = self.machine.upgrade().ok_or(PumpError::MachineGone)?;
        machine.post_event(event, priority)
    }
}
