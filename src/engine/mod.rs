//! This module contains the generic state machine engine.
//!
//! One [`machine::StateMachine`] is constructed per owner object. Every owner
//! sharing the same `(Owner, Event, Tag)` shape dispatches against the same
//! flyweight [`state::State`] instances held by a [`factory::StateFactory`];
//! per-owner mutable data lives on the owner itself.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Event envelopes and completion tickets.
pub mod envelope;
/// Typed errors reported by the event pump.
pub mod error;
/// Flyweight registry of state instances for one machine shape.
pub mod factory;
/// The per-owner facade and its dispatch loop.
pub mod machine;
/// Prioritized FIFO queues and pump lifecycle bookkeeping.
pub mod pump;
/// The state behavior contract.
pub mod state;

pub use envelope::EventTicket;
pub use error::PumpError;
pub use factory::StateFactory;
pub use machine::{Processor, StateMachine};
pub use pump::{DEFAULT_PRIORITY_LEVELS, PumpPhase};
pub use state::{State, StateFuture, StateTag};
