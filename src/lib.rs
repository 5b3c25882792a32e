//! This crate provides a flyweight, event-driven asynchronous state machine
//! engine: shared stateless state instances, per-owner prioritized event
//! queues and a serialized dispatch pump.
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Handles configuration, command-line parsing, and logging.
pub mod cfg;
/// The state machine engine: state contract, flyweight factory, event
/// envelopes and the per-owner event pump.
pub mod engine;
/// Episode-download domain driven by the engine (used by the demo binary).
pub mod episode;
