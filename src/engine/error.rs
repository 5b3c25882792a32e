// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;

/// Errors reported synchronously by the event pump.
///
/// Failures raised by state callbacks are not represented here; those travel
/// as [`anyhow::Error`] through the ticket of the event whose handler failed.
#[derive(Debug, Error)]
pub enum PumpError {
    /// The requested priority lies outside the queue range configured at
    /// construction.
    #[error("priority {priority} out of range (max {max})")]
    InvalidPriority { priority: usize, max: usize },

    /// An event was posted (or pumping started) before `init_state`.
    #[error("state machine used before init_state")]
    NotInitialized,

    /// `init_state` was called twice.
    #[error("state machine already initialized")]
    AlreadyInitialized,

    /// A `Processor` outlived its state machine.
    #[error("state machine is gone")]
    MachineGone,
}
