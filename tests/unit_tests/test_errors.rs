// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{Arc, atomic::Ordering};

use anyhow::Result;
use statepump_rs::engine::{PumpError, StateMachine};

use crate::unit_tests::common::{Probe, TestEvent, TestTag, ready_machine, test_factory};

/// A failing handler rejects only its own ticket; the state is untouched and
/// the next queued event dispatches normally.
#[tokio::test]
async fn handler_failure_is_isolated() -> Result<()> {
    let (probe, machine) = ready_machine().await;
    machine.start_pump_events()?;

    let boom = machine.post_event(TestEvent::Boom, 5)?;
    let step = machine.post_event(TestEvent::Step("after"), 5)?;

    let err = boom.outcome().await.expect_err("boom must reject");
    assert!(err.to_string().contains("boom"), "unexpected error: {err:#}");
    assert_eq!(machine.current_tag(), Some(TestTag::A));

    step.outcome().await?;
    assert!(probe.log_snapshot().contains(&"after".to_string()));
    Ok(())
}

/// A failing `on_entry` rejects the ticket and restores the pre-attempt
/// state.
#[tokio::test]
async fn entry_failure_restores_state() -> Result<()> {
    let (_probe, machine) = ready_machine().await;
    machine.start_pump_events()?;

    let err = machine
        .post_event(TestEvent::Trip, 5)?
        .outcome()
        .await
        .expect_err("trap entry must reject");
    assert!(err.to_string().contains("entry refused"));
    assert_eq!(machine.current_tag(), Some(TestTag::A));

    // The machine still works afterwards.
    let state = machine.post_event(TestEvent::Next, 5)?.outcome().await?;
    assert_eq!(state.tag(), TestTag::B);
    Ok(())
}

/// A failing `on_exit` aborts the transition before any state change.
#[tokio::test]
async fn exit_failure_aborts_transition() -> Result<()> {
    let (probe, machine) = ready_machine().await;
    machine.start_pump_events()?;
    probe.fail_exit_a.store(true, Ordering::SeqCst);

    let err = machine
        .post_event(TestEvent::Next, 5)?
        .outcome()
        .await
        .expect_err("exit must reject");
    assert!(err.to_string().contains("exit refused"));
    assert_eq!(machine.current_tag(), Some(TestTag::A));
    assert_eq!(probe.entries_b.load(Ordering::SeqCst), 0);
    Ok(())
}

/// Out-of-range priorities are rejected synchronously, before any queue
/// mutation.
#[tokio::test]
async fn invalid_priority_rejected() -> Result<()> {
    let (_probe, machine) = ready_machine().await;

    let err = machine
        .post_event(TestEvent::Step("never"), machine.max_priority() + 1)
        .expect_err("priority out of range");
    assert!(matches!(
        err,
        PumpError::InvalidPriority { priority: 11, max: 10 }
    ));
    Ok(())
}

/// Posting or starting before `init_state` is a usage error.
#[tokio::test]
async fn use_before_init_rejected() -> Result<()> {
    let probe = Arc::new(Probe::default());
    let machine = StateMachine::new(probe, test_factory());

    assert!(matches!(
        machine.post_event(TestEvent::Next, 0),
        Err(PumpError::NotInitialized)
    ));
    assert!(matches!(
        machine.start_pump_events(),
        Err(PumpError::NotInitialized)
    ));
    Ok(())
}

/// `init_state` is one-shot.
#[tokio::test]
async fn double_init_rejected() -> Result<()> {
    let (_probe, machine) = ready_machine().await;

    let err = machine
        .init_state(TestTag::B, false)
        .await
        .expect_err("second init must fail");
    assert!(matches!(
        err.downcast_ref::<PumpError>(),
        Some(PumpError::AlreadyInitialized)
    ));
    Ok(())
}

/// A processor whose machine is gone reports `MachineGone`.
#[tokio::test]
async fn processor_outliving_machine() -> Result<()> {
    let (_probe, machine) = ready_machine().await;
    let processor = machine.processor();
    drop(machine);

    assert!(matches!(
        processor.post_event(TestEvent::Next, 0),
        Err(PumpError::MachineGone)
    ));
    Ok(())
}
