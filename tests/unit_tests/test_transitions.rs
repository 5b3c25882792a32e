// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{Arc, atomic::Ordering};

use anyhow::Result;
use statepump_rs::engine::StateMachine;

use crate::unit_tests::common::{Probe, TestEvent, TestTag, ready_machine, test_factory};

/// The two-state toggle scenario: A → B → A, with entry counters
/// A=2 (init + second toggle) and B=1.
#[tokio::test]
async fn toggle_scenario_counts_entries() -> Result<()> {
    let (probe, machine) = ready_machine().await;
    machine.start_pump_events()?;

    let first = machine.post_event(TestEvent::Next, 5)?.outcome().await?;
    assert_eq!(first.tag(), TestTag::B);
    assert_eq!(machine.current_tag(), Some(TestTag::B));

    let second = machine.post_event(TestEvent::Next, 5)?.outcome().await?;
    assert_eq!(second.tag(), TestTag::A);
    assert_eq!(machine.current_tag(), Some(TestTag::A));

    assert_eq!(probe.entries_a.load(Ordering::SeqCst), 2);
    assert_eq!(probe.entries_b.load(Ordering::SeqCst), 1);
    assert_eq!(probe.exits_a.load(Ordering::SeqCst), 1);
    assert_eq!(probe.exits_b.load(Ordering::SeqCst), 1);
    Ok(())
}

/// Transition atomicity: the old state is still current throughout its
/// `on_exit`, and the new state is already current when its `on_entry` runs.
#[tokio::test]
async fn exit_sees_old_state_entry_sees_new() -> Result<()> {
    let (probe, machine) = ready_machine().await;
    machine.start_pump_events()?;
    machine.post_event(TestEvent::Next, 5)?.outcome().await?;

    let log = probe.log_snapshot();
    let exit_pos = log
        .iter()
        .position(|l| l == "exit A to=B cur=Some(A)")
        .unwrap_or_else(|| panic!("missing exit record in {log:?}"));
    let entry_pos = log
        .iter()
        .position(|l| l == "enter B from=Some(A) cur=Some(B)")
        .unwrap_or_else(|| panic!("missing entry record in {log:?}"));
    assert!(exit_pos < entry_pos, "exit must complete before entry");
    Ok(())
}

/// `init_state` with `run_entry = false` suppresses the initial entry, the
/// restore-from-persistence path.
#[tokio::test]
async fn init_without_entry() -> Result<()> {
    let probe = Arc::new(Probe::default());
    let machine = StateMachine::new(probe.clone(), test_factory());
    probe
        .machine
        .set(Arc::downgrade(&machine))
        .expect("bound twice");
    machine.init_state(TestTag::B, false).await?;

    assert_eq!(machine.current_tag(), Some(TestTag::B));
    assert_eq!(probe.entries_b.load(Ordering::SeqCst), 0);
    Ok(())
}

/// Initial entry observes `from = None`.
#[tokio::test]
async fn initial_entry_has_no_predecessor() -> Result<()> {
    let (probe, _machine) = ready_machine().await;
    let log = probe.log_snapshot();
    assert_eq!(log, ["enter A from=None cur=Some(A)"]);
    Ok(())
}
