// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;

use crate::unit_tests::common::{TestEvent, ready_machine};

/// Events posted before pumping starts drain in priority order, FIFO within
/// one level, regardless of posting order.
#[tokio::test]
async fn priority_order_over_posting_order() -> Result<()> {
    let (probe, machine) = ready_machine().await;

    let t_a = machine.post_event(TestEvent::Step("a5"), 5)?;
    let t_b = machine.post_event(TestEvent::Step("b0"), 0)?;
    let t_c = machine.post_event(TestEvent::Step("c0"), 0)?;
    let t_d = machine.post_event(TestEvent::Step("d3"), 3)?;

    machine.start_pump_events()?;
    for ticket in [t_a, t_b, t_c, t_d] {
        ticket.outcome().await?;
    }

    let steps: Vec<String> = probe
        .log_snapshot()
        .into_iter()
        .filter(|l| !l.starts_with("enter"))
        .collect();
    assert_eq!(steps, ["b0", "c0", "d3", "a5"]);
    Ok(())
}

/// A high-priority event enqueued while a lower-priority backlog is pending
/// overtakes it at the next selection.
#[tokio::test]
async fn high_priority_overtakes_backlog() -> Result<()> {
    let (probe, machine) = ready_machine().await;

    machine.post_event(TestEvent::Step("first10"), 10)?;
    machine.post_event(TestEvent::Step("second10"), 10)?;
    let urgent = machine.post_event(TestEvent::Step("urgent0"), 0)?;
    machine.start_pump_events()?;
    urgent.outcome().await?;

    let steps: Vec<String> = probe
        .log_snapshot()
        .into_iter()
        .filter(|l| !l.starts_with("enter"))
        .collect();
    assert_eq!(steps.first().map(String::as_str), Some("urgent0"));
    Ok(())
}

/// FIFO holds within a single priority level across many events.
#[tokio::test]
async fn fifo_within_level() -> Result<()> {
    let (probe, machine) = ready_machine().await;

    let labels = ["s1", "s2", "s3", "s4", "s5"];
    let mut tickets = Vec::new();
    for label in labels {
        tickets.push(machine.post_event(TestEvent::Step(label), 7)?);
    }
    machine.start_pump_events()?;
    for ticket in tickets {
        ticket.outcome().await?;
    }

    let steps: Vec<String> = probe
        .log_snapshot()
        .into_iter()
        .filter(|l| !l.starts_with("enter"))
        .collect();
    assert_eq!(steps, labels);
    Ok(())
}
