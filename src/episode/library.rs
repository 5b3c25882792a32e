// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use anyhow::{Context, Result};
use dashmap::DashMap;
use tokio::time::{Duration, sleep};

use crate::{
    cfg::config::{EngineConfig, EpisodeSpec},
    engine::{EventTicket, StateFactory, StateMachine},
    episode::{Episode, EpisodeEvent, EpisodeMachine, EpisodeTag},
};

/// One tracked episode: the owner object plus its machine.
#[derive(Clone)]
pub struct EpisodeEntry {
    pub episode: Arc<Episode>,
    pub machine: Arc<EpisodeMachine>,
}

/// Registry of episode machines, keyed by episode id.
pub struct EpisodeLibrary {
    entries: DashMap<u64, EpisodeEntry>,
    factory: Arc<StateFactory<Episode, EpisodeEvent, EpisodeTag>>,
    priority_levels: usize,
    id_gen: AtomicU64,
}

impl EpisodeLibrary {
    pub fn new(
        factory: Arc<StateFactory<Episode, EpisodeEvent, EpisodeTag>>,
        engine: &EngineConfig,
    ) -> Self {
        Self {
            entries: DashMap::new(),
            factory,
            priority_levels: engine.priority_levels,
            id_gen: AtomicU64::new(1),
        }
    }

    /// Registers an episode, initializes its machine in `Pending` and starts
    /// pumping. Returns the assigned id.
    pub async fn add_episode(&self, spec: &EpisodeSpec) -> Result<u64> {
        let id = self.id_gen.fetch_add(1, Ordering::SeqCst);
        let episode = Arc::new(Episode::new(id, spec));
        let machine = StateMachine::with_priority_levels(
            episode.clone(),
            self.factory.clone(),
            self.priority_levels,
        );

        machine.init_state(EpisodeTag::Pending, true).await?;
        machine.start_pump_events()?;

        self.entries.insert(
            id,
            EpisodeEntry {
                episode,
                machine,
            },
        );
        Ok(id)
    }

    pub fn entry(&self, id: u64) -> Result<EpisodeEntry> {
        Ok(self
            .entries
            .get(&id)
            .with_context(|| format!("unknown episode id={id}"))?
            .clone())
    }

    pub fn ids(&self) -> Vec<u64> {
        self.entries.iter().map(|kv| *kv.key()).collect()
    }

    /// Posts a user download request at the lowest priority, so in-flight
    /// completion events keep overtaking bulk actions.
    pub fn download(
        &self,
        id: u64,
    ) -> Result<EventTicket<Episode, EpisodeEvent, EpisodeTag>> {
        let entry = self.entry(id)?;
        let priority = entry.machine.max_priority();
        Ok(entry.machine.post_event(EpisodeEvent::StartDownload, priority)?)
    }

    /// Posts a retry for a failed episode.
    pub fn retry(&self, id: u64) -> Result<EventTicket<Episode, EpisodeEvent, EpisodeTag>> {
        let entry = self.entry(id)?;
        let priority = entry.machine.max_priority();
        Ok(entry.machine.post_event(EpisodeEvent::Retry, priority)?)
    }

    /// Stops every machine's pump. In-flight dispatch cycles finish on their
    /// own.
    pub fn stop_all(&self) {
        for kv in self.entries.iter() {
            kv.value().machine.stop_pump_events();
        }
    }

    /// Polls until every episode reached a terminal state or `timeout`
    /// elapsed. Returns the terminal tags keyed by id.
    pub async fn wait_terminal(&self, timeout: Duration) -> Result<Vec<(u64, EpisodeTag)>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let tags: Vec<(u64, Option<EpisodeTag>)> = self
                .entries
                .iter()
                .map(|kv| (*kv.key(), kv.value().machine.current_tag()))
                .collect();

            let done = tags.iter().all(|(_, tag)| {
                matches!(tag, Some(EpisodeTag::Downloaded | EpisodeTag::Failed))
            });
            if done {
                return Ok(tags
                    .into_iter()
                    .filter_map(|(id, tag)| tag.map(|t| (id, t)))
                    .collect());
            }
            if tokio::time::Instant::now() >= deadline {
                anyhow::bail!("episodes did not settle within {timeout:?}");
            }
            sleep(Duration::from_millis(20)).await;
        }
    }
}
