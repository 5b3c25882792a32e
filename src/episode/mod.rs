//! This module contains the episode-download domain driven by the engine.
//!
//! The lifecycle is pending → downloading → downloaded / failed, with a
//! simulated transfer standing in for the real network. It exists for the
//! demo binary and as a realistic exercise of the engine surfaces.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Registry of episode machines keyed by episode id.
pub mod library;

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, AtomicU64, Ordering},
    },
    time::Duration,
};

use anyhow::Result;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    cfg::config::{DemoConfig, EngineConfig, EpisodeSpec},
    engine::{Processor, State, StateFactory, StateFuture, StateMachine},
};

/// Discriminant of the episode lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EpisodeTag {
    Pending,
    Downloading,
    Downloaded,
    Failed,
}

/// Events the application and background transfers post at an episode.
#[derive(Debug)]
pub enum EpisodeEvent {
    /// User action: fetch the media file.
    StartDownload,
    /// Posted by the transfer task on success.
    DownloadOk { bytes: u64 },
    /// Posted by the transfer task on failure.
    DownloadErr(String),
    /// User action: try a failed download again.
    Retry,
}

/// The owner object: all per-episode mutable data lives here, never on the
/// shared state instances.
#[derive(Debug)]
pub struct Episode {
    pub id: u64,
    pub title: String,
    pub media_url: String,
    pub size_bytes: u64,

    bytes_on_disk: AtomicU64,
    attempts: AtomicU32,
    last_error: Mutex<Option<String>>,
}

impl Episode {
    pub fn new(id: u64, spec: &EpisodeSpec) -> Self {
        Self {
            id,
            title: spec.title.clone(),
            media_url: spec.media_url.clone(),
            size_bytes: spec.size_bytes,
            bytes_on_disk: AtomicU64::new(0),
            attempts: AtomicU32::new(0),
            last_error: Mutex::new(None),
        }
    }

    pub fn bytes_on_disk(&self) -> u64 {
        self.bytes_on_disk.load(Ordering::SeqCst)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().expect("episode lock poisoned").clone()
    }

    fn record_success(&self, bytes: u64) {
        self.bytes_on_disk.store(bytes, Ordering::SeqCst);
        *self.last_error.lock().expect("episode lock poisoned") = None;
    }

    fn record_failure(&self, reason: String) {
        *self.last_error.lock().expect("episode lock poisoned") = Some(reason);
    }
}

/// Machine shape used throughout the demo.
pub type EpisodeMachine = StateMachine<Episode, EpisodeEvent, EpisodeTag>;
/// Processor of the demo shape.
pub type EpisodeProcessor = Processor<Episode, EpisodeEvent, EpisodeTag>;

struct Pending;

impl State<Episode, EpisodeEvent, EpisodeTag> for Pending {
    fn tag(&self) -> EpisodeTag {
        EpisodeTag::Pending
    }

    fn on_event<'a>(
        &'a self,
        owner: &'a Episode,
        event: EpisodeEvent,
        _events: &'a EpisodeProcessor,
    ) -> StateFuture<'a, Result<Option<EpisodeTag>>> {
        Box::pin(async move {
            match event {
                EpisodeEvent::StartDownload => Ok(Some(EpisodeTag::Downloading)),
                other => {
                    debug!(id = owner.id, ?other, "ignored while pending");
                    Ok(None)
                },
            }
        })
    }
}

/// Simulation knobs shared by every downloading episode; configuration only,
/// never per-owner data.
struct Downloading {
    download_time: Duration,
    failure_rate: f64,
    completion_priority: usize,
}

impl Downloading {
    /// Simulated transfer. Spawned from `on_entry`; posts exactly one
    /// terminal event back through the queue when it resolves.
    async fn transfer(
        id: u64,
        size_bytes: u64,
        download_time: Duration,
        failure_rate: f64,
        completion_priority: usize,
        events: EpisodeProcessor,
    ) {
        let jitter_ms = rand::random_range(0..=download_time.as_millis() as u64 / 2 + 1);
        sleep(download_time + Duration::from_millis(jitter_ms)).await;

        let outcome = if rand::random::<f64>() < failure_rate {
            EpisodeEvent::DownloadErr("simulated transfer error".to_string())
        } else {
            EpisodeEvent::DownloadOk { bytes: size_bytes }
        };
        if let Err(e) = events.post_event(outcome, completion_priority) {
            warn!(id, "could not deliver download outcome: {e}");
        }
    }
}

impl State<Episode, EpisodeEvent, EpisodeTag> for Downloading {
    fn tag(&self) -> EpisodeTag {
        EpisodeTag::Downloading
    }

    fn on_entry<'a>(
        &'a self,
        owner: &'a Episode,
        from: Option<EpisodeTag>,
        events: &'a EpisodeProcessor,
    ) -> StateFuture<'a, Result<()>> {
        Box::pin(async move {
            let attempt = owner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            info!(id = owner.id, ?from, attempt, url = %owner.media_url, "download started");

            tokio::spawn(Self::transfer(
                owner.id,
                owner.size_bytes,
                self.download_time,
                self.failure_rate,
                self.completion_priority,
                events.clone(),
            ));
            Ok(())
        })
    }

    fn on_event<'a>(
        &'a self,
        owner: &'a Episode,
        event: EpisodeEvent,
        _events: &'a EpisodeProcessor,
    ) -> StateFuture<'a, Result<Option<EpisodeTag>>> {
        Box::pin(async move {
            match event {
                EpisodeEvent::DownloadOk { bytes } => {
                    owner.record_success(bytes);
                    Ok(Some(EpisodeTag::Downloaded))
                },
                EpisodeEvent::DownloadErr(reason) => {
                    owner.record_failure(reason);
                    Ok(Some(EpisodeTag::Failed))
                },
                other => {
                    debug!(id = owner.id, ?other, "ignored while downloading");
                    Ok(None)
                },
            }
        })
    }
}

struct Downloaded;

impl State<Episode, EpisodeEvent, EpisodeTag> for Downloaded {
    fn tag(&self) -> EpisodeTag {
        EpisodeTag::Downloaded
    }

    fn on_entry<'a>(
        &'a self,
        owner: &'a Episode,
        _from: Option<EpisodeTag>,
        _events: &'a EpisodeProcessor,
    ) -> StateFuture<'a, Result<()>> {
        Box::pin(async move {
            info!(
                id = owner.id,
                bytes = owner.bytes_on_disk(),
                "download finished"
            );
            Ok(())
        })
    }

    fn on_event<'a>(
        &'a self,
        _owner: &'a Episode,
        _event: EpisodeEvent,
        _events: &'a EpisodeProcessor,
    ) -> StateFuture<'a, Result<Option<EpisodeTag>>> {
        Box::pin(async { Ok(None) })
    }
}

struct Failed;

impl State<Episode, EpisodeEvent, EpisodeTag> for Failed {
    fn tag(&self) -> EpisodeTag {
        EpisodeTag::Failed
    }

    fn on_entry<'a>(
        &'a self,
        owner: &'a Episode,
        _from: Option<EpisodeTag>,
        _events: &'a EpisodeProcessor,
    ) -> StateFuture<'a, Result<()>> {
        Box::pin(async move {
            warn!(
                id = owner.id,
                error = owner.last_error().as_deref().unwrap_or("unknown"),
                "download failed"
            );
            Ok(())
        })
    }

    fn on_event<'a>(
        &'a self,
        _owner: &'a Episode,
        event: EpisodeEvent,
        _events: &'a EpisodeProcessor,
    ) -> StateFuture<'a, Result<Option<EpisodeTag>>> {
        Box::pin(async move {
            match event {
                EpisodeEvent::Retry => Ok(Some(EpisodeTag::Downloading)),
                _ => Ok(None),
            }
        })
    }
}

/// Builds the flyweight factory for the episode shape. One factory serves
/// every episode in the process.
pub fn episode_factory(
    engine: &EngineConfig,
    demo: &DemoConfig,
) -> Arc<StateFactory<Episode, EpisodeEvent, EpisodeTag>> {
    Arc::new(StateFactory::new([
        Arc::new(Pending) as Arc<dyn State<Episode, EpisodeEvent, EpisodeTag>>,
        Arc::new(Downloading {
            download_time: demo.download_time,
            failure_rate: demo.failure_rate,
            completion_priority: engine.completion_priority,
        }),
        Arc::new(Downloaded),
        Arc::new(Failed),
    ]))
}
