// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::engine::DEFAULT_PRIORITY_LEVELS;

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Event pump parameters shared by every machine the process builds.
    pub engine: EngineConfig,
    /// Simulated episode feed driven by the demo binary.
    pub demo: DemoConfig,
}

/// Tunables of the event pump itself.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct EngineConfig {
    #[serde(rename = "PriorityLevels", default = "default_priority_levels")]
    /// Number of FIFO priority queues per machine (priority 0 is highest).
    pub priority_levels: usize,

    #[serde(rename = "CompletionPriority", default)]
    /// Priority used for download-completion events posted by background
    /// transfers; keeping it at 0 lets completions overtake queued user
    /// actions.
    pub completion_priority: usize,
}

fn default_priority_levels() -> usize {
    DEFAULT_PRIORITY_LEVELS
}

/// Parameters of the simulated download workload.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct DemoConfig {
    #[serde(rename = "Episodes")]
    /// Episodes to register in the library at startup.
    pub episodes: Vec<EpisodeSpec>,

    #[serde(rename = "DownloadMillis", with = "serde_millis")]
    /// Base duration of one simulated transfer.
    pub download_time: Duration,

    #[serde(rename = "FailureRate", default)]
    /// Probability in `[0, 1]` that a simulated transfer fails.
    pub failure_rate: f64,
}

/// One episode of the simulated feed.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct EpisodeSpec {
    #[serde(rename = "Title")]
    pub title: String,

    #[serde(rename = "MediaUrl")]
    pub media_url: String,

    #[serde(rename = "SizeBytes")]
    /// Reported size of the finished download.
    pub size_bytes: u64,
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(
            self.engine.priority_levels >= 1,
            "PriorityLevels must be >= 1"
        );
        ensure!(
            self.engine.priority_levels <= 64,
            "PriorityLevels must be <= 64"
        );
        ensure!(
            self.engine.completion_priority < self.engine.priority_levels,
            "CompletionPriority must be a valid priority"
        );
        ensure!(
            (0.0..=1.0).contains(&self.demo.failure_rate),
            "FailureRate must be within [0, 1]"
        );
        for ep in &self.demo.episodes {
            ensure!(!ep.title.is_empty(), "episode Title must not be empty");
            ensure!(
                !ep.media_url.is_empty(),
                "episode MediaUrl must not be empty"
            );
        }
        Ok(())
    }
}

/// Serde helpers for representing `Duration` as a number of milliseconds.
mod serde_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
