// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan, time::ChronoUtc},
    layer::SubscriberExt,
};

// Config logger
#[derive(Debug, Deserialize, Clone)]
struct LoggerConfig {
    logger: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
struct LogConfig {
    level: String,
    output: String,
    #[serde(default)]
    json: bool,
    #[serde(default)]
    is_show_line: bool,
    #[serde(default)]
    is_show_target: bool,
    file: Option<LogFileConfig>,
}

#[derive(Debug, Deserialize, Clone)]
struct LogFileConfig {
    path: String,
    rotation_frequency: Option<String>,
}

fn split_path(path: &str) -> (String, String) {
    let path = Path::new(path);
    let directory = path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .to_string_lossy()
        .into_owned();
    let file_name = path
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new(""))
        .to_string_lossy()
        .into_owned();
    (directory, file_name)
}

/// Initializes the global tracing subscriber from a YAML logger config.
///
/// Keep the returned guard alive for as long as logs should be flushed.
pub fn init_logger(config_path: &str) -> Result<WorkerGuard> {
    let config_content = fs::read_to_string(config_path)
        .context(format!("Failed to read config file: {config_path}"))?;
    let config: LoggerConfig = serde_yaml::from_str(&config_content)
        .context(format!("Failed to parse config file: {config_path}"))?;
    let cfg = config.logger;

    let (file_writer, guard) = match cfg.output.as_str() {
        "stdout" => tracing_appender::non_blocking(std::io::stdout()),
        "stderr" => tracing_appender::non_blocking(std::io::stderr()),
        "file" => {
            let file_cfg = cfg
                .file
                .as_ref()
                .context("Failed to find log file config")?;

            let rotation = match file_cfg.rotation_frequency.as_deref() {
                Some("minutely") => Rotation::MINUTELY,
                Some("hourly") => Rotation::HOURLY,
                Some("daily") => Rotation::DAILY,
                _ => Rotation::NEVER,
            };
            let (directory, file_name) = split_path(&file_cfg.path);
            let file_appender = RollingFileAppender::new(rotation, directory, file_name);
            tracing_appender::non_blocking(file_appender)
        },
        _ => {
            return Err(anyhow::anyhow!("Invalid log output specified"));
        },
    };

    let env_filter =
        EnvFilter::try_new(&cfg.level).context("Failed to parse log level from config")?;

    let subscriber_layer = fmt::layer()
        .with_writer(move || file_writer.clone())
        .with_timer(ChronoUtc::rfc_3339())
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_target(cfg.is_show_target)
        .with_line_number(cfg.is_show_line);

    if cfg.json {
        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(subscriber_layer.json());
        tracing::subscriber::set_global_default(subscriber)
            .context("Failed to set global default subscriber")?;
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(subscriber_layer);
        tracing::subscriber::set_global_default(subscriber)
            .context("Failed to set global default subscriber")?;
    }

    Ok(guard)
}
