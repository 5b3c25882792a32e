use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use statepump_rs::{
    cfg::{cli::config_path_from_args, config::Config, logger::init_logger},
    episode::{EpisodeTag, episode_factory, library::EpisodeLibrary},
};
use tokio::main;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[main]
async fn main() -> Result<()> {
    let _init_logger = init_logger("tests/config_logger.yaml")?;

    let config = config_path_from_args("tests/config.yaml")
        .and_then(Config::load_from_file)
        .context("failed to resolve or load config")?;

    let factory = episode_factory(&config.engine, &config.demo);
    let library = EpisodeLibrary::new(factory, &config.engine);

    for spec in &config.demo.episodes {
        let id = library.add_episode(spec).await?;
        info!(id, title = %spec.title, "episode registered");
    }

    let mut tickets = Vec::new();
    for id in library.ids() {
        tickets.push((id, library.download(id)?));
    }
    for (id, ticket) in tickets {
        match ticket.outcome().await {
            Ok(state) => info!(id, state = ?state.tag(), "download request handled"),
            Err(e) => info!(id, "download request rejected: {e:#}"),
        }
    }

    let shutdown = CancellationToken::new();
    let shutdown_on_ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_on_ctrl_c.cancel();
        }
    });

    let settle = library.wait_terminal(Duration::from_secs(30));
    tokio::select! {
        res = settle => {
            let mut report = Vec::new();
            for (id, tag) in res? {
                let entry = library.entry(id)?;
                report.push(json!({
                    "id": id,
                    "title": entry.episode.title,
                    "state": format!("{tag:?}"),
                    "bytes": entry.episode.bytes_on_disk(),
                    "attempts": entry.episode.attempts(),
                    "error": entry.episode.last_error(),
                }));
                match tag {
                    EpisodeTag::Downloaded => info!(
                        id,
                        title = %entry.episode.title,
                        bytes = entry.episode.bytes_on_disk(),
                        attempts = entry.episode.attempts(),
                        "episode downloaded"
                    ),
                    _ => info!(
                        id,
                        title = %entry.episode.title,
                        error = entry.episode.last_error().as_deref().unwrap_or("unknown"),
                        "episode failed"
                    ),
                }
            }
            let summary = json!({
                "finished_at": chrono::Utc::now().to_rfc3339(),
                "episodes": report,
            });
            info!(summary = %summary, "run complete");
        },
        _ = shutdown.cancelled() => {
            info!("interrupted, stopping pumps");
        },
    }

    library.stop_all();
    Ok(())
}
