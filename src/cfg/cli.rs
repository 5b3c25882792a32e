// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Resolves a possibly-relative config path against the current working
/// directory and canonicalizes it.
pub fn resolve_config_path(rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);

    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };

    let canon = abs
        .canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))?;

    Ok(canon)
}

/// Takes the config path from the first CLI argument, falling back to
/// `default` when none was given.
pub fn config_path_from_args(default: &str) -> Result<PathBuf> {
    let rel = std::env::args().nth(1);
    resolve_config_path(rel.as_deref().unwrap_or(default))
}
