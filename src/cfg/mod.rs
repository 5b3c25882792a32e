//! This module handles configuration, command-line parsing, and logging.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Resolves configuration file paths given on the command line.
pub mod cli;
/// Engine and demo configuration loaded from YAML.
pub mod config;
/// Tracing subscriber setup driven by a YAML logger config.
pub mod logger;
