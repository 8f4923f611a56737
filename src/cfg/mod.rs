//! Daemon configuration, command-line handling and logging.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Command-line arguments and config path resolution.
pub mod cli;
/// YAML configuration of the frontend, portal, targets and session defaults.
pub mod config;
/// Enumerations used in configuration.
pub mod enums;
/// Logger initialization.
pub mod logger;
