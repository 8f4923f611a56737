// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Config and logger file paths given on the command line, falling back to
/// the files shipped in `tests/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliPaths {
    pub config: String,
    pub logger: String,
}

impl CliPaths {
    pub const DEFAULT_CONFIG: &'static str = "tests/config.yaml";
    pub const DEFAULT_LOGGER: &'static str = "tests/config_logger.yaml";

    /// `iscsi-targetd [CONFIG [LOGGER]]`
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Self {
        let mut it = args.into_iter().skip(1);
        Self {
            config: it.next().unwrap_or_else(|| Self::DEFAULT_CONFIG.to_string()),
            logger: it.next().unwrap_or_else(|| Self::DEFAULT_LOGGER.to_string()),
        }
    }
}

/// Absolute, canonical form of `rel`, resolved against the working directory.
pub fn resolve_config_path(rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);
    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };
    abs.canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))
}
