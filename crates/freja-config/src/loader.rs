// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::Path;

use anyhow::Context;

use crate::schema::Config;

/// Load a [`Config`] from a YAML file.
///
/// A missing file is not an error – the embedding host may run entirely on
/// defaults.  A present-but-invalid file is an error so that a typo'd config
/// never silently degrades to defaults.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
