// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

use super::Output;
use crate::config::Config;
use anyhow::{Context, Result};

/// Print the effective configuration, or one key of it
pub fn run(config: &Config, key: Option<&str>, out: Output) -> Result<()> {
    let value = serde_json::to_value(config).context("Failed to serialize configuration")?;
    if let Some(key) = key {
        let entry = value
            .get(key)
            .ok_or_else(|| anyhow::anyhow!("Unknown configuration key: {}", key))?;
        if out.json {
            return out.print_json(entry);
        }
        match entry.as_str() {
            Some(text) => println!("{text}"),
            None => println!("{entry}"),
        }
        return Ok(());
    }

    if out.json {
        out.print_json(config)
    } else {
        print!("{}", toml::to_string_pretty(config).context("Failed to render configuration")?);
        Ok(())
    }
}
