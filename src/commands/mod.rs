// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Command implementations

pub mod completions;
pub mod config;
pub mod delete;
pub mod import;
pub mod new;
pub mod recent;
pub mod rename;
pub mod show;

use crate::config::Config;
use crate::events::EventBus;
use crate::persistence::StorePersistence;
use crate::shell::ModelingApp;
use crate::store::MemoryStore;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;

/// A shell wired to the local collections for one command
pub struct Session {
    /// The application shell
    pub app: ModelingApp<MemoryStore>,
    /// Effective configuration
    pub config: Config,
}

impl Session {
    /// Open the collections under the configured data directory
    pub async fn open(config: Config) -> Result<Self> {
        let bus = EventBus::new();
        let store = MemoryStore::new(bus.clone());
        let persistence = StorePersistence::open(store.clone(), bus.clone(), &config.data_dir)
            .with_context(|| format!("Failed to open project store in {}", config.data_dir.display()))?
            .with_page_size(config.recent_page_size);
        let app = ModelingApp::new(store, bus, persistence).with_zoom_debounce(config.zoom_debounce());
        app.persistence().listen().await;
        app.listen().await;
        Ok(Self { app, config })
    }

    /// Let the mirror and the shell handle everything published so far
    ///
    /// Fails with the alert message when something was reported.
    pub async fn settle(&self) -> Result<()> {
        let mirrored = self.app.persistence().drain().await;
        let handled = self.app.drain().await;
        tracing::debug!("Settled {} mirrored and {} shell events", mirrored, handled);
        match self.app.state().alert {
            Some(alert) => anyhow::bail!(alert),
            None => Ok(()),
        }
    }
}

/// Output settings shared by commands
#[derive(Debug, Clone, Copy)]
pub struct Output {
    /// Print JSON instead of text
    pub json: bool,
    /// Colorize headings
    pub color: bool,
}

impl Output {
    /// Format a heading
    #[must_use]
    pub fn heading(&self, text: &str) -> String {
        if self.color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    /// Format a secondary detail such as an id
    #[must_use]
    pub fn dim(&self, text: &str) -> String {
        if self.color {
            text.dimmed().to_string()
        } else {
            text.to_string()
        }
    }

    /// Print a value as pretty JSON
    pub fn print_json(&self, value: &impl Serialize) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
        Ok(())
    }
}
