// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Recent command - lists stored projects one page at a time

use super::{Output, Session};
use crate::persistence::RecentQuery;
use anyhow::Result;
use chrono::{DateTime, Utc};

/// Run recent command
pub async fn run(session: &Session, limit: Option<usize>, after: Option<String>, out: Output) -> Result<()> {
    let query = RecentQuery {
        limit,
        skip: after.as_ref().map(|_| 1),
        startkey: after,
    };
    let page = session.app.persistence().recent(query).await?;

    if out.json {
        return out.print_json(&page);
    }
    if page.items.is_empty() {
        println!("No stored projects");
        return Ok(());
    }
    println!("{}", out.heading("Recent projects"));
    for item in &page.items {
        let saved = DateTime::<Utc>::from_timestamp_millis(item.time)
            .map_or_else(|| "unknown".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string());
        let name = item.name.as_deref().unwrap_or("New project");
        println!("  {:<30} {}  {}", name, saved, out.dim(&item.id));
    }
    if let Some(next) = &page.options.startkey {
        println!();
        println!("Next page: --after '{}'", next);
    }
    Ok(())
}
