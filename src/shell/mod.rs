// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Application shell: view state, its reducer and the flows that drive it

pub mod app;
pub mod reducer;
pub mod state;
pub mod zoom;

pub use app::{EditorWidget, ModelingApp};
pub use reducer::{reduce, record_needed, Action};
pub use state::{CachedRoot, DesignerView, Pane, ViewState};
