// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Library error type
//!
//! Local, predictable failures (an unknown import format, a rejected
//! changelog) are matched at the call site. Everything else bubbles up to the
//! shell's reporter, which shows the message verbatim.

use crate::types::NodeKind;
use thiserror::Error;

/// Errors produced by the store, the persistence mirror and the importer
#[derive(Debug, Error)]
pub enum Error {
    /// A record does not exist
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of the missing record
        kind: NodeKind,
        /// Requested id
        id: String,
    },

    /// A local document does not exist
    #[error("Document not found: {id}")]
    MissingDocument {
        /// Requested document id
        id: String,
    },

    /// A document write carried a stale revision
    #[error("Document update conflict: {id}")]
    Conflict {
        /// Document id
        id: String,
    },

    /// Requested import type is not supported
    #[error("Unknown import format {0}")]
    UnknownImportFormat(String),

    /// An import file could not be interpreted
    #[error("Invalid import data: {0}")]
    InvalidImport(String),

    /// An imported record has no known enclosing node
    #[error("No parent found for imported record {id}")]
    MissingParent {
        /// Record id
        id: String,
    },

    /// A create or patch request does not fit the graph
    #[error("Invalid change: {0}")]
    InvalidChange(String),

    /// Local storage IO failure
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Local database failure
    #[error("Local database error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization failure
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for library operations
pub type Result<T, E = Error> = std::result::Result<T, E>;
