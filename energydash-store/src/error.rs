// EnergyDash Store - SQLite persistence adapter
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for EnergyDash Store

use thiserror::Error;

/// Main error type for store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database directory could not be created
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite failure; a failed batch has already been rolled back
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored timestamp could not be read back
    #[error("Invalid stored timestamp in {column}: '{value}'")]
    InvalidTimestamp { column: &'static str, value: String },

    /// A stored notification category is unknown
    #[error("Invalid stored category: {0}")]
    InvalidCategory(String),

    /// Another thread panicked while holding the connection
    #[error("Connection lock poisoned")]
    LockPoisoned,
}

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
