// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use common::TaskStatus;
use thiserror::Error;

/// Typed failures produced by the engine operations.
///
/// Business-rule violations are returned as values; they never escape a
/// half-committed transaction (any failure inside an atomic unit rolls
/// the whole unit back before the error is returned). The HTTP boundary
/// in `handlers.rs` owns the mapping to status codes.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn not_found(entity: &str, id: i64) -> Self {
        EngineError::NotFound(format!("{} with ID {} does not exist", entity, id))
    }
}
