// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rusqlite::ErrorCode;
use thiserror::Error;

use crate::validation::InputError;

/// Failure kinds every service call can surface.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// User-correctable input problem; the message is shown as-is.
    #[error("{0}")]
    Validation(String),

    /// The record exists but belongs to someone else. Rendered like `NotFound`
    /// so ids of other users cannot be probed.
    #[error("permission denied")]
    Permission,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;

impl ServiceError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn invariant(detail: impl Into<String>) -> Self {
        Self::Invariant(detail.into())
    }

    /// Busy or locked database; worth another attempt after a pause.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Storage(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

impl From<InputError> for ServiceError {
    fn from(e: InputError) -> Self {
        Self::Validation(e.to_string())
    }
}
