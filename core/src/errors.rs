use thiserror::Error;

use crate::types::PieceId;

/// Failures surfaced by overlay handlers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HudError {
    #[error("permission denied: {operation} requires a GM")]
    PermissionDenied { operation: &'static str },

    #[error("token has no owning actor")]
    MissingOwner,

    #[error("persistence failed: {0}")]
    Persistence(String),

    /// Nothing to do; handlers swallow this without notifying anyone.
    #[error("not applicable: {0}")]
    NotApplicable(String),

    #[error("overlay is not bound to a token")]
    Unbound,

    #[error("token {0} no longer exists")]
    PieceMissing(PieceId),
}

/// Error returned by a persistence round trip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

impl From<StoreError> for HudError {
    fn from(err: StoreError) -> Self {
        HudError::Persistence(err.0)
    }
}

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

impl HudError {
    /// Maps an error to the notification it should raise, if any.
    ///
    /// # Returns
    /// * `None` for [`HudError::NotApplicable`], which is never reported.
    pub fn notice_level(&self) -> Option<NoticeLevel> {
        match self {
            HudError::NotApplicable(_) => None,
            HudError::Persistence(_) => Some(NoticeLevel::Error),
            HudError::PermissionDenied { .. }
            | HudError::MissingOwner
            | HudError::Unbound
            | HudError::PieceMissing(_) => Some(NoticeLevel::Warning),
        }
    }
}
