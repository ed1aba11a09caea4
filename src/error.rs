//! Error taxonomy for roll requests
//!
//! Physical anomalies (clamped velocities, timeouts) are statuses, not errors.

use crate::sim::RollStatus;
use crate::tray::RollHandle;

/// Alias for `Result<T, RollError>`.
pub type RollResult<T> = Result<T, RollError>;

/// Errors surfaced synchronously to callers.
#[derive(Debug, thiserror::Error)]
pub enum RollError {
    /// Bad caller input; the roll never starts.
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument {
        /// Name of the offending argument or setting.
        name: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// Outcome requested before the roll resolved or timed out.
    #[error("roll outcome not ready (status: {0:?})")]
    NotReady(RollStatus),

    /// A roll is already spawning, simulating or settled on this session.
    #[error("a roll is already in progress")]
    RollInProgress,

    /// The tray never issued this handle, or it was released.
    #[error("unknown roll handle: {0}")]
    UnknownHandle(RollHandle),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RollError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}
