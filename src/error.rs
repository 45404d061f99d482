//! Error types for surfacewire.

use thiserror::Error;

use crate::status::Status;

/// Main error type for all surfacewire operations.
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// The transport could not complete the call (channel broken, peer gone).
    #[error("Transport failure: {0}")]
    Transport(Status),

    /// The remote implementation answered with an error status.
    #[error("Remote returned {0}")]
    Remote(Status),

    /// The message does not carry this protocol's interface token.
    #[error("Interface token mismatch: expected {expected:?}, got {actual:?}")]
    BadInterface { expected: String, actual: String },

    /// No handler for the transaction code (unknown or capability-gated).
    #[error("Unknown transaction code: {0}")]
    UnknownTransaction(u32),

    /// The operation is not part of the negotiated capability set.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// A read ran past the end of the data area.
    #[error("Not enough data: needed {needed} bytes, {available} available")]
    NotEnoughData { needed: usize, available: usize },

    /// A read wanted more descriptors than the side channel holds.
    #[error("Missing descriptor: needed {needed}, {available} available")]
    MissingDescriptor { needed: usize, available: usize },

    /// Structurally invalid payload.
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// I/O error (configuration loading).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error (control plane and configuration).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SurfaceError {
    /// Project this error to the status written into a reply.
    pub fn status(&self) -> Status {
        match self {
            SurfaceError::Transport(status) | SurfaceError::Remote(status) => *status,
            SurfaceError::BadInterface { .. } => Status::PERMISSION_DENIED,
            SurfaceError::UnknownTransaction(_) => Status::UNKNOWN_TRANSACTION,
            SurfaceError::Unsupported(_) => Status::INVALID_OPERATION,
            SurfaceError::NotEnoughData { .. } => Status::NOT_ENOUGH_DATA,
            SurfaceError::MissingDescriptor { .. } => Status::BAD_VALUE,
            SurfaceError::Malformed(_) => Status::BAD_VALUE,
            SurfaceError::Io(_) | SurfaceError::Json(_) => Status::BAD_TYPE,
        }
    }

    /// Shorthand for an application-level failure.
    #[inline]
    pub fn remote(status: Status) -> Self {
        SurfaceError::Remote(status)
    }

    /// True if this is a transport-level failure.
    pub fn is_transport(&self) -> bool {
        matches!(self, SurfaceError::Transport(_))
    }
}

/// Result type alias using SurfaceError.
pub type Result<T> = std::result::Result<T, SurfaceError>;

/// Turn a decoded reply status into a result.
///
/// Non-negative values pass through (dequeue uses them as flags).
pub(crate) fn check_status(status: Status) -> Result<i32> {
    if status.is_ok() {
        Ok(status.code())
    } else {
        Err(SurfaceError::Remote(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_projection() {
        assert_eq!(
            SurfaceError::Remote(Status::BUSY).status(),
            Status::BUSY
        );
        assert_eq!(
            SurfaceError::UnknownTransaction(99).status(),
            Status::UNKNOWN_TRANSACTION
        );
        let bad = SurfaceError::BadInterface {
            expected: "a".into(),
            actual: "b".into(),
        };
        assert_eq!(bad.status(), Status::PERMISSION_DENIED);
    }

    #[test]
    fn test_check_status() {
        assert_eq!(check_status(Status::OK).unwrap(), 0);
        assert_eq!(check_status(Status(2)).unwrap(), 2);
        let err = check_status(Status::BAD_VALUE).unwrap_err();
        assert!(matches!(err, SurfaceError::Remote(Status::BAD_VALUE)));
    }

    #[test]
    fn test_display_messages() {
        let err = SurfaceError::NotEnoughData {
            needed: 8,
            available: 4,
        };
        assert!(err.to_string().contains("needed 8 bytes"));
        assert!(SurfaceError::Transport(Status::DEAD_OBJECT)
            .to_string()
            .contains("DEAD_OBJECT"));
    }
}
