// Error taxonomy shared by the state machine, the stores and the sync layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("the draft is already complete")]
    DraftAlreadyComplete,

    #[error("it is not this role's turn")]
    NotYourTurn,

    #[error("god `{god}` has already been banned or picked")]
    GodUnavailable { god: String },

    #[error("god `{god}` is not in the draft pool")]
    UnknownGod { god: String },

    #[error("session {id} changed since cursor {expected_cursor} was read (store is at {actual_cursor})")]
    StaleWrite {
        id: String,
        expected_cursor: usize,
        actual_cursor: usize,
    },

    #[error("session {id} does not exist")]
    RecordNotFound { id: String },

    #[error("session {id} violates an invariant: {reason}")]
    CorruptRecord { id: String, reason: String },

    #[error("store failure: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl DraftError {
    /// Local validation failures: nothing was written, and the caller may try
    /// again after re-reading state. Never retried automatically.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::DraftAlreadyComplete
                | Self::NotYourTurn
                | Self::GodUnavailable { .. }
                | Self::UnknownGod { .. }
        )
    }

    /// The caller's view of the session is out of date.
    pub fn needs_refresh(&self) -> bool {
        matches!(self, Self::StaleWrite { .. })
    }

    /// The session cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = DraftError::GodUnavailable { god: "Zeus".into() };
        assert_eq!(err.to_string(), "god `Zeus` has already been banned or picked");

        let err = DraftError::RecordNotFound { id: "lobby_1".into() };
        assert_eq!(err.to_string(), "session lobby_1 does not exist");

        let err = DraftError::StaleWrite {
            id: "lobby_1".into(),
            expected_cursor: 3,
            actual_cursor: 4,
        };
        assert_eq!(
            err.to_string(),
            "session lobby_1 changed since cursor 3 was read (store is at 4)"
        );
    }

    #[test]
    fn classification() {
        assert!(DraftError::NotYourTurn.is_validation());
        assert!(DraftError::DraftAlreadyComplete.is_validation());
        assert!(!DraftError::NotYourTurn.needs_refresh());

        let stale = DraftError::StaleWrite {
            id: "x".into(),
            expected_cursor: 0,
            actual_cursor: 1,
        };
        assert!(stale.needs_refresh());
        assert!(!stale.is_validation());
        assert!(!stale.is_fatal());

        assert!(DraftError::RecordNotFound { id: "x".into() }.is_fatal());
    }

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DraftError>();
    }
}
