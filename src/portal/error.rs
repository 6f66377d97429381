//! Outcomes of a rejected login attempt.

use axum::http::StatusCode;

use crate::defense::PolicyMessages;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LoginError {
    /// Wrong username/password, or the identity provider failed to answer.
    /// Both look the same from outside so an attacker cannot tell them apart.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid challenge answer")]
    InvalidChallengeAnswer,
    #[error("locked out for another {seconds_left}s")]
    LockedOut { seconds_left: u64 },
    #[error("missing username or password")]
    MalformedRequest,
}

impl LoginError {
    #[must_use]
    pub fn status(self) -> StatusCode {
        match self {
            Self::InvalidCredentials | Self::InvalidChallengeAnswer => StatusCode::UNAUTHORIZED,
            Self::LockedOut { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::MalformedRequest => StatusCode::BAD_REQUEST,
        }
    }

    /// Error line shown above the policy feedback. Lockout has none; its
    /// blocking message already says everything.
    #[must_use]
    pub fn user_message(self, messages: &PolicyMessages) -> Option<String> {
        match self {
            Self::InvalidCredentials | Self::InvalidChallengeAnswer => {
                Some(messages.invalid_generic.clone())
            }
            Self::MalformedRequest => Some(messages.missing_fields.clone()),
            Self::LockedOut { .. } => None,
        }
    }
}
