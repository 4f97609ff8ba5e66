//! Errors surfaced to interactive callers.
use crate::gate::{GateError, LimiterKind};
use crate::store::StoreError;

/// Error returned by the fail-fast consumer and [`EsiClient`](crate::EsiClient).
///
/// The three limit variants carry the epoch at which the caller may retry, so a
/// web handler can pass it on (for example as its own `Retry-After`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EsiError {
    #[error("ESI error limit reached, retry at {retry_at}")]
    ErrorLimitReached { retry_at: i64 },
    #[error("ESI rate limit reached, retry at {retry_at}")]
    RateLimitReached { retry_at: i64 },
    #[error("temporarily throttled by ESI, retry at {retry_at}")]
    TemporarilyThrottled { retry_at: i64 },
    #[error("character not found")]
    CharacterNotFound,
    #[error("character has no valid token")]
    InvalidToken,
    #[error("unknown error: {0}")]
    Unknown(String),
    /// Limiter state could not be read.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Discriminant of [`EsiError`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EsiErrorKind {
    ErrorLimitReached,
    RateLimitReached,
    TemporarilyThrottled,
    CharacterNotFound,
    InvalidToken,
    Unknown,
    Store,
}

impl EsiError {
    /// The error for a blocked limiter.
    pub fn limited(kind: LimiterKind, retry_at: i64) -> Self {
        match kind {
            LimiterKind::RateLimit => EsiError::RateLimitReached { retry_at },
            LimiterKind::Throttle => EsiError::TemporarilyThrottled { retry_at },
            LimiterKind::ErrorLimit => EsiError::ErrorLimitReached { retry_at },
        }
    }

    pub fn kind(&self) -> EsiErrorKind {
        match self {
            EsiError::ErrorLimitReached { .. } => EsiErrorKind::ErrorLimitReached,
            EsiError::RateLimitReached { .. } => EsiErrorKind::RateLimitReached,
            EsiError::TemporarilyThrottled { .. } => EsiErrorKind::TemporarilyThrottled,
            EsiError::CharacterNotFound => EsiErrorKind::CharacterNotFound,
            EsiError::InvalidToken => EsiErrorKind::InvalidToken,
            EsiError::Unknown(_) => EsiErrorKind::Unknown,
            EsiError::Store(_) => EsiErrorKind::Store,
        }
    }

    /// Retry epoch for limit errors.
    pub fn retry_at(&self) -> Option<i64> {
        match self {
            EsiError::ErrorLimitReached { retry_at }
            | EsiError::RateLimitReached { retry_at }
            | EsiError::TemporarilyThrottled { retry_at } => Some(*retry_at),
            _ => None,
        }
    }

    /// Whether this error only means "wait and try again".
    pub fn is_limited(&self) -> bool {
        self.retry_at().is_some()
    }
}

impl From<GateError> for EsiError {
    fn from(error: GateError) -> Self {
        match error {
            GateError::Store(e) => EsiError::Store(e),
        }
    }
}

/// Failure reported by a [`TokenProvider`](crate::client::TokenProvider).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("character not found")]
    CharacterNotFound,
    #[error("character has no valid token")]
    InvalidToken,
    #[error("{0}")]
    Other(String),
}

impl From<AuthError> for EsiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::CharacterNotFound => EsiError::CharacterNotFound,
            AuthError::InvalidToken => EsiError::InvalidToken,
            AuthError::Other(message) => EsiError::Unknown(message),
        }
    }
}
