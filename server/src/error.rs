//! Error taxonomy shared by every PVP operation.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

use crate::game::types::UnknownVariant;

pub type PvpResult<T> = std::result::Result<T, PvpError>;

/// Why the store could not be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outage {
    Connection,
    Timeout,
    /// The store layer refuses work outright; callers should back off at once.
    CircuitOpen,
}

impl std::fmt::Display for Outage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outage::Connection => "connection",
            Outage::Timeout => "timeout",
            Outage::CircuitOpen => "circuit open",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum PvpError {
    #[error("player is already queued")]
    AlreadyQueued,

    #[error("player is not in the queue")]
    NotInQueue,

    #[error("match not found")]
    MatchNotFound,

    #[error("action rejected")]
    NotAParticipant,

    #[error("match is already finished")]
    AlreadyFinished,

    #[error("winner must be one of the match participants")]
    InvalidWinner,

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("no active season")]
    NoActiveSeason,

    #[error("beast is unknown or not owned by the player")]
    InvalidBeast,

    #[error("challenge not found")]
    ChallengeNotFound,

    #[error("invalid challenge: {0}")]
    InvalidChallenge(&'static str),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("store unavailable ({0})")]
    StoreUnavailable(Outage),

    #[error("schema missing: {0}")]
    SchemaMissing(String),

    #[error("store error: {0}")]
    Store(String),
}

impl PvpError {
    pub fn invalid_action(reason: impl Into<String>) -> Self {
        Self::InvalidAction(reason.into())
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest(reason.into())
    }

    /// Transient store failures: the operation may succeed if retried later.
    pub fn is_transient(&self) -> bool {
        matches!(self, PvpError::StoreUnavailable(_))
    }

    pub fn outage(&self) -> Option<Outage> {
        match self {
            PvpError::StoreUnavailable(o) => Some(*o),
            _ => None,
        }
    }
}

impl From<UnknownVariant> for PvpError {
    fn from(e: UnknownVariant) -> Self {
        PvpError::Store(format!("corrupt row: {e}"))
    }
}

/// SQLSTATE `undefined_table`.
const UNDEFINED_TABLE: &str = "42P01";

impl From<sqlx::Error> for PvpError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => PvpError::StoreUnavailable(Outage::Timeout),
            sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
                PvpError::StoreUnavailable(Outage::CircuitOpen)
            }
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                PvpError::StoreUnavailable(Outage::Connection)
            }
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
                if code == UNDEFINED_TABLE {
                    PvpError::SchemaMissing(db_err.message().to_owned())
                } else if code.starts_with("08") || code.starts_with("57P0") {
                    // connection_exception class / admin or crash shutdown
                    PvpError::StoreUnavailable(Outage::Connection)
                } else {
                    PvpError::Store(db_err.to_string())
                }
            }
            other => PvpError::Store(other.to_string()),
        }
    }
}

impl ResponseError for PvpError {
    fn status_code(&self) -> StatusCode {
        match self {
            PvpError::AlreadyQueued | PvpError::AlreadyFinished => StatusCode::CONFLICT,
            PvpError::NotInQueue
            | PvpError::InvalidWinner
            | PvpError::InvalidAction(_)
            | PvpError::InvalidBeast
            | PvpError::InvalidChallenge(_)
            | PvpError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            PvpError::MatchNotFound | PvpError::ChallengeNotFound => StatusCode::NOT_FOUND,
            PvpError::NotAParticipant => StatusCode::FORBIDDEN,
            PvpError::NoActiveSeason | PvpError::StoreUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            PvpError::SchemaMissing(_) | PvpError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Store internals stay in the log, not in the response.
        let reason = match self {
            PvpError::SchemaMissing(_) | PvpError::Store(_) => "internal error".to_owned(),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": reason }))
    }
}
