//! Store status codes and error classification.

use crate::store::context::CallContext;
use rusqlite::ffi;
use rusqlite::ErrorCode;
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Structured status reported by every failed store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    FailedPrecondition,
    Aborted,
    Unavailable,
    Internal,
}

impl StatusCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
            Self::InvalidArgument => "invalid_argument",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::PermissionDenied => "permission_denied",
            Self::FailedPrecondition => "failed_precondition",
            Self::Aborted => "aborted",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
        }
    }
}

impl Display for StatusCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by the store, with the originating SQLite error when there is one.
#[derive(Debug, Error)]
#[error("store error ({code}): {message}")]
pub struct StoreError {
    code: StatusCode,
    message: String,
    #[source]
    source: Option<rusqlite::Error>,
}

impl StoreError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Classifies a SQLite failure raised while serving `ctx`.
    ///
    /// Interrupts are attributed to the context so callers see `Cancelled` or
    /// `DeadlineExceeded` rather than a generic SQLite failure.
    pub(crate) fn from_sqlite(err: rusqlite::Error, ctx: &CallContext) -> Self {
        let code = classify_sqlite(&err, ctx);
        Self {
            code,
            message: err.to_string(),
            source: Some(err),
        }
    }
}

/// Failure inside a store call: either already classified, or a raw SQLite
/// error still to be classified against the call context.
#[derive(Debug)]
pub(crate) enum ExecError {
    Store(StoreError),
    Sqlite(rusqlite::Error),
}

impl ExecError {
    pub(crate) fn into_store(self, ctx: &CallContext) -> StoreError {
        match self {
            Self::Store(err) => err,
            Self::Sqlite(err) => StoreError::from_sqlite(err, ctx),
        }
    }
}

impl From<rusqlite::Error> for ExecError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

fn classify_sqlite(err: &rusqlite::Error, ctx: &CallContext) -> StatusCode {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
            ErrorCode::ConstraintViolation => match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => {
                    StatusCode::AlreadyExists
                }
                _ => StatusCode::FailedPrecondition,
            },
            ErrorCode::OperationInterrupted => ctx.status().unwrap_or(StatusCode::Cancelled),
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => StatusCode::Unavailable,
            ErrorCode::PermissionDenied
            | ErrorCode::ReadOnly
            | ErrorCode::AuthorizationForStatementDenied => StatusCode::PermissionDenied,
            ErrorCode::OperationAborted => StatusCode::Aborted,
            ErrorCode::CannotOpen | ErrorCode::SystemIoFailure | ErrorCode::DiskFull => {
                StatusCode::Unavailable
            }
            ErrorCode::ApiMisuse | ErrorCode::ParameterOutOfRange | ErrorCode::TooBig => {
                StatusCode::InvalidArgument
            }
            ErrorCode::Unknown => StatusCode::Unknown,
            _ => StatusCode::Internal,
        },
        rusqlite::Error::QueryReturnedNoRows => StatusCode::NotFound,
        rusqlite::Error::InvalidParameterName(_)
        | rusqlite::Error::InvalidParameterCount(_, _)
        | rusqlite::Error::InvalidColumnName(_)
        | rusqlite::Error::InvalidColumnIndex(_)
        | rusqlite::Error::ToSqlConversionFailure(_) => StatusCode::InvalidArgument,
        // Malformed SQL surfaces as SQLITE_ERROR which lands here.
        _ => StatusCode::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::{StatusCode, StoreError};
    use crate::store::context::CallContext;
    use rusqlite::{ffi, Connection};

    fn sqlite_failure(extended_code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(extended_code), None)
    }

    #[test]
    fn primary_key_and_unique_violations_map_to_already_exists() {
        let ctx = CallContext::background();
        for code in [ffi::SQLITE_CONSTRAINT_PRIMARYKEY, ffi::SQLITE_CONSTRAINT_UNIQUE] {
            let err = StoreError::from_sqlite(sqlite_failure(code), &ctx);
            assert_eq!(err.code(), StatusCode::AlreadyExists);
        }
        let not_null = StoreError::from_sqlite(sqlite_failure(ffi::SQLITE_CONSTRAINT_NOTNULL), &ctx);
        assert_eq!(not_null.code(), StatusCode::FailedPrecondition);
    }

    #[test]
    fn interrupt_is_attributed_to_the_context() {
        let ctx = CallContext::background();
        ctx.cancel();
        let err = StoreError::from_sqlite(sqlite_failure(ffi::SQLITE_INTERRUPT), &ctx);
        assert_eq!(err.code(), StatusCode::Cancelled);
    }

    #[test]
    fn real_duplicate_insert_is_classified() {
        let conn = Connection::open_in_memory().expect("in-memory connection should open");
        conn.execute_batch("CREATE TABLE t (k TEXT PRIMARY KEY); INSERT INTO t VALUES ('a');")
            .expect("setup SQL should run");
        let err = conn.execute("INSERT INTO t VALUES ('a')", []).expect_err("statement should fail");
        let err = StoreError::from_sqlite(err, &CallContext::background());
        assert_eq!(err.code(), StatusCode::AlreadyExists);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn display_includes_code_and_message() {
        let err = StoreError::new(StatusCode::Unavailable, "store closed");
        assert_eq!(err.to_string(), "store error (unavailable): store closed");
    }
}
