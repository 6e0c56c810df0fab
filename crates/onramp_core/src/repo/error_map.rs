//! Store status to domain error translation.

use super::RepoError;
use crate::store::{StatusCode, StoreError};
use log::warn;

/// Repository operation a store failure came from.
///
/// Determines which store codes carry domain meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    PointRead,
    Scan,
    Insert,
    Update,
    Delete,
}

impl Operation {
    fn as_str(self) -> &'static str {
        match self {
            Self::PointRead => "point_read",
            Self::Scan => "scan",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Maps a store failure raised by `op` on `target` to a repository error.
///
/// - `NotFound` from a point read or update becomes `RepoError::NotFound`.
/// - `AlreadyExists` from an insert becomes `RepoError::Duplicate`.
/// - Everything else is returned as `RepoError::Store` untouched.
pub fn map_store_error(op: Operation, target: &str, err: StoreError) -> RepoError {
    match (op, err.code()) {
        (Operation::PointRead | Operation::Update, StatusCode::NotFound) => {
            warn!(
                "event=resource_not_found module=repo op={} target={} error={}",
                op.as_str(),
                target,
                err
            );
            RepoError::NotFound(target.to_string())
        }
        (Operation::Insert, StatusCode::AlreadyExists) => {
            warn!(
                "event=resource_exists module=repo op={} target={} error={}",
                op.as_str(),
                target,
                err
            );
            RepoError::Duplicate(target.to_string())
        }
        _ => RepoError::Store(err),
    }
}
