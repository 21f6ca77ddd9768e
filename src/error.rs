use rusqlite::ErrorCode;

use crate::model::{InstanceId, ReaderId, RentalId};

/// Fault raised by the underlying SQLite store.
///
/// Every variant aborts the unit of work it occurred in; the surrounding
/// transaction is rolled back before the error reaches the caller.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A UNIQUE, FOREIGN KEY, CHECK, NOT NULL or trigger constraint failed.
    /// Carries SQLite's own description, e.g. `UNIQUE constraint failed: Book.ISBN`.
    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[source] rusqlite::Error),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                StorageError::Constraint(message.unwrap_or_else(|| failure.to_string()))
            }
            other => StorageError::Sqlite(other),
        }
    }
}

/// Outcome of a return that did not commit.
#[derive(Debug, thiserror::Error)]
pub enum ReturnError {
    /// The reader has no open rental on this instance. Nothing was written.
    #[error("reader {reader} has no open rental on instance {instance}")]
    NoOpenRental {
        reader: ReaderId,
        instance: InstanceId,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ReturnError {
    /// True when the return was refused because there was nothing to return,
    /// as opposed to the store failing.
    pub fn is_precondition(&self) -> bool {
        matches!(self, ReturnError::NoOpenRental { .. })
    }
}

impl From<rusqlite::Error> for ReturnError {
    fn from(err: rusqlite::Error) -> Self {
        ReturnError::Storage(err.into())
    }
}

/// Outcome of a check-out that did not commit.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("instance {instance} is already checked out (rental {rental})")]
    InstanceUnavailable {
        instance: InstanceId,
        rental: RentalId,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<rusqlite::Error> for CheckoutError {
    fn from(err: rusqlite::Error) -> Self {
        CheckoutError::Storage(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn unique_violation_maps_to_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (isbn TEXT UNIQUE); INSERT INTO t VALUES ('x');")
            .unwrap();
        let err: StorageError = conn
            .execute("INSERT INTO t VALUES ('x')", [])
            .unwrap_err()
            .into();
        match err {
            StorageError::Constraint(msg) => assert!(msg.contains("t.isbn"), "{msg}"),
            other => panic!("expected constraint violation, got {other:?}"),
        }
    }

    #[test]
    fn syntax_error_maps_to_sqlite() {
        let conn = Connection::open_in_memory().unwrap();
        let err: StorageError = conn.execute("SELEC 1", []).unwrap_err().into();
        assert!(matches!(err, StorageError::Sqlite(_)));
    }

    #[test]
    fn only_no_open_rental_is_a_precondition() {
        let refused = ReturnError::NoOpenRental {
            reader: 1,
            instance: 2,
        };
        assert!(refused.is_precondition());
        assert_eq!(
            refused.to_string(),
            "reader 1 has no open rental on instance 2"
        );

        let failed = ReturnError::Storage(StorageError::Constraint("boom".into()));
        assert!(!failed.is_precondition());
    }
}
