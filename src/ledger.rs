//! Rental ledger: check-out and the return transaction.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

use crate::error::{CheckoutError, ReturnError, StorageError};
use crate::model::{InstanceId, InstanceState, Reader, ReaderId, ReaderStatus, Rental, RentalId};
use crate::sqlite::Store;

const FIND_OPEN_RENTAL: &str = "SELECT RentalID FROM Rental \
     WHERE Reader = ?1 AND Instance = ?2 AND DateReturned IS NULL";
const FIND_OPEN_RENTAL_FOR_INSTANCE: &str = "SELECT RentalID, Reader FROM Rental \
     WHERE Instance = ?1 AND DateReturned IS NULL";
const CLOSE_RENTAL: &str = "UPDATE Rental SET DateReturned = ?1 WHERE RentalID = ?2";
const COUNT_OPEN_RENTALS: &str =
    "SELECT COUNT(*) FROM Rental WHERE Reader = ?1 AND DateReturned IS NULL";
const SET_READER_STATUS: &str = "UPDATE Reader SET ReaderStatus = ?1 WHERE ReaderID = ?2";
const SELECT_RENTAL: &str =
    "SELECT RentalID, Reader, Instance, DateRented, DateReturned FROM Rental";
const SELECT_READER: &str = "SELECT ReaderID, Name, Email, ReaderStatus FROM Reader";

/// What a committed return changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReturnReceipt {
    pub rental_id: RentalId,
    pub returned_on: NaiveDate,
    /// Open rentals the reader still holds after this return.
    pub remaining_open: u32,
    pub reader_deactivated: bool,
}

/// Close the reader's open rental on `instance` and, if it was their last
/// one, mark the reader inactive.
///
/// Both writes commit together or not at all. When there is no open rental
/// for the pair the transaction is rolled back untouched and
/// [`ReturnError::NoOpenRental`] is returned.
pub fn return_book(
    store: &mut Store,
    reader: ReaderId,
    instance: InstanceId,
    returned_on: NaiveDate,
) -> Result<ReturnReceipt, ReturnError> {
    let span = tracing::info_span!("return_book", reader, instance, %returned_on);
    let _enter = span.enter();

    match close_rental(store, reader, instance, returned_on) {
        Ok(receipt) => {
            tracing::info!(
                rental = receipt.rental_id,
                remaining_open = receipt.remaining_open,
                deactivated = receipt.reader_deactivated,
                "book returned"
            );
            Ok(receipt)
        }
        Err(err) if err.is_precondition() => {
            tracing::warn!("{err}");
            Err(err)
        }
        Err(err) => {
            tracing::error!(error = %err, "return rolled back");
            Err(err)
        }
    }
}

fn close_rental(
    store: &mut Store,
    reader: ReaderId,
    instance: InstanceId,
    returned_on: NaiveDate,
) -> Result<ReturnReceipt, ReturnError> {
    let tx = store.transaction()?;

    let rental_id: Option<RentalId> = tx
        .query_row(FIND_OPEN_RENTAL, params![reader, instance], |row| row.get(0))
        .optional()?;
    let Some(rental_id) = rental_id else {
        tx.rollback()?;
        return Err(ReturnError::NoOpenRental { reader, instance });
    };

    tx.execute(CLOSE_RENTAL, params![returned_on, rental_id])?;

    let remaining: u32 = tx.query_row(COUNT_OPEN_RENTALS, [reader], |row| row.get(0))?;
    // Only ever driven to inactive here; check-out is what reactivates.
    let reader_deactivated = remaining == 0;
    if reader_deactivated {
        tx.execute(SET_READER_STATUS, params![ReaderStatus::Inactive, reader])?;
    }

    tx.commit()?;
    Ok(ReturnReceipt {
        rental_id,
        returned_on,
        remaining_open: remaining,
        reader_deactivated,
    })
}

/// Open a rental of `instance` for `reader` and mark the reader active.
///
/// Refused with [`CheckoutError::InstanceUnavailable`] when the instance
/// already has an open rental. Unknown reader or instance ids fail the
/// foreign key check and come back as a storage constraint error.
pub fn check_out(
    store: &mut Store,
    reader: ReaderId,
    instance: InstanceId,
    rented_on: NaiveDate,
) -> Result<RentalId, CheckoutError> {
    let span = tracing::info_span!("check_out", reader, instance, %rented_on);
    let _enter = span.enter();

    match open_rental(store, reader, instance, rented_on) {
        Ok(rental_id) => {
            tracing::info!(rental = rental_id, "book checked out");
            Ok(rental_id)
        }
        Err(err @ CheckoutError::InstanceUnavailable { .. }) => {
            tracing::warn!("{err}");
            Err(err)
        }
        Err(err) => {
            tracing::error!(error = %err, "check-out rolled back");
            Err(err)
        }
    }
}

fn open_rental(
    store: &mut Store,
    reader: ReaderId,
    instance: InstanceId,
    rented_on: NaiveDate,
) -> Result<RentalId, CheckoutError> {
    let tx = store.transaction()?;

    let open: Option<RentalId> = tx
        .query_row(FIND_OPEN_RENTAL_FOR_INSTANCE, [instance], |row| row.get(0))
        .optional()?;
    if let Some(rental) = open {
        tx.rollback()?;
        return Err(CheckoutError::InstanceUnavailable { instance, rental });
    }

    tx.execute(
        "INSERT INTO Rental (Reader, Instance, DateRented) VALUES (?1, ?2, ?3)",
        params![reader, instance, rented_on],
    )?;
    let rental_id = tx.last_insert_rowid();
    tx.execute(SET_READER_STATUS, params![ReaderStatus::Active, reader])?;

    tx.commit()?;
    Ok(rental_id)
}

/// Rental state of an instance, derived from its open rental if any.
pub fn instance_state(store: &Store, instance: InstanceId) -> Result<InstanceState, StorageError> {
    let open: Option<(RentalId, ReaderId)> = store
        .connection()
        .query_row(FIND_OPEN_RENTAL_FOR_INSTANCE, [instance], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .optional()?;
    Ok(match open {
        Some((rental, reader)) => InstanceState::CheckedOut { rental, reader },
        None => InstanceState::Available,
    })
}

/// Stored status of a reader, `None` if the reader does not exist.
pub fn reader_status(store: &Store, reader: ReaderId) -> Result<Option<ReaderStatus>, StorageError> {
    Ok(store
        .connection()
        .query_row(
            "SELECT ReaderStatus FROM Reader WHERE ReaderID = ?1",
            [reader],
            |row| row.get(0),
        )
        .optional()?)
}

pub fn open_rental_count(store: &Store, reader: ReaderId) -> Result<u32, StorageError> {
    Ok(store
        .connection()
        .query_row(COUNT_OPEN_RENTALS, [reader], |row| row.get(0))?)
}

fn rental_from_row(row: &Row<'_>) -> rusqlite::Result<Rental> {
    Ok(Rental {
        id: row.get(0)?,
        reader: row.get(1)?,
        instance: row.get(2)?,
        date_rented: row.get(3)?,
        date_returned: row.get(4)?,
    })
}

fn reader_from_row(row: &Row<'_>) -> rusqlite::Result<Reader> {
    Ok(Reader {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        status: row.get(3)?,
    })
}

pub fn rental(store: &Store, id: RentalId) -> Result<Option<Rental>, StorageError> {
    let sql = format!("{SELECT_RENTAL} WHERE RentalID = ?1");
    Ok(store
        .connection()
        .query_row(&sql, [id], rental_from_row)
        .optional()?)
}

/// Every rental, oldest first.
pub fn rentals(store: &Store) -> Result<Vec<Rental>, StorageError> {
    let mut stmt = store
        .connection()
        .prepare(&format!("{SELECT_RENTAL} ORDER BY RentalID"))?;
    let rows = stmt.query_map([], rental_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn reader(store: &Store, id: ReaderId) -> Result<Option<Reader>, StorageError> {
    let sql = format!("{SELECT_READER} WHERE ReaderID = ?1");
    Ok(store
        .connection()
        .query_row(&sql, [id], reader_from_row)
        .optional()?)
}

pub fn readers(store: &Store) -> Result<Vec<Reader>, StorageError> {
    let mut stmt = store
        .connection()
        .prepare(&format!("{SELECT_READER} ORDER BY ReaderID"))?;
    let rows = stmt.query_map([], reader_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
