//! Read-only reporting queries.
//!
//! Each function is a single SELECT. An empty result is an empty `Vec`.
//! Row order is whatever SQLite yields unless the query orders explicitly.

use chrono::NaiveDate;
use rusqlite::{params, Row};
use serde::Serialize;

use crate::error::StorageError;
use crate::model::{InstanceId, InstanceState, InstanceStatus, ReaderId, ReaderStatus, RentalId};
use crate::sqlite::Store;

const RENTAL_JOINS: &str = "FROM Rental ra \
     JOIN BookInstance bi ON ra.Instance = bi.BookInstanceID \
     JOIN Book b ON bi.Book = b.BookID \
     JOIN Reader r ON ra.Reader = r.ReaderID";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookAuthorRow {
    pub title: String,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookAuthorDetailRow {
    pub author: String,
    pub nationality: Option<String>,
    pub title: String,
    pub publication_year: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorBooksRow {
    pub author: String,
    /// Titles joined with `", "`.
    pub titles: String,
    pub book_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckedOutRow {
    pub title: String,
    pub instance_number: i64,
    pub reader: String,
    pub date_rented: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReturnedRow {
    pub title: String,
    pub instance_number: i64,
    pub reader: String,
    pub date_rented: NaiveDate,
    pub date_returned: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RentalHistoryRow {
    pub reader: String,
    pub date_rented: NaiveDate,
    pub date_returned: Option<NaiveDate>,
}

/// An instance whose stored status label disagrees with its open rentals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceDrift {
    pub instance: InstanceId,
    pub title: String,
    pub instance_number: i64,
    pub stored: Option<InstanceStatus>,
    pub derived: InstanceState,
}

/// A reader whose stored status disagrees with their open-rental count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReaderDrift {
    pub reader: ReaderId,
    pub name: String,
    pub stored: ReaderStatus,
    pub open_rentals: u32,
}

fn collect<T>(
    store: &Store,
    sql: &str,
    params: impl rusqlite::Params,
    map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>, StorageError> {
    tracing::debug!(sql, "running report");
    let mut stmt = store.connection().prepare(sql)?;
    let rows = stmt.query_map(params, map)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Every (title, author) pair.
pub fn book_authors(store: &Store) -> Result<Vec<BookAuthorRow>, StorageError> {
    collect(
        store,
        "SELECT Book.Title, Author.Name FROM Book \
         JOIN BookAuthor ON Book.BookID = BookAuthor.Book \
         JOIN Author ON BookAuthor.Author = Author.AuthorID",
        [],
        |row| {
            Ok(BookAuthorRow {
                title: row.get(0)?,
                author: row.get(1)?,
            })
        },
    )
}

/// Author name and nationality next to each of their books' title and year.
pub fn book_author_details(store: &Store) -> Result<Vec<BookAuthorDetailRow>, StorageError> {
    collect(
        store,
        "SELECT Author.Name, Author.Nationality, Book.Title, Book.PublicationYear FROM Book \
         JOIN BookAuthor ON Book.BookID = BookAuthor.Book \
         JOIN Author ON BookAuthor.Author = Author.AuthorID",
        [],
        |row| {
            Ok(BookAuthorDetailRow {
                author: row.get(0)?,
                nationality: row.get(1)?,
                title: row.get(2)?,
                publication_year: row.get(3)?,
            })
        },
    )
}

fn author_books_row(row: &Row<'_>) -> rusqlite::Result<AuthorBooksRow> {
    Ok(AuthorBooksRow {
        author: row.get(0)?,
        titles: row.get(1)?,
        book_count: row.get(2)?,
    })
}

/// One row per author with all of their titles, ordered by author name.
pub fn authors_with_titles(store: &Store) -> Result<Vec<AuthorBooksRow>, StorageError> {
    collect(
        store,
        "SELECT Author.Name, GROUP_CONCAT(Book.Title, ', '), COUNT(Book.BookID) FROM Author \
         JOIN BookAuthor ON Author.AuthorID = BookAuthor.Author \
         JOIN Book ON BookAuthor.Book = Book.BookID \
         GROUP BY Author.AuthorID \
         ORDER BY Author.Name",
        [],
        author_books_row,
    )
}

/// Authors credited on exactly `count` books.
pub fn authors_with_book_count(
    store: &Store,
    count: u32,
) -> Result<Vec<AuthorBooksRow>, StorageError> {
    collect(
        store,
        "SELECT Author.Name, GROUP_CONCAT(Book.Title, ', '), COUNT(Book.BookID) AS BookCount \
         FROM Author \
         JOIN BookAuthor ON Author.AuthorID = BookAuthor.Author \
         JOIN Book ON BookAuthor.Book = Book.BookID \
         GROUP BY Author.AuthorID \
         HAVING BookCount = ?1",
        [count],
        author_books_row,
    )
}

/// Instances out on an open rental, with the borrower.
pub fn checked_out(store: &Store) -> Result<Vec<CheckedOutRow>, StorageError> {
    let sql = format!(
        "SELECT b.Title, bi.InstanceNumber, r.Name, ra.DateRented {RENTAL_JOINS} \
         WHERE ra.DateReturned IS NULL"
    );
    collect(store, &sql, [], |row| {
        Ok(CheckedOutRow {
            title: row.get(0)?,
            instance_number: row.get(1)?,
            reader: row.get(2)?,
            date_rented: row.get(3)?,
        })
    })
}

/// Closed rentals with both dates.
pub fn returned(store: &Store) -> Result<Vec<ReturnedRow>, StorageError> {
    let sql = format!(
        "SELECT b.Title, bi.InstanceNumber, r.Name, ra.DateRented, ra.DateReturned {RENTAL_JOINS} \
         WHERE ra.DateReturned IS NOT NULL"
    );
    collect(store, &sql, [], |row| {
        Ok(ReturnedRow {
            title: row.get(0)?,
            instance_number: row.get(1)?,
            reader: row.get(2)?,
            date_rented: row.get(3)?,
            date_returned: row.get(4)?,
        })
    })
}

/// Everyone who has rented the given copy of a title, and when.
pub fn rental_history(
    store: &Store,
    title: &str,
    instance_number: i64,
) -> Result<Vec<RentalHistoryRow>, StorageError> {
    let sql = format!(
        "SELECT r.Name, ra.DateRented, ra.DateReturned {RENTAL_JOINS} \
         WHERE b.Title = ?1 AND bi.InstanceNumber = ?2"
    );
    collect(store, &sql, params![title, instance_number], |row| {
        Ok(RentalHistoryRow {
            reader: row.get(0)?,
            date_rented: row.get(1)?,
            date_returned: row.get(2)?,
        })
    })
}

/// Instances whose stored label does not match the state their rentals imply.
pub fn status_drift(store: &Store) -> Result<Vec<InstanceDrift>, StorageError> {
    let rows = collect(
        store,
        "SELECT bi.BookInstanceID, b.Title, bi.InstanceNumber, bi.InstanceStatus, \
                ra.RentalID, ra.Reader \
         FROM BookInstance bi \
         JOIN Book b ON bi.Book = b.BookID \
         LEFT JOIN Rental ra ON ra.Instance = bi.BookInstanceID AND ra.DateReturned IS NULL \
         ORDER BY bi.BookInstanceID",
        [],
        |row| {
            let open: Option<(RentalId, ReaderId)> = match row.get::<_, Option<RentalId>>(4)? {
                Some(rental) => Some((rental, row.get(5)?)),
                None => None,
            };
            let derived = match open {
                Some((rental, reader)) => InstanceState::CheckedOut { rental, reader },
                None => InstanceState::Available,
            };
            Ok(InstanceDrift {
                instance: row.get(0)?,
                title: row.get(1)?,
                instance_number: row.get(2)?,
                stored: row.get(3)?,
                derived,
            })
        },
    )?;
    Ok(rows
        .into_iter()
        .filter(|drift| drift.stored != Some(drift.derived.as_status()))
        .collect())
}

/// Readers marked active with nothing out, or inactive while holding a book.
pub fn reader_status_drift(store: &Store) -> Result<Vec<ReaderDrift>, StorageError> {
    let rows = collect(
        store,
        "SELECT r.ReaderID, r.Name, r.ReaderStatus, \
                (SELECT COUNT(*) FROM Rental ra \
                 WHERE ra.Reader = r.ReaderID AND ra.DateReturned IS NULL) \
         FROM Reader r \
         ORDER BY r.ReaderID",
        [],
        |row| {
            Ok(ReaderDrift {
                reader: row.get(0)?,
                name: row.get(1)?,
                stored: row.get(2)?,
                open_rentals: row.get(3)?,
            })
        },
    )?;
    Ok(rows
        .into_iter()
        .filter(|r| (r.stored == ReaderStatus::Inactive) != (r.open_rentals == 0))
        .collect())
}
