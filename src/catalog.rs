//! Catalog initialization: schema plus the fixed seed set.
//!
//! The seed set covers the catalog (genres, authors, books, instances and
//! their author links) and the initial state of the rental ledger (two
//! readers and three rentals). It is loaded in a single transaction, so a
//! constraint failure leaves the store without any seed rows.

use rusqlite::{params, Transaction};
use serde::Serialize;

use crate::error::StorageError;
use crate::model::{InstanceStatus, ReaderStatus};
use crate::schema::library_schema;
use crate::sqlite::Store;

/// (name, birth year, nationality)
pub const AUTHORS: &[(&str, i32, &str)] = &[
    ("М. Горький", 1868, "русский"),
    ("А. Чехов", 1860, "русский"),
    ("Т. Шевченко", 1814, "украинец"),
    ("Л. Толстой", 1828, "русский"),
    ("И. Ильф", 1897, "еврей"),
    ("Е. Петров", 1903, "русский"),
];

/// (name, description)
pub const GENRES: &[(&str, &str)] = &[
    ("роман", "Произведение прозаического жанра, длинное по объему"),
    ("драма", "Произведение, предназначенное для театрального исполнения"),
    ("повесть", "Произведение прозаического жанра, короткое по объему"),
    (
        "поэма",
        "Произведение лиро-эпической или эпической формы, чаще всего в стихотворной форме",
    ),
];

/// (genre id, title, publication year, ISBN)
pub const BOOKS: &[(i64, &str, i32, &str)] = &[
    (1, "Мать", 1996, "978-1234567890"),
    (2, "На дне", 1992, "978-0987654321"),
    (3, "Каштанка", 2017, "978-5432167890"),
    (3, "Вишневый сад", 2017, "978-6432167890"),
    (4, "Гайдамаки", 1930, "978-2345678901"),
    (1, "Война и мир", 2025, "978-3456789012"),
    (1, "Двенадцать стульев", 1828, "978-22334455"),
    (1, "Золотой теленок", 1833, "978-33445522"),
];

/// (book id, instance number, stored status, condition)
pub const INSTANCES: &[(i64, i64, InstanceStatus, &str)] = &[
    (1, 1, InstanceStatus::CheckedOut, "Хорошее"),
    (1, 2, InstanceStatus::Available, "Хорошее"),
    (2, 1, InstanceStatus::Available, "Хорошее"),
    (2, 2, InstanceStatus::Available, "Хорошее"),
    (3, 1, InstanceStatus::Available, "Отличное"),
    (3, 2, InstanceStatus::Available, "Отличное"),
    (4, 1, InstanceStatus::Available, "Хорошее"),
    (5, 1, InstanceStatus::Available, "Удовлетворительное"),
    (6, 1, InstanceStatus::CheckedOut, "Отличное"),
    (7, 1, InstanceStatus::Available, "Отличное"),
    (8, 1, InstanceStatus::Available, "Отличное"),
];

/// (author id, book id)
pub const BOOK_AUTHORS: &[(i64, i64)] = &[
    (1, 1),
    (1, 2),
    (2, 3),
    (2, 4),
    (3, 5),
    (4, 6),
    (5, 7),
    (6, 7),
    (5, 8),
    (6, 8),
];

/// (name, email, status)
pub const READERS: &[(&str, &str, ReaderStatus)] = &[
    ("Иванов", "ivanov@example.com", ReaderStatus::Active),
    ("Петров", "petrov@example.com", ReaderStatus::Active),
];

/// (reader id, instance id, date rented, date returned)
pub const RENTALS: &[(i64, i64, &str, Option<&str>)] = &[
    (2, 1, "2023-03-15", Some("2023-05-15")),
    (1, 1, "2024-02-01", None),
    (2, 9, "2024-02-01", None),
];

/// Row counts written by [`seed`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedStats {
    pub genres: usize,
    pub authors: usize,
    pub books: usize,
    pub instances: usize,
    pub book_authors: usize,
    pub readers: usize,
    pub rentals: usize,
}

/// Create the schema if needed and load the seed set.
pub fn initialize(store: &mut Store) -> Result<SeedStats, StorageError> {
    store.initialize_schema(&library_schema())?;
    seed(store)
}

/// Load the seed set into an existing schema, all or nothing.
pub fn seed(store: &mut Store) -> Result<SeedStats, StorageError> {
    let tx = store.transaction()?;
    let stats = match insert_seed(&tx) {
        Ok(stats) => stats,
        Err(err) => {
            let err = StorageError::from(err);
            tracing::error!(error = %err, "catalog seeding failed, rolling back");
            return Err(err);
        }
    };
    tx.commit()?;
    tracing::info!(?stats, "catalog seeded");
    Ok(stats)
}

fn insert_seed(tx: &Transaction<'_>) -> rusqlite::Result<SeedStats> {
    let mut stats = SeedStats::default();

    let mut stmt =
        tx.prepare("INSERT INTO Author (Name, BirthYear, Nationality) VALUES (?1, ?2, ?3)")?;
    for (name, birth_year, nationality) in AUTHORS {
        stats.authors += stmt.execute(params![name, birth_year, nationality])?;
    }

    let mut stmt = tx.prepare("INSERT INTO Genre (GenreName, Description) VALUES (?1, ?2)")?;
    for (name, description) in GENRES {
        stats.genres += stmt.execute(params![name, description])?;
    }

    let mut stmt = tx.prepare(
        "INSERT INTO Book (Genre, Title, PublicationYear, ISBN) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (genre, title, year, isbn) in BOOKS {
        stats.books += stmt.execute(params![genre, title, year, isbn])?;
    }

    let mut stmt = tx.prepare(
        "INSERT INTO BookInstance (Book, InstanceNumber, InstanceStatus, Condition) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (book, number, status, condition) in INSTANCES {
        stats.instances += stmt.execute(params![book, number, status, condition])?;
    }

    let mut stmt = tx.prepare("INSERT INTO BookAuthor (Author, Book) VALUES (?1, ?2)")?;
    for (author, book) in BOOK_AUTHORS {
        stats.book_authors += stmt.execute(params![author, book])?;
    }

    let mut stmt =
        tx.prepare("INSERT INTO Reader (Name, Email, ReaderStatus) VALUES (?1, ?2, ?3)")?;
    for (name, email, status) in READERS {
        stats.readers += stmt.execute(params![name, email, status])?;
    }

    let mut stmt = tx.prepare(
        "INSERT INTO Rental (Reader, Instance, DateRented, DateReturned) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (reader, instance, rented, returned) in RENTALS {
        stats.rentals += stmt.execute(params![reader, instance, rented, returned])?;
    }

    Ok(stats)
}
