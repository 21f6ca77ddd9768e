//! Row and status types for the rental ledger.

use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

pub type InstanceId = i64;
pub type ReaderId = i64;
pub type RentalId = i64;

/// A row of `Reader`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reader {
    pub id: ReaderId,
    pub name: String,
    pub email: String,
    pub status: ReaderStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rental {
    pub id: RentalId,
    pub reader: ReaderId,
    pub instance: InstanceId,
    pub date_rented: NaiveDate,
    pub date_returned: Option<NaiveDate>,
}

impl Rental {
    /// Open until a return date is recorded.
    pub fn is_open(&self) -> bool {
        self.date_returned.is_none()
    }
}

/// Reader status as persisted in `Reader.ReaderStatus` (1 = active, 2 = inactive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReaderStatus {
    Active,
    Inactive,
}

impl ReaderStatus {
    pub fn code(self) -> i64 {
        match self {
            ReaderStatus::Active => 1,
            ReaderStatus::Inactive => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(ReaderStatus::Active),
            2 => Some(ReaderStatus::Inactive),
            _ => None,
        }
    }
}

impl ToSql for ReaderStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for ReaderStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_i64()?;
        ReaderStatus::from_code(code).ok_or(FromSqlError::OutOfRange(code))
    }
}

/// Status label stored on `BookInstance.InstanceStatus`.
///
/// The labels are the ones the seed data uses verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Available,
    CheckedOut,
}

impl InstanceStatus {
    pub fn label(self) -> &'static str {
        match self {
            InstanceStatus::Available => "Доступен",
            InstanceStatus::CheckedOut => "Выдан",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Доступен" => Some(InstanceStatus::Available),
            "Выдан" => Some(InstanceStatus::CheckedOut),
            _ => None,
        }
    }
}

impl ToSql for InstanceStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.label()))
    }
}

impl FromSql for InstanceStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let label = value.as_str()?;
        InstanceStatus::from_label(label)
            .ok_or_else(|| FromSqlError::Other(format!("unknown instance status {label:?}").into()))
    }
}

/// Rental state of an instance, derived from open `Rental` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Available,
    CheckedOut { rental: RentalId, reader: ReaderId },
}

impl InstanceState {
    pub fn is_available(self) -> bool {
        matches!(self, InstanceState::Available)
    }

    /// The stored label this state corresponds to.
    pub fn as_status(self) -> InstanceStatus {
        match self {
            InstanceState::Available => InstanceStatus::Available,
            InstanceState::CheckedOut { .. } => InstanceStatus::CheckedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_status_codes_match_storage() {
        assert_eq!(ReaderStatus::Active.code(), 1);
        assert_eq!(ReaderStatus::Inactive.code(), 2);
        assert_eq!(ReaderStatus::from_code(2), Some(ReaderStatus::Inactive));
        assert_eq!(ReaderStatus::from_code(3), None);
    }

    #[test]
    fn instance_labels_parse_back() {
        for status in [InstanceStatus::Available, InstanceStatus::CheckedOut] {
            assert_eq!(InstanceStatus::from_label(status.label()), Some(status));
        }
        assert_eq!(InstanceStatus::from_label("Утерян"), None);
    }

    #[test]
    fn rental_is_open_until_returned() {
        let mut rental = Rental {
            id: 1,
            reader: 1,
            instance: 1,
            date_rented: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            date_returned: None,
        };
        assert!(rental.is_open());
        rental.date_returned = NaiveDate::from_ymd_opt(2024, 2, 10);
        assert!(!rental.is_open());
    }

    #[test]
    fn reader_status_reads_from_sqlite() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let status: ReaderStatus = conn
            .query_row("SELECT ?1", [ReaderStatus::Inactive], |row| row.get(0))
            .unwrap();
        assert_eq!(status, ReaderStatus::Inactive);

        let bad = conn.query_row("SELECT 7", [], |row| row.get::<_, ReaderStatus>(0));
        assert!(bad.is_err());
    }
}
