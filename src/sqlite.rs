use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::PathBuf;

use crate::error::StorageError;

/// Schema definition for the SQLite database
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub tables: Vec<TableDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }
    pub fn add_table(mut self, table: TableDefinition) -> Self {
        self.tables.push(table);
        self
    }

    /// Render the whole schema as an idempotent DDL batch.
    pub fn to_sql(&self) -> String {
        let mut sql = String::new();
        for table in &self.tables {
            sql.push_str(&table.create_statement());
            sql.push('\n');
            for index in &table.indexes {
                sql.push_str(&index.create_statement(&table.name));
                sql.push('\n');
            }
        }
        sql
    }
}

/// One table: columns, foreign keys and the indexes created alongside it
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub foreign_keys: Vec<ForeignKey>,
    pub indexes: Vec<IndexDefinition>,
}

impl TableDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }
    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }
    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }
    pub fn index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn create_statement(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(ColumnDefinition::to_sql).collect();
        parts.extend(self.foreign_keys.iter().map(ForeignKey::to_sql));
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
            self.name,
            parts.join(",\n    ")
        )
    }
}

/// Column name, type, constraints and optional integer default
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub constraints: Vec<ColumnConstraint>,
    pub default_value: Option<i64>,
}

impl ColumnDefinition {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            constraints: Vec::new(),
            default_value: None,
        }
    }
    pub fn with(mut self, constraint: ColumnConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }
    pub fn default_to(mut self, value: i64) -> Self {
        self.default_value = Some(value);
        self
    }

    fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.data_type.as_sql());
        for constraint in &self.constraints {
            sql.push(' ');
            sql.push_str(&constraint.to_sql());
        }
        if let Some(default) = self.default_value {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        sql
    }
}

/// SQLite storage class of a column
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataType {
    Integer,
    Text,
}

impl DataType {
    fn as_sql(self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Text => "TEXT",
        }
    }
}

/// Column-level constraint
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnConstraint {
    PrimaryKey,
    /// `PRIMARY KEY AUTOINCREMENT`; ids are never reused.
    AutoIncrement,
    NotNull,
    Unique,
    Check(String),
}

impl ColumnConstraint {
    fn to_sql(&self) -> String {
        match self {
            ColumnConstraint::PrimaryKey => "PRIMARY KEY".to_string(),
            ColumnConstraint::AutoIncrement => "PRIMARY KEY AUTOINCREMENT".to_string(),
            ColumnConstraint::NotNull => "NOT NULL".to_string(),
            ColumnConstraint::Unique => "UNIQUE".to_string(),
            ColumnConstraint::Check(expr) => format!("CHECK ({})", expr),
        }
    }
}

/// Table-level `FOREIGN KEY` clause
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub column: String,
    pub foreign_table: String,
    pub foreign_column: String,
}

impl ForeignKey {
    pub fn new(column: &str, foreign_table: &str, foreign_column: &str) -> Self {
        Self {
            column: column.to_string(),
            foreign_table: foreign_table.to_string(),
            foreign_column: foreign_column.to_string(),
        }
    }

    fn to_sql(&self) -> String {
        format!(
            "FOREIGN KEY ({}) REFERENCES {}({})",
            self.column, self.foreign_table, self.foreign_column
        )
    }
}

/// Index created after its table, optionally unique or partial
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
    /// Optional `WHERE` clause turning this into a partial index.
    pub predicate: Option<String>,
}

impl IndexDefinition {
    fn create_statement(&self, table: &str) -> String {
        let mut sql = format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {}({})",
            if self.unique { "UNIQUE " } else { "" },
            self.name,
            table,
            self.columns.join(", ")
        );
        if let Some(predicate) = &self.predicate {
            sql.push_str(" WHERE ");
            sql.push_str(predicate);
        }
        sql.push(';');
        sql
    }
}

/// Store configuration
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Path to the SQLite database file, `None` for an in-memory store
    pub db_path: Option<PathBuf>,
    /// Schema definition for the database
    pub schema: Schema,
}

impl StoreConfig {
    /// Create a new config for a file-backed store
    pub fn new(db_path: impl Into<PathBuf>, schema: Schema) -> Self {
        Self {
            db_path: Some(db_path.into()),
            schema,
        }
    }

    pub fn in_memory(schema: Schema) -> Self {
        Self {
            db_path: None,
            schema,
        }
    }
}

/// Handle to the library database.
///
/// Owns the single connection; callers pass it explicitly to every
/// operation. Writes go through [`Store::transaction`], which rolls back
/// on drop unless committed.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open the store described by `config` and make sure its schema exists.
    pub fn open(config: &StoreConfig) -> Result<Self, StorageError> {
        let conn = match &config.db_path {
            Some(path) => {
                tracing::info!(path = %path.display(), "opening sqlite store");
                Connection::open(path)?
            }
            None => {
                tracing::debug!("opening in-memory sqlite store");
                Connection::open_in_memory()?
            }
        };
        conn.pragma_update(None, "foreign_keys", true)?;
        let store = Self { conn };
        store.initialize_schema(&config.schema)?;
        Ok(store)
    }

    /// Create any missing tables and indexes. Safe to call repeatedly.
    pub fn initialize_schema(&self, schema: &Schema) -> Result<(), StorageError> {
        tracing::debug!(tables = schema.tables.len(), "initializing schema");
        self.conn.execute_batch(&schema.to_sql())?;
        Ok(())
    }

    /// Read access for queries that need no transaction.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Begin an immediate transaction. Dropping it without `commit` rolls back.
    pub fn transaction(&mut self) -> Result<Transaction<'_>, StorageError> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_schema() -> Schema {
        Schema::new().add_table(
            TableDefinition::new("users")
                .column(ColumnDefinition::new("id", DataType::Integer).with(ColumnConstraint::PrimaryKey))
                .column(
                    ColumnDefinition::new("email", DataType::Text)
                        .with(ColumnConstraint::NotNull)
                        .with(ColumnConstraint::Unique),
                )
                .column(ColumnDefinition::new("age", DataType::Integer).default_to(18)),
        )
    }

    #[test]
    fn renders_columns_and_foreign_keys() {
        let table = TableDefinition::new("child")
            .column(ColumnDefinition::new("id", DataType::Integer).with(ColumnConstraint::AutoIncrement))
            .column(ColumnDefinition::new("parent", DataType::Integer).with(ColumnConstraint::NotNull))
            .foreign_key(ForeignKey::new("parent", "parent", "id"));

        assert_eq!(
            table.create_statement(),
            "CREATE TABLE IF NOT EXISTS child (\n    id INTEGER PRIMARY KEY AUTOINCREMENT,\n    parent INTEGER NOT NULL,\n    FOREIGN KEY (parent) REFERENCES parent(id)\n);"
        );
    }

    #[test]
    fn renders_partial_unique_index() {
        let index = IndexDefinition {
            name: "one_open".to_string(),
            columns: vec!["item".to_string()],
            unique: true,
            predicate: Some("closed IS NULL".to_string()),
        };
        assert_eq!(
            index.create_statement("loans"),
            "CREATE UNIQUE INDEX IF NOT EXISTS one_open ON loans(item) WHERE closed IS NULL;"
        );
    }

    #[test]
    fn renders_check_and_default() {
        let column = ColumnDefinition::new("status", DataType::Integer)
            .with(ColumnConstraint::Check("status IN (1, 2)".to_string()))
            .default_to(1);
        assert_eq!(column.to_sql(), "status INTEGER CHECK (status IN (1, 2)) DEFAULT 1");
    }

    #[test]
    fn schema_initialization_is_idempotent() {
        let config = StoreConfig::in_memory(users_schema());
        let store = Store::open(&config).unwrap();
        store.initialize_schema(&config.schema).unwrap();

        store
            .connection()
            .execute("INSERT INTO users (email) VALUES (?1)", ["a@example.com"])
            .unwrap();
        let age: i64 = store
            .connection()
            .query_row("SELECT age FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(age, 18);
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let mut store = Store::open(&StoreConfig::in_memory(users_schema())).unwrap();
        {
            let tx = store.transaction().unwrap();
            tx.execute("INSERT INTO users (email) VALUES ('x@example.com')", [])
                .unwrap();
        }
        let count: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let schema = users_schema().add_table(
            TableDefinition::new("posts")
                .column(ColumnDefinition::new("id", DataType::Integer).with(ColumnConstraint::PrimaryKey))
                .column(ColumnDefinition::new("author", DataType::Integer).with(ColumnConstraint::NotNull))
                .foreign_key(ForeignKey::new("author", "users", "id")),
        );
        let store = Store::open(&StoreConfig::in_memory(schema)).unwrap();
        let err: StorageError = store
            .connection()
            .execute("INSERT INTO posts (author) VALUES (42)", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, StorageError::Constraint(_)), "{err:?}");
    }
}
