//! Table layout of the library database.

use crate::sqlite::{
    ColumnConstraint, ColumnDefinition, DataType, ForeignKey, IndexDefinition, Schema,
    TableDefinition,
};

/// Name of the partial index that allows one open rental per instance.
pub const ONE_OPEN_RENTAL_INDEX: &str = "idx_rental_one_open_per_instance";

fn id(name: &str) -> ColumnDefinition {
    ColumnDefinition::new(name, DataType::Integer).with(ColumnConstraint::PrimaryKey)
}

fn required(name: &str, data_type: DataType) -> ColumnDefinition {
    ColumnDefinition::new(name, data_type).with(ColumnConstraint::NotNull)
}

/// Catalog tables plus the rental ledger, in dependency order.
pub fn library_schema() -> Schema {
    Schema::new()
        .add_table(
            TableDefinition::new("Genre")
                .column(id("GenreID"))
                .column(required("GenreName", DataType::Text).with(ColumnConstraint::Unique))
                .column(ColumnDefinition::new("Description", DataType::Text)),
        )
        .add_table(
            TableDefinition::new("Author")
                .column(id("AuthorID"))
                .column(required("Name", DataType::Text))
                .column(
                    ColumnDefinition::new("BirthYear", DataType::Integer)
                        .with(ColumnConstraint::Check("BirthYear <= 2010".to_string())),
                )
                .column(ColumnDefinition::new("Nationality", DataType::Text)),
        )
        .add_table(
            TableDefinition::new("Book")
                .column(id("BookID"))
                .column(required("Genre", DataType::Integer))
                .column(required("Title", DataType::Text))
                .column(required("PublicationYear", DataType::Integer))
                .column(ColumnDefinition::new("ISBN", DataType::Text).with(ColumnConstraint::Unique))
                .foreign_key(ForeignKey::new("Genre", "Genre", "GenreID")),
        )
        .add_table(
            TableDefinition::new("BookAuthor")
                .column(
                    ColumnDefinition::new("BookAuthorID", DataType::Integer)
                        .with(ColumnConstraint::AutoIncrement),
                )
                .column(required("Author", DataType::Integer))
                .column(required("Book", DataType::Integer))
                .foreign_key(ForeignKey::new("Author", "Author", "AuthorID"))
                .foreign_key(ForeignKey::new("Book", "Book", "BookID")),
        )
        .add_table(
            TableDefinition::new("BookInstance")
                .column(id("BookInstanceID"))
                .column(required("Book", DataType::Integer))
                .column(required("InstanceNumber", DataType::Integer).default_to(1))
                .column(ColumnDefinition::new("InstanceStatus", DataType::Text))
                .column(ColumnDefinition::new("Condition", DataType::Text))
                .foreign_key(ForeignKey::new("Book", "Book", "BookID")),
        )
        .add_table(
            TableDefinition::new("Reader")
                .column(id("ReaderID"))
                .column(required("Name", DataType::Text))
                .column(required("Email", DataType::Text))
                .column(
                    required("ReaderStatus", DataType::Integer)
                        .with(ColumnConstraint::Check("ReaderStatus IN (1, 2)".to_string()))
                        .default_to(1),
                ),
        )
        .add_table(
            TableDefinition::new("Rental")
                .column(id("RentalID"))
                .column(required("Reader", DataType::Integer))
                .column(required("Instance", DataType::Integer))
                .column(required("DateRented", DataType::Text))
                .column(ColumnDefinition::new("DateReturned", DataType::Text))
                .foreign_key(ForeignKey::new("Reader", "Reader", "ReaderID"))
                .foreign_key(ForeignKey::new("Instance", "BookInstance", "BookInstanceID"))
                .index(IndexDefinition {
                    name: ONE_OPEN_RENTAL_INDEX.to_string(),
                    columns: vec!["Instance".to_string()],
                    unique: true,
                    predicate: Some("DateReturned IS NULL".to_string()),
                }),
        )
}
