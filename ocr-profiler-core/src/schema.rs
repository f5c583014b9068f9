//! Static description of the relational schema.
//!
//! Table names used in dynamically assembled statements come from [`Table`]
//! only, never from request input.

/// DDL for all tables, safe to run on every start.
pub const SCHEMA_SQL: &str = include_str!("../sql/schema.sql");

/// Column every per-book table is keyed by.
pub const BOOK_COLUMN: &str = "bookid";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Table {
    Books,
    Contents,
    Types,
    TypCounts,
    Suggestions,
    ErrorPatterns,
}

impl Table {
    pub const fn name(self) -> &'static str {
        match self {
            Table::Books => "books",
            Table::Contents => "contents",
            Table::Types => "types",
            Table::TypCounts => "typcounts",
            Table::Suggestions => "suggestions",
            Table::ErrorPatterns => "errorpatterns",
        }
    }

    /// `DELETE FROM <table> WHERE bookid = $1`
    pub fn delete_by_book(self) -> String {
        format!("DELETE FROM {} WHERE {} = $1", self.name(), BOOK_COLUMN)
    }
}

/// Per-book rows a profile owns. Cleared, in this order, before a profile
/// is ingested again.
pub const PROFILE_TABLES: [Table; 3] = [Table::ErrorPatterns, Table::Suggestions, Table::TypCounts];
