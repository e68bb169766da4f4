use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use utoipa::ToSchema;

/// Processing category supplied by the client alongside each uploaded file.
///
/// The wire literals are exactly `"TypeA"`..`"TypeD"`; anything else is
/// rejected during intake validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Tag {
    TypeA,
    TypeB,
    TypeC,
    TypeD,
}

impl Tag {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "TypeA" => Some(Tag::TypeA),
            "TypeB" => Some(Tag::TypeB),
            "TypeC" => Some(Tag::TypeC),
            "TypeD" => Some(Tag::TypeD),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::TypeA => "TypeA",
            Tag::TypeB => "TypeB",
            Tag::TypeC => "TypeC",
            Tag::TypeD => "TypeD",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reporting quarter, parsed from exactly `"Q1"`..`"Q4"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Q1" => Some(Quarter::Q1),
            "Q2" => Some(Quarter::Q2),
            "Q3" => Some(Quarter::Q3),
            "Q4" => Some(Quarter::Q4),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quarter::Q1 => "Q1",
            Quarter::Q2 => "Q2",
            Quarter::Q3 => "Q3",
            Quarter::Q4 => "Q4",
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepted reporting year range, inclusive.
pub const MIN_YEAR: i32 = 2000;
pub const MAX_YEAR: i32 = 2099;

/// The (year, quarter) pair scoping one request's transformations.
///
/// Immutable for the duration of a request; every transformer receives a copy
/// so output rows can be stamped with the request's temporal scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodContext {
    pub year: i32,
    pub quarter: Quarter,
}

impl PeriodContext {
    pub fn new(year: i32, quarter: Quarter) -> Result<Self, String> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(format!(
                "year {} is out of range ({}..={})",
                year, MIN_YEAR, MAX_YEAR
            ));
        }
        Ok(Self { year, quarter })
    }
}

/// Which family of transformers an uploaded file belongs to, derived from its
/// filename extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionClass {
    /// `.xlsx` / `.xls`
    Spreadsheet,
    /// `.pdf`
    Document,
}

impl ExtensionClass {
    /// Classifies a lower-cased extension (with its leading dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            ".xlsx" | ".xls" => Some(ExtensionClass::Spreadsheet),
            ".pdf" => Some(ExtensionClass::Document),
            _ => None,
        }
    }

    /// Whether this extension class may be combined with the given tag.
    ///
    /// Spreadsheets pair with TypeA/TypeB, documents with TypeC/TypeD.
    pub fn allows(&self, tag: Tag) -> bool {
        matches!(
            (self, tag),
            (ExtensionClass::Spreadsheet, Tag::TypeA)
                | (ExtensionClass::Spreadsheet, Tag::TypeB)
                | (ExtensionClass::Document, Tag::TypeC)
                | (ExtensionClass::Document, Tag::TypeD)
        )
    }
}

/// One accepted upload: the caller's filename, its tag, and the transient
/// on-disk location owned by the storage area for the request lifetime.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub original_filename: String,
    pub tag: Tag,
    pub stored_path: PathBuf,
}

/// A single cell value. `Empty` is the explicit "no value" marker used when a
/// row lacks one of the combined table's columns.
#[derive(Debug, Clone, PartialEq)]
pub enum CellScalar {
    Text(String),
    Number(f64),
    Empty,
}

/// Tabular output of transforming one file: named columns plus rows aligned
/// to those columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellScalar>>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends a column with the same value in every existing row.
    pub fn push_constant_column(&mut self, name: impl Into<String>, value: CellScalar) {
        self.columns.push(name.into());
        for row in &mut self.rows {
            row.push(value.clone());
        }
    }
}

/// The union-concatenation of all per-file tables for one request.
pub type CombinedTable = Table;
