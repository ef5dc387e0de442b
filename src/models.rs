//! Domain models that mirror the SQLite schema and get passed throughout the
//! TUI, the CLI and the CSV exchange. The types stay light-weight data holders
//! so other layers can focus on presentation and persistence logic.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// One of the two record collections. Both share the same schema; the
/// physical table names come from `StoreConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Live,
    Deceased,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Live, Collection::Deceased];

    /// Stable lowercase name used by the CLI and log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Live => "live",
            Collection::Deceased => "deceased",
        }
    }

    /// Heading shown in the collection selector.
    pub fn title(self) -> &'static str {
        match self {
            Collection::Live => "Live Mice",
            Collection::Deceased => "Deceased Mice",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            Collection::Live => Collection::Deceased,
            Collection::Deceased => Collection::Live,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(Collection::Live),
            "deceased" => Ok(Collection::Deceased),
            other => Err(StoreError::UnknownCollection(other.to_string())),
        }
    }
}

/// The visible attributes of a record, in their fixed exchange order. The
/// surrogate `internal_sequence` is not a column here; only the store
/// addresses rows by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Identifier,
    CageNumber,
    Mouseline,
    Genotype,
    Gender,
    Dob,
    Available,
    Health,
    Username,
    UserManipulations,
    Status,
    Comments,
}

impl Column {
    pub const ALL: [Column; 12] = [
        Column::Identifier,
        Column::CageNumber,
        Column::Mouseline,
        Column::Genotype,
        Column::Gender,
        Column::Dob,
        Column::Available,
        Column::Health,
        Column::Username,
        Column::UserManipulations,
        Column::Status,
        Column::Comments,
    ];

    /// Column name as used in SQL and CSV headers.
    pub fn as_str(self) -> &'static str {
        match self {
            Column::Identifier => "identifier",
            Column::CageNumber => "cage_number",
            Column::Mouseline => "mouseline",
            Column::Genotype => "genotype",
            Column::Gender => "gender",
            Column::Dob => "dob",
            Column::Available => "available",
            Column::Health => "health",
            Column::Username => "username",
            Column::UserManipulations => "user_manipulations",
            Column::Status => "status",
            Column::Comments => "comments",
        }
    }

    /// Short human label used for table headers and form prompts.
    pub fn label(self) -> &'static str {
        match self {
            Column::Identifier => "ID",
            Column::CageNumber => "Cage",
            Column::Mouseline => "Mouseline",
            Column::Genotype => "Genotype",
            Column::Gender => "Gender",
            Column::Dob => "DOB",
            Column::Available => "Available",
            Column::Health => "Health",
            Column::Username => "User",
            Column::UserManipulations => "Manipulations",
            Column::Status => "Status",
            Column::Comments => "Comments",
        }
    }

    /// Position within `Column::ALL`.
    pub fn index(self) -> usize {
        Column::ALL
            .iter()
            .position(|column| *column == self)
            .unwrap_or(0)
    }

    /// Step through the columns, wrapping at both ends.
    pub fn cycle(self, offset: isize) -> Self {
        let len = Column::ALL.len() as isize;
        let next = (self.index() as isize + offset).rem_euclid(len);
        Column::ALL[next as usize]
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Column {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Column::ALL
            .into_iter()
            .find(|column| column.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| StoreError::UnknownColumn(wanted.to_string()))
    }
}

/// One mouse record as seen by every layer above the store. Field order is
/// the CSV column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    /// Business key: the physical tag or tattoo number.
    #[serde(alias = "id")]
    pub identifier: String,
    /// Kept as text; older snapshots carry it as an integer.
    pub cage_number: String,
    pub mouseline: String,
    pub genotype: String,
    pub gender: String,
    pub dob: String,
    pub available: String,
    pub health: String,
    pub username: String,
    pub user_manipulations: String,
    pub status: String,
    pub comments: String,
}

impl Record {
    /// Create an otherwise empty record with the given identifier.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    pub fn get(&self, column: Column) -> &str {
        match column {
            Column::Identifier => &self.identifier,
            Column::CageNumber => &self.cage_number,
            Column::Mouseline => &self.mouseline,
            Column::Genotype => &self.genotype,
            Column::Gender => &self.gender,
            Column::Dob => &self.dob,
            Column::Available => &self.available,
            Column::Health => &self.health,
            Column::Username => &self.username,
            Column::UserManipulations => &self.user_manipulations,
            Column::Status => &self.status,
            Column::Comments => &self.comments,
        }
    }

    pub fn set(&mut self, column: Column, value: impl Into<String>) {
        let value = value.into();
        match column {
            Column::Identifier => self.identifier = value,
            Column::CageNumber => self.cage_number = value,
            Column::Mouseline => self.mouseline = value,
            Column::Genotype => self.genotype = value,
            Column::Gender => self.gender = value,
            Column::Dob => self.dob = value,
            Column::Available => self.available = value,
            Column::Health => self.health = value,
            Column::Username => self.username = value,
            Column::UserManipulations => self.user_manipulations = value,
            Column::Status => self.status = value,
            Column::Comments => self.comments = value,
        }
    }

    /// Attribute values in `Column::ALL` order, ready for SQL parameters.
    pub fn values(&self) -> [&str; 12] {
        Column::ALL.map(|column| self.get(column))
    }

    /// `Identifier (Mouseline)` when a mouseline is present, used to name
    /// records in status messages.
    pub fn display_name(&self) -> String {
        if self.mouseline.trim().is_empty() {
            self.identifier.clone()
        } else {
            format!("{} ({})", self.identifier, self.mouseline)
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Result of an operation addressed by business key. A missing identifier is
/// an expected answer rather than a failure, so it is reported here instead of
/// through `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    NotFound,
}
