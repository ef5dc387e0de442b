use anyhow::{anyhow, Result};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::models::{Collection, Column, Record};

/// Form state for adding or editing a record: one text field per column.
#[derive(Clone)]
pub(crate) struct RecordForm {
    values: [String; 12],
    pub(crate) active: Column,
    /// Editing keeps the identifier fixed; updates never change it.
    pub(crate) identifier_locked: bool,
    pub(crate) error: Option<String>,
}

impl Default for RecordForm {
    fn default() -> Self {
        Self {
            values: Default::default(),
            active: Column::Identifier,
            identifier_locked: false,
            error: None,
        }
    }
}

impl RecordForm {
    /// Populate the form from an existing record when entering edit mode.
    pub(crate) fn from_record(record: &Record) -> Self {
        Self {
            values: Column::ALL.map(|column| record.get(column).to_string()),
            active: Column::CageNumber,
            identifier_locked: true,
            error: None,
        }
    }

    pub(crate) fn value(&self, column: Column) -> &str {
        &self.values[column.index()]
    }

    /// Move focus forward or backward, skipping a locked identifier.
    pub(crate) fn cycle_field(&mut self, offset: isize) {
        let mut next = self.active.cycle(offset);
        if self.identifier_locked && next == Column::Identifier {
            next = next.cycle(offset);
        }
        self.active = next;
    }

    /// Insert a character into the active field.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() || self.is_locked(self.active) {
            return false;
        }
        self.values[self.active.index()].push(ch);
        true
    }

    /// Remove a character from the active field.
    pub(crate) fn backspace(&mut self) {
        if !self.is_locked(self.active) {
            self.values[self.active.index()].pop();
        }
    }

    /// Validate and normalize form inputs before they are written to the
    /// database. Only the identifier is required.
    pub(crate) fn to_record(&self) -> Result<Record> {
        let mut record = Record::default();
        for column in Column::ALL {
            record.set(column, self.value(column).trim());
        }
        if record.identifier.is_empty() {
            return Err(anyhow!("Record identifier is required."));
        }
        Ok(record)
    }

    /// Render a styled line for the modal form.
    pub(crate) fn build_line(&self, column: Column) -> Line<'static> {
        let value = self.value(column);
        let is_active = self.active == column;
        let placeholder = match column {
            Column::Identifier => "<required>",
            _ => "<optional>",
        };

        let display = if value.is_empty() {
            placeholder.to_string()
        } else {
            value.to_string()
        };

        let style = if self.is_locked(column) {
            Style::default().fg(Color::Gray)
        } else if is_active {
            Style::default().fg(Color::Yellow)
        } else if value.is_empty() {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        Line::from(vec![
            Span::raw(field_prefix(column)),
            Span::styled(display, style),
        ])
    }

    /// Character length of the requested field.
    pub(crate) fn value_len(&self, column: Column) -> usize {
        self.value(column).chars().count()
    }

    fn is_locked(&self, column: Column) -> bool {
        self.identifier_locked && column == Column::Identifier
    }
}

/// Label printed before each form value; the cursor is placed after it.
pub(crate) fn field_prefix(column: Column) -> String {
    format!("{:>14}: ", column.as_str())
}

/// State for confirming permanent record deletion.
pub(crate) struct ConfirmRecordDelete {
    pub(crate) collection: Collection,
    pub(crate) record: Record,
}

/// State for confirming the copy of a live record into the deceased list.
pub(crate) struct ConfirmMigrate {
    pub(crate) record: Record,
}

/// Inline column-equality search. Tab cycles the searched column.
pub(crate) struct SearchState {
    pub(crate) column: Column,
    pub(crate) query: String,
}

impl SearchState {
    pub(crate) fn new(column: Column, query: String) -> Self {
        Self { column, query }
    }

    pub(crate) fn prompt(&self) -> String {
        format!("{} = ", self.column.as_str())
    }
}

/// Destination prompt for exporting the visible collection.
pub(crate) struct ExportForm {
    pub(crate) collection: Collection,
    pub(crate) path: String,
    pub(crate) error: Option<String>,
}

impl ExportForm {
    pub(crate) fn new(collection: Collection, default_path: String) -> Self {
        Self {
            collection,
            path: default_path,
            error: None,
        }
    }
}

/// Informational dialog, dismissed with any key.
pub(crate) struct Notice {
    pub(crate) title: String,
    pub(crate) message: String,
}

impl Notice {
    pub(crate) fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}
