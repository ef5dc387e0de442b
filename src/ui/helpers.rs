use std::cmp::Ordering;

use anyhow::Error;
use ratatui::layout::{Constraint, Direction, Layout, Rect};

use crate::models::Column;

/// Produce a rectangle centered within `area` that spans the requested percent
/// of the width and height. Used for modal dialogs.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(area);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(horizontal[1]);

    vertical[1]
}

/// Extract the most relevant error message from a chained error.
pub(crate) fn surface_error(err: &Error) -> String {
    err.chain()
        .last()
        .map(|cause| cause.to_string())
        .unwrap_or_else(|| err.to_string())
}

/// Column widths for the record table. Free-text columns share whatever is
/// left after the short ones.
pub(crate) fn column_constraint(column: Column) -> Constraint {
    match column {
        Column::Identifier => Constraint::Length(10),
        Column::CageNumber => Constraint::Length(6),
        Column::Gender => Constraint::Length(7),
        Column::Dob => Constraint::Length(11),
        Column::Available => Constraint::Length(10),
        Column::Health | Column::Status | Column::Username => Constraint::Length(10),
        Column::Mouseline | Column::Genotype => Constraint::Min(10),
        Column::UserManipulations | Column::Comments => Constraint::Min(12),
    }
}

/// Compare two cell values. Numeric cells (cage numbers) sort before text
/// and compare by value; text compares case-insensitively.
pub(crate) fn compare_cells(left: &str, right: &str) -> Ordering {
    match (numeric(left), numeric(right)) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => left
            .to_lowercase()
            .cmp(&right.to_lowercase())
            .then_with(|| left.cmp(right)),
    }
}

fn numeric(cell: &str) -> Option<f64> {
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_compare_numerically() {
        assert_eq!(compare_cells("2", "10"), Ordering::Less);
        assert_eq!(compare_cells("12", "12.0"), Ordering::Equal);
    }

    #[test]
    fn numbers_sort_before_text() {
        assert_eq!(compare_cells("10", "1a"), Ordering::Less);
        assert_eq!(compare_cells("1a", "2"), Ordering::Greater);
        assert_eq!(compare_cells("NaN", "3"), Ordering::Greater);
        assert_eq!(compare_cells("inf", "nan"), Ordering::Less);
    }

    #[test]
    fn mixed_cells_sort_without_cycles() {
        let labels = ["2", "10", "1a", "3b", "25", "7", "100", "", "NaN"];
        let mut cells: Vec<&str> = (0..120).map(|i| labels[(i * 7) % labels.len()]).collect();
        cells.sort_by(|a, b| compare_cells(a, b));

        let first_text = cells.iter().position(|cell| numeric(cell).is_none()).unwrap();
        assert!(cells[first_text..].iter().all(|cell| numeric(cell).is_none()));
        assert!(cells[..first_text]
            .windows(2)
            .all(|pair| numeric(pair[0]).unwrap() <= numeric(pair[1]).unwrap()));
    }

    #[test]
    fn text_compares_case_insensitively() {
        assert_eq!(compare_cells("c57", "BALB"), Ordering::Greater);
        assert_eq!(compare_cells("WT", "wt"), Ordering::Less);
        assert_eq!(compare_cells("", "a"), Ordering::Less);
    }

    #[test]
    fn surface_error_prefers_root_cause() {
        let err = anyhow::anyhow!("Record M001 not found.").context("failed to update record");
        assert_eq!(surface_error(&err), "Record M001 not found.");
    }
}
