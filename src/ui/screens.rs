use crate::models::{Collection, Column, Record};

use super::helpers::compare_cells;

/// Active table sort: one column, ascending unless `descending`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) struct SortOrder {
    pub(crate) column: Column,
    pub(crate) descending: bool,
}

/// The record table for one collection, plus the search and sort applied to
/// it. `records` holds what the store returned (storage order); `rows` is the
/// display order as indexes into it.
pub(crate) struct RecordsScreen {
    pub(crate) collection: Collection,
    pub(crate) records: Vec<Record>,
    pub(crate) rows: Vec<usize>,
    pub(crate) search: Option<(Column, String)>,
    pub(crate) sort: Option<SortOrder>,
    pub(crate) selected: usize,
}

impl RecordsScreen {
    pub(crate) fn new(collection: Collection, records: Vec<Record>) -> Self {
        let mut screen = Self {
            collection,
            records: Vec::new(),
            rows: Vec::new(),
            search: None,
            sort: None,
            selected: 0,
        };
        screen.set_records(records);
        screen
    }

    /// Replace the loaded records, keeping the current sort.
    pub(crate) fn set_records(&mut self, records: Vec<Record>) {
        self.records = records;
        self.apply_sort();
    }

    fn apply_sort(&mut self) {
        let mut rows: Vec<usize> = (0..self.records.len()).collect();
        if let Some(order) = self.sort {
            rows.sort_by(|a, b| {
                let ordering = compare_cells(
                    self.records[*a].get(order.column),
                    self.records[*b].get(order.column),
                );
                if order.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
        self.rows = rows;
        self.ensure_in_bounds();
    }

    /// Advance the sort column: unsorted → first column → … → last → unsorted.
    pub(crate) fn cycle_sort(&mut self) -> Option<SortOrder> {
        let focus = self.current_identifier();
        self.sort = match self.sort {
            None => Some(SortOrder {
                column: Column::ALL[0],
                descending: false,
            }),
            Some(order) if order.column == Column::ALL[Column::ALL.len() - 1] => None,
            Some(order) => Some(SortOrder {
                column: order.column.cycle(1),
                descending: order.descending,
            }),
        };
        self.apply_sort();
        self.refocus(focus);
        self.sort
    }

    /// Flip the direction of the active sort. No-op while unsorted.
    pub(crate) fn toggle_sort_direction(&mut self) -> Option<SortOrder> {
        let focus = self.current_identifier();
        if let Some(order) = self.sort.as_mut() {
            order.descending = !order.descending;
        }
        self.apply_sort();
        self.refocus(focus);
        self.sort
    }

    pub(crate) fn current_record(&self) -> Option<&Record> {
        self.rows
            .get(self.selected)
            .and_then(|idx| self.records.get(*idx))
    }

    /// Records in display order.
    pub(crate) fn visible_records(&self) -> impl Iterator<Item = &Record> {
        self.rows.iter().filter_map(|idx| self.records.get(*idx))
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        if self.rows.is_empty() {
            return;
        }
        let len = self.rows.len() as isize;
        let new = (self.selected as isize + offset).clamp(0, len - 1);
        self.selected = new as usize;
    }

    pub(crate) fn select_first(&mut self) {
        self.selected = 0;
    }

    pub(crate) fn select_last(&mut self) {
        self.selected = self.rows.len().saturating_sub(1);
    }

    /// Move the cursor to the row holding `identifier`, if it is visible.
    pub(crate) fn select_identifier(&mut self, identifier: &str) -> bool {
        let position = self
            .rows
            .iter()
            .position(|idx| self.records[*idx].identifier == identifier);
        if let Some(position) = position {
            self.selected = position;
            true
        } else {
            false
        }
    }

    pub(crate) fn ensure_in_bounds(&mut self) {
        if self.rows.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.rows.len() {
            self.selected = self.rows.len() - 1;
        }
    }

    fn current_identifier(&self) -> Option<String> {
        self.current_record().map(|record| record.identifier.clone())
    }

    fn refocus(&mut self, identifier: Option<String>) {
        if let Some(identifier) = identifier {
            self.select_identifier(&identifier);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(identifier: &str, cage: &str, mouseline: &str) -> Record {
        let mut record = Record::new(identifier);
        record.cage_number = cage.to_string();
        record.mouseline = mouseline.to_string();
        record
    }

    fn screen() -> RecordsScreen {
        RecordsScreen::new(
            Collection::Live,
            vec![
                record("M003", "10", "C57"),
                record("M001", "2", "BALB"),
                record("M002", "7", "C57"),
            ],
        )
    }

    fn identifiers(screen: &RecordsScreen) -> Vec<&str> {
        screen
            .visible_records()
            .map(|record| record.identifier.as_str())
            .collect()
    }

    #[test]
    fn unsorted_screen_keeps_storage_order() {
        let screen = screen();
        assert_eq!(identifiers(&screen), ["M003", "M001", "M002"]);
        assert_eq!(screen.current_record().unwrap().identifier, "M003");
    }

    #[test]
    fn sort_cycles_columns_and_keeps_focus() {
        let mut screen = screen();
        screen.move_selection(1);
        assert_eq!(screen.current_record().unwrap().identifier, "M001");

        let order = screen.cycle_sort().unwrap();
        assert_eq!(order.column, Column::Identifier);
        assert_eq!(identifiers(&screen), ["M001", "M002", "M003"]);
        assert_eq!(screen.current_record().unwrap().identifier, "M001");

        let order = screen.cycle_sort().unwrap();
        assert_eq!(order.column, Column::CageNumber);
        assert_eq!(identifiers(&screen), ["M001", "M002", "M003"]);

        screen.toggle_sort_direction();
        assert_eq!(identifiers(&screen), ["M003", "M002", "M001"]);
        assert_eq!(screen.current_record().unwrap().identifier, "M001");
    }

    #[test]
    fn sort_wraps_back_to_storage_order() {
        let mut screen = screen();
        for _ in 0..Column::ALL.len() {
            assert!(screen.cycle_sort().is_some());
        }
        assert!(screen.cycle_sort().is_none());
        assert_eq!(identifiers(&screen), ["M003", "M001", "M002"]);
    }

    #[test]
    fn sort_by_cage_handles_mixed_labels() {
        let cages = ["2", "10", "1a", "3b", "25", "7", "100"];
        let records = (0..64)
            .map(|i| record(&format!("M{i:03}"), cages[(i * 3) % cages.len()], ""))
            .collect();
        let mut screen = RecordsScreen::new(Collection::Live, records);

        screen.cycle_sort();
        let order = screen.cycle_sort().unwrap();
        assert_eq!(order.column, Column::CageNumber);

        let sorted: Vec<&str> = screen
            .visible_records()
            .map(|record| record.cage_number.as_str())
            .collect();
        assert_eq!(sorted.len(), 64);
        assert_eq!(sorted.first(), Some(&"2"));
        assert_eq!(sorted.last(), Some(&"3b"));
        let first_label = sorted.iter().position(|cage| *cage == "1a").unwrap();
        assert!(sorted[..first_label].iter().all(|cage| cage.parse::<u32>().is_ok()));

        screen.toggle_sort_direction();
        assert_eq!(screen.visible_records().next().unwrap().cage_number, "3b");
    }

    #[test]
    fn selection_is_clamped() {
        let mut screen = screen();
        screen.move_selection(10);
        assert_eq!(screen.selected, 2);
        screen.move_selection(-10);
        assert_eq!(screen.selected, 0);
        screen.select_last();
        screen.set_records(vec![record("M009", "", "")]);
        assert_eq!(screen.selected, 0);
        screen.set_records(Vec::new());
        assert!(screen.current_record().is_none());
        screen.move_selection(1);
        assert_eq!(screen.selected, 0);
    }

    #[test]
    fn select_identifier_finds_visible_rows() {
        let mut screen = screen();
        assert!(screen.select_identifier("M002"));
        assert_eq!(screen.selected, 2);
        assert!(!screen.select_identifier("M404"));
        assert_eq!(screen.selected, 2);
    }
}
