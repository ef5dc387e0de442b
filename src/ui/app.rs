use std::mem;
use std::path::PathBuf;

use anyhow::{Context, Result};
use crossterm::event::KeyCode;
use open::that as open_path;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Tabs, Wrap,
};
use ratatui::Frame;

use crate::db::RecordStore;
use crate::models::{Collection, Column, Outcome, Record};

use super::forms::{
    field_prefix, ConfirmMigrate, ConfirmRecordDelete, ExportForm, Notice, RecordForm,
    SearchState,
};
use super::helpers::{centered_rect, column_constraint, surface_error};
use super::screens::RecordsScreen;

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Height of the collection selector above the table.
const HEADER_HEIGHT: u16 = 3;
/// Rows skipped by PageUp/PageDown.
const PAGE_STEP: isize = 10;
/// Column searched when the operator opens the search bar for the first time.
const DEFAULT_SEARCH_COLUMN: Column = Column::Mouseline;

/// Fine-grained modes layered over the record table.
enum Mode {
    Normal,
    AddingRecord(RecordForm),
    EditingRecord {
        identifier: String,
        form: RecordForm,
    },
    ConfirmDelete(ConfirmRecordDelete),
    ConfirmMigrate(ConfirmMigrate),
    Searching(SearchState),
    Exporting(ExportForm),
    Notice(Notice),
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state shared across the TUI.
pub struct App {
    store: RecordStore,
    screen: RecordsScreen,
    mode: Mode,
    status: Option<StatusMessage>,
    last_search_column: Column,
    last_export: Option<PathBuf>,
}

impl App {
    /// Build the app on the live collection, loading its records.
    pub fn new(store: RecordStore) -> Result<Self> {
        let records = store
            .fetch(Collection::Live)
            .context("failed to load live records")?;
        Ok(Self {
            store,
            screen: RecordsScreen::new(Collection::Live, records),
            mode: Mode::Normal,
            status: None,
            last_search_column: DEFAULT_SEARCH_COLUMN,
            last_export: None,
        })
    }

    /// Show a message in the footer before the first frame is drawn, e.g. the
    /// outcome of the session bootstrap.
    pub fn with_status(mut self, text: impl Into<String>, is_error: bool) -> Self {
        let kind = if is_error {
            StatusKind::Error
        } else {
            StatusKind::Info
        };
        self.set_status(text, kind);
        self
    }

    /// Returns `true` when the operator asked to quit.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        self.mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit)?,
            Mode::AddingRecord(form) => self.handle_add_record(code, form)?,
            Mode::EditingRecord { identifier, form } => {
                self.handle_edit_record(code, identifier, form)?
            }
            Mode::ConfirmDelete(confirm) => self.handle_confirm_delete(code, confirm)?,
            Mode::ConfirmMigrate(confirm) => self.handle_confirm_migrate(code, confirm)?,
            Mode::Searching(state) => self.handle_search(code, state)?,
            Mode::Exporting(form) => self.handle_export(code, form)?,
            Mode::Notice(notice) => match code {
                KeyCode::Enter | KeyCode::Esc | KeyCode::Char(_) => Mode::Normal,
                _ => Mode::Notice(notice),
            },
        };

        Ok(exit)
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        match code {
            KeyCode::Char('q') => *exit = true,
            KeyCode::Esc => {
                if self.screen.search.is_some() {
                    self.screen.search = None;
                    self.reload(None)?;
                    self.set_status("Search cleared.", StatusKind::Info);
                } else {
                    *exit = true;
                }
            }
            KeyCode::Tab | KeyCode::BackTab => {
                self.clear_status();
                self.switch_collection(self.screen.collection.toggle())?;
            }
            KeyCode::Up => self.screen.move_selection(-1),
            KeyCode::Down => self.screen.move_selection(1),
            KeyCode::PageUp => self.screen.move_selection(-PAGE_STEP),
            KeyCode::PageDown => self.screen.move_selection(PAGE_STEP),
            KeyCode::Home => self.screen.select_first(),
            KeyCode::End => self.screen.select_last(),
            KeyCode::Char('r') | KeyCode::Char('R') => {
                let focus = self.current_identifier();
                self.reload(focus.as_deref())?;
                self.set_status(
                    format!(
                        "Reloaded {} ({} records).",
                        self.screen.collection.title(),
                        self.screen.len()
                    ),
                    StatusKind::Info,
                );
            }
            KeyCode::Char('f') | KeyCode::Char('/') => {
                self.clear_status();
                let (column, query) = match &self.screen.search {
                    Some((column, value)) => (*column, value.clone()),
                    None => (self.last_search_column, String::new()),
                };
                return Ok(Mode::Searching(SearchState::new(column, query)));
            }
            KeyCode::Char('+') | KeyCode::Char('a') => {
                self.clear_status();
                return Ok(Mode::AddingRecord(RecordForm::default()));
            }
            KeyCode::Char('e') | KeyCode::Char('E') | KeyCode::Enter => {
                if let Some(record) = self.screen.current_record().cloned() {
                    self.clear_status();
                    return Ok(Mode::EditingRecord {
                        identifier: record.identifier.clone(),
                        form: RecordForm::from_record(&record),
                    });
                }
                self.set_status("No record selected to edit.", StatusKind::Error);
            }
            KeyCode::Char('-') | KeyCode::Char('d') => {
                if let Some(record) = self.screen.current_record().cloned() {
                    self.clear_status();
                    return Ok(Mode::ConfirmDelete(ConfirmRecordDelete {
                        collection: self.screen.collection,
                        record,
                    }));
                }
                self.set_status("No record selected to delete.", StatusKind::Error);
            }
            KeyCode::Char('m') | KeyCode::Char('M') => {
                if self.screen.collection != Collection::Live {
                    self.set_status(
                        "Only live records can be copied to the deceased list.",
                        StatusKind::Error,
                    );
                } else if let Some(record) = self.screen.current_record().cloned() {
                    self.clear_status();
                    return Ok(Mode::ConfirmMigrate(ConfirmMigrate { record }));
                } else {
                    self.set_status("No record selected to copy.", StatusKind::Error);
                }
            }
            KeyCode::Char('x') | KeyCode::Char('X') => {
                self.clear_status();
                let collection = self.screen.collection;
                let default_path = format!("{}.csv", self.store.config().table(collection));
                return Ok(Mode::Exporting(ExportForm::new(collection, default_path)));
            }
            KeyCode::Char('o') | KeyCode::Char('O') => match self.last_export.clone() {
                Some(path) => match open_path(&path) {
                    Ok(()) => {
                        self.set_status(format!("Opened {}.", path.display()), StatusKind::Info)
                    }
                    Err(err) => self.set_status(
                        format!("Failed to open {}: {err}", path.display()),
                        StatusKind::Error,
                    ),
                },
                None => self.set_status("Nothing exported yet.", StatusKind::Error),
            },
            KeyCode::Char('s') => {
                let message = match self.screen.cycle_sort() {
                    Some(order) => format!("Sorted by {}.", order.column.as_str()),
                    None => "Showing storage order.".to_string(),
                };
                self.set_status(message, StatusKind::Info);
            }
            KeyCode::Char('S') => {
                if let Some(order) = self.screen.toggle_sort_direction() {
                    let direction = if order.descending {
                        "descending"
                    } else {
                        "ascending"
                    };
                    self.set_status(
                        format!("Sorted by {} ({direction}).", order.column.as_str()),
                        StatusKind::Info,
                    );
                }
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_add_record(&mut self, code: KeyCode, mut form: RecordForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Add record cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Tab | KeyCode::Down => form.cycle_field(1),
            KeyCode::BackTab | KeyCode::Up => form.cycle_field(-1),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_new_record(&form) {
                Ok(()) => return Ok(Mode::Normal),
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Ok(Mode::AddingRecord(form))
    }

    fn handle_edit_record(
        &mut self,
        code: KeyCode,
        identifier: String,
        mut form: RecordForm,
    ) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Edit cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Tab | KeyCode::Down => form.cycle_field(1),
            KeyCode::BackTab | KeyCode::Up => form.cycle_field(-1),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_existing_record(&identifier, &form) {
                Ok(mode) => return Ok(mode),
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Ok(Mode::EditingRecord { identifier, form })
    }

    fn handle_confirm_delete(
        &mut self,
        code: KeyCode,
        confirm: ConfirmRecordDelete,
    ) -> Result<Mode> {
        match code {
            KeyCode::Char('y') | KeyCode::Char('Y') => self.perform_delete(&confirm),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.set_status("Delete cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            _ => Ok(Mode::ConfirmDelete(confirm)),
        }
    }

    fn handle_confirm_migrate(&mut self, code: KeyCode, confirm: ConfirmMigrate) -> Result<Mode> {
        match code {
            KeyCode::Char('y') | KeyCode::Char('Y') => self.perform_migrate(&confirm),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.set_status("Copy cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            _ => Ok(Mode::ConfirmMigrate(confirm)),
        }
    }

    fn handle_search(&mut self, code: KeyCode, mut state: SearchState) -> Result<Mode> {
        match code {
            KeyCode::Esc => return Ok(Mode::Normal),
            KeyCode::Tab => state.column = state.column.cycle(1),
            KeyCode::BackTab => state.column = state.column.cycle(-1),
            KeyCode::Backspace => {
                state.query.pop();
            }
            KeyCode::Enter => {
                self.last_search_column = state.column;
                let query = state.query.trim().to_string();
                if query.is_empty() {
                    self.screen.search = None;
                    self.reload(None)?;
                    self.set_status("Search cleared.", StatusKind::Info);
                } else {
                    self.screen.search = Some((state.column, query));
                    self.reload(None)?;
                    let message = format!("{} matching records.", self.screen.len());
                    self.set_status(message, StatusKind::Info);
                }
                return Ok(Mode::Normal);
            }
            KeyCode::Char(ch) => {
                if !ch.is_control() {
                    state.query.push(ch);
                }
            }
            _ => {}
        }
        Ok(Mode::Searching(state))
    }

    fn handle_export(&mut self, code: KeyCode, mut form: ExportForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Export cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Backspace => {
                form.path.pop();
            }
            KeyCode::Enter => match self.perform_export(&form) {
                Ok(()) => return Ok(Mode::Normal),
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if !ch.is_control() {
                    form.path.push(ch);
                    form.error = None;
                }
            }
            _ => {}
        }
        Ok(Mode::Exporting(form))
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(HEADER_HEIGHT.min(area.height)),
                Constraint::Min(0),
                Constraint::Length(FOOTER_HEIGHT.min(area.height)),
            ])
            .split(area);

        self.draw_header(frame, chunks[0]);
        self.draw_table(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);

        match &self.mode {
            Mode::AddingRecord(form) => self.draw_record_form(frame, area, "Add Record", form),
            Mode::EditingRecord { form, .. } => {
                self.draw_record_form(frame, area, "Edit Record", form)
            }
            Mode::ConfirmDelete(confirm) => self.draw_confirm_delete(frame, area, confirm),
            Mode::ConfirmMigrate(confirm) => self.draw_confirm_migrate(frame, area, confirm),
            Mode::Searching(state) => self.draw_search_bar(frame, area, state),
            Mode::Exporting(form) => self.draw_export_form(frame, area, form),
            Mode::Notice(notice) => self.draw_notice(frame, area, notice),
            Mode::Normal => {}
        }
    }

    fn draw_header(&self, frame: &mut Frame, area: Rect) {
        let titles: Vec<Line> = Collection::ALL
            .iter()
            .map(|collection| Line::from(collection.title()))
            .collect();
        let selected = Collection::ALL
            .iter()
            .position(|collection| *collection == self.screen.collection)
            .unwrap_or(0);

        let title = match &self.screen.search {
            Some((column, value)) => format!("Mouse Records • {} = \"{}\"", column.as_str(), value),
            None => "Mouse Records".to_string(),
        };

        let tabs = Tabs::new(titles)
            .block(Block::default().borders(Borders::ALL).title(title))
            .select(selected)
            .highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            );
        frame.render_widget(tabs, area);
    }

    fn draw_table(&self, frame: &mut Frame, area: Rect) {
        if area.height == 0 {
            return;
        }

        let block_title = format!(
            "{} ({} shown)",
            self.screen.collection.title(),
            self.screen.len()
        );
        let block = Block::default().borders(Borders::ALL).title(block_title);

        if self.screen.len() == 0 {
            let text = if self.screen.search.is_some() {
                "No records match the current search. Press Esc to clear it."
            } else {
                "No records yet. Press '+' to add one."
            };
            let message = Paragraph::new(text)
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(message, area);
            return;
        }

        let header_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let header = Row::new(Column::ALL.iter().map(|column| {
            let marker = match self.screen.sort {
                Some(order) if order.column == *column && order.descending => " ▼",
                Some(order) if order.column == *column => " ▲",
                _ => "",
            };
            Cell::from(format!("{}{marker}", column.label()))
        }))
        .style(header_style);

        let rows = self.screen.visible_records().map(|record| {
            Row::new(
                Column::ALL
                    .iter()
                    .map(|column| Cell::from(record.get(*column).to_string())),
            )
        });

        let table = Table::new(rows, Column::ALL.map(column_constraint))
            .header(header)
            .block(block)
            .column_spacing(1)
            .row_highlight_style(
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");

        let mut state = TableState::default().with_selected(Some(self.screen.selected));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let instructions = self.footer_instructions();

        let paragraph = Paragraph::new(vec![status_line, instructions]).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let pairs: &[(&str, &str)] = match &self.mode {
            Mode::AddingRecord(_) | Mode::EditingRecord { .. } => &[
                ("[Tab/↑↓]", " Field   "),
                ("[Enter]", " Save   "),
                ("[Esc]", " Cancel"),
            ],
            Mode::ConfirmDelete(_) | Mode::ConfirmMigrate(_) => {
                &[("[Y]", " Confirm   "), ("[N/Esc]", " Cancel")]
            }
            Mode::Searching(_) => &[
                ("[Tab]", " Column   "),
                ("[Enter]", " Search (empty clears)   "),
                ("[Esc]", " Cancel"),
            ],
            Mode::Exporting(_) => &[("[Enter]", " Export   "), ("[Esc]", " Cancel")],
            Mode::Notice(_) => &[("[Enter]", " Dismiss")],
            Mode::Normal => &[
                ("[Tab]", " Collection   "),
                ("[f]", " Search   "),
                ("[+]", " Add   "),
                ("[e]", " Edit   "),
                ("[-]", " Delete   "),
                ("[m]", " To deceased   "),
                ("[r]", " Refresh   "),
                ("[x]", " Export   "),
                ("[s/S]", " Sort   "),
                ("[q]", " Quit"),
            ],
        };

        Line::from(
            pairs
                .iter()
                .flat_map(|(key, label)| {
                    [
                        Span::styled(key.to_string(), key_style),
                        Span::raw(label.to_string()),
                    ]
                })
                .collect::<Vec<_>>(),
        )
    }

    fn draw_record_form(&self, frame: &mut Frame, area: Rect, title: &str, form: &RecordForm) {
        let popup_area = centered_rect(70, 80, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines: Vec<Line> = Column::ALL
            .iter()
            .map(|column| form.build_line(*column))
            .collect();
        lines.push(Line::from(""));

        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "Enter to save • Tab to switch field • Esc to cancel",
                Style::default().fg(Color::Gray),
            )));
        }

        let paragraph = Paragraph::new(lines);
        frame.render_widget(paragraph, inner);

        let prefix = field_prefix(form.active).chars().count() as u16;
        let cursor_x = inner.x + prefix + form.value_len(form.active) as u16;
        let cursor_y = inner.y + form.active.index() as u16;
        if cursor_y < inner.y + inner.height {
            frame.set_cursor_position((cursor_x.min(inner.x + inner.width), cursor_y));
        }
    }

    fn draw_confirm_delete(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmRecordDelete) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Confirm Delete")
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            Line::from(format!(
                "Delete {} from the {} list?",
                confirm.record.display_name(),
                confirm.collection.as_str()
            )),
            Line::from("This cannot be undone."),
            Line::from(""),
            Line::from(Span::styled(
                "Press Y to confirm or N / Esc to cancel.",
                Style::default().fg(Color::Gray),
            )),
        ];

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_confirm_migrate(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmMigrate) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Copy to Deceased")
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            Line::from(format!(
                "Copy {} to the deceased list?",
                confirm.record.display_name()
            )),
            Line::from("The live record is kept; delete it separately if needed."),
            Line::from(""),
            Line::from(Span::styled(
                "Press Y to confirm or N / Esc to cancel.",
                Style::default().fg(Color::Gray),
            )),
        ];

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_search_bar(&self, frame: &mut Frame, area: Rect, state: &SearchState) {
        let height = 3u16.min(area.height);
        let popup_area = Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height,
        };
        frame.render_widget(Clear, popup_area);

        let prompt = state.prompt();
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Search (exact match)");
        let paragraph = Paragraph::new(Line::from(vec![
            Span::styled(prompt.clone(), Style::default().fg(Color::Cyan)),
            Span::raw(state.query.clone()),
        ]))
        .block(block.clone());
        frame.render_widget(paragraph, popup_area);

        let inner = block.inner(popup_area);
        let cursor_x =
            inner.x + prompt.chars().count() as u16 + state.query.chars().count() as u16;
        frame.set_cursor_position((cursor_x.min(inner.x + inner.width), inner.y));
    }

    fn draw_export_form(&self, frame: &mut Frame, area: Rect, form: &ExportForm) {
        let popup_area = centered_rect(70, 30, area);
        frame.render_widget(Clear, popup_area);

        let title = format!("Export {}", form.collection.title());
        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = vec![
            Line::from(vec![
                Span::raw("File: "),
                Span::styled(form.path.clone(), Style::default().fg(Color::Yellow)),
            ]),
            Line::from(""),
        ];
        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "Enter to write the CSV • Esc to cancel",
                Style::default().fg(Color::Gray),
            )));
        }

        frame.render_widget(Paragraph::new(lines), inner);
        let cursor_x = inner.x + "File: ".len() as u16 + form.path.chars().count() as u16;
        frame.set_cursor_position((cursor_x.min(inner.x + inner.width), inner.y));
    }

    fn draw_notice(&self, frame: &mut Frame, area: Rect, notice: &Notice) {
        let popup_area = centered_rect(50, 25, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(notice.title.clone())
            .borders(Borders::ALL);
        let lines = vec![
            Line::from(notice.message.clone()),
            Line::from(""),
            Line::from(Span::styled(
                "Press Enter to continue.",
                Style::default().fg(Color::Gray),
            )),
        ];
        let paragraph = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, popup_area);
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    fn save_new_record(&mut self, form: &RecordForm) -> Result<()> {
        let record = form.to_record()?;
        let collection = self.screen.collection;
        self.store
            .insert(collection, &record)
            .context("failed to add record")?;
        self.reload(Some(&record.identifier))?;
        self.set_status(
            format!("Added {} to the {} list.", record.display_name(), collection),
            StatusKind::Info,
        );
        Ok(())
    }

    fn save_existing_record(&mut self, identifier: &str, form: &RecordForm) -> Result<Mode> {
        let record = form.to_record()?;
        let collection = self.screen.collection;
        let outcome = self
            .store
            .update(identifier, collection, &record)
            .context("failed to update record")?;
        self.reload(Some(identifier))?;
        Ok(match outcome {
            Outcome::Applied => {
                self.set_status(format!("Updated {identifier}."), StatusKind::Info);
                Mode::Normal
            }
            Outcome::NotFound => Mode::Notice(Notice::new(
                "Record Not Found",
                format!("Record {identifier} no longer exists in the {collection} list."),
            )),
        })
    }

    fn perform_delete(&mut self, confirm: &ConfirmRecordDelete) -> Result<Mode> {
        let identifier = &confirm.record.identifier;
        let outcome = self
            .store
            .delete(identifier, confirm.collection)
            .context("failed to delete record")?;
        self.reload(None)?;
        Ok(match outcome {
            Outcome::Applied => {
                self.set_status(format!("Deleted {identifier}."), StatusKind::Info);
                Mode::Normal
            }
            Outcome::NotFound => Mode::Notice(Notice::new(
                "Record Not Found",
                format!("Record {identifier} could not be found or deleted."),
            )),
        })
    }

    fn perform_migrate(&mut self, confirm: &ConfirmMigrate) -> Result<Mode> {
        let identifier = &confirm.record.identifier;
        match self.store.migrate(identifier) {
            Ok(Outcome::Applied) => {
                self.set_status(
                    format!("Copied {identifier} to the deceased list."),
                    StatusKind::Info,
                );
                Ok(Mode::Normal)
            }
            Ok(Outcome::NotFound) => {
                self.reload(None)?;
                Ok(Mode::Notice(Notice::new(
                    "Record Not Found",
                    format!("Record {identifier} is not in the live list."),
                )))
            }
            Err(err) => {
                let err = anyhow::Error::from(err).context("failed to copy record");
                self.set_status(surface_error(&err), StatusKind::Error);
                Ok(Mode::Normal)
            }
        }
    }

    fn perform_export(&mut self, form: &ExportForm) -> Result<()> {
        let raw = form.path.trim();
        if raw.is_empty() {
            anyhow::bail!("Export file name is required.");
        }
        let path = PathBuf::from(raw);
        let rows = self
            .store
            .export_to_path(form.collection, &path)
            .context("failed to export records")?;
        self.set_status(
            format!("Exported {rows} records to {}. Press 'o' to open.", path.display()),
            StatusKind::Info,
        );
        self.last_export = Some(path);
        Ok(())
    }

    fn switch_collection(&mut self, collection: Collection) -> Result<()> {
        let records = self
            .store
            .fetch(collection)
            .with_context(|| format!("failed to load {collection} records"))?;
        self.screen = RecordsScreen::new(collection, records);
        Ok(())
    }

    /// Re-query the store for the visible collection (honouring an active
    /// search) and optionally focus a record.
    fn reload(&mut self, focus: Option<&str>) -> Result<()> {
        let collection = self.screen.collection;
        let records = match &self.screen.search {
            Some((column, value)) => self.store.filter(collection, *column, value),
            None => self.store.fetch(collection),
        }
        .with_context(|| format!("failed to load {collection} records"))?;

        self.screen.set_records(records);
        if let Some(identifier) = focus {
            self.screen.select_identifier(identifier);
        }
        Ok(())
    }

    fn current_identifier(&self) -> Option<String> {
        self.screen
            .current_record()
            .map(|record: &Record| record.identifier.clone())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::config::StoreConfig;

    fn app() -> (TempDir, App) {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::open(StoreConfig::at(dir.path().join("mice.sqlite"))).unwrap();
        let app = App::new(store).unwrap();
        (dir, app)
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            app.handle_key(KeyCode::Char(ch)).unwrap();
        }
    }

    fn add_record(app: &mut App, identifier: &str, mouseline: &str) {
        app.handle_key(KeyCode::Char('+')).unwrap();
        type_text(app, identifier);
        app.handle_key(KeyCode::Tab).unwrap();
        app.handle_key(KeyCode::Tab).unwrap();
        type_text(app, mouseline);
        app.handle_key(KeyCode::Enter).unwrap();
        assert!(matches!(app.mode, Mode::Normal));
    }

    #[test]
    fn add_then_migrate_then_delete() {
        let (_dir, mut app) = app();
        add_record(&mut app, "M001", "C57");
        assert_eq!(app.screen.len(), 1);

        app.handle_key(KeyCode::Char('m')).unwrap();
        assert!(matches!(app.mode, Mode::ConfirmMigrate(_)));
        app.handle_key(KeyCode::Char('y')).unwrap();
        assert_eq!(app.store.count(Collection::Deceased).unwrap(), 1);
        assert_eq!(app.screen.len(), 1);

        app.handle_key(KeyCode::Char('-')).unwrap();
        app.handle_key(KeyCode::Char('y')).unwrap();
        assert_eq!(app.screen.len(), 0);

        app.handle_key(KeyCode::Tab).unwrap();
        assert_eq!(app.screen.collection, Collection::Deceased);
        assert_eq!(app.screen.current_record().unwrap().mouseline, "C57");
    }

    #[test]
    fn duplicate_add_keeps_form_open_with_error() {
        let (_dir, mut app) = app();
        add_record(&mut app, "M001", "C57");

        app.handle_key(KeyCode::Char('+')).unwrap();
        type_text(&mut app, "M001");
        app.handle_key(KeyCode::Enter).unwrap();
        match &app.mode {
            Mode::AddingRecord(form) => assert!(form.error.as_deref().unwrap().contains("M001")),
            _ => panic!("form should stay open"),
        }
    }

    #[test]
    fn edit_of_vanished_record_shows_notice() {
        let (_dir, mut app) = app();
        add_record(&mut app, "M001", "C57");

        app.handle_key(KeyCode::Char('e')).unwrap();
        app.store.delete("M001", Collection::Live).unwrap();
        app.handle_key(KeyCode::Enter).unwrap();
        assert!(matches!(app.mode, Mode::Notice(_)));
        app.handle_key(KeyCode::Enter).unwrap();
        assert!(matches!(app.mode, Mode::Normal));
    }

    #[test]
    fn search_filters_by_exact_column_value() {
        let (_dir, mut app) = app();
        add_record(&mut app, "M001", "C57");
        add_record(&mut app, "M002", "BALB");

        app.handle_key(KeyCode::Char('f')).unwrap();
        type_text(&mut app, "BALB");
        app.handle_key(KeyCode::Enter).unwrap();
        assert_eq!(app.screen.len(), 1);
        assert_eq!(app.screen.current_record().unwrap().identifier, "M002");

        app.handle_key(KeyCode::Esc).unwrap();
        assert_eq!(app.screen.len(), 2);
    }

    #[test]
    fn long_search_query_keeps_cursor_inside_the_bar() {
        let (_dir, mut app) = app();
        app.handle_key(KeyCode::Char('f')).unwrap();
        type_text(&mut app, &"C57BL".repeat(20));

        let mut terminal =
            ratatui::Terminal::new(ratatui::backend::TestBackend::new(40, 20)).unwrap();
        terminal.draw(|frame| app.draw(frame)).unwrap();

        let cursor = terminal.get_cursor_position().unwrap();
        assert!(cursor.x < 40, "cursor escaped the screen at x={}", cursor.x);
    }

    #[test]
    fn migrate_is_refused_on_deceased_list() {
        let (_dir, mut app) = app();
        app.handle_key(KeyCode::Tab).unwrap();
        app.handle_key(KeyCode::Char('m')).unwrap();
        assert!(matches!(app.mode, Mode::Normal));
        assert!(matches!(
            app.status.as_ref().map(|status| &status.kind),
            Some(StatusKind::Error)
        ));
    }
}
