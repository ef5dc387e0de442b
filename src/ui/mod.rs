//! Ratatui front-end: a collection selector, the record table, and modal
//! forms for add/edit/delete/copy/export.

mod app;
mod forms;
mod helpers;
mod screens;
mod terminal;

pub use app::App;
pub use terminal::run_app;
