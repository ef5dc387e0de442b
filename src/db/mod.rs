//! Persistence module split across logical submodules.

mod connection;
mod exchange;
mod migration;
mod records;

pub use connection::RecordStore;
pub use exchange::{read_csv, write_csv};
