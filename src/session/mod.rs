//! Session glue around the interactive phase: load remote snapshots before
//! it, publish the collections after it.

mod bootstrap;
mod publish;

pub use bootstrap::{bootstrap, bootstrap_from_remote, BootstrapReport, HttpSource, SnapshotSource};
pub use publish::{publish, PublishOutcome, PublishReport};
