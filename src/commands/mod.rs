//! Command implementations for the taxrag CLI

mod ingest;
mod sample;
mod verify;

pub use ingest::{cmd_ingest, IngestStats};
pub use sample::cmd_sample;
pub use verify::cmd_verify;
