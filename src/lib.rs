pub mod analysis;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod ingest;
pub mod insights;
pub mod logging;
pub mod query;

pub use error::{EngineError, EngineResult};
