pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::{CliArgs, RunMode};

pub use adapters::{LocalEngine, PostgresConnector};
pub use config::IntegrationConfiguration;
pub use crate::core::archive::run_archives;
pub use crate::core::orchestrator::{run_integrations, FailurePolicy, TransferReport};
pub use utils::error::{EtlError, Result};
