pub mod archive;
pub mod audit;
pub mod expander;
pub mod orchestrator;
pub mod registry;
pub mod strategy;

pub use crate::domain::model::{Dataset, RunContext};
pub use crate::domain::ports::{DatasetEngine, RelationalConnector, Transferable};
pub use crate::utils::error::Result;
