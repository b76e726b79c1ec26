pub mod clients;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{cli::LocalStorage, CliConfig};

pub use core::{etl::EtlEngine, pipeline::DrugTargetPipeline};
pub use utils::error::{EtlError, Result};
