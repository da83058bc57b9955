pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;

pub use adapters::SubprocessTransformService;
pub use config::ChainConfig;
pub use crate::core::chain::{ChainReport, TransformChainRunner};
pub use crate::core::records::{extract_scale, parse_transform, RecordTable};
pub use domain::model::{ChainParameters, StageKind, TransformSpec};
pub use domain::ports::{GeometryTransformService, ServiceOutput};
pub use utils::error::{ChainError, Result};
