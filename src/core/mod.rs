pub mod chain;
pub mod records;

pub use crate::domain::model::{ChainParameters, StageKind, TransformSpec, TransformStage};
pub use crate::domain::ports::{GeometryTransformService, ServiceOutput};
pub use crate::utils::error::Result;
