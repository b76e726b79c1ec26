pub mod etl;
pub mod pipeline;

pub use crate::domain::model::{DrugRecord, ReportSet, TargetKeywords, TargetLink};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
