pub mod aggregate;
pub mod etl;
pub mod extract;
pub mod pipeline;
pub mod psl;
pub mod sort;
pub mod staging;

pub use crate::domain::model::{AggregateSummary, AnnotatedDomainRecord};
pub use crate::domain::ports::{ConfigProvider, DomainFilter, Pipeline, SourceFetcher, Storage};
pub use crate::utils::error::Result;
