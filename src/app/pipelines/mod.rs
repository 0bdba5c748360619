pub mod blocklist_pipeline;

pub use blocklist_pipeline::{BlocklistPipeline, RunOptions};
