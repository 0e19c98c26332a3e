pub mod config;
pub mod context;
pub mod stream;

pub use config::{ErrorStrategy, PipelineConfig, RuleConfig};
pub use context::{ParseErrorInfo, ProcessingStats, RecordContext};
pub use stream::{RecordProcessor, StreamPipeline};
