pub mod aligner;
pub mod error;
pub mod loader;
pub mod parser;
pub mod pipeline;
pub mod resampler;
pub mod series;
pub mod source_type;
pub mod storage;
