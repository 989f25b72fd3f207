pub mod algo;
pub mod config;
pub mod error;
pub mod ops;

#[cfg(feature = "store")]
pub mod store;

pub use config::PipelineConfig;
