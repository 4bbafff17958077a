pub mod collector_config;
pub mod minio_config;
pub mod pipeline_config;

pub use collector_config::*;
pub use minio_config::MinioConfig;
pub use pipeline_config::*;
