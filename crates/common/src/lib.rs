pub mod config;
pub mod error;
pub mod logger;

// Re-export commonly used types
pub use config::{AppConfig, ExtractorKind};
pub use error::QfsError;
pub type Result<T> = std::result::Result<T, QfsError>;
