pub mod client;
pub mod config;
pub mod error;
pub mod prompt;
pub mod vision;

pub use client::{CompletionRequest, LlmService};
pub use config::LlmConfig;
pub use error::{FAILURE_MARKER, LlmError, LlmErrorKind};
pub use vision::ImageDetail;
