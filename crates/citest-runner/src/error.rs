use thiserror::Error;

use citest_core::Tag;
use citest_runtime::RuntimeError;

#[derive(Debug, Error)]
pub enum CiError {
    /// The tag's container never started; no report exists for it.
    #[error("failed to launch {tag}: {source}")]
    Launch { tag: Tag, source: RuntimeError },

    #[error("{collector} failed for {tag}: {message}")]
    Collector { collector: &'static str, tag: Tag, message: String },

    #[error("cleanup of {tag} failed: {message}")]
    Cleanup { tag: Tag, message: String },

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("a report for {0} was already finalized")]
    DuplicateReport(Tag),

    #[error("preflight failed: {0}")]
    Preflight(String),
}

impl CiError {
    pub fn collector(collector: &'static str, tag: &Tag, message: impl Into<String>) -> Self {
        CiError::Collector { collector, tag: tag.clone(), message: message.into() }
    }
}
