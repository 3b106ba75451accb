//! Error types for verdict generation

use thiserror::Error;

use crate::service::capabilities::CapabilityError;

/// Why a verdict batch attempt produced nothing usable
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenerationFailure {
    #[error("generation call failed: {0}")]
    Call(#[from] CapabilityError),

    #[error("generation output unparseable: {0}")]
    Unparseable(String),
}
