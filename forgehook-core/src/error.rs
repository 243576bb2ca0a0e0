//! The error taxonomy shared by every component of the host.
//!
//! A single enum, not one per crate: every component ultimately reports
//! failure as one of these nine stable codes, because the transport-facing
//! envelope (`ErrorEnvelope`) is built once at the boundary rather than
//! duplicated per call site. Lower layers (a container engine client, a
//! provider adapter) are free to define their own narrower error type and
//! convert it here with `From`.

use thiserror::Error;

/// The taxonomy from which every operation's failure is drawn.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ForgehookError {
    /// Malformed manifest, missing required argument.
    #[error("validation: {0}")]
    Validation(String),

    /// No such hook instance / agent / run.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate hookId, port exhaustion, name collision.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Container engine reachability or API error.
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Pull, load, or digest lookup failure.
    #[error("image error: {0}")]
    ImageError(String),

    /// Container crash, embedded invoke returned success=false, gateway non-2xx.
    #[error("runtime error: {0}")]
    RuntimeError(String),

    /// Any `finishReason="error"` from the LLM capability.
    #[error("llm error: {0}")]
    LlmError(String),

    /// Wall-clock deadline exceeded.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Unexpected; callers should log this with the full source chain.
    #[error("internal error: {0}")]
    Internal(String),

    /// Catch-all preserving an opaque lower-layer error as the source.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ForgehookError {
    /// The stable transport code for this error, per the taxonomy.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::EngineUnavailable(_) => "engine_unavailable",
            Self::ImageError(_) => "image_error",
            Self::RuntimeError(_) => "runtime_error",
            Self::LlmError(_) => "llm_error",
            Self::Timeout(_) => "timeout",
            Self::Internal(_) | Self::Other(_) => "internal",
        }
    }
}

/// The structured error envelope returned to callers, per the error-handling
/// design: `{code, message, details?}`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorEnvelope {
    /// Stable code from the taxonomy.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&ForgehookError> for ErrorEnvelope {
    fn from(err: &ForgehookError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            details: None,
        }
    }
}

impl ErrorEnvelope {
    /// Attach a structured details payload.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_matches_taxonomy() {
        assert_eq!(ForgehookError::Validation("x".into()).code(), "validation");
        assert_eq!(ForgehookError::NotFound("x".into()).code(), "not_found");
        assert_eq!(ForgehookError::Conflict("x".into()).code(), "conflict");
        assert_eq!(
            ForgehookError::EngineUnavailable("x".into()).code(),
            "engine_unavailable"
        );
        assert_eq!(ForgehookError::ImageError("x".into()).code(), "image_error");
        assert_eq!(ForgehookError::RuntimeError("x".into()).code(), "runtime_error");
        assert_eq!(ForgehookError::LlmError("x".into()).code(), "llm_error");
        assert_eq!(ForgehookError::Timeout("x".into()).code(), "timeout");
        assert_eq!(ForgehookError::Internal("x".into()).code(), "internal");
    }

    #[test]
    fn envelope_carries_message() {
        let err = ForgehookError::NotFound("hook abc".into());
        let envelope = ErrorEnvelope::from(&err);
        assert_eq!(envelope.code, "not_found");
        assert_eq!(envelope.message, "not found: hook abc");
        assert!(envelope.details.is_none());
    }
}
