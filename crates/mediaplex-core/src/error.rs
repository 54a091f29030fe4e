// crates/mediaplex-core/src/error.rs
//
// Public error type for the engine boundary. Internal FFmpeg plumbing keeps
// using anyhow::Result (see mediaplex-engine) the way decode.rs/encode.rs do;
// anything that crosses into host-visible territory — open/seek results,
// command completions, on_media_failed — is converted into one of these five
// kinds first, each carrying a machine-readable code() for host dispatch.

use thiserror::Error;

/// Trait for error types that provide a machine-readable error code.
pub trait ErrorCode {
    /// Returns a stable, host-facing error code.
    fn code(&self) -> &'static str;
}

/// Everything that can go wrong opening, decoding, buffering, or commanding
/// a playback session.
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    /// Demuxer open/read/seek failure.
    #[error("container error: {0}")]
    Container(String),

    /// Codec send/receive, resampler init, or filter-graph build failure.
    #[error("decoder error: {0}")]
    Decoder(String),

    /// A BlockBuffer slot could not be allocated or materialized.
    #[error("allocation error: {0}")]
    Allocation(String),

    /// An operation was invoked in the wrong lifecycle state.
    #[error("state error: {0}")]
    State(String),

    /// A worker observed an interrupt mid-cycle and aborted intentionally.
    /// Never surfaced to the host; logged at debug verbosity only.
    #[error("cancelled")]
    Cancelled,
}

impl ErrorCode for EngineError {
    fn code(&self) -> &'static str {
        match self {
            Self::Container(_)  => "container_error",
            Self::Decoder(_)    => "decoder_error",
            Self::Allocation(_) => "allocation_error",
            Self::State(_)      => "state_error",
            Self::Cancelled     => "cancelled",
        }
    }
}

impl EngineError {
    pub fn container(msg: impl Into<String>) -> Self {
        Self::Container(msg.into())
    }

    pub fn decoder(msg: impl Into<String>) -> Self {
        Self::Decoder(msg.into())
    }

    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(EngineError::container("x").code(), "container_error");
        assert_eq!(EngineError::decoder("x").code(), "decoder_error");
        assert_eq!(EngineError::allocation("x").code(), "allocation_error");
        assert_eq!(EngineError::state("x").code(), "state_error");
        assert_eq!(EngineError::Cancelled.code(), "cancelled");
    }

    #[test]
    fn is_cancelled_only_matches_cancelled_variant() {
        assert!(EngineError::Cancelled.is_cancelled());
        assert!(!EngineError::container("x").is_cancelled());
    }
}
