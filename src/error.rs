//! Error taxonomy
//!
//! Every failure is single-shot and surfaced to the immediate caller; the
//! crate never retries and never aborts the host process. Total recognition
//! failure degrades to "no keywords matched".

use thiserror::Error;

/// Recognition engine initialization failure.
///
/// Non-fatal: recognition calls short-circuit with
/// [`RecognizeError::NotReady`] until a later initialization succeeds.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to create native engine handle")]
    HandleCreation,

    #[error("engine initialization failed for language '{language}' (status {status})")]
    EngineInit { language: String, status: i32 },

    #[error("recognition data path does not exist: {0}")]
    DataPath(String),

    #[error("language or data path contains an interior NUL byte")]
    InvalidArgument,

    #[error("native recognition backend not available - build with the `tesseract` feature")]
    BackendUnavailable,
}

/// Source image could not be turned into a recognizable pixel buffer.
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("source image has zero width or height")]
    EmptyImage,

    #[error("source image unreadable after conversion ({0})")]
    Unreadable(String),
}

/// Native recognition call failure. Temporary native buffers are released
/// on every exit path before this is returned.
#[derive(Debug, Error)]
pub enum RecognizeError {
    #[error("recognition engine not initialized")]
    NotReady,

    #[error("native recognize call failed (status {0})")]
    NativeFailure(i32),

    #[error("native engine returned no text")]
    NullText,
}

/// Pipeline-level failure for a single submitted request. The cache entry
/// for the affected image remains unprocessed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error(transparent)]
    Recognize(#[from] RecognizeError),
}
