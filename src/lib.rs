//! keyword-lens - OCR keyword indexing and highlighting engine
//!
//! Turns the flat word list a native text-recognition engine produces for
//! an image into fast keyword lookups (exact, partial, multi-word phrase),
//! caches results per image so repeated queries never re-run recognition,
//! and projects matched bounding boxes into a display surface's local
//! coordinates for an external renderer.
//!
//! The native Tesseract backend is optional (`tesseract` feature); any
//! backend implementing [`TextRecognizer`] can drive the pipeline.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod index;
pub mod matcher;
pub mod pipeline;
pub mod preprocess;
pub mod projector;

pub use cache::{ImageId, ImageOcrResult, OcrResultCache, RuleOrigin};
pub use config::{load_config, load_rules, save_config, OcrConfig, RuleSet, MIN_WORD_CONFIDENCE};
#[cfg(feature = "tesseract")]
pub use engine::TesseractEngine;
pub use engine::{reconcile, NativeBox, Recognition, RecognizedWord, TextRecognizer};
pub use error::{InitError, PipelineError, PreprocessError, RecognizeError};
pub use geometry::Rect;
pub use index::WordIndex;
pub use matcher::{match_rules, KeywordRule, MarkerStyle};
pub use pipeline::{KeywordPipeline, RuleScope, SubmitOutcome};
pub use preprocess::{prepare, PixelBuffer};
pub use projector::{project, LocalPoint};
