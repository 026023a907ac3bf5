//! Recognition engine adapter
//!
//! Bridges pixel buffers to the native text-recognition engine and decodes
//! its parallel output arrays (tokens, confidences, bounding boxes) into a
//! single structured word list. The native backend is behind the
//! `tesseract` feature; everything above the [`TextRecognizer`] seam works
//! without it.

use tracing::{debug, warn};

use crate::config::MIN_WORD_CONFIDENCE;
use crate::error::RecognizeError;
use crate::geometry::Rect;
use crate::preprocess::PixelBuffer;

/// Single recognized word. Immutable once produced; bounds are in display
/// space (top-left origin).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizedWord {
    pub text: String,
    pub bounds: Rect,
    /// Engine confidence, 0-100.
    pub confidence: i32,
}

/// Output of one recognition pass over a pixel buffer.
#[derive(Debug, Clone, Default)]
pub struct Recognition {
    /// Whitespace-joined text of the words that survived filtering.
    pub full_text: String,
    /// Surviving words in original sequence order.
    pub words: Vec<RecognizedWord>,
}

/// Recognition backend seam.
///
/// Implemented by the native Tesseract engine and by scripted test doubles.
pub trait TextRecognizer: Send {
    fn recognize(&mut self, buffer: &PixelBuffer) -> Result<Recognition, RecognizeError>;
}

/// Word bounding box as the native engine reports it: bottom-left origin,
/// unflipped, possibly with negative coordinates on noisy input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Reconcile the engine's parallel output arrays into a word list.
///
/// The authoritative word count is the shortest of the three artifacts;
/// misaligned native output is truncated, not fatal. Words below
/// [`MIN_WORD_CONFIDENCE`] are dropped from both the word list and the
/// reconstructed text. Boxes are flipped into display space using the
/// recognized buffer's height.
///
/// Backends that retrieve tokens, confidences, and boxes separately should
/// funnel them through here so filtering and axis conventions stay uniform.
pub fn reconcile(
    text: &str,
    confidences: &[i32],
    boxes: &[NativeBox],
    buffer_height: u32,
) -> Recognition {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let count = tokens.len().min(confidences.len()).min(boxes.len());

    if tokens.len() != confidences.len() || confidences.len() != boxes.len() {
        warn!(
            "native output arrays disagree: {} tokens, {} confidences, {} boxes; truncating to {}",
            tokens.len(),
            confidences.len(),
            boxes.len(),
            count
        );
    }

    let mut words = Vec::with_capacity(count);
    let mut kept_tokens = Vec::with_capacity(count);

    for i in 0..count {
        let confidence = confidences[i];
        if confidence < MIN_WORD_CONFIDENCE {
            debug!(
                "dropped low-confidence word '{}' ({} < {})",
                tokens[i], confidence, MIN_WORD_CONFIDENCE
            );
            continue;
        }

        words.push(RecognizedWord {
            text: tokens[i].to_string(),
            bounds: flip_to_display(boxes[i], buffer_height),
            confidence,
        });
        kept_tokens.push(tokens[i]);
    }

    Recognition {
        full_text: kept_tokens.join(" "),
        words,
    }
}

/// Convert a native bottom-left-origin box to display (top-left-origin)
/// coordinates: `display_y = buffer_height - native_y - box_height`.
fn flip_to_display(b: NativeBox, buffer_height: u32) -> Rect {
    let width = b.width.max(0) as u32;
    let height = b.height.max(0) as u32;
    let x = b.x.max(0) as u32;
    let y = (buffer_height as i64 - b.y as i64 - b.height as i64).max(0) as u32;
    Rect::new(x, y, width, height)
}

/// Native Tesseract backend over the raw C API.
///
/// The call contract: create handle, Init3(data path, language), SetImage
/// (raw pixel pointer + dimensions + bytes-per-pixel + stride),
/// Recognize(monitor), GetUTF8Text, AllWordConfidences (`-1`-terminated),
/// GetWords (Boxa), End/Delete. Every native pointer is held by a guard
/// that frees it on all exit paths.
#[cfg(feature = "tesseract")]
pub mod native {
    use std::ffi::{CStr, CString};
    use std::os::raw::{c_char, c_int};
    use std::path::Path;
    use std::ptr;

    use tracing::info;

    use super::{reconcile, NativeBox, Recognition, TextRecognizer};
    use crate::error::{InitError, RecognizeError};
    use crate::preprocess::PixelBuffer;

    /// Process-wide native handle. Ended and deleted on drop.
    struct EngineHandle(*mut tesseract_sys::TessBaseAPI);

    impl Drop for EngineHandle {
        fn drop(&mut self) {
            unsafe {
                tesseract_sys::TessBaseAPIEnd(self.0);
                tesseract_sys::TessBaseAPIDelete(self.0);
            }
        }
    }

    /// UTF-8 text pointer returned by the engine.
    struct TextGuard(*mut c_char);

    impl Drop for TextGuard {
        fn drop(&mut self) {
            if !self.0.is_null() {
                unsafe { tesseract_sys::TessDeleteText(self.0) };
            }
        }
    }

    /// Sentinel-terminated per-word confidence array.
    struct ConfidenceGuard(*mut c_int);

    impl Drop for ConfidenceGuard {
        fn drop(&mut self) {
            if !self.0.is_null() {
                unsafe { tesseract_sys::TessDeleteIntArray(self.0) };
            }
        }
    }

    /// Boxed word-rectangle array.
    struct BoxaGuard(*mut leptonica_sys::Boxa);

    impl Drop for BoxaGuard {
        fn drop(&mut self) {
            if !self.0.is_null() {
                unsafe { leptonica_sys::boxaDestroy(&mut self.0) };
            }
        }
    }

    /// Tesseract-backed [`TextRecognizer`].
    pub struct TesseractEngine {
        handle: EngineHandle,
        language: String,
    }

    // The raw handle is only touched through &mut self; instances move
    // between threads as a whole.
    unsafe impl Send for TesseractEngine {}

    impl TesseractEngine {
        /// Create and initialize a native engine instance.
        ///
        /// Initializing again means constructing a new instance; dropping
        /// the previous one ends and deletes its native handle.
        pub fn new(language: &str, data_path: Option<&Path>) -> Result<Self, InitError> {
            if let Some(path) = data_path {
                if !path.exists() {
                    return Err(InitError::DataPath(path.display().to_string()));
                }
            }

            let lang = CString::new(language).map_err(|_| InitError::InvalidArgument)?;
            let data = data_path
                .map(|p| CString::new(p.to_string_lossy().into_owned()))
                .transpose()
                .map_err(|_| InitError::InvalidArgument)?;

            let raw = unsafe { tesseract_sys::TessBaseAPICreate() };
            if raw.is_null() {
                return Err(InitError::HandleCreation);
            }
            let handle = EngineHandle(raw);

            let data_ptr = data.as_ref().map_or(ptr::null(), |c| c.as_ptr());
            let status = unsafe { tesseract_sys::TessBaseAPIInit3(raw, data_ptr, lang.as_ptr()) };
            if status != 0 {
                return Err(InitError::EngineInit {
                    language: language.to_string(),
                    status,
                });
            }

            info!("native recognition engine initialized (language: {})", language);

            Ok(Self {
                handle,
                language: language.to_string(),
            })
        }

        pub fn language(&self) -> &str {
            &self.language
        }
    }

    impl TextRecognizer for TesseractEngine {
        fn recognize(&mut self, buffer: &PixelBuffer) -> Result<Recognition, RecognizeError> {
            let raw = self.handle.0;

            unsafe {
                tesseract_sys::TessBaseAPISetImage(
                    raw,
                    buffer.data.as_ptr(),
                    buffer.width as c_int,
                    buffer.height as c_int,
                    PixelBuffer::BYTES_PER_PIXEL as c_int,
                    buffer.stride() as c_int,
                );
            }

            let status = unsafe { tesseract_sys::TessBaseAPIRecognize(raw, ptr::null_mut()) };
            if status != 0 {
                return Err(RecognizeError::NativeFailure(status));
            }

            let text = TextGuard(unsafe { tesseract_sys::TessBaseAPIGetUTF8Text(raw) });
            if text.0.is_null() {
                return Err(RecognizeError::NullText);
            }

            let confidences =
                ConfidenceGuard(unsafe { tesseract_sys::TessBaseAPIAllWordConfidences(raw) });
            let boxes = BoxaGuard(unsafe { tesseract_sys::TessBaseAPIGetWords(raw, ptr::null_mut()) });

            let full_text = unsafe { CStr::from_ptr(text.0) }
                .to_string_lossy()
                .into_owned();
            let confs = read_confidences(confidences.0);
            let native_boxes = read_boxes(boxes.0);

            Ok(reconcile(&full_text, &confs, &native_boxes, buffer.height))
        }
    }

    /// Decode the `-1`-terminated confidence array.
    fn read_confidences(arr: *const c_int) -> Vec<i32> {
        let mut out = Vec::new();
        if arr.is_null() {
            return out;
        }
        let mut i = 0isize;
        loop {
            let v = unsafe { *arr.offset(i) };
            if v == -1 {
                break;
            }
            out.push(v);
            i += 1;
        }
        out
    }

    /// Decode the Boxa word-rectangle array.
    fn read_boxes(boxa: *mut leptonica_sys::Boxa) -> Vec<NativeBox> {
        let mut out = Vec::new();
        if boxa.is_null() {
            return out;
        }
        let count = unsafe { leptonica_sys::boxaGetCount(boxa) };
        for i in 0..count {
            let (mut x, mut y, mut w, mut h) = (0, 0, 0, 0);
            let status = unsafe {
                leptonica_sys::boxaGetBoxGeometry(boxa, i, &mut x, &mut y, &mut w, &mut h)
            };
            if status == 0 {
                out.push(NativeBox {
                    x,
                    y,
                    width: w,
                    height: h,
                });
            }
        }
        out
    }
}

#[cfg(feature = "tesseract")]
pub use native::TesseractEngine;
