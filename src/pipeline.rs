//! Keyword highlighting pipeline
//!
//! The inbound surface for the presentation layer: submit images, register
//! keyword rules, and read back matched rects and projected anchor points.
//! Owns the recognition backend, the result cache, the global rule list,
//! and the pending-request queue behind a single lock, so cache mutation
//! and queue draining are serialized.

use std::collections::{HashMap, VecDeque};

use image::DynamicImage;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{ImageId, ImageOcrResult, OcrResultCache, RuleOrigin};
use crate::config::OcrConfig;
use crate::engine::TextRecognizer;
use crate::error::{InitError, PipelineError, RecognizeError};
use crate::geometry::Rect;
use crate::matcher::KeywordRule;
use crate::preprocess;
use crate::projector::{self, LocalPoint};

/// Scope of a rule registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    /// Applies to one image only.
    Image(ImageId),
    /// Applies to every image the pipeline processes.
    Global,
}

/// What happened to a submitted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Recognition ran and the result is cached.
    Processed,
    /// A cached result already existed; the engine was not invoked.
    AlreadyProcessed,
    /// The engine is not ready; the request is queued until it is.
    Queued,
}

/// Request deferred while the recognition engine is not yet initialized.
struct PendingRequest {
    image_id: ImageId,
    source: DynamicImage,
}

struct Inner {
    config: OcrConfig,
    recognizer: Option<Box<dyn TextRecognizer>>,
    cache: OcrResultCache,
    global_rules: Vec<KeywordRule>,
    pending: VecDeque<PendingRequest>,
}

/// Facade over preprocessing, recognition, indexing, matching, caching,
/// and projection. One recognition runs at a time; recognition is a
/// blocking call from the submitter's perspective.
pub struct KeywordPipeline {
    inner: Mutex<Inner>,
}

impl KeywordPipeline {
    pub fn new(config: OcrConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                config,
                recognizer: None,
                cache: OcrResultCache::new(),
                global_rules: Vec::new(),
                pending: VecDeque::new(),
            }),
        }
    }

    /// Whether a recognition backend is installed and requests run
    /// immediately instead of queueing.
    pub fn is_ready(&self) -> bool {
        self.inner.lock().recognizer.is_some()
    }

    /// Initialize the native recognition backend from the pipeline
    /// configuration. A second call tears the previous engine down and
    /// reinitializes. Queued requests are drained on success.
    #[cfg(feature = "tesseract")]
    pub fn initialize(&self) -> Result<(), InitError> {
        let engine = {
            let inner = self.inner.lock();
            crate::engine::TesseractEngine::new(
                &inner.config.language,
                inner.config.data_path.as_deref(),
            )?
        };
        self.initialize_with(Box::new(engine));
        Ok(())
    }

    /// Without the `tesseract` feature there is no native backend to
    /// construct; install one via [`KeywordPipeline::initialize_with`].
    #[cfg(not(feature = "tesseract"))]
    pub fn initialize(&self) -> Result<(), InitError> {
        Err(InitError::BackendUnavailable)
    }

    /// Install a recognition backend, replacing any previous one, and
    /// drain the pending queue exactly once, in arrival order.
    pub fn initialize_with(&self, recognizer: Box<dyn TextRecognizer>) {
        let mut inner = self.inner.lock();
        if inner.recognizer.replace(recognizer).is_some() {
            debug!("replacing previously installed recognition backend");
        }
        drain_pending(&mut inner);
    }

    /// Run recognition for an image, or queue the request if the engine is
    /// not ready. Repeated submissions of a processed image are no-ops that
    /// never reach the engine. A failed request leaves the cache entry
    /// unprocessed; resubmitting tries again.
    pub fn submit_image(
        &self,
        id: ImageId,
        source: DynamicImage,
    ) -> Result<SubmitOutcome, PipelineError> {
        let mut inner = self.inner.lock();

        if inner.cache.is_processed(id) {
            return Ok(SubmitOutcome::AlreadyProcessed);
        }
        touch_entry(&mut inner, id);

        if inner.recognizer.is_none() {
            debug!("engine not ready, queueing request for image {}", id);
            inner.pending.push_back(PendingRequest {
                image_id: id,
                source,
            });
            return Ok(SubmitOutcome::Queued);
        }

        process_now(&mut inner, id, source)?;
        Ok(SubmitOutcome::Processed)
    }

    /// Register a keyword rule. Image-scoped rules merge into their image's
    /// entry; global rules merge into every cached image and all images
    /// submitted later. Matched rects refresh from cached words without
    /// re-running recognition.
    pub fn add_rule(&self, scope: RuleScope, rule: KeywordRule) {
        let mut inner = self.inner.lock();
        match scope {
            RuleScope::Image(id) => {
                touch_entry(&mut inner, id);
                inner.cache.merge_rules(id, &[rule], RuleOrigin::Image);
            }
            RuleScope::Global => {
                let known = inner.global_rules.iter().any(|r| r.keyword == rule.keyword);
                if !known {
                    inner.global_rules.push(rule.clone());
                }
                for id in inner.cache.image_ids() {
                    inner.cache.merge_rules(id, &[rule.clone()], RuleOrigin::Global);
                }
            }
        }
    }

    /// Matched rects for an image: keyword to pixel-space boxes.
    pub fn matched_rects(&self, id: ImageId) -> Option<HashMap<String, Vec<Rect>>> {
        self.inner
            .lock()
            .cache
            .lookup(id)
            .map(|entry| entry.matched.clone())
    }

    /// The full cached result for an image.
    pub fn lookup(&self, id: ImageId) -> Option<ImageOcrResult> {
        self.inner.lock().cache.lookup(id).cloned()
    }

    /// Matched keywords projected into a target surface's local space, one
    /// `(keyword, point)` pair per matched rect. The renderer owns the
    /// world transform from here.
    pub fn anchor_points(
        &self,
        id: ImageId,
        target_width: f32,
        target_height: f32,
    ) -> Option<Vec<(String, LocalPoint)>> {
        let inner = self.inner.lock();
        let entry = inner.cache.lookup(id)?;

        let mut points = Vec::new();
        for (keyword, rects) in &entry.matched {
            for rect in rects {
                points.push((
                    keyword.clone(),
                    projector::project(
                        rect,
                        entry.texture_width,
                        entry.texture_height,
                        target_width,
                        target_height,
                    ),
                ));
            }
        }
        Some(points)
    }
}

impl Default for KeywordPipeline {
    fn default() -> Self {
        Self::new(OcrConfig::default())
    }
}

/// Ensure an entry exists with the current global rules merged in.
fn touch_entry(inner: &mut Inner, id: ImageId) {
    inner.cache.get_or_create(id);
    if !inner.global_rules.is_empty() {
        let globals = inner.global_rules.clone();
        inner.cache.merge_rules(id, &globals, RuleOrigin::Global);
    }
}

/// Preprocess, recognize, and cache one image. The cache entry stays
/// unprocessed on any failure.
fn process_now(inner: &mut Inner, id: ImageId, source: DynamicImage) -> Result<(), PipelineError> {
    let buffer = preprocess::prepare(source, inner.config.downscale)?;

    let recognizer = inner
        .recognizer
        .as_mut()
        .ok_or(RecognizeError::NotReady)?;
    let recognition = recognizer.recognize(&buffer)?;

    debug!(
        "image {}: recognized {} words in {}x{} buffer",
        id,
        recognition.words.len(),
        buffer.width,
        buffer.height
    );

    inner
        .cache
        .store_recognition(id, recognition, buffer.width, buffer.height);
    Ok(())
}

/// Drain the pending queue in arrival order. Runs on every readiness
/// transition; the queue is consumed exactly once and failed requests are
/// dropped after logging — there is no replay.
fn drain_pending(inner: &mut Inner) {
    let pending = std::mem::take(&mut inner.pending);
    if pending.is_empty() {
        return;
    }

    info!("engine ready, draining {} pending requests", pending.len());
    for request in pending {
        if let Err(e) = process_now(inner, request.image_id, request.source) {
            warn!("dropping queued request for image {}: {}", request.image_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Recognition, RecognizedWord};
    use crate::preprocess::PixelBuffer;
    use image::GrayImage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Returns a fixed word list and counts recognize calls.
    struct ScriptedRecognizer {
        recognition: Recognition,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedRecognizer {
        fn new(texts: &[&str]) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let words = texts
                .iter()
                .enumerate()
                .map(|(i, t)| RecognizedWord {
                    text: t.to_string(),
                    bounds: Rect::new(i as u32 * 50, 10, 40, 12),
                    confidence: 90,
                })
                .collect();
            (
                Self {
                    recognition: Recognition {
                        full_text: texts.join(" "),
                        words,
                    },
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    impl TextRecognizer for ScriptedRecognizer {
        fn recognize(&mut self, _buffer: &PixelBuffer) -> Result<Recognition, RecognizeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.recognition.clone())
        }
    }

    struct FailingRecognizer;

    impl TextRecognizer for FailingRecognizer {
        fn recognize(&mut self, _buffer: &PixelBuffer) -> Result<Recognition, RecognizeError> {
            Err(RecognizeError::NativeFailure(1))
        }
    }

    fn test_image() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(100, 100, image::Luma([128])))
    }

    #[test]
    fn test_submit_before_ready_queues() {
        let pipeline = KeywordPipeline::default();
        let id = ImageId::new();

        assert!(!pipeline.is_ready());
        let outcome = pipeline.submit_image(id, test_image()).unwrap();
        assert_eq!(outcome, SubmitOutcome::Queued);
        assert!(!pipeline.lookup(id).unwrap().processed);
    }

    #[test]
    fn test_queue_drains_once_on_ready() {
        let pipeline = KeywordPipeline::default();
        let id = ImageId::new();
        pipeline.add_rule(RuleScope::Image(id), KeywordRule::exact("Revenue"));
        pipeline.submit_image(id, test_image()).unwrap();

        let (recognizer, calls) = ScriptedRecognizer::new(&["Q3", "Revenue", "Growth"]);
        pipeline.initialize_with(Box::new(recognizer));

        assert!(pipeline.is_ready());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let matched = pipeline.matched_rects(id).unwrap();
        assert_eq!(matched["Revenue"].len(), 1);
    }

    #[test]
    fn test_resubmit_is_idempotent() {
        let pipeline = KeywordPipeline::default();
        let (recognizer, calls) = ScriptedRecognizer::new(&["hello"]);
        pipeline.initialize_with(Box::new(recognizer));

        let id = ImageId::new();
        assert_eq!(
            pipeline.submit_image(id, test_image()).unwrap(),
            SubmitOutcome::Processed
        );
        assert_eq!(
            pipeline.submit_image(id, test_image()).unwrap(),
            SubmitOutcome::AlreadyProcessed
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_global_rule_reaches_existing_and_future_images() {
        let pipeline = KeywordPipeline::default();
        let (recognizer, _) = ScriptedRecognizer::new(&["Growth", "Revenue"]);
        pipeline.initialize_with(Box::new(recognizer));

        let first = ImageId::new();
        pipeline.submit_image(first, test_image()).unwrap();
        pipeline.add_rule(RuleScope::Global, KeywordRule::exact("Growth"));

        // already-processed image re-matched without re-recognition
        assert_eq!(pipeline.matched_rects(first).unwrap()["Growth"].len(), 1);

        let second = ImageId::new();
        pipeline.submit_image(second, test_image()).unwrap();
        assert_eq!(pipeline.matched_rects(second).unwrap()["Growth"].len(), 1);
    }

    #[test]
    fn test_failed_recognition_leaves_entry_unprocessed() {
        let pipeline = KeywordPipeline::default();
        pipeline.initialize_with(Box::new(FailingRecognizer));

        let id = ImageId::new();
        let result = pipeline.submit_image(id, test_image());
        assert!(result.is_err());
        assert!(!pipeline.lookup(id).unwrap().processed);

        // a later backend swap lets the same image process
        let (recognizer, _) = ScriptedRecognizer::new(&["ok"]);
        pipeline.initialize_with(Box::new(recognizer));
        assert_eq!(
            pipeline.submit_image(id, test_image()).unwrap(),
            SubmitOutcome::Processed
        );
    }

    #[test]
    fn test_zero_sized_image_rejected() {
        let pipeline = KeywordPipeline::default();
        let (recognizer, calls) = ScriptedRecognizer::new(&["x"]);
        pipeline.initialize_with(Box::new(recognizer));

        let id = ImageId::new();
        let result = pipeline.submit_image(id, DynamicImage::ImageLuma8(GrayImage::new(0, 0)));
        assert!(matches!(result, Err(PipelineError::Preprocess(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_anchor_points_projected_per_matched_rect() {
        let pipeline = KeywordPipeline::default();
        let (recognizer, _) = ScriptedRecognizer::new(&["Revenue"]);
        pipeline.initialize_with(Box::new(recognizer));

        let id = ImageId::new();
        pipeline.add_rule(RuleScope::Image(id), KeywordRule::exact("Revenue"));
        pipeline.submit_image(id, test_image()).unwrap();

        let points = pipeline.anchor_points(id, 2.0, 2.0).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].0, "Revenue");
        // word box center (20, 16) on the 100x100 buffer
        let p = points[0].1;
        assert!((p.x - (0.20 - 0.5) * 2.0).abs() < 1e-6);
        assert!((p.y - (0.5 - 0.16) * 2.0).abs() < 1e-6);
    }
}
