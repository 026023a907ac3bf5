//! Per-image recognition result cache
//!
//! Stores recognized words, the word index, merged keyword rules, and
//! matched rects per source image, keyed by an explicit identity token.
//! Guarantees at most one recognition pass per image: rules can be merged
//! and re-matched at any time without re-running recognition.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;
use uuid::Uuid;

use crate::engine::{Recognition, RecognizedWord};
use crate::geometry::Rect;
use crate::index::WordIndex;
use crate::matcher::{match_rules, KeywordRule};

/// Opaque identity token for a source image.
///
/// Issued by the caller (or [`ImageId::new`]) and passed back on every
/// request; the cache never keys on host object identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId(Uuid);

impl ImageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Which rule list a merge targets. Image-scoped rules always run ahead of
/// global ones when matching, so they win keyword collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOrigin {
    Image,
    Global,
}

/// Everything known about one source image.
///
/// `texture_width`/`texture_height` are the dimensions of the recognized
/// buffer, so matched rects and projection share one pixel space.
#[derive(Debug, Clone)]
pub struct ImageOcrResult {
    pub image_id: ImageId,
    pub words: Vec<RecognizedWord>,
    pub index: WordIndex,
    /// Image-scoped rules, in registration order.
    pub rules: Vec<KeywordRule>,
    /// Global rules merged into this image, in registration order.
    pub global_rules: Vec<KeywordRule>,
    pub matched: HashMap<String, Vec<Rect>>,
    pub texture_width: u32,
    pub texture_height: u32,
    pub processed: bool,
}

impl ImageOcrResult {
    fn empty(image_id: ImageId) -> Self {
        Self {
            image_id,
            words: Vec::new(),
            index: WordIndex::default(),
            rules: Vec::new(),
            global_rules: Vec::new(),
            matched: HashMap::new(),
            texture_width: 0,
            texture_height: 0,
            processed: false,
        }
    }

    /// The rule list used for matching: image-scoped first, then global.
    pub fn merged_rules(&self) -> Vec<KeywordRule> {
        let mut merged = Vec::with_capacity(self.rules.len() + self.global_rules.len());
        merged.extend(self.rules.iter().cloned());
        merged.extend(self.global_rules.iter().cloned());
        merged
    }

    fn rematch(&mut self) {
        let merged = self.merged_rules();
        self.matched = match_rules(&merged, &self.index, &self.words);
    }
}

/// Cache of per-image results. Entries are created lazily and owned
/// exclusively by the cache.
#[derive(Debug, Default)]
pub struct OcrResultCache {
    entries: HashMap<ImageId, ImageOcrResult>,
}

impl OcrResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the entry for an image, creating an empty unprocessed one if
    /// this is the first reference.
    pub fn get_or_create(&mut self, id: ImageId) -> &mut ImageOcrResult {
        self.entries
            .entry(id)
            .or_insert_with(|| ImageOcrResult::empty(id))
    }

    pub fn lookup(&self, id: ImageId) -> Option<&ImageOcrResult> {
        self.entries.get(&id)
    }

    pub fn is_processed(&self, id: ImageId) -> bool {
        self.entries.get(&id).map_or(false, |e| e.processed)
    }

    /// Store the outcome of a successful recognition pass: word list, index,
    /// buffer dimensions, and refreshed matches for the rules already
    /// registered. Flips `processed` exactly once; a second call for the
    /// same image is a no-op.
    pub fn store_recognition(
        &mut self,
        id: ImageId,
        recognition: Recognition,
        width: u32,
        height: u32,
    ) {
        let entry = self.get_or_create(id);
        if entry.processed {
            debug!("image {} already processed, keeping cached result", id);
            return;
        }

        entry.index = WordIndex::build(&recognition.words);
        entry.words = recognition.words;
        entry.texture_width = width;
        entry.texture_height = height;
        entry.processed = true;
        entry.rematch();

        debug!(
            "image {} processed: {} words, {} matched keywords",
            id,
            entry.words.len(),
            entry.matched.len()
        );
    }

    /// Append rules whose keyword is not yet registered in the targeted
    /// scope for this image, then refresh matched rects from the cached
    /// words. Safe before or after processing: rules merged early are
    /// matched once recognition completes. Returns how many rules were
    /// appended.
    pub fn merge_rules(&mut self, id: ImageId, rules: &[KeywordRule], origin: RuleOrigin) -> usize {
        let entry = self.get_or_create(id);

        let mut appended = 0;
        for rule in rules {
            let target = match origin {
                RuleOrigin::Image => &mut entry.rules,
                RuleOrigin::Global => &mut entry.global_rules,
            };
            let known = target.iter().any(|r| r.keyword == rule.keyword);
            if !known {
                target.push(rule.clone());
                appended += 1;
            }
        }

        if appended > 0 {
            entry.rematch();
            debug!("image {}: merged {} new {:?} rules", id, appended, origin);
        }

        appended
    }

    /// Ids of all cached images, in no particular order.
    pub fn image_ids(&self) -> Vec<ImageId> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
