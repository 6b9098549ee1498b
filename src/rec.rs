use image::GrayImage;
use serde::Serialize;
use tracing::{debug, warn};

use crate::engine::{OcrEngine, OcrToken};
use crate::scoring::{CandidateScorer, HeuristicScorer};
use crate::types::{OcrConfig, OcrProfile, ScoreKind};

/// Best text found for one bitmap. `confidence` is the scorer's aggregate and
/// only means something relative to other candidates for the same bitmap.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OcrCandidate {
    pub text: String,
    pub confidence: f32,
    pub profile: Option<String>,
}

impl OcrCandidate {
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
            profile: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Runs every profile against a bitmap and keeps the best-scoring text.
pub struct TextRecognizer<'e> {
    pub cfg: OcrConfig,
    engine: &'e dyn OcrEngine,
    scorer: Box<dyn CandidateScorer + 'e>,
}

impl<'e> TextRecognizer<'e> {
    pub fn new(engine: &'e dyn OcrEngine, cfg: OcrConfig) -> Self {
        let scorer = Box::new(HeuristicScorer::from_config(&cfg));
        Self { cfg, engine, scorer }
    }

    pub fn with_scorer(engine: &'e dyn OcrEngine, cfg: OcrConfig, scorer: Box<dyn CandidateScorer + 'e>) -> Self {
        Self { cfg, engine, scorer }
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Profiles: strictly greater score replaces the current best, so the
    /// earliest profile wins a tie. A failing profile is skipped.
    pub fn run(&self, img: &GrayImage, profiles: &[OcrProfile], kind: ScoreKind) -> OcrCandidate {
        let mut best: Option<OcrCandidate> = None;

        for profile in profiles {
            let tokens = match self.engine.recognize(img, profile) {
                Ok(tokens) => tokens,
                Err(e) => {
                    warn!("profile {} failed on {}: {e}", profile.name, self.engine.name());
                    continue;
                }
            };

            let kept: Vec<&OcrToken> = tokens
                .iter()
                .filter(|t| t.confidence > self.cfg.confidence_floor)
                .collect();
            let text = join_tokens(&kept);
            if text.trim().is_empty() {
                debug!("profile {} produced no confident text", profile.name);
                continue;
            }

            let confidences: Vec<f32> = kept.iter().map(|t| t.confidence).collect();
            let score = self.scorer.score(&text, &confidences, kind);
            debug!(
                "profile {}: {} of {} tokens kept, score {:.2}",
                profile.name,
                kept.len(),
                tokens.len(),
                score
            );

            if best.as_ref().map_or(true, |b| score > b.confidence) {
                best = Some(OcrCandidate {
                    text,
                    confidence: score,
                    profile: Some(profile.name.clone()),
                });
            }
        }

        best.unwrap_or_else(OcrCandidate::empty)
    }

    /// Profile set for a crop of the given kind and size. Only glyph-sized
    /// region crops (short and at most twice as wide as tall) get the
    /// single-glyph profiles; a short line of text is still a line.
    pub fn profiles_for(&self, kind: ScoreKind, crop_width: u32, crop_height: u32) -> &[OcrProfile] {
        let glyph_sized =
            crop_height <= self.cfg.glyph_max_height && crop_width <= crop_height.saturating_mul(2);
        match kind {
            ScoreKind::Page => &self.cfg.page_profiles,
            ScoreKind::Table => &self.cfg.table_profiles,
            ScoreKind::Region if glyph_sized => &self.cfg.glyph_profiles,
            ScoreKind::Region => &self.cfg.region_profiles,
        }
    }
}

/// Spaces between tokens of one line, newlines between lines.
fn join_tokens(tokens: &[&OcrToken]) -> String {
    let mut out = String::new();
    let mut prev_line = None;
    for token in tokens {
        match prev_line {
            Some(line) if line == token.line => out.push(' '),
            Some(_) => out.push('\n'),
            None => {}
        }
        out.push_str(&token.text);
        prev_line = Some(token.line);
    }
    out
}
