use crate::types::{OcrConfig, ScoreKind};

/// Ranks the candidates produced for one bitmap. Scores are only compared
/// with each other, never against a fixed threshold.
pub trait CandidateScorer {
    fn score(&self, text: &str, confidences: &[f32], kind: ScoreKind) -> f32;
}

/// `mean confidence × hangul density`, scaled by length for page and table
/// passes, with a bonus per table glyph for table passes.
#[derive(Clone, Debug)]
pub struct HeuristicScorer {
    pub length_scaling: bool,
    pub table_glyph_bonus: f32,
}

impl HeuristicScorer {
    pub fn from_config(cfg: &OcrConfig) -> Self {
        Self {
            length_scaling: cfg.length_scaling,
            table_glyph_bonus: cfg.table_glyph_bonus,
        }
    }
}

impl Default for HeuristicScorer {
    fn default() -> Self {
        Self::from_config(&OcrConfig::default())
    }
}

impl CandidateScorer for HeuristicScorer {
    fn score(&self, text: &str, confidences: &[f32], kind: ScoreKind) -> f32 {
        let visible = text.chars().filter(|c| !c.is_whitespace()).count();
        if visible == 0 || confidences.is_empty() {
            return 0.0;
        }

        let mean = confidences.iter().sum::<f32>() / confidences.len() as f32;
        let hangul = text.chars().filter(|&c| is_hangul(c)).count();
        let mut score = mean * hangul as f32 / visible as f32;

        if self.length_scaling && matches!(kind, ScoreKind::Page | ScoreKind::Table) {
            score *= text.chars().count() as f32;
        }
        if kind == ScoreKind::Table {
            score += self.table_glyph_bonus * count_table_glyphs(text) as f32;
        }

        if score.is_finite() {
            score
        } else {
            0.0
        }
    }
}

/// Hangul syllables and jamo, including the compatibility block.
pub fn is_hangul(ch: char) -> bool {
    matches!(ch,
        '\u{AC00}'..='\u{D7A3}'
        | '\u{1100}'..='\u{11FF}'
        | '\u{3130}'..='\u{318F}'
        | '\u{A960}'..='\u{A97F}'
        | '\u{D7B0}'..='\u{D7FF}')
}

/// Pipes and box-drawing characters.
pub fn count_table_glyphs(text: &str) -> usize {
    text.chars()
        .filter(|&c| c == '|' || ('\u{2500}'..='\u{257F}').contains(&c))
        .count()
}
