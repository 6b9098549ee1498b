use serde::{Deserialize, Serialize};

/// Tesseract engine mode (`--oem`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineMode {
    LegacyOnly = 0,
    LstmOnly = 1,
    LegacyAndLstm = 2,
    Default = 3,
}

impl EngineMode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Page segmentation mode (`--psm`), limited to the modes the pipeline uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSegMode {
    Auto = 3,
    SingleBlock = 6,
    SingleLine = 7,
    SingleWord = 8,
    SingleChar = 10,
}

impl PageSegMode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Which kind of bitmap a candidate was produced for. Drives profile choice
/// and the scoring extras.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreKind {
    Page,
    Table,
    Region,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Binarization {
    /// Global Otsu threshold, used for whole-page passes.
    Otsu,
    /// Local Gaussian-weighted threshold, used for region and cell crops.
    AdaptiveGaussian,
}

/// One OCR engine configuration tried against a bitmap.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OcrProfile {
    pub name: String,
    pub engine_mode: EngineMode,
    pub segmentation: PageSegMode,
    pub languages: Vec<String>,
}

impl OcrProfile {
    pub fn new(name: &str, engine_mode: EngineMode, segmentation: PageSegMode, languages: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            engine_mode,
            segmentation,
            languages: languages.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// Language set in Tesseract's `kor+eng` form.
    pub fn language_spec(&self) -> String {
        self.languages.join("+")
    }

    pub fn page_profiles() -> Vec<Self> {
        vec![
            Self::new("page-lstm-auto", EngineMode::LstmOnly, PageSegMode::Auto, &["kor", "eng"]),
            Self::new("page-lstm-block", EngineMode::LstmOnly, PageSegMode::SingleBlock, &["kor", "eng"]),
            Self::new("page-default-vert", EngineMode::Default, PageSegMode::Auto, &["kor", "kor_vert", "eng"]),
        ]
    }

    pub fn table_profiles() -> Vec<Self> {
        vec![
            Self::new("table-lstm-block", EngineMode::LstmOnly, PageSegMode::SingleBlock, &["kor", "eng"]),
            Self::new("table-lstm-auto", EngineMode::LstmOnly, PageSegMode::Auto, &["kor", "eng"]),
        ]
    }

    pub fn cell_profiles() -> Vec<Self> {
        vec![
            Self::new("cell-lstm-line", EngineMode::LstmOnly, PageSegMode::SingleLine, &["kor", "eng"]),
            Self::new("cell-lstm-word", EngineMode::LstmOnly, PageSegMode::SingleWord, &["kor", "eng"]),
        ]
    }

    pub fn region_profiles() -> Vec<Self> {
        vec![
            Self::new("region-lstm-line", EngineMode::LstmOnly, PageSegMode::SingleLine, &["kor", "eng"]),
            Self::new("region-lstm-block", EngineMode::LstmOnly, PageSegMode::SingleBlock, &["kor", "eng"]),
            Self::new("region-lstm-word", EngineMode::LstmOnly, PageSegMode::SingleWord, &["kor", "eng"]),
        ]
    }

    /// Crops about the size of one glyph.
    pub fn glyph_profiles() -> Vec<Self> {
        vec![
            Self::new("glyph-lstm-char", EngineMode::LstmOnly, PageSegMode::SingleChar, &["kor", "eng"]),
            Self::new("glyph-lstm-word", EngineMode::LstmOnly, PageSegMode::SingleWord, &["kor", "eng"]),
        ]
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub upscale_factor: u32,
    pub bilateral_window: u32,
    pub bilateral_sigma_color: f32,
    pub bilateral_sigma_spatial: f32,
    pub smoothing_sigma: f32,
    pub unsharp_sigma: f32,
    pub unsharp_alpha: f32,
    pub clahe_tiles: u32,
    pub clahe_clip_limit: f32,
    pub close_kernel: u32,
    pub adaptive_block_size: u32,
    pub adaptive_c: f32,
    pub max_skew_degrees: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            upscale_factor: 3,
            bilateral_window: 9,
            bilateral_sigma_color: 75.0,
            bilateral_sigma_spatial: 75.0,
            smoothing_sigma: 0.8,
            unsharp_sigma: 2.0,
            unsharp_alpha: 1.5,
            clahe_tiles: 8,
            clahe_clip_limit: 2.0,
            close_kernel: 2,
            adaptive_block_size: 11,
            adaptive_c: 2.0,
            max_skew_degrees: 1.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    pub line_kernel: u32,
    pub min_table_area: f32,
    pub min_table_width: u32,
    pub min_table_height: u32,
    pub min_cell_width: u32,
    pub min_cell_height: u32,
    pub adaptive_block_size: u32,
    pub adaptive_c: f32,
    pub text_dilate_kernel: u32,
    pub text_dilate_iterations: u32,
    pub min_text_area: f32,
    pub min_text_width: u32,
    pub min_text_height: u32,
    pub min_aspect_ratio: f32,
    pub max_aspect_ratio: f32,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            line_kernel: 40,
            min_table_area: 3000.0,
            min_table_width: 80,
            min_table_height: 40,
            min_cell_width: 20,
            min_cell_height: 10,
            adaptive_block_size: 11,
            adaptive_c: 2.0,
            text_dilate_kernel: 3,
            text_dilate_iterations: 2,
            min_text_area: 60.0,
            min_text_width: 20,
            min_text_height: 10,
            min_aspect_ratio: 0.1,
            max_aspect_ratio: 20.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tokens at or below this engine confidence (0-100) are dropped.
    pub confidence_floor: f32,
    pub length_scaling: bool,
    pub table_glyph_bonus: f32,
    /// Region crops no taller than this, and at most twice as wide as
    /// tall, use the single-glyph profiles.
    pub glyph_max_height: u32,
    pub page_profiles: Vec<OcrProfile>,
    pub table_profiles: Vec<OcrProfile>,
    pub cell_profiles: Vec<OcrProfile>,
    pub region_profiles: Vec<OcrProfile>,
    pub glyph_profiles: Vec<OcrProfile>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 50.0,
            length_scaling: true,
            table_glyph_bonus: 10.0,
            glyph_max_height: 24,
            page_profiles: OcrProfile::page_profiles(),
            table_profiles: OcrProfile::table_profiles(),
            cell_profiles: OcrProfile::cell_profiles(),
            region_profiles: OcrProfile::region_profiles(),
            glyph_profiles: OcrProfile::glyph_profiles(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PostprocessConfig {
    /// Literal replacements applied in order. Empty unless opted in.
    pub substitutions: Vec<(String, String)>,
    pub markdown_tables: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub dpi: u32,
    /// Pages with fewer native non-whitespace chars are sent to OCR.
    pub native_text_min_chars: usize,
    /// Documents with fewer non-whitespace chars are reported as failed.
    pub min_document_chars: usize,
    pub preprocess: PreprocessConfig,
    pub regions: RegionConfig,
    pub ocr: OcrConfig,
    pub postprocess: PostprocessConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            native_text_min_chars: 50,
            min_document_chars: 10,
            preprocess: PreprocessConfig::default(),
            regions: RegionConfig::default(),
            ocr: OcrConfig::default(),
            postprocess: PostprocessConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Resolution of the bitmaps the OCR engine sees: every crop is
    /// upscaled by the preprocessor after rasterization.
    pub fn ocr_source_dpi(&self) -> u32 {
        self.dpi.saturating_mul(self.preprocess.upscale_factor.max(1))
    }
}
