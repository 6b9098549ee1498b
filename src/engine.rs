use image::GrayImage;

use crate::types::OcrProfile;

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("{0} is not available in this build")]
    Unavailable(&'static str),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Image processing error: {0}")]
    ImageError(String),

    #[error("Preprocess error: {0}")]
    Preprocess(String),

    #[error("Rasterize error: {0}")]
    Rasterize(String),

    #[error("Tesseract error: {0}")]
    Tesseract(String),
}

impl From<image::ImageError> for EngineError {
    fn from(err: image::ImageError) -> Self {
        EngineError::ImageError(err.to_string())
    }
}

/// Document-level failure reported by `extract` alongside any partial text.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    #[error("document has no pages")]
    EmptyDocument,

    #[error("extracted text is too short ({chars} characters, at least {min} required); try enabling OCR")]
    InsufficientText { chars: usize, min: usize },
}

/// One recognised word as reported by the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct OcrToken {
    pub text: String,
    /// Engine confidence on a 0-100 scale.
    pub confidence: f32,
    /// Sequential line index within the recognised bitmap.
    pub line: usize,
}

impl OcrToken {
    pub fn new(text: &str, confidence: f32, line: usize) -> Self {
        Self {
            text: text.to_string(),
            confidence,
            line,
        }
    }
}

/// Capability seam for the recognition backend.
pub trait OcrEngine {
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool {
        true
    }

    fn recognize(&self, img: &GrayImage, profile: &OcrProfile) -> Result<Vec<OcrToken>, EngineError>;
}

/// Stand-in used when no OCR backend was compiled in.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableEngine;

impl OcrEngine for UnavailableEngine {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn recognize(&self, _img: &GrayImage, _profile: &OcrProfile) -> Result<Vec<OcrToken>, EngineError> {
        Err(EngineError::Unavailable("OCR engine"))
    }
}

const TSV_WORD_LEVEL: u32 = 5;
const TSV_MIN_FIELDS: usize = 12;

/// Parse Tesseract's TSV output into word tokens. Line indices are assigned
/// in order of first appearance of each (block, paragraph, line) triple.
pub fn tokens_from_tsv(tsv: &str) -> Vec<OcrToken> {
    let mut tokens = Vec::new();
    let mut current_key: Option<(u32, u32, u32)> = None;
    let mut line_idx = 0usize;

    for (line_num, line) in tsv.lines().enumerate() {
        if line_num == 0 && line.starts_with("level") {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < TSV_MIN_FIELDS {
            continue;
        }

        let level = fields[0].parse::<u32>().unwrap_or(0);
        if level != TSV_WORD_LEVEL {
            continue;
        }

        let conf = fields[10].trim().parse::<f32>().unwrap_or(-1.0);
        let text = fields[11].trim();
        if conf < 0.0 || text.is_empty() {
            continue;
        }

        let key = (
            fields[2].parse().unwrap_or(0),
            fields[3].parse().unwrap_or(0),
            fields[4].parse().unwrap_or(0),
        );
        match current_key {
            Some(k) if k == key => {}
            Some(_) => {
                line_idx += 1;
                current_key = Some(key);
            }
            None => current_key = Some(key),
        }

        tokens.push(OcrToken::new(text, conf, line_idx));
    }

    tokens
}

#[cfg(feature = "tesseract")]
pub use tesseract_impl::TesseractEngine;

#[cfg(feature = "tesseract")]
mod tesseract_impl {
    use std::collections::hash_map::Entry;
    use std::collections::HashMap;
    use std::ffi::CString;
    use std::io::Cursor;
    use std::sync::Mutex;

    use image::GrayImage;
    use leptess::capi::TessOcrEngineMode;
    use leptess::leptonica::pix_read_mem;
    use leptess::tesseract::TessApi;
    use tesseract_plumbing::TessBaseApi;
    use tracing::debug;

    use super::{tokens_from_tsv, EngineError, OcrEngine, OcrToken};
    use crate::types::{EngineMode, OcrProfile};

    /// Language set plus engine mode. Tesseract fixes both at init.
    type HandleKey = (String, EngineMode);

    fn handle_key(profile: &OcrProfile) -> HandleKey {
        (profile.language_spec(), profile.engine_mode)
    }

    /// Tesseract via leptess. Handles are initialised lazily, one per
    /// language set and engine mode, and reused across calls; only the page
    /// segmentation mode changes between profiles sharing a handle.
    #[derive(Debug, Default)]
    pub struct TesseractEngine {
        datapath: Option<String>,
        /// Resolution of the bitmaps handed to `recognize`.
        source_dpi: Option<i32>,
        handles: Mutex<HashMap<HandleKey, TessApi>>,
    }

    impl TesseractEngine {
        pub fn new(datapath: Option<String>, source_dpi: Option<i32>) -> Self {
            Self {
                datapath,
                source_dpi,
                handles: Mutex::new(HashMap::new()),
            }
        }

        fn init_handle(&self, profile: &OcrProfile) -> Result<TessApi, EngineError> {
            let datapath = self
                .datapath
                .as_deref()
                .map(CString::new)
                .transpose()
                .map_err(|e| EngineError::Tesseract(format!("invalid datapath: {e}")))?;
            let lang = CString::new(profile.language_spec())
                .map_err(|e| EngineError::Tesseract(format!("invalid language set: {e}")))?;

            let mut raw = TessBaseApi::create();
            raw.init_4(
                datapath.as_deref(),
                Some(lang.as_c_str()),
                profile.engine_mode.as_u8() as TessOcrEngineMode,
            )
            .map_err(|_| {
                EngineError::Tesseract(format!(
                    "init failed for {} (oem {})",
                    profile.language_spec(),
                    profile.engine_mode.as_u8()
                ))
            })?;
            debug!("initialised tesseract for {} with oem {}", profile.language_spec(), profile.engine_mode.as_u8());
            Ok(TessApi { raw })
        }
    }

    impl OcrEngine for TesseractEngine {
        fn name(&self) -> &'static str {
            "tesseract"
        }

        fn recognize(&self, img: &GrayImage, profile: &OcrProfile) -> Result<Vec<OcrToken>, EngineError> {
            let mut png = Cursor::new(Vec::new());
            img.write_to(&mut png, image::ImageFormat::Png)?;
            let pix = pix_read_mem(png.get_ref())
                .map_err(|e| EngineError::Tesseract(format!("failed to set image: {e}")))?;

            let mut handles = self
                .handles
                .lock()
                .map_err(|_| EngineError::Tesseract("handle cache poisoned".to_string()))?;
            let api = match handles.entry(handle_key(profile)) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(self.init_handle(profile)?),
            };

            let name = CString::new("tessedit_pageseg_mode")
                .map_err(|e| EngineError::Tesseract(e.to_string()))?;
            let psm = CString::new(profile.segmentation.as_u8().to_string())
                .map_err(|e| EngineError::Tesseract(e.to_string()))?;
            api.raw
                .set_variable(&name, &psm)
                .map_err(|_| EngineError::Tesseract("failed to set PSM".to_string()))?;

            api.set_image(&pix);
            if let Some(dpi) = self.source_dpi {
                api.set_source_resolution(dpi);
            }

            let tsv = api
                .get_tsv_text(0)
                .map_err(|e| EngineError::Tesseract(format!("invalid TSV output: {e}")))?;
            Ok(tokens_from_tsv(&tsv))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::types::PageSegMode;

        #[test]
        fn test_engine_mode_selects_its_own_handle() {
            let lstm = OcrProfile::new("a", EngineMode::LstmOnly, PageSegMode::SingleLine, &["kor", "eng"]);
            let legacy = OcrProfile::new("b", EngineMode::LegacyOnly, PageSegMode::SingleLine, &["kor", "eng"]);
            let lstm_word = OcrProfile::new("c", EngineMode::LstmOnly, PageSegMode::SingleWord, &["kor", "eng"]);

            assert_ne!(handle_key(&lstm), handle_key(&legacy));
            assert_eq!(handle_key(&lstm), handle_key(&lstm_word));
            assert_eq!(handle_key(&legacy).0, "kor+eng");
        }

        #[test]
        fn test_handles_are_created_lazily() {
            let engine = TesseractEngine::new(None, Some(900));
            assert!(engine.handles.lock().unwrap().is_empty());
            assert_eq!(engine.source_dpi, Some(900));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_from_tsv_groups_lines() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
1\t1\t0\t0\t0\t0\t0\t0\t500\t300\t-1\t\n\
5\t1\t1\t1\t1\t1\t10\t10\t40\t20\t91.5\t안녕\n\
5\t1\t1\t1\t1\t2\t60\t10\t40\t20\t88.0\t하세요\n\
5\t1\t1\t1\t2\t1\t10\t40\t40\t20\t45.0\t세계\n\
5\t1\t1\t1\t2\t2\t60\t40\t40\t20\t-1\t \n";

        let tokens = tokens_from_tsv(tsv);
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0], OcrToken::new("안녕", 91.5, 0));
        assert_eq!(tokens[1].line, 0);
        assert_eq!(tokens[2].text, "세계");
        assert_eq!(tokens[2].line, 1);
    }

    #[test]
    fn test_unavailable_engine_reports_typed_error() {
        let engine = UnavailableEngine;
        let img = GrayImage::new(4, 4);
        let profile = OcrProfile::page_profiles().remove(0);
        assert!(!engine.is_available());
        assert!(matches!(engine.recognize(&img, &profile), Err(EngineError::Unavailable(_))));
    }
}
