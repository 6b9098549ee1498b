//! # hangulpdf - Korean PDF text extraction
//!
//! Pulls text out of PDF documents, falling back to OCR for scanned pages.
//! Native text layers are always kept; with OCR enabled, pages that carry
//! too little native text are rasterized and run through a pipeline of
//! image cleanup, table and text-region detection, multi-profile OCR and
//! text normalization tuned for Korean documents.
//!
//! ## Features
//!
//! - **Pure Rust image pipeline**: bilateral/unsharp/CLAHE cleanup, Otsu and
//!   adaptive binarization, deskew, morphological table detection
//! - **Pluggable OCR**: any [`OcrEngine`]; a Tesseract backend ships behind
//!   the `tesseract` feature
//! - **Never throws**: failures come back in [`ExtractOutput::error`] next to
//!   whatever text was recovered
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hangulpdf::{extract, ExtractOptions};
//!
//! let bytes = std::fs::read("document.pdf")?;
//! let options = ExtractOptions {
//!     use_enhanced_ocr: true,
//!     ..ExtractOptions::default()
//! };
//!
//! let out = extract(&bytes, &options);
//! match &out.error {
//!     None => println!("{} pages, {} chars\n{}", out.page_count, out.text_length, out.text),
//!     Some(e) => eprintln!("extraction failed: {e}"),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod contours;
mod geometry;
mod image_impl;
mod morphology;

pub mod det;
pub mod engine;
pub mod pdf;
pub mod pipeline;
pub mod postprocess;
pub mod preprocess;
pub mod rec;
pub mod scoring;
pub mod types;

#[cfg(feature = "ffi")]
pub mod ffi;

use serde::{Deserialize, Serialize, Serializer};
use tracing::{info, warn};

pub use crate::det::{DetectedRegions, RegionDetector, TableRegion};
#[cfg(feature = "tesseract")]
pub use crate::engine::TesseractEngine;
pub use crate::engine::{EngineError, ExtractError, OcrEngine, OcrToken, UnavailableEngine};
pub use crate::image_impl::Rect;
pub use crate::pdf::{LopdfBackend, PdfBackend};
pub use crate::pipeline::{merge_page_result, PagePipeline, PageResult, PageState};
pub use crate::postprocess::TextPostprocessor;
pub use crate::preprocess::ImagePreprocessor;
pub use crate::rec::{OcrCandidate, TextRecognizer};
pub use crate::types::{
    Binarization, EngineMode, OcrConfig, OcrProfile, PageSegMode, PipelineConfig, PostprocessConfig,
    PreprocessConfig, RegionConfig, ScoreKind,
};

/// Separator placed between the text of consecutive pages.
pub const PAGE_DELIMITER: &str = "\n\n---\n\n";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Run the OCR pipeline on pages without enough native text.
    pub use_enhanced_ocr: bool,
    /// Normalize native text with the postprocessor as well.
    pub clean_text: bool,
    pub pipeline: PipelineConfig,
}

/// Where a page's text came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSource {
    Native,
    Ocr,
    NativeAndOcr,
    /// Nothing usable was found.
    Empty,
}

#[derive(Clone, Debug, Serialize)]
pub struct PageReport {
    /// One-based page number.
    pub page: usize,
    pub source: PageSource,
    /// OCR pipeline states visited; empty when the page was not OCRed.
    pub states: Vec<PageState>,
    pub chars: usize,
    pub notes: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ExtractOutput {
    pub text: String,
    pub page_count: usize,
    pub text_length: usize,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<ExtractError>,
    pub pages: Vec<PageReport>,
}

impl ExtractOutput {
    fn failed(error: ExtractError) -> Self {
        Self {
            text: String::new(),
            page_count: 0,
            text_length: 0,
            error: Some(error),
            pages: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

fn serialize_error<S: Serializer>(error: &Option<ExtractError>, serializer: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

fn visible_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Document extraction with injected OCR capability.
pub struct Extractor<E: OcrEngine> {
    pub engine: E,
    pub options: ExtractOptions,
}

impl<E: OcrEngine> Extractor<E> {
    pub fn new(engine: E, options: ExtractOptions) -> Self {
        Self { engine, options }
    }

    pub fn extract_bytes(&self, pdf_bytes: &[u8]) -> ExtractOutput {
        match LopdfBackend::from_bytes(pdf_bytes) {
            Ok(backend) => self.run(&backend),
            Err(e) => {
                warn!("cannot open PDF: {e}");
                ExtractOutput::failed(ExtractError::Parse(e.to_string()))
            }
        }
    }

    pub fn run(&self, backend: &dyn PdfBackend) -> ExtractOutput {
        let cfg = &self.options.pipeline;
        let pipeline = PagePipeline::new(&self.engine, cfg);
        let page_count = backend.page_count();
        if page_count == 0 {
            return ExtractOutput::failed(ExtractError::EmptyDocument);
        }

        let ocr_ready = self.options.use_enhanced_ocr && self.engine.is_available();
        if self.options.use_enhanced_ocr && !ocr_ready {
            warn!("OCR requested but the {} engine is not available", self.engine.name());
        }

        let mut blocks: Vec<String> = Vec::new();
        let mut pages = Vec::with_capacity(page_count);

        for index in 0..page_count {
            let mut report = PageReport {
                page: index + 1,
                source: PageSource::Empty,
                states: Vec::new(),
                chars: 0,
                notes: Vec::new(),
            };

            let native = backend.page_text(index);
            let native_chars = visible_chars(&native);
            let mut parts: Vec<String> = Vec::new();
            let text = if self.options.clean_text {
                pipeline.postprocessor.process(&native)
            } else {
                native
            };
            if !text.is_empty() {
                parts.push(text);
            }
            let mut ocr_added = false;

            if self.options.use_enhanced_ocr && native_chars < cfg.native_text_min_chars {
                if !ocr_ready {
                    report.notes.push("OCR engine unavailable".to_string());
                } else {
                    match backend.rasterize(index, cfg.dpi) {
                        Ok(bitmap) => {
                            let outcome = pipeline.run_page(bitmap);
                            report.states = outcome.states;
                            if !outcome.text.is_empty() {
                                parts.push(outcome.text);
                                ocr_added = true;
                            } else {
                                report.notes.push("OCR found no text".to_string());
                            }
                        }
                        Err(e) => {
                            warn!("page {}: rasterization failed: {e}", index + 1);
                            report.notes.push(format!("rasterization failed: {e}"));
                        }
                    }
                }
            }

            report.source = match (native_chars > 0, ocr_added) {
                (true, false) => PageSource::Native,
                (true, true) => PageSource::NativeAndOcr,
                (false, true) => PageSource::Ocr,
                (false, false) => PageSource::Empty,
            };

            let page_text = parts.join("\n");
            report.chars = page_text.chars().count();
            if !page_text.is_empty() {
                blocks.push(page_text);
                if !report.states.is_empty() {
                    report.states.push(PageState::Appended);
                }
            }
            pages.push(report);
        }

        let text = blocks.join(PAGE_DELIMITER);
        let chars = visible_chars(&text);
        let error = (chars < cfg.min_document_chars).then_some(ExtractError::InsufficientText {
            chars,
            min: cfg.min_document_chars,
        });
        info!("extracted {} characters from {} pages", text.chars().count(), page_count);

        ExtractOutput {
            text_length: text.chars().count(),
            text,
            page_count,
            error,
            pages,
        }
    }
}

/// Extracts the text of a PDF. Never panics on bad input; errors are
/// reported in [`ExtractOutput::error`] next to any partial text.
pub fn extract(pdf_bytes: &[u8], options: &ExtractOptions) -> ExtractOutput {
    #[cfg(feature = "tesseract")]
    let engine = TesseractEngine::new(None, i32::try_from(options.pipeline.ocr_source_dpi()).ok());
    #[cfg(not(feature = "tesseract"))]
    let engine = UnavailableEngine;

    Extractor::new(engine, options.clone()).extract_bytes(pdf_bytes)
}
