use image::GrayImage;
use serde::Serialize;
use tracing::{debug, info};

use crate::det::{DetectedRegions, RegionDetector, TableRegion};
use crate::engine::OcrEngine;
use crate::image_impl::{crop, Rect};
use crate::postprocess::TextPostprocessor;
use crate::preprocess::ImagePreprocessor;
use crate::rec::TextRecognizer;
use crate::types::{Binarization, PipelineConfig, ScoreKind};

pub const TABLE_HEADER: &str = "[표 영역]";
pub const REGION_HEADER: &str = "[텍스트 영역]";
pub const PAGE_PRIMARY_HEADER: &str = "[전체 페이지 OCR]";
pub const PAGE_SUPPLEMENTARY_HEADER: &str = "[전체 페이지 OCR - 보조]";

/// Progress of one page through the OCR pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PageState {
    Rasterized,
    RegionsDetected,
    RegionsOcred,
    PageOcred,
    Merged,
    Normalized,
    Appended,
}

/// Raw text of the three OCR channels for one page.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PageResult {
    pub table_text: String,
    pub region_text: String,
    pub full_page_text: String,
}

#[derive(Clone, Debug)]
pub struct PageOutcome {
    /// Merged and normalized page text, possibly empty.
    pub text: String,
    pub result: PageResult,
    pub regions: DetectedRegions,
    /// States visited, in order.
    pub states: Vec<PageState>,
}

/// Concatenates the non-empty channels in table, region, whole-page order.
/// The whole-page block is labelled primary only when it is longer than
/// the table and region text together.
pub fn merge_page_result(result: &PageResult) -> String {
    let table = result.table_text.trim();
    let region = result.region_text.trim();
    let page = result.full_page_text.trim();

    let mut blocks = Vec::new();
    if !table.is_empty() {
        blocks.push(format!("{TABLE_HEADER}\n{table}"));
    }
    if !region.is_empty() {
        blocks.push(format!("{REGION_HEADER}\n{region}"));
    }
    if !page.is_empty() {
        let structured = table.chars().count() + region.chars().count();
        let header = if page.chars().count() > structured {
            PAGE_PRIMARY_HEADER
        } else {
            PAGE_SUPPLEMENTARY_HEADER
        };
        blocks.push(format!("{header}\n{page}"));
    }
    blocks.join("\n\n")
}

/// What a crop holds, which decides its profiles and scoring.
#[derive(Clone, Copy, Debug)]
enum CropKind {
    Cell,
    Table,
    Region,
}

pub struct PagePipeline<'e> {
    pub preprocessor: ImagePreprocessor,
    pub detector: RegionDetector,
    pub recognizer: TextRecognizer<'e>,
    pub postprocessor: TextPostprocessor,
}

impl<'e> PagePipeline<'e> {
    pub fn new(engine: &'e dyn OcrEngine, cfg: &PipelineConfig) -> Self {
        Self {
            preprocessor: ImagePreprocessor::new(cfg.preprocess.clone()),
            detector: RegionDetector::new(cfg.regions.clone()),
            recognizer: TextRecognizer::new(engine, cfg.ocr.clone()),
            postprocessor: TextPostprocessor::new(cfg.postprocess.clone()),
        }
    }

    /// Runs a rasterized page to normalized text. The page bitmap and every
    /// crop derived from it are dropped before returning.
    pub fn run_page(&self, page: GrayImage) -> PageOutcome {
        let mut states = vec![PageState::Rasterized];

        let regions = self.detector.detect(&page);
        states.push(PageState::RegionsDetected);
        debug!(
            "{}: {} tables, {} text regions",
            self.recognizer.engine_name(),
            regions.tables.len(),
            regions.text_regions.len()
        );

        let mut result = PageResult::default();
        if !regions.is_empty() {
            result.table_text = self.ocr_tables(&page, &regions.tables);
            result.region_text = self.ocr_regions(&page, &regions.text_regions);
            states.push(PageState::RegionsOcred);
        }

        let prepared = self.preprocessor.preprocess_or_fallback(&page, Binarization::Otsu);
        drop(page);
        let profiles = self.recognizer.profiles_for(ScoreKind::Page, prepared.width(), prepared.height());
        result.full_page_text = self.recognizer.run(&prepared, profiles, ScoreKind::Page).text;
        states.push(PageState::PageOcred);

        let merged = merge_page_result(&result);
        states.push(PageState::Merged);

        let text = self.postprocessor.process(&merged);
        states.push(PageState::Normalized);
        info!("page OCR produced {} characters", text.chars().count());

        PageOutcome {
            text,
            result,
            regions,
            states,
        }
    }

    fn ocr_tables(&self, page: &GrayImage, tables: &[TableRegion]) -> String {
        let blocks: Vec<String> = tables
            .iter()
            .map(|table| {
                let from_cells = self.ocr_cells(page, table);
                if from_cells.is_empty() {
                    self.ocr_crop(page, &table.rect, CropKind::Table)
                } else {
                    from_cells
                }
            })
            .filter(|text| !text.is_empty())
            .collect();
        blocks.join("\n\n")
    }

    /// Cell text, `" | "` between cells and one line per row. Empty when no
    /// cell produced anything, so the caller can fall back to the whole table.
    fn ocr_cells(&self, page: &GrayImage, table: &TableRegion) -> String {
        let rows: Vec<String> = table
            .cells
            .iter()
            .filter_map(|row| {
                let texts: Vec<String> = row
                    .iter()
                    .map(|cell| self.ocr_crop(page, cell, CropKind::Cell).replace('\n', " "))
                    .collect();
                texts.iter().any(|t| !t.is_empty()).then(|| texts.join(" | "))
            })
            .collect();
        rows.join("\n")
    }

    fn ocr_regions(&self, page: &GrayImage, regions: &[Rect]) -> String {
        let texts: Vec<String> = regions
            .iter()
            .map(|rect| self.ocr_crop(page, rect, CropKind::Region))
            .filter(|text| !text.is_empty())
            .collect();
        texts.join("\n")
    }

    fn ocr_crop(&self, page: &GrayImage, rect: &Rect, kind: CropKind) -> String {
        let Some(rect) = Rect::within(
            rect.x as i64,
            rect.y as i64,
            rect.width as i64,
            rect.height as i64,
            page.width(),
            page.height(),
        ) else {
            return String::new();
        };

        let region = crop(page, &rect);
        let prepared = self.preprocessor.preprocess_or_fallback(&region, Binarization::AdaptiveGaussian);
        let (profiles, score_kind) = match kind {
            CropKind::Cell => (self.recognizer.cfg.cell_profiles.as_slice(), ScoreKind::Table),
            CropKind::Table => (
                self.recognizer.profiles_for(ScoreKind::Table, rect.width, rect.height),
                ScoreKind::Table,
            ),
            CropKind::Region => (
                self.recognizer.profiles_for(ScoreKind::Region, rect.width, rect.height),
                ScoreKind::Region,
            ),
        };
        self.recognizer.run(&prepared, profiles, score_kind).text.trim().to_string()
    }
}
