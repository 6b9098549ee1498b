use image::{GrayImage, Luma};
use serde::Serialize;
use tracing::{debug, warn};

use crate::contours::find_external_contours;
use crate::engine::EngineError;
use crate::geometry::{cell_grid, group_lines, sort_reading_order, stroke_positions, Axis};
use crate::image_impl::Rect;
use crate::morphology::{dilate_rect, open_rect};
use crate::preprocess::{adaptive_gaussian_binarize, otsu_binarize};
use crate::types::RegionConfig;

/// A detected table and, when the ruling lines could be resolved, its cells
/// in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRegion {
    pub rect: Rect,
    pub cells: Vec<Vec<Rect>>,
}

impl TableRegion {
    pub fn cell_count(&self) -> usize {
        self.cells.iter().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectedRegions {
    pub tables: Vec<TableRegion>,
    pub text_regions: Vec<Rect>,
}

impl DetectedRegions {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.text_regions.is_empty()
    }
}

pub struct RegionDetector {
    pub cfg: RegionConfig,
}

impl RegionDetector {
    pub fn new(cfg: RegionConfig) -> Self {
        Self { cfg }
    }

    pub fn detect(&self, page: &GrayImage) -> DetectedRegions {
        DetectedRegions {
            tables: self.detect_tables(page),
            text_regions: self.detect_text_regions(page),
        }
    }

    /// Table rectangles found from long ruling strokes. Never fails; a
    /// processing error yields an empty list.
    pub fn detect_tables(&self, page: &GrayImage) -> Vec<TableRegion> {
        match self.find_tables(page) {
            Ok(tables) => tables,
            Err(e) => {
                warn!("table detection failed: {e}");
                Vec::new()
            }
        }
    }

    /// Word and line blobs. Never fails; a processing error yields an empty
    /// list.
    pub fn detect_text_regions(&self, page: &GrayImage) -> Vec<Rect> {
        match self.find_text_regions(page) {
            Ok(regions) => regions,
            Err(e) => {
                warn!("text region detection failed: {e}");
                Vec::new()
            }
        }
    }

    fn find_tables(&self, page: &GrayImage) -> Result<Vec<TableRegion>, EngineError> {
        let (w, h) = non_empty(page)?;
        let inverted = otsu_binarize(page, true);

        let k = self.cfg.line_kernel.max(1);
        let horizontal = open_rect(&inverted, k, 1);
        let vertical = open_rect(&inverted, 1, k);

        // Equal-weight blend; any lit pixel counts as structure.
        let mut structure = GrayImage::new(w, h);
        for ((hp, vp), out) in horizontal.pixels().zip(vertical.pixels()).zip(structure.pixels_mut()) {
            let blended = hp[0] as f32 * 0.5 + vp[0] as f32 * 0.5;
            *out = Luma([if blended > 0.0 { 255 } else { 0 }]);
        }

        let mut tables = Vec::new();
        for contour in find_external_contours(&structure) {
            let Some(rect) = contour.bounding_rect(w, h) else {
                continue;
            };
            if contour.area() <= self.cfg.min_table_area
                || rect.width <= self.cfg.min_table_width
                || rect.height <= self.cfg.min_table_height
            {
                continue;
            }

            let rows = group_lines(&stroke_positions(&horizontal, &rect, Axis::Rows));
            let cols = group_lines(&stroke_positions(&vertical, &rect, Axis::Columns));
            let cells = cell_grid(&rows, &cols, self.cfg.min_cell_width, self.cfg.min_cell_height);
            debug!(
                "table at ({}, {}) {}x{}: {} rows, {} cols, {} cells",
                rect.x,
                rect.y,
                rect.width,
                rect.height,
                rows.len(),
                cols.len(),
                cells.iter().map(Vec::len).sum::<usize>()
            );
            tables.push(TableRegion { rect, cells });
        }

        tables.sort_by(|a, b| a.rect.y.cmp(&b.rect.y).then(a.rect.x.cmp(&b.rect.x)));
        Ok(tables)
    }

    fn find_text_regions(&self, page: &GrayImage) -> Result<Vec<Rect>, EngineError> {
        let (w, h) = non_empty(page)?;
        let mut blobs = adaptive_gaussian_binarize(page, self.cfg.adaptive_block_size, self.cfg.adaptive_c, true);

        let k = self.cfg.text_dilate_kernel;
        for _ in 0..self.cfg.text_dilate_iterations {
            blobs = dilate_rect(&blobs, k, k);
        }

        let mut regions: Vec<Rect> = find_external_contours(&blobs)
            .iter()
            .filter(|c| c.area() > self.cfg.min_text_area)
            .filter_map(|c| c.bounding_rect(w, h))
            .filter(|r| {
                let aspect = r.aspect_ratio();
                aspect > self.cfg.min_aspect_ratio
                    && aspect < self.cfg.max_aspect_ratio
                    && r.width > self.cfg.min_text_width
                    && r.height > self.cfg.min_text_height
            })
            .collect();

        sort_reading_order(&mut regions);
        debug!("{} text regions", regions.len());
        Ok(regions)
    }
}

fn non_empty(page: &GrayImage) -> Result<(u32, u32), EngineError> {
    let (w, h) = page.dimensions();
    if w == 0 || h == 0 {
        return Err(EngineError::ImageError(format!("empty page bitmap {w}x{h}")));
    }
    Ok((w, h))
}
