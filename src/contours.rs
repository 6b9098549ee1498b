// External contour extraction on binary bitmaps.
// Any non-zero pixel is foreground.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};

use crate::image_impl::Rect;

#[derive(Debug, Clone)]
pub struct Contour {
    pub points: Vec<(i32, i32)>,
}

impl Contour {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Polygon area of the traced border (shoelace formula).
    pub fn area(&self) -> f32 {
        if self.points.len() < 3 {
            return 0.0;
        }

        let mut area = 0.0f32;
        let n = self.points.len();
        for i in 0..n {
            let j = (i + 1) % n;
            let (x1, y1) = self.points[i];
            let (x2, y2) = self.points[j];
            area += (x1 as f32 * y2 as f32) - (x2 as f32 * y1 as f32);
        }

        (area * 0.5).abs()
    }

    /// Inclusive pixel bounding box, clipped to the bitmap.
    pub fn bounding_rect(&self, bounds_w: u32, bounds_h: u32) -> Option<Rect> {
        let min_x = self.points.iter().map(|p| p.0).min()?;
        let max_x = self.points.iter().map(|p| p.0).max()?;
        let min_y = self.points.iter().map(|p| p.1).min()?;
        let max_y = self.points.iter().map(|p| p.1).max()?;
        Rect::within(
            min_x as i64,
            min_y as i64,
            (max_x - min_x + 1) as i64,
            (max_y - min_y + 1) as i64,
            bounds_w,
            bounds_h,
        )
    }
}

/// Outer borders that are not nested inside any hole, matching an
/// "external only" retrieval mode.
pub fn find_external_contours(binary_img: &GrayImage) -> Vec<Contour> {
    find_contours::<i32>(binary_img)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .map(|c| Contour {
            points: c.points.iter().map(|p| (p.x, p.y)).collect(),
        })
        .filter(|c| !c.is_empty())
        .collect()
}
