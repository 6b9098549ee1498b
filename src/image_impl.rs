//! Bitmap primitives shared by the preprocessor and the region detector.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

use crate::engine::EngineError;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2f {
    pub x: f32,
    pub y: f32,
}

impl Default for Point2f {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0 }
    }
}

impl Point2f {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle in pixel coordinates. Always non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Builds a rectangle clipped to a `bounds_w`×`bounds_h` bitmap, or
    /// `None` when nothing of it is left.
    pub fn within(x: i64, y: i64, width: i64, height: i64, bounds_w: u32, bounds_h: u32) -> Option<Self> {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + width).min(bounds_w as i64);
        let y1 = (y + height).min(bounds_h as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn fits_in(&self, width: u32, height: u32) -> bool {
        self.width > 0 && self.height > 0 && self.right() <= width && self.bottom() <= height
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x && other.y >= self.y && other.right() <= self.right() && other.bottom() <= self.bottom()
    }
}

pub fn crop(img: &GrayImage, rect: &Rect) -> GrayImage {
    imageops::crop_imm(img, rect.x, rect.y, rect.width, rect.height).to_image()
}

/// Cubic upscale by an integer factor.
pub fn upscale(img: &GrayImage, factor: u32) -> GrayImage {
    if factor <= 1 {
        return img.clone();
    }
    imageops::resize(img, img.width() * factor, img.height() * factor, FilterType::CatmullRom)
}

pub fn resize_exact(img: &GrayImage, width: u32, height: u32) -> GrayImage {
    imageops::resize(img, width, height, FilterType::CatmullRom)
}

/// Rotates `src` by `angle_deg` (clockwise in image coordinates) about its
/// centre. Output keeps the input size; pixels mapped from outside the source
/// replicate the nearest edge pixel.
pub fn rotate_replicate(src: &GrayImage, angle_deg: f32) -> Result<GrayImage> {
    use nalgebra::Matrix3;

    let (w, h) = src.dimensions();
    if w == 0 || h == 0 {
        return Err(EngineError::ImageError("cannot rotate an empty image".to_string()));
    }

    let cx = (w as f64 - 1.0) / 2.0;
    let cy = (h as f64 - 1.0) / 2.0;
    let (sin_a, cos_a) = (angle_deg as f64).to_radians().sin_cos();

    // Forward map: translate to origin, rotate, translate back.
    let forward = Matrix3::new(
        cos_a, -sin_a, cx - cos_a * cx + sin_a * cy,
        sin_a, cos_a, cy - sin_a * cx - cos_a * cy,
        0.0, 0.0, 1.0,
    );
    let inv = forward
        .try_inverse()
        .ok_or_else(|| EngineError::ImageError("rotation matrix is not invertible".to_string()))?;

    let (m00, m01, m02) = (inv[(0, 0)], inv[(0, 1)], inv[(0, 2)]);
    let (m10, m11, m12) = (inv[(1, 0)], inv[(1, 1)], inv[(1, 2)]);
    let max_x = (w - 1) as f64;
    let max_y = (h - 1) as f64;

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        let y_f = y as f64;
        for x in 0..w {
            let x_f = x as f64;
            let sx = (m00 * x_f + m01 * y_f + m02).clamp(0.0, max_x);
            let sy = (m10 * x_f + m11 * y_f + m12).clamp(0.0, max_y);

            // Bilinear interpolation on the clamped coordinate.
            let x0 = sx.floor() as u32;
            let y0 = sy.floor() as u32;
            let x1 = (x0 + 1).min(w - 1);
            let y1 = (y0 + 1).min(h - 1);
            let fx = sx - x0 as f64;
            let fy = sy - y0 as f64;

            let p00 = src.get_pixel(x0, y0)[0] as f64;
            let p10 = src.get_pixel(x1, y0)[0] as f64;
            let p01 = src.get_pixel(x0, y1)[0] as f64;
            let p11 = src.get_pixel(x1, y1)[0] as f64;

            let v = (1.0 - fx) * (1.0 - fy) * p00
                + fx * (1.0 - fy) * p10
                + (1.0 - fx) * fy * p01
                + fx * fy * p11;
            out.put_pixel(x, y, Luma([v.round().clamp(0.0, 255.0) as u8]));
        }
    }

    Ok(out)
}

/// Minimum-area bounding rectangle via rotating calipers over the convex hull.
/// Returns centre, size and the angle in degrees of the edge the rectangle is
/// aligned with.
pub fn min_area_rect(points: &[Point2f]) -> Result<(Point2f, Size, f32)> {
    if points.is_empty() {
        return Err(EngineError::ImageError("empty point set".to_string()));
    }

    let hull = convex_hull(points);
    if hull.len() < 3 {
        let mut min_x = f32::MAX;
        let mut max_x = f32::MIN;
        let mut min_y = f32::MAX;
        let mut max_y = f32::MIN;
        for pt in points {
            min_x = min_x.min(pt.x);
            max_x = max_x.max(pt.x);
            min_y = min_y.min(pt.y);
            max_y = max_y.max(pt.y);
        }
        let center = Point2f::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);
        return Ok((center, Size::new(max_x - min_x, max_y - min_y), 0.0));
    }

    let mut min_area = f32::MAX;
    let mut best_rect = None;

    let n = hull.len();
    for i in 0..n {
        let p1 = hull[i];
        let p2 = hull[(i + 1) % n];

        let edge_x = p2.x - p1.x;
        let edge_y = p2.y - p1.y;
        let edge_len = (edge_x * edge_x + edge_y * edge_y).sqrt();
        if edge_len < 1e-6 {
            continue;
        }

        let ux = edge_x / edge_len;
        let uy = edge_y / edge_len;
        let vx = -uy;
        let vy = ux;

        let mut min_u = f32::MAX;
        let mut max_u = f32::MIN;
        let mut min_v = f32::MAX;
        let mut max_v = f32::MIN;
        for pt in &hull {
            let u = pt.x * ux + pt.y * uy;
            let v = pt.x * vx + pt.y * vy;
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }

        let width = max_u - min_u;
        let height = max_v - min_v;
        let area = width * height;

        // Strict comparison keeps the first edge on ties, so axis-aligned
        // sets report 0 rather than 90.
        if area < min_area - 1e-3 {
            min_area = area;
            let center_u = (min_u + max_u) / 2.0;
            let center_v = (min_v + max_v) / 2.0;
            best_rect = Some((
                Point2f::new(center_u * ux + center_v * vx, center_u * uy + center_v * vy),
                Size::new(width, height),
                uy.atan2(ux).to_degrees(),
            ));
        }
    }

    best_rect.ok_or_else(|| EngineError::ImageError("failed to compute minimum area rectangle".to_string()))
}

/// Monotone chain convex hull, counter-clockwise, no collinear points.
fn convex_hull(points: &[Point2f]) -> Vec<Point2f> {
    let mut pts: Vec<Point2f> = points.to_vec();
    pts.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
    });
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    fn cross(o: Point2f, a: Point2f, b: Point2f) -> f32 {
        (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
    }

    let mut lower: Vec<Point2f> = Vec::new();
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Point2f> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}
