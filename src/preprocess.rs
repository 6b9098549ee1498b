use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::filter::{bilateral_filter, gaussian_blur_f32};
use tracing::{debug, warn};

use crate::engine::EngineError;
use crate::image_impl::{self, min_area_rect, rotate_replicate, Point2f};
use crate::morphology::open_rect;
use crate::types::{Binarization, PreprocessConfig};

/// Turns a page or region bitmap into a binarized, deskewed bitmap for OCR.
pub struct ImagePreprocessor {
    pub cfg: PreprocessConfig,
}

impl ImagePreprocessor {
    pub fn new(cfg: PreprocessConfig) -> Self {
        Self { cfg }
    }

    pub fn preprocess(&self, img: &GrayImage, mode: Binarization) -> Result<GrayImage, EngineError> {
        let (w, h) = img.dimensions();
        if w == 0 || h == 0 {
            return Err(EngineError::Preprocess(format!("empty image {w}x{h}")));
        }

        let upscaled = image_impl::upscale(img, self.cfg.upscale_factor);

        let smoothed = bilateral_filter(
            &upscaled,
            self.cfg.bilateral_window,
            self.cfg.bilateral_sigma_color,
            self.cfg.bilateral_sigma_spatial,
        );
        let smoothed = blur(&smoothed, self.cfg.smoothing_sigma);

        let sharpened = unsharp_mask(&smoothed, self.cfg.unsharp_sigma, self.cfg.unsharp_alpha);
        let equalized = clahe(&sharpened, self.cfg.clahe_tiles, self.cfg.clahe_clip_limit);

        // Text is dark: closing the strokes is an opening of the intensities.
        let closed = if self.cfg.close_kernel > 1 {
            open_rect(&equalized, self.cfg.close_kernel, self.cfg.close_kernel)
        } else {
            equalized
        };

        let binary = match mode {
            Binarization::Otsu => otsu_binarize(&closed, false),
            Binarization::AdaptiveGaussian => {
                adaptive_gaussian_binarize(&closed, self.cfg.adaptive_block_size, self.cfg.adaptive_c, false)
            }
        };

        self.deskew(&binary)
    }

    /// Like [`preprocess`](Self::preprocess) but never fails: on error the
    /// plain grayscale input is returned.
    pub fn preprocess_or_fallback(&self, img: &GrayImage, mode: Binarization) -> GrayImage {
        match self.preprocess(img, mode) {
            Ok(out) => out,
            Err(e) => {
                warn!("preprocessing failed, using grayscale input: {e}");
                img.clone()
            }
        }
    }

    /// Rotates the bitmap upright when the estimated skew exceeds the
    /// configured limit; otherwise returns it unchanged.
    pub fn deskew(&self, binary: &GrayImage) -> Result<GrayImage, EngineError> {
        let angle = estimate_skew(binary);
        if angle.abs() <= self.cfg.max_skew_degrees {
            return Ok(binary.clone());
        }
        debug!("deskewing by {:.2} degrees", -angle);
        let rotated = rotate_replicate(binary, -angle)?;
        Ok(map_threshold(&rotated, |_, _, v| v >= 128, false))
    }
}

/// Skew of the dark foreground in degrees, folded into (-45, 45].
pub fn estimate_skew(binary: &GrayImage) -> f32 {
    let (w, h) = binary.dimensions();

    // Row extremes span the same convex hull as the full foreground.
    let mut points = Vec::new();
    for y in 0..h {
        let mut first = None;
        let mut last = None;
        for x in 0..w {
            if binary.get_pixel(x, y)[0] < 128 {
                if first.is_none() {
                    first = Some(x);
                }
                last = Some(x);
            }
        }
        if let (Some(a), Some(b)) = (first, last) {
            points.push(Point2f::new(a as f32, y as f32));
            if b != a {
                points.push(Point2f::new(b as f32, y as f32));
            }
        }
    }

    if points.len() < 3 {
        return 0.0;
    }

    match min_area_rect(&points) {
        Ok((_, _, angle)) => fold_angle(angle),
        Err(_) => 0.0,
    }
}

fn fold_angle(mut angle: f32) -> f32 {
    while angle > 45.0 {
        angle -= 90.0;
    }
    while angle <= -45.0 {
        angle += 90.0;
    }
    angle
}

fn blur(img: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return img.clone();
    }
    gaussian_blur_f32(img, sigma)
}

/// `orig * alpha - blurred * (alpha - 1)`, saturated to u8.
pub fn unsharp_mask(img: &GrayImage, sigma: f32, alpha: f32) -> GrayImage {
    let blurred = blur(img, sigma);
    let mut out = GrayImage::new(img.width(), img.height());
    for ((o, b), d) in img.pixels().zip(blurred.pixels()).zip(out.pixels_mut()) {
        let v = o[0] as f32 * alpha - b[0] as f32 * (alpha - 1.0);
        *d = Luma([v.round().clamp(0.0, 255.0) as u8]);
    }
    out
}

/// Contrast-limited adaptive histogram equalization with bilinear
/// interpolation between tile mappings.
pub fn clahe(img: &GrayImage, tiles: u32, clip_limit: f32) -> GrayImage {
    let (w, h) = img.dimensions();
    let tiles_x = tiles.clamp(1, w.max(1));
    let tiles_y = tiles.clamp(1, h.max(1));

    let tile_bounds = |i: u32, n: u32, len: u32| (i * len / n, (i + 1) * len / n);

    let mut luts = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];
    for ty in 0..tiles_y {
        let (y0, y1) = tile_bounds(ty, tiles_y, h);
        for tx in 0..tiles_x {
            let (x0, x1) = tile_bounds(tx, tiles_x, w);
            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[img.get_pixel(x, y)[0] as usize] += 1;
                }
            }
            let area = ((x1 - x0) * (y1 - y0)).max(1);

            let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
            let mut excess = 0u32;
            for bin in hist.iter_mut() {
                if *bin > limit {
                    excess += *bin - limit;
                    *bin = limit;
                }
            }
            let share = excess / 256;
            let residual = (excess % 256) as usize;
            for (i, bin) in hist.iter_mut().enumerate() {
                *bin += share + u32::from(i < residual);
            }

            let lut = &mut luts[(ty * tiles_x + tx) as usize];
            let scale = 255.0 / area as f32;
            let mut cdf = 0u32;
            for (i, bin) in hist.iter().enumerate() {
                cdf += bin;
                lut[i] = (cdf as f32 * scale).round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    let tile_w = w as f32 / tiles_x as f32;
    let tile_h = h as f32 / tiles_y as f32;
    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        let gy = (y as f32 + 0.5) / tile_h - 0.5;
        let ty0 = gy.floor().clamp(0.0, (tiles_y - 1) as f32) as u32;
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let fy = (gy - ty0 as f32).clamp(0.0, 1.0);
        for x in 0..w {
            let gx = (x as f32 + 0.5) / tile_w - 0.5;
            let tx0 = gx.floor().clamp(0.0, (tiles_x - 1) as f32) as u32;
            let tx1 = (tx0 + 1).min(tiles_x - 1);
            let fx = (gx - tx0 as f32).clamp(0.0, 1.0);

            let v = img.get_pixel(x, y)[0] as usize;
            let at = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][v] as f32;
            let top = at(tx0, ty0) * (1.0 - fx) + at(tx1, ty0) * fx;
            let bottom = at(tx0, ty1) * (1.0 - fx) + at(tx1, ty1) * fx;
            let value = top * (1.0 - fy) + bottom * fy;
            out.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

/// Global Otsu threshold. With `invert`, dark pixels become 255.
pub fn otsu_binarize(img: &GrayImage, invert: bool) -> GrayImage {
    let (lo, hi) = img
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));

    // A flat image has no split; classify it as a whole.
    let level = if lo == hi { 127 } else { otsu_level(img) };
    map_threshold(img, |_, _, v| v > level, invert)
}

/// Gaussian-weighted local threshold: a pixel is background when it is
/// brighter than its neighbourhood mean minus `c`.
pub fn adaptive_gaussian_binarize(img: &GrayImage, block_size: u32, c: f32, invert: bool) -> GrayImage {
    let block = block_size.max(3) | 1;
    let sigma = 0.3 * ((block as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let local = gaussian_blur_f32(img, sigma);
    map_threshold(img, |x, y, v| v as f32 > local.get_pixel(x, y)[0] as f32 - c, invert)
}

fn map_threshold<F>(img: &GrayImage, is_background: F, invert: bool) -> GrayImage
where
    F: Fn(u32, u32, u8) -> bool,
{
    let (bg, fg) = if invert { (0u8, 255u8) } else { (255u8, 0u8) };
    let mut out = GrayImage::new(img.width(), img.height());
    for (x, y, p) in img.enumerate_pixels() {
        let v = if is_background(x, y, p[0]) { bg } else { fg };
        out.put_pixel(x, y, Luma([v]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_block(w: u32, h: u32) -> GrayImage {
        let mut img = GrayImage::from_pixel(w, h, Luma([255]));
        for row in 0..3 {
            let y0 = 10 + row * 20;
            for y in y0..y0 + 8 {
                for x in 10..w - 10 {
                    if (x / 6) % 2 == 0 {
                        img.put_pixel(x, y, Luma([20]));
                    }
                }
            }
        }
        img
    }

    #[test]
    fn test_otsu_separates_text_from_paper() {
        let img = text_block(120, 80);
        let bin = otsu_binarize(&img, false);
        assert_eq!(bin.get_pixel(10, 10)[0], 0);
        assert_eq!(bin.get_pixel(0, 0)[0], 255);

        let inv = otsu_binarize(&img, true);
        assert_eq!(inv.get_pixel(10, 10)[0], 255);
        assert_eq!(inv.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_blank_image_binarizes_to_background() {
        let img = GrayImage::from_pixel(40, 40, Luma([255]));
        assert!(otsu_binarize(&img, false).pixels().all(|p| p[0] == 255));
        assert!(adaptive_gaussian_binarize(&img, 11, 2.0, true).pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_axis_aligned_image_is_left_untouched() {
        let pre = ImagePreprocessor::new(PreprocessConfig::default());
        let bin = otsu_binarize(&text_block(120, 80), false);
        assert!(estimate_skew(&bin).abs() <= 1.0);
        let out = pre.deskew(&bin).unwrap();
        assert_eq!(out, bin);
    }

    #[test]
    fn test_skewed_block_is_detected_and_corrected() {
        let mut img = GrayImage::from_pixel(200, 200, Luma([255]));
        let (s, c) = 8f32.to_radians().sin_cos();
        for v in 0..30 {
            for u in 0..120 {
                let x = 40.0 + u as f32 * c - v as f32 * s;
                let y = 60.0 + u as f32 * s + v as f32 * c;
                img.put_pixel(x.round() as u32, y.round() as u32, Luma([0]));
            }
        }
        let angle = estimate_skew(&img);
        assert!((angle - 8.0).abs() < 1.5, "estimated {angle}");

        let pre = ImagePreprocessor::new(PreprocessConfig::default());
        let fixed = pre.deskew(&img).unwrap();
        assert!(estimate_skew(&otsu_binarize(&fixed, false)).abs() < 2.0);
    }

    #[test]
    fn test_unsharp_mask_increases_edge_contrast() {
        let mut img = GrayImage::from_pixel(20, 20, Luma([200]));
        for y in 0..20 {
            for x in 10..20 {
                img.put_pixel(x, y, Luma([60]));
            }
        }
        let sharp = unsharp_mask(&img, 2.0, 1.5);
        assert!(sharp.get_pixel(9, 10)[0] >= 200);
        assert!(sharp.get_pixel(10, 10)[0] <= 60);
    }

    #[test]
    fn test_clahe_stretches_low_contrast() {
        let mut img = GrayImage::new(64, 64);
        for (x, _, p) in img.enumerate_pixels_mut() {
            *p = Luma([100 + (x % 2) as u8 * 20]);
        }
        let eq = clahe(&img, 8, 40.0);
        let (lo, hi) = eq.pixels().fold((255u8, 0u8), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
        assert!(hi - lo > 20);
    }

    #[test]
    fn test_preprocess_output_is_binary_and_upscaled() {
        let pre = ImagePreprocessor::new(PreprocessConfig::default());
        let out = pre.preprocess(&text_block(60, 80), Binarization::Otsu).unwrap();
        assert_eq!(out.dimensions(), (180, 240));
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn test_empty_image_falls_back() {
        let pre = ImagePreprocessor::new(PreprocessConfig::default());
        let empty = GrayImage::new(0, 0);
        assert!(pre.preprocess(&empty, Binarization::Otsu).is_err());
        assert_eq!(pre.preprocess_or_fallback(&empty, Binarization::Otsu).dimensions(), (0, 0));
    }
}
