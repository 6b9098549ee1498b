use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageReader, Luma};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::engine::EngineError;
use crate::image_impl::resize_exact;

/// Upper bound on either side of a rasterized page.
const MAX_RASTER_SIDE: u32 = 12_000;
const POINTS_PER_INCH: f32 = 72.0;

/// Source of page text and page bitmaps. Page indices are zero-based.
pub trait PdfBackend {
    fn page_count(&self) -> usize;

    /// Native text layer of the page; empty when there is none.
    fn page_text(&self, index: usize) -> String;

    fn rasterize(&self, index: usize, dpi: u32) -> Result<GrayImage, EngineError>;
}

/// `lopdf`-backed document. Rasterization covers scanned pages: the largest
/// image drawn on the page is decoded and scaled to the page size at the
/// requested resolution. Vector-only pages cannot be rasterized.
pub struct LopdfBackend {
    doc: Document,
    pages: Vec<(u32, ObjectId)>,
}

impl LopdfBackend {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EngineError> {
        let doc = Document::load_mem(bytes)?;
        let pages = doc.get_pages().into_iter().collect();
        Ok(Self { doc, pages })
    }

    fn page(&self, index: usize) -> Result<(u32, ObjectId), EngineError> {
        self.pages
            .get(index)
            .copied()
            .ok_or_else(|| EngineError::Rasterize(format!("page index {index} out of range")))
    }

    fn resolve<'a>(&'a self, obj: &'a Object) -> Option<&'a Object> {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).ok(),
            other => Some(other),
        }
    }

    /// Looks a key up on the page, then on its ancestors in the page tree.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = self.doc.get_dictionary(page_id).ok();
        for _ in 0..32 {
            let dict = current?;
            if let Ok(value) = dict.get(key) {
                return self.resolve(value);
            }
            current = match dict.get(b"Parent") {
                Ok(Object::Reference(parent)) => self.doc.get_dictionary(*parent).ok(),
                _ => None,
            };
        }
        None
    }

    fn media_box(&self, page_id: ObjectId) -> Option<(f32, f32)> {
        let Object::Array(values) = self.inherited(page_id, b"MediaBox")? else {
            return None;
        };
        let nums: Vec<f32> = values.iter().filter_map(|v| self.resolve(v).and_then(number)).collect();
        if nums.len() != 4 {
            return None;
        }
        let (w, h) = ((nums[2] - nums[0]).abs(), (nums[3] - nums[1]).abs());
        (w > 0.0 && h > 0.0).then_some((w, h))
    }

    /// Image XObjects in the page resources, largest pixel area first.
    fn page_images(&self, page_id: ObjectId) -> Vec<&Stream> {
        let Some(Object::Dictionary(resources)) = self.inherited(page_id, b"Resources") else {
            return Vec::new();
        };
        let Some(Object::Dictionary(xobjects)) = resources.get(b"XObject").ok().and_then(|o| self.resolve(o)) else {
            return Vec::new();
        };

        let mut images: Vec<&Stream> = xobjects
            .iter()
            .filter_map(|(_, obj)| match self.resolve(obj) {
                Some(Object::Stream(stream)) if is_image(&stream.dict) => Some(stream),
                _ => None,
            })
            .collect();
        images.sort_by_key(|s| {
            let area = dimension(&s.dict, b"Width") as u64 * dimension(&s.dict, b"Height") as u64;
            std::cmp::Reverse(area)
        });
        images
    }

    fn decode_image(&self, stream: &Stream) -> Result<GrayImage, EngineError> {
        let width = dimension(&stream.dict, b"Width");
        let height = dimension(&stream.dict, b"Height");
        if width == 0 || height == 0 {
            return Err(EngineError::Rasterize("image has no dimensions".to_string()));
        }
        if width > MAX_RASTER_SIDE || height > MAX_RASTER_SIDE {
            return Err(EngineError::Rasterize(format!(
                "image of {width}x{height} exceeds {MAX_RASTER_SIDE} pixels per side"
            )));
        }

        let filters = filter_names(&stream.dict);
        if filters.iter().any(|f| f == "DCTDecode") {
            let data = if filters.len() > 1 {
                stream.decompressed_content().unwrap_or_else(|_| stream.content.clone())
            } else {
                stream.content.clone()
            };
            let img = ImageReader::new(Cursor::new(data))
                .with_guessed_format()
                .map_err(|e| EngineError::ImageError(e.to_string()))?
                .decode()?;
            return Ok(img.to_luma8());
        }
        if let Some(other) = filters.iter().find(|f| f.as_str() != "FlateDecode") {
            return Err(EngineError::Rasterize(format!("unsupported image filter {other}")));
        }

        let data = if filters.is_empty() {
            stream.content.clone()
        } else {
            stream.decompressed_content().unwrap_or_else(|_| stream.content.clone())
        };
        let bits = match stream.dict.get(b"BitsPerComponent") {
            Ok(Object::Integer(b)) => *b as u32,
            _ => 8,
        };
        raw_to_gray(&data, width, height, bits)
    }
}

impl PdfBackend for LopdfBackend {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, index: usize) -> String {
        let Some(&(page_no, _)) = self.pages.get(index) else {
            return String::new();
        };
        match self.doc.extract_text(&[page_no]) {
            Ok(text) => text,
            Err(e) => {
                debug!("page {page_no}: no text layer ({e})");
                String::new()
            }
        }
    }

    fn rasterize(&self, index: usize, dpi: u32) -> Result<GrayImage, EngineError> {
        let (page_no, page_id) = self.page(index)?;
        let images = self.page_images(page_id);
        let stream = images
            .first()
            .ok_or_else(|| EngineError::Rasterize(format!("page {page_no} has no image content")))?;

        let img = self.decode_image(stream)?;
        let Some((w_pt, h_pt)) = self.media_box(page_id) else {
            return Ok(img);
        };

        let scale = dpi as f32 / POINTS_PER_INCH;
        let target_w = ((w_pt * scale).round() as u32).clamp(1, MAX_RASTER_SIDE);
        let target_h = ((h_pt * scale).round() as u32).clamp(1, MAX_RASTER_SIDE);
        debug!(
            "page {page_no}: image {}x{} scaled to {target_w}x{target_h} at {dpi} dpi",
            img.width(),
            img.height()
        );
        if img.dimensions() == (target_w, target_h) {
            return Ok(img);
        }
        Ok(resize_exact(&img, target_w, target_h))
    }
}

fn is_image(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(name)) if name.as_slice() == b"Image")
}

fn dimension(dict: &Dictionary, key: &[u8]) -> u32 {
    match dict.get(key) {
        Ok(Object::Integer(v)) if *v > 0 => u32::try_from(*v).unwrap_or(u32::MAX),
        _ => 0,
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn filter_names(dict: &Dictionary) -> Vec<String> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![String::from_utf8_lossy(name).into_owned()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Raw samples to grayscale. The component count is inferred from the
/// buffer length, which covers Device*, ICC-based and calibrated spaces
/// alike.
fn raw_to_gray(data: &[u8], width: u32, height: u32, bits: u32) -> Result<GrayImage, EngineError> {
    let pixels = width as usize * height as usize;

    if bits == 1 {
        let row_bytes = (width as usize).div_ceil(8);
        if data.len() < row_bytes * height as usize {
            return Err(EngineError::Rasterize("truncated 1-bit image".to_string()));
        }
        let mut img = GrayImage::new(width, height);
        for (x, y, p) in img.enumerate_pixels_mut() {
            let byte = data[y as usize * row_bytes + x as usize / 8];
            // 0 is black for gray samples and painted for stencil masks.
            let bit = (byte >> (7 - (x % 8))) & 1;
            *p = Luma([if bit == 1 { 255 } else { 0 }]);
        }
        return Ok(img);
    }

    if bits != 8 {
        return Err(EngineError::Rasterize(format!("unsupported bit depth {bits}")));
    }

    let components = match data.len() / pixels.max(1) {
        n @ (1 | 3 | 4) => n,
        _ => return Err(EngineError::Rasterize(format!("unexpected sample buffer of {} bytes", data.len()))),
    };

    let img = match components {
        1 => GrayImage::from_raw(width, height, data[..pixels].to_vec()).map(DynamicImage::ImageLuma8),
        3 => image::RgbImage::from_raw(width, height, data[..pixels * 3].to_vec()).map(DynamicImage::ImageRgb8),
        _ => {
            let rgb: Vec<u8> = data[..pixels * 4]
                .chunks_exact(4)
                .flat_map(|c| {
                    let k = 255 - c[3] as u32;
                    [c[0], c[1], c[2]].map(|v| ((255 - v as u32) * k / 255) as u8)
                })
                .collect();
            image::RgbImage::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
        }
    };
    img.map(|i| i.to_luma8())
        .ok_or_else(|| EngineError::Rasterize("sample buffer does not match image size".to_string()))
}
