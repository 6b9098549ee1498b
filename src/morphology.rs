//! Rectangular-kernel morphology on grayscale bitmaps.
//!
//! Rectangular kernels are separable, so each operation runs as a row pass
//! followed by a column pass of a sliding min/max filter. Pixels outside the
//! image never contribute.

use std::collections::VecDeque;

use image::GrayImage;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Extreme {
    Min,
    Max,
}

/// Sliding min/max over `line`, where output `i` covers `[i - before, i + after]`.
fn sliding_extreme(line: &[u8], before: usize, after: usize, extreme: Extreme) -> Vec<u8> {
    let n = line.len();
    let mut out = vec![0u8; n];
    let mut window: VecDeque<usize> = VecDeque::new();
    let better = |a: u8, b: u8| match extreme {
        Extreme::Min => a <= b,
        Extreme::Max => a >= b,
    };

    let mut next = 0usize;
    for (i, slot) in out.iter_mut().enumerate() {
        let hi = (i + after).min(n - 1);
        while next <= hi {
            while let Some(&back) = window.back() {
                if better(line[next], line[back]) {
                    window.pop_back();
                } else {
                    break;
                }
            }
            window.push_back(next);
            next += 1;
        }
        let lo = i.saturating_sub(before);
        while let Some(&front) = window.front() {
            if front < lo {
                window.pop_front();
            } else {
                break;
            }
        }
        *slot = window.front().map(|&idx| line[idx]).unwrap_or(line[i]);
    }
    out
}

fn filter_rect(img: &GrayImage, kw: u32, kh: u32, extreme: Extreme) -> GrayImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return img.clone();
    }

    // Anchor at k/2. Dilation uses the reflected window so that open/close
    // are proper openings and closings for even kernels too.
    let offsets = |k: u32| {
        let k = k.max(1) as usize;
        let anchor = k / 2;
        match extreme {
            Extreme::Min => (anchor, k - 1 - anchor),
            Extreme::Max => (k - 1 - anchor, anchor),
        }
    };
    let (bx, ax) = offsets(kw);
    let (by, ay) = offsets(kh);

    let mut rows = GrayImage::new(w, h);
    if kw > 1 {
        for y in 0..h {
            let start = (y * w) as usize;
            let line = &img.as_raw()[start..start + w as usize];
            let filtered = sliding_extreme(line, bx, ax, extreme);
            for (x, v) in filtered.into_iter().enumerate() {
                rows.put_pixel(x as u32, y, image::Luma([v]));
            }
        }
    } else {
        rows = img.clone();
    }

    if kh <= 1 {
        return rows;
    }

    let mut out = GrayImage::new(w, h);
    let mut column = vec![0u8; h as usize];
    for x in 0..w {
        for y in 0..h {
            column[y as usize] = rows.get_pixel(x, y)[0];
        }
        let filtered = sliding_extreme(&column, by, ay, extreme);
        for (y, v) in filtered.into_iter().enumerate() {
            out.put_pixel(x, y as u32, image::Luma([v]));
        }
    }
    out
}

pub fn erode_rect(img: &GrayImage, kw: u32, kh: u32) -> GrayImage {
    filter_rect(img, kw, kh, Extreme::Min)
}

pub fn dilate_rect(img: &GrayImage, kw: u32, kh: u32) -> GrayImage {
    filter_rect(img, kw, kh, Extreme::Max)
}

pub fn open_rect(img: &GrayImage, kw: u32, kh: u32) -> GrayImage {
    dilate_rect(&erode_rect(img, kw, kh), kw, kh)
}
