use image::GrayImage;

use crate::image_impl::Rect;

/// Which axis a ruling line runs along.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    /// Horizontal rulings, located by their y coordinate.
    Rows,
    /// Vertical rulings, located by their x coordinate.
    Columns,
}

/// Positions inside `area` (absolute coordinates) where the mask has at
/// least one foreground pixel across the whole row or column.
pub fn stroke_positions(mask: &GrayImage, area: &Rect, axis: Axis) -> Vec<u32> {
    let (outer, inner) = match axis {
        Axis::Rows => (area.y..area.bottom(), area.x..area.right()),
        Axis::Columns => (area.x..area.right(), area.y..area.bottom()),
    };

    outer
        .filter(|&o| {
            inner.clone().any(|i| {
                let (x, y) = match axis {
                    Axis::Rows => (i, o),
                    Axis::Columns => (o, i),
                };
                mask.get_pixel(x, y)[0] > 0
            })
        })
        .collect()
}

/// Collapses runs of adjacent positions into one line each, at the run's
/// midpoint. Input must be sorted.
pub fn group_lines(positions: &[u32]) -> Vec<u32> {
    let mut lines = Vec::new();
    let mut run: Option<(u32, u32)> = None;

    for &p in positions {
        run = match run {
            Some((start, end)) if p <= end + 1 => Some((start, p)),
            Some((start, end)) => {
                lines.push(start + (end - start) / 2);
                Some((p, p))
            }
            None => Some((p, p)),
        };
    }
    if let Some((start, end)) = run {
        lines.push(start + (end - start) / 2);
    }
    lines
}

/// Cells between consecutive ruling lines, row-major. Cells narrower or
/// shorter than the minimum are skipped; rows left empty are dropped.
pub fn cell_grid(rows: &[u32], cols: &[u32], min_width: u32, min_height: u32) -> Vec<Vec<Rect>> {
    if rows.len() < 2 || cols.len() < 2 {
        return Vec::new();
    }

    rows.windows(2)
        .filter_map(|r| {
            let row: Vec<Rect> = cols
                .windows(2)
                .filter_map(|c| {
                    let width = c[1].saturating_sub(c[0]);
                    let height = r[1].saturating_sub(r[0]);
                    (width > min_width && height > min_height).then_some(Rect {
                        x: c[0],
                        y: r[0],
                        width,
                        height,
                    })
                })
                .collect();
            (!row.is_empty()).then_some(row)
        })
        .collect()
}

/// Sort rectangles into reading order: top to bottom, then left to right.
pub fn sort_reading_order(rects: &mut [Rect]) {
    rects.sort_by(|a, b| a.y.cmp(&b.y).then(a.x.cmp(&b.x)));
}
