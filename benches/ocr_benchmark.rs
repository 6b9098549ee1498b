use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hangulpdf::{Binarization, ImagePreprocessor, PreprocessConfig, RegionConfig, RegionDetector, TextPostprocessor};
use image::{GrayImage, Luma};

/// Synthetic page: a ruled 3x3 table above a few lines of glyph-like strokes.
fn synthetic_page(width: u32, height: u32) -> GrayImage {
    let mut img = GrayImage::from_pixel(width, height, Luma([250]));
    let (tx, ty, tw, th) = (width / 10, height / 10, width * 8 / 10, height / 3);
    for i in 0..4 {
        let y = ty + i * th / 3;
        let x = tx + i * tw / 3;
        for dx in 0..tw {
            img.put_pixel(tx + dx, y.min(height - 1), Luma([0]));
        }
        for dy in 0..th {
            img.put_pixel(x.min(width - 1), ty + dy, Luma([0]));
        }
    }
    for line in 0..5 {
        let y0 = height / 2 + line * 30;
        for glyph in 0..20 {
            let x0 = width / 10 + glyph * 14;
            for y in y0..(y0 + 16).min(height) {
                for x in x0..(x0 + 9).min(width) {
                    img.put_pixel(x, y, Luma([30]));
                }
            }
        }
    }
    img
}

fn benchmark_preprocess(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocess");
    group.sample_size(10);

    let pre = ImagePreprocessor::new(PreprocessConfig::default());
    for &(w, h) in &[(320u32, 240u32), (640, 480)] {
        let page = synthetic_page(w, h);
        group.bench_with_input(BenchmarkId::from_parameter(format!("{w}x{h}")), &page, |b, page| {
            b.iter(|| pre.preprocess_or_fallback(black_box(page), Binarization::Otsu));
        });
    }

    group.finish();
}

fn benchmark_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("region_detection");
    group.sample_size(20);

    let det = RegionDetector::new(RegionConfig::default());
    let page = synthetic_page(1240, 1754);
    group.bench_function("a4_150dpi", |b| {
        b.iter(|| det.detect(black_box(&page)));
    });

    group.finish();
}

fn benchmark_postprocess(c: &mut Criterion) {
    let pp = TextPostprocessor::default();
    let text = "━━━━━━\n품목 │ 수량 │ 금액\n사과 │ 3 개 │ 1 , 500 원\n━━━━━━\n2024 년 3 월 5 일 “발행”…\n".repeat(50);
    c.bench_function("postprocess", |b| {
        b.iter(|| pp.process(black_box(&text)));
    });
}

criterion_group!(benches, benchmark_preprocess, benchmark_detection, benchmark_postprocess);
criterion_main!(benches);
