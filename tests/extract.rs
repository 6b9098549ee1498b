use hangulpdf::{
    extract, EngineError, ExtractError, ExtractOptions, Extractor, LopdfBackend, OcrEngine, OcrProfile, OcrToken,
    PageSource, PageState, PdfBackend, PipelineConfig, UnavailableEngine, PAGE_DELIMITER,
};
use image::GrayImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

enum PageSpec {
    Text(&'static str),
    /// Gray 8-bit image drawn over the whole page, one pixel per point.
    Scan { width: u32, height: u32, samples: Vec<u8> },
}

fn build_pdf(pages: Vec<PageSpec>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids: Vec<Object> = Vec::new();
    for spec in &pages {
        let (operations, resources, (w, h)) = match spec {
            PageSpec::Text(text) => (
                vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![50.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
                dictionary! { "Font" => dictionary! { "F1" => font_id } },
                (595, 842),
            ),
            PageSpec::Scan { width, height, samples } => {
                let image_id = doc.add_object(Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => *width as i64,
                        "Height" => *height as i64,
                        "ColorSpace" => "DeviceGray",
                        "BitsPerComponent" => 8,
                    },
                    samples.clone(),
                ));
                (
                    vec![
                        Operation::new("q", vec![]),
                        Operation::new(
                            "cm",
                            vec![(*width as i64).into(), 0.into(), 0.into(), (*height as i64).into(), 0.into(), 0.into()],
                        ),
                        Operation::new("Do", vec![Object::Name(b"Im1".to_vec())]),
                        Operation::new("Q", vec![]),
                    ],
                    dictionary! { "XObject" => dictionary! { "Im1" => image_id } },
                    (*width as i64, *height as i64),
                )
            }
        };

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources,
            "MediaBox" => vec![0.into(), 0.into(), w.into(), h.into()],
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages.len() as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// A white scan with two rows of dark glyph-like strokes.
fn scan_page() -> PageSpec {
    let (width, height) = (200u32, 100u32);
    let mut samples = vec![255u8; (width * height) as usize];
    for row in [30u32, 60] {
        for glyph in 0..8 {
            for y in row..row + 14 {
                for x in 20 + glyph * 12..28 + glyph * 12 {
                    samples[(y * width + x) as usize] = 0;
                }
            }
        }
    }
    PageSpec::Scan { width, height, samples }
}

/// Answers every profile with the same confident Korean line.
struct FixedKoreanEngine;

impl OcrEngine for FixedKoreanEngine {
    fn name(&self) -> &'static str {
        "fixed-korean"
    }

    fn recognize(&self, _img: &GrayImage, _profile: &OcrProfile) -> Result<Vec<OcrToken>, EngineError> {
        Ok(vec![
            OcrToken::new("대한민국", 93.0, 0),
            OcrToken::new("문서", 88.0, 0),
            OcrToken::new("인식", 91.0, 0),
            OcrToken::new("흐림", 30.0, 0),
        ])
    }
}

fn ocr_options() -> ExtractOptions {
    let mut pipeline = PipelineConfig::default();
    pipeline.dpi = 72;
    pipeline.preprocess.upscale_factor = 1;
    ExtractOptions {
        use_enhanced_ocr: true,
        clean_text: false,
        pipeline,
    }
}

#[test]
fn native_page_is_returned_verbatim() {
    let bytes = build_pdf(vec![PageSpec::Text("Hello World from a native text layer")]);
    let expected = LopdfBackend::from_bytes(&bytes).unwrap().page_text(0);
    assert!(expected.contains("Hello World"));

    let out = extract(&bytes, &ExtractOptions::default());
    assert!(out.error.is_none(), "unexpected error: {:?}", out.error);
    assert_eq!(out.page_count, 1);
    assert_eq!(out.text, expected);
    assert_eq!(out.text_length, expected.chars().count());
    assert_eq!(out.pages[0].source, PageSource::Native);
}

#[test]
fn merging_never_loses_native_text() {
    let bytes = build_pdf(vec![
        PageSpec::Text("First page of native text"),
        PageSpec::Text("Second page, also native"),
        PageSpec::Text("Third and last page"),
    ]);
    let backend = LopdfBackend::from_bytes(&bytes).unwrap();
    let native_total: usize = (0..3).map(|i| backend.page_text(i).chars().count()).sum();

    let out = extract(&bytes, &ExtractOptions::default());
    assert!(out.error.is_none());
    assert_eq!(out.page_count, 3);
    assert!(out.text.chars().count() >= native_total);
    assert_eq!(out.text.matches(PAGE_DELIMITER).count(), 2);
    let first = out.text.find("First").unwrap();
    let third = out.text.find("Third").unwrap();
    assert!(first < third);
}

#[test]
fn scanned_page_without_ocr_reports_insufficient_text() {
    let bytes = build_pdf(vec![scan_page()]);
    let out = extract(&bytes, &ExtractOptions::default());

    assert_eq!(out.page_count, 1);
    assert!(out.text.chars().count() < 10);
    assert!(matches!(out.error, Some(ExtractError::InsufficientText { min: 10, .. })));
    assert_eq!(out.pages[0].source, PageSource::Empty);
}

#[test]
fn scanned_page_with_ocr_yields_text() {
    let bytes = build_pdf(vec![scan_page()]);
    let out = Extractor::new(FixedKoreanEngine, ocr_options()).extract_bytes(&bytes);

    assert!(out.error.is_none(), "unexpected error: {:?}", out.error);
    assert_eq!(out.page_count, 1);
    assert!(out.text.chars().count() >= 10);
    assert!(out.text.contains("대한민국 문서 인식"));
    assert!(!out.text.contains("흐림"));

    let report = &out.pages[0];
    assert_eq!(report.source, PageSource::Ocr);
    assert_eq!(report.states.first(), Some(&PageState::Rasterized));
    assert_eq!(report.states.last(), Some(&PageState::Appended));
}

#[test]
fn ocr_without_engine_keeps_the_error_and_a_note() {
    let bytes = build_pdf(vec![scan_page()]);
    let out = Extractor::new(UnavailableEngine, ocr_options()).extract_bytes(&bytes);

    assert!(matches!(out.error, Some(ExtractError::InsufficientText { .. })));
    assert!(out.pages[0].notes.iter().any(|n| n.contains("unavailable")));
}

#[test]
fn mixed_document_uses_ocr_only_where_needed() {
    let bytes = build_pdf(vec![
        PageSpec::Text("This page carries more than enough native text to skip OCR entirely."),
        scan_page(),
    ]);
    let out = Extractor::new(FixedKoreanEngine, ocr_options()).extract_bytes(&bytes);

    assert!(out.error.is_none());
    assert_eq!(out.pages[0].source, PageSource::Native);
    assert!(out.pages[0].states.is_empty());
    assert_eq!(out.pages[1].source, PageSource::Ocr);

    let (first, second) = out.text.split_once(PAGE_DELIMITER).unwrap();
    assert!(first.contains("native text"));
    assert!(second.contains("대한민국"));
}

#[test]
fn short_native_page_keeps_text_when_rasterization_fails() {
    let bytes = build_pdf(vec![PageSpec::Text("Short but real")]);
    let out = Extractor::new(FixedKoreanEngine, ocr_options()).extract_bytes(&bytes);

    assert!(out.text.contains("Short but real"));
    assert_eq!(out.pages[0].source, PageSource::Native);
    assert!(out.pages[0].notes.iter().any(|n| n.contains("rasterization failed")));
}

#[test]
fn clean_text_normalizes_native_pages() {
    let bytes = build_pdf(vec![PageSpec::Text("Total 1 , 500 items at 20 %")]);

    let raw = extract(&bytes, &ExtractOptions::default());
    assert!(raw.text.contains("1 , 500"));

    let cleaned = extract(
        &bytes,
        &ExtractOptions {
            clean_text: true,
            ..ExtractOptions::default()
        },
    );
    assert!(cleaned.text.contains("Total 1,500 items at 20%"));
}

#[test]
fn unparsable_bytes_report_a_parse_error() {
    let out = extract(b"%PDF-1.4 this is not really a pdf", &ExtractOptions::default());
    assert!(matches!(out.error, Some(ExtractError::Parse(_))));
    assert_eq!(out.page_count, 0);
    assert!(out.text.is_empty());
}

#[test]
fn output_serializes_error_as_message() {
    let out = extract(b"garbage", &ExtractOptions::default());
    let json = serde_json::to_value(&out).unwrap();
    assert!(json["error"].as_str().unwrap().contains("parse"));
    assert_eq!(json["text_length"], 0);
}
