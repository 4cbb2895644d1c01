use image_translator_rust::overlay::BBox;
use image_translator_rust::script::SourceScript;
use image_translator_rust::services::{OcrOutcome, OcrSpan};

fn span(text: &str, x0: f32, y0: f32, x1: f32, y1: f32) -> OcrSpan {
    OcrSpan {
        text: text.to_string(),
        bbox: BBox::new(x0, y0, x1, y1),
        conf: 90.0,
    }
}

#[test]
fn word_grouping_snapshot() {
    let outcome = OcrOutcome {
        full_text: "안녕 하세요 감사합니다 skip".to_string(),
        words: vec![
            span("안녕", 10.0, 10.0, 40.0, 20.0),
            span("하세요", 45.0, 12.0, 80.0, 22.0),
            span("감사합니다", 12.0, 50.0, 60.0, 62.0),
            span("skip", 100.0, 50.0, 140.0, 60.0),
        ],
        ..Default::default()
    };
    let regions = image_translator_rust::overlay::group_regions(
        &outcome,
        SourceScript::Hangul,
        800.0,
        600.0,
    );
    let rendered = regions
        .iter()
        .map(|region| {
            format!(
                "{} @ ({:.0},{:.0})-({:.0},{:.0})",
                region.text, region.bbox.x0, region.bbox.y0, region.bbox.x1, region.bbox.y1
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    insta::assert_snapshot!(rendered);
}
