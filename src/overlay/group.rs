//! Groups raw OCR output into text regions. The recognizer may expose
//! paragraph-, line-, or word-granular output; the best available
//! granularity wins, and word output is stitched into lines by vertical
//! proximity. With no positional data at all, a single approximate region
//! is synthesized over the lower portion of the image.

use crate::script::SourceScript;
use crate::services::{OcrOutcome, OcrSpan};
use crate::util::collapse_whitespace;

use super::{BBox, TextRegion};

/// Fallback band used when the recognizer returned text but no boxes.
const FALLBACK_X: (f32, f32) = (0.1, 0.9);
const FALLBACK_Y: (f32, f32) = (0.6, 0.9);

pub fn group_regions(
    ocr: &OcrOutcome,
    script: SourceScript,
    image_w: f32,
    image_h: f32,
) -> Vec<TextRegion> {
    if !ocr.paragraphs.is_empty() {
        return spans_to_regions(&ocr.paragraphs, script);
    }
    if !ocr.lines.is_empty() {
        return spans_to_regions(&ocr.lines, script);
    }
    if !ocr.words.is_empty() {
        return group_words(&ocr.words, script);
    }
    fallback_region(&ocr.full_text, script, image_w, image_h)
        .into_iter()
        .collect()
}

fn spans_to_regions(spans: &[OcrSpan], script: SourceScript) -> Vec<TextRegion> {
    spans
        .iter()
        .filter(|span| script.matches(&span.text))
        .map(|span| TextRegion {
            text: collapse_whitespace(&span.text),
            bbox: span.bbox.clone(),
        })
        .collect()
}

struct WordGroup {
    text: String,
    bbox: BBox,
    last_top: f32,
    last_height: f32,
}

impl WordGroup {
    fn start(word: &OcrSpan) -> Self {
        Self {
            text: word.text.trim().to_string(),
            bbox: word.bbox.clone(),
            last_top: word.bbox.y0,
            last_height: word.bbox.height(),
        }
    }

    /// A word joins the group while the gap between its top edge and the
    /// previous word's top edge stays under half the average of the two
    /// heights.
    fn accepts(&self, word: &OcrSpan) -> bool {
        let gap = (word.bbox.y0 - self.last_top).abs();
        gap < (self.last_height + word.bbox.height()) / 4.0
    }

    fn push(&mut self, word: &OcrSpan) {
        self.text.push(' ');
        self.text.push_str(word.text.trim());
        self.bbox = self.bbox.union(&word.bbox);
        self.last_top = word.bbox.y0;
        self.last_height = word.bbox.height();
    }

    fn into_region(self) -> TextRegion {
        TextRegion {
            text: self.text,
            bbox: self.bbox,
        }
    }
}

fn group_words(words: &[OcrSpan], script: SourceScript) -> Vec<TextRegion> {
    let mut groups: Vec<WordGroup> = Vec::new();
    for word in words.iter().filter(|word| script.matches(&word.text)) {
        if let Some(last) = groups.last_mut()
            && last.accepts(word)
        {
            last.push(word);
            continue;
        }
        groups.push(WordGroup::start(word));
    }
    groups.into_iter().map(WordGroup::into_region).collect()
}

fn fallback_region(
    full_text: &str,
    script: SourceScript,
    image_w: f32,
    image_h: f32,
) -> Option<TextRegion> {
    let text = collapse_whitespace(full_text);
    if text.is_empty() || !script.matches(&text) {
        return None;
    }
    Some(TextRegion {
        text,
        bbox: BBox::new(
            image_w * FALLBACK_X.0,
            image_h * FALLBACK_Y.0,
            image_w * FALLBACK_X.1,
            image_h * FALLBACK_Y.1,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, x0: f32, y0: f32, x1: f32, y1: f32) -> OcrSpan {
        OcrSpan {
            text: text.to_string(),
            bbox: BBox::new(x0, y0, x1, y1),
            conf: 90.0,
        }
    }

    #[test]
    fn adjacent_words_merge_into_one_region() {
        let outcome = OcrOutcome {
            words: vec![
                span("안녕", 10.0, 10.0, 40.0, 20.0),
                span("하세요", 45.0, 12.0, 80.0, 22.0),
            ],
            ..Default::default()
        };
        let regions = group_regions(&outcome, SourceScript::Hangul, 800.0, 600.0);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].text, "안녕 하세요");
        assert_eq!(regions[0].bbox, BBox::new(10.0, 10.0, 80.0, 22.0));
    }

    #[test]
    fn distant_word_starts_a_new_region() {
        let outcome = OcrOutcome {
            words: vec![
                span("안녕", 10.0, 10.0, 40.0, 20.0),
                span("하세요", 45.0, 12.0, 80.0, 22.0),
                span("감사합니다", 12.0, 50.0, 60.0, 62.0),
            ],
            ..Default::default()
        };
        let regions = group_regions(&outcome, SourceScript::Hangul, 800.0, 600.0);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].text, "안녕 하세요");
        assert_eq!(regions[1].text, "감사합니다");
        assert_eq!(regions[1].bbox, BBox::new(12.0, 50.0, 60.0, 62.0));
    }

    #[test]
    fn words_not_matching_the_script_are_dropped() {
        let outcome = OcrOutcome {
            words: vec![
                span("안녕", 10.0, 10.0, 40.0, 20.0),
                span("hello", 45.0, 12.0, 80.0, 22.0),
                span("하세요", 85.0, 11.0, 120.0, 21.0),
            ],
            ..Default::default()
        };
        let regions = group_regions(&outcome, SourceScript::Hangul, 800.0, 600.0);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].text, "안녕 하세요");
    }

    #[test]
    fn paragraphs_win_over_finer_granularity() {
        let outcome = OcrOutcome {
            paragraphs: vec![span("첫 번째 문단", 5.0, 5.0, 200.0, 40.0)],
            lines: vec![span("첫", 5.0, 5.0, 30.0, 20.0)],
            words: vec![span("번째", 35.0, 5.0, 70.0, 20.0)],
            ..Default::default()
        };
        let regions = group_regions(&outcome, SourceScript::Hangul, 800.0, 600.0);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].bbox, BBox::new(5.0, 5.0, 200.0, 40.0));
    }

    #[test]
    fn lines_win_over_words() {
        let outcome = OcrOutcome {
            lines: vec![span("한 줄", 5.0, 5.0, 90.0, 20.0)],
            words: vec![
                span("한", 5.0, 5.0, 30.0, 20.0),
                span("줄", 60.0, 5.0, 90.0, 20.0),
            ],
            ..Default::default()
        };
        let regions = group_regions(&outcome, SourceScript::Hangul, 800.0, 600.0);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].text, "한 줄");
    }

    #[test]
    fn full_text_only_synthesizes_the_lower_band() {
        let outcome = OcrOutcome {
            full_text: "자막 텍스트".to_string(),
            ..Default::default()
        };
        let regions = group_regions(&outcome, SourceScript::Hangul, 1000.0, 500.0);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].bbox, BBox::new(100.0, 300.0, 900.0, 450.0));
        assert_eq!(regions[0].text, "자막 텍스트");
    }

    #[test]
    fn no_matching_text_yields_empty_list() {
        let outcome = OcrOutcome {
            full_text: "latin only".to_string(),
            ..Default::default()
        };
        assert!(group_regions(&outcome, SourceScript::Hangul, 800.0, 600.0).is_empty());

        let outcome = OcrOutcome::default();
        assert!(group_regions(&outcome, SourceScript::Hangul, 800.0, 600.0).is_empty());
    }
}
