//! Fits translated text into a target box: searches for the largest usable
//! font size, word-wraps at that size, and sizes the covering box that hides
//! the original text.

use super::font::TextMeasure;
use super::{BBox, TextRegion};

pub const MIN_FONT_SIZE: f32 = 8.0;
pub const MAX_FONT_SIZE_CAP: f32 = 60.0;
pub const LINE_PITCH: f32 = 1.3;
pub const FILL_RATIO: f32 = 0.9;

/// Above this share of the image area a region is treated as text-heavy and
/// typeset at a uniform fixed size with an enlarged covering box.
pub const TEXT_HEAVY_AREA_RATIO: f32 = 0.15;

const COVERAGE_MARGIN: f32 = 16.0;
const COVERAGE_PADDING: f32 = 6.0;

pub fn max_font_size(box_h: f32) -> f32 {
    (box_h * 0.5).min(MAX_FONT_SIZE_CAP)
}

/// Greedy word wrap. A word joins the current line while the measured width
/// of `line + " " + word` stays within `max_width`; a single word wider than
/// `max_width` gets its own line. No character is ever dropped.
pub fn wrap_text(
    text: &str,
    font_size: f32,
    max_width: f32,
    measure: &dyn TextMeasure,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{} {}", current, word);
        if measure.width(&candidate, font_size) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub font_size: f32,
    pub lines: Vec<String>,
}

/// Linear search for the largest font size whose wrapped block fits the box.
/// Steps ascending by 2 from the minimum; the first size that fails stops
/// the search and the largest fitting size so far wins. When nothing fits
/// even at the minimum, the minimum is returned anyway.
pub fn fit_text(text: &str, box_w: f32, box_h: f32, measure: &dyn TextMeasure) -> FitResult {
    let max_text_width = box_w * FILL_RATIO;
    let max_text_height = box_h * FILL_RATIO;
    let max_size = max_font_size(box_h);

    let mut best = None;
    let mut test_size = MIN_FONT_SIZE;
    while test_size <= max_size {
        let lines = wrap_text(text, test_size, max_text_width, measure);
        let total_height = lines.len() as f32 * test_size * LINE_PITCH;
        if total_height > max_text_height {
            break;
        }
        best = Some(test_size);
        test_size += 2.0;
    }

    let font_size = best.unwrap_or(MIN_FONT_SIZE);
    let lines = wrap_text(text, font_size, box_w * FILL_RATIO, measure);
    FitResult { font_size, lines }
}

/// Typeset output for one region: the box to paint over the source text and
/// the wrapped translation to center inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionLayout {
    pub coverage: BBox,
    pub font_size: f32,
    pub lines: Vec<String>,
}

impl RegionLayout {
    pub fn text_height(&self) -> f32 {
        self.lines.len() as f32 * self.font_size * LINE_PITCH
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|line| line.trim().is_empty())
    }
}

/// Coverage policy for the automatic pipeline. Captioned/meme-style regions
/// (large area share) get a uniform fixed font size and a covering box grown
/// outward by a fixed margin, clamped to the image; incidental in-scene text
/// gets a box sized tightly to the wrapped text, never larger than the
/// detected region.
pub fn layout_region(
    region: &TextRegion,
    translated: &str,
    image_w: f32,
    image_h: f32,
    fixed_font_size: f32,
    measure: &dyn TextMeasure,
) -> RegionLayout {
    let bbox = &region.bbox;
    let area_ratio = bbox.area() / (image_w * image_h).max(1.0);

    if area_ratio > TEXT_HEAVY_AREA_RATIO {
        let coverage = BBox {
            x0: bbox.x0 - COVERAGE_MARGIN,
            y0: bbox.y0 - COVERAGE_MARGIN,
            x1: bbox.x1 + COVERAGE_MARGIN,
            y1: bbox.y1 + COVERAGE_MARGIN,
        }
        .clamp_to(image_w, image_h);
        let font_size = fixed_font_size.max(MIN_FONT_SIZE);
        let lines = wrap_text(translated, font_size, coverage.width() * FILL_RATIO, measure);
        return RegionLayout {
            coverage,
            font_size,
            lines,
        };
    }

    let fit = fit_text(translated, bbox.width(), bbox.height(), measure);
    let max_line_width = fit
        .lines
        .iter()
        .map(|line| measure.width(line, fit.font_size))
        .fold(0.0, f32::max);
    let text_height = fit.lines.len() as f32 * fit.font_size * LINE_PITCH;
    let cov_w = (max_line_width + COVERAGE_PADDING * 2.0).min(bbox.width());
    let cov_h = (text_height + COVERAGE_PADDING * 2.0).min(bbox.height());
    let (cx, cy) = bbox.center();
    let coverage = BBox {
        x0: cx - cov_w * 0.5,
        y0: cy - cov_h * 0.5,
        x1: cx + cov_w * 0.5,
        y1: cy + cov_h * 0.5,
    };
    RegionLayout {
        coverage,
        font_size: fit.font_size,
        lines: fit.lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fixed-width measure: every character counts half the font size.
    struct CharMeasure;

    impl TextMeasure for CharMeasure {
        fn width(&self, text: &str, font_size: f32) -> f32 {
            text.chars().count() as f32 * font_size * 0.5
        }
    }

    #[test]
    fn wrap_preserves_every_word_in_order() {
        let text = "the quick brown fox jumps over the lazy dog";
        for max_width in [30.0, 60.0, 120.0, 500.0] {
            let lines = wrap_text(text, 10.0, max_width, &CharMeasure);
            let rejoined = lines.join(" ");
            assert_eq!(rejoined, text, "max_width={max_width}");
        }
    }

    #[test]
    fn overwide_word_gets_its_own_line() {
        let lines = wrap_text("hi incomprehensibilities no", 10.0, 40.0, &CharMeasure);
        assert_eq!(lines, vec!["hi", "incomprehensibilities", "no"]);
    }

    #[test]
    fn fit_stays_within_bounds_and_height() {
        let fit = fit_text("some translated caption text", 200.0, 80.0, &CharMeasure);
        assert!(fit.font_size >= MIN_FONT_SIZE);
        assert!(fit.font_size <= max_font_size(80.0));
        let total = fit.lines.len() as f32 * fit.font_size * LINE_PITCH;
        assert!(total <= 80.0 * FILL_RATIO + 1e-3);
    }

    #[test]
    fn fit_returns_minimum_when_nothing_fits() {
        let fit = fit_text(
            "far too much text for such a tiny box to ever hold legibly",
            30.0,
            10.0,
            &CharMeasure,
        );
        assert_eq!(fit.font_size, MIN_FONT_SIZE);
        assert!(!fit.lines.is_empty());
    }

    #[test]
    fn fit_prefers_larger_sizes_when_room_allows() {
        let short = fit_text("hi", 400.0, 200.0, &CharMeasure);
        let long = fit_text(
            "a considerably longer piece of translated text that wraps",
            400.0,
            200.0,
            &CharMeasure,
        );
        assert!(short.font_size >= long.font_size);
        assert_eq!(short.font_size, max_font_size(200.0));
    }

    #[test]
    fn coverage_policies_diverge_on_area_ratio() {
        let text = "same translated text";
        // 20% of a 1000x1000 image: text-heavy path.
        let heavy_region = TextRegion {
            text: "원본".to_string(),
            bbox: BBox::new(100.0, 100.0, 600.0, 500.0),
        };
        // 5%: tight-fit path.
        let small_region = TextRegion {
            text: "원본".to_string(),
            bbox: BBox::new(100.0, 100.0, 350.0, 300.0),
        };

        let heavy = layout_region(&heavy_region, text, 1000.0, 1000.0, 24.0, &CharMeasure);
        let small = layout_region(&small_region, text, 1000.0, 1000.0, 24.0, &CharMeasure);

        assert_eq!(heavy.font_size, 24.0);
        assert!(heavy.coverage.x0 < heavy_region.bbox.x0);
        assert!(heavy.coverage.x1 > heavy_region.bbox.x1);

        assert!(small.coverage.x0 >= small_region.bbox.x0 - 1e-3);
        assert!(small.coverage.x1 <= small_region.bbox.x1 + 1e-3);
        assert!(small.coverage.width() <= small_region.bbox.width() + 1e-3);
    }

    #[test]
    fn heavy_coverage_clamps_to_image_bounds() {
        let region = TextRegion {
            text: "원본".to_string(),
            bbox: BBox::new(0.0, 0.0, 500.0, 400.0),
        };
        let layout = layout_region(&region, "text", 600.0, 450.0, 24.0, &CharMeasure);
        assert!(layout.coverage.x0 >= 0.0);
        assert!(layout.coverage.y0 >= 0.0);
        assert!(layout.coverage.x1 <= 600.0);
        assert!(layout.coverage.y1 <= 450.0);
        assert!(layout.coverage.x1 > region.bbox.x1);
    }
}
