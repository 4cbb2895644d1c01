pub mod compose;
pub mod font;
pub mod group;
pub mod scale;
pub mod typeset;

pub use compose::{compose_overlay, rasterize_svg, render_region_boxes};
pub use font::{
    EstimateMeasure, FontMetrics, ResolvedOverlayFont, TextMeasure, load_font_metrics,
    resolve_overlay_font,
};
pub use group::group_regions;
pub use scale::{DisplayRect, Scale};
pub use typeset::{FitResult, RegionLayout, fit_text, layout_region, wrap_text};

/// Axis-aligned box in source-space pixels, `x1 > x0` and `y1 > y0`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x0 + self.x1) * 0.5, (self.y0 + self.y1) * 0.5)
    }

    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Clamps the box to an image of the given dimensions.
    pub fn clamp_to(&self, width: f32, height: f32) -> BBox {
        BBox {
            x0: self.x0.clamp(0.0, width),
            y0: self.y0.clamp(0.0, height),
            x1: self.x1.clamp(0.0, width),
            y1: self.y1.clamp(0.0, height),
        }
    }
}

/// A script-filtered run of source text with its source-space bounding box.
/// Created once during grouping, consumed once by typesetting, never stored.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TextRegion {
    pub text: String,
    pub bbox: BBox,
}

#[derive(Debug, Clone)]
pub struct OverlayStyle {
    pub text_color: String,
    pub stroke_color: String,
    pub fill_color: String,
    pub font_family: Option<String>,
    pub font_metrics: Option<FontMetrics>,
}
