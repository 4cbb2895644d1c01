//! Mapping between display space (the scaled size an image is rendered at
//! for interaction) and source space (the image's native pixel grid).

use super::BBox;

/// Per-axis ratio of source dimension to display dimension. Derived once
/// when an image is fitted to its display container and read-only afterward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub x: f32,
    pub y: f32,
}

/// An axis-aligned rectangle in display space with a top-left origin.
/// Width and height are kept non-negative by construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl DisplayRect {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.w && y >= self.y && y <= self.y + self.h
    }
}

impl Scale {
    /// Fits an image to a container of known width; display height follows
    /// from the source aspect ratio. Returns the scale and display height.
    pub fn fit_width(source_w: u32, source_h: u32, display_w: f32) -> (Scale, f32) {
        let source_w = (source_w.max(1)) as f32;
        let source_h = (source_h.max(1)) as f32;
        let display_w = display_w.max(1.0);
        let display_h = display_w * source_h / source_w;
        let scale = Scale {
            x: source_w / display_w,
            y: source_h / display_h,
        };
        (scale, display_h)
    }

    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.x, y * self.y)
    }

    pub fn to_display(&self, x: f32, y: f32) -> (f32, f32) {
        (x / self.x, y / self.y)
    }

    pub fn rect_to_source(&self, rect: &DisplayRect) -> BBox {
        let (x0, y0) = self.to_source(rect.x, rect.y);
        let (x1, y1) = self.to_source(rect.x + rect.w, rect.y + rect.h);
        BBox { x0, y0, x1, y1 }
    }
}
