use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use resvg::render;
use std::io::Cursor;
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use super::typeset::RegionLayout;
use super::{OverlayStyle, TextRegion};

/// Builds the overlay SVG: the unmodified source image first, then one
/// opaque covering box with a thin border and centered multi-line text per
/// translated region, in list order. Regions with nothing to say are
/// skipped.
pub fn compose_overlay(
    image_bytes: &[u8],
    image_mime: &str,
    width: u32,
    height: u32,
    layouts: &[RegionLayout],
    style: &OverlayStyle,
) -> Result<String> {
    let encoded = BASE64.encode(image_bytes);
    let data_uri = format!("data:{};base64,{}", image_mime, encoded);

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
        uri = data_uri,
        w = width,
        h = height
    ));

    let font_family = style
        .font_family
        .as_deref()
        .or_else(|| style.font_metrics.as_ref().and_then(|m| m.family()));

    for layout in layouts {
        if layout.is_empty() {
            continue;
        }
        let coverage = &layout.coverage;
        svg.push_str(&format!(
            r##"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="{fill}" stroke="{stroke}" stroke-width="2"/>"##,
            x = coverage.x0,
            y = coverage.y0,
            w = coverage.width(),
            h = coverage.height(),
            fill = &style.fill_color,
            stroke = &style.stroke_color
        ));

        let (center_x, _) = coverage.center();
        let pitch = layout.font_size * super::typeset::LINE_PITCH;
        let start_y = coverage.y0 + (coverage.height() - layout.text_height()) * 0.5;
        for (idx, line) in layout.lines.iter().enumerate() {
            let baseline = start_y + idx as f32 * pitch + layout.font_size;
            let escaped = escape_xml(line);
            if let Some(family) = font_family {
                svg.push_str(&format!(
                    r#"<text x="{x}" y="{y}" font-size="{size}" fill="{color}" font-family="{family}" text-anchor="middle">{text}</text>"#,
                    x = center_x,
                    y = baseline,
                    size = layout.font_size,
                    color = &style.text_color,
                    family = escape_xml(family),
                    text = escaped
                ));
            } else {
                svg.push_str(&format!(
                    r#"<text x="{x}" y="{y}" font-size="{size}" fill="{color}" text-anchor="middle">{text}</text>"#,
                    x = center_x,
                    y = baseline,
                    size = layout.font_size,
                    color = &style.text_color,
                    text = escaped
                ));
            }
        }
    }

    svg.push_str("</svg>");
    Ok(svg)
}

/// Debug rendering: outlines of the detected regions on top of the image.
pub fn render_region_boxes(
    image_bytes: &[u8],
    image_mime: &str,
    width: u32,
    height: u32,
    regions: &[TextRegion],
) -> Result<String> {
    let encoded = BASE64.encode(image_bytes);
    let data_uri = format!("data:{};base64,{}", image_mime, encoded);

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
        uri = data_uri,
        w = width,
        h = height
    ));

    for region in regions {
        svg.push_str(&format!(
            r##"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="none" stroke="#00c853" stroke-width="2"/>"##,
            x = region.bbox.x0,
            y = region.bbox.y0,
            w = region.bbox.width(),
            h = region.bbox.height()
        ));
    }

    svg.push_str("</svg>");
    Ok(svg)
}

/// Rasterizes an SVG document into an encoded image of the requested mime.
pub fn rasterize_svg(svg: &str, output_mime: &str, font_data: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(data) = font_data {
        db.load_font_data(data.to_vec());
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    let image = image::RgbaImage::from_raw(size.width(), size.height(), pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))?;
    let format = image_format_from_mime(output_mime)
        .ok_or_else(|| anyhow!("unsupported output image mime '{}'", output_mime))?;
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut cursor, format)
        .with_context(|| "failed to encode image from SVG")?;
    Ok(bytes)
}

fn image_format_from_mime(mime: &str) -> Option<image::ImageFormat> {
    match mime {
        "image/png" => Some(image::ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Some(image::ImageFormat::Jpeg),
        "image/gif" => Some(image::ImageFormat::Gif),
        "image/webp" => Some(image::ImageFormat::WebP),
        "image/bmp" => Some(image::ImageFormat::Bmp),
        "image/tiff" => Some(image::ImageFormat::Tiff),
        _ => None,
    }
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
