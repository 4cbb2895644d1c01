use anyhow::{Context, Result, anyhow};
use futures_util::stream::{self, StreamExt};
use image::GenericImageView;
use std::path::{Path, PathBuf};
use tracing::warn;

pub mod editor;
pub mod logging;
pub mod overlay;
pub mod script;
pub mod services;
pub mod settings;
mod util;

pub use editor::{EditorDriver, SelectionEditor};

use overlay::{EstimateMeasure, OverlayStyle, TextMeasure, TextRegion};
use script::SourceScript;
use services::{HttpImageHost, HttpOcr, HttpTranslator, PublishService, TranslateService};

#[derive(Debug, Clone)]
pub struct Config {
    pub input: String,
    pub output: Option<String>,
    pub lang: String,
    pub source_lang: String,
    pub publish: bool,
    pub allow_empty: bool,
    pub debug_regions: bool,
    pub settings_path: Option<String>,
}

/// Runs the automatic pipeline on an image file: recognize, group, translate
/// each region, composite, then write the result (or publish it and return
/// the URL).
pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    let input_path = Path::new(&config.input);
    let image_bytes = std::fs::read(input_path)
        .with_context(|| format!("failed to read image: {}", input_path.display()))?;
    let image_mime = util::sniff_image_mime(&image_bytes, Some(input_path))?;

    let ocr = HttpOcr::new(settings.ocr_endpoint.clone());
    let translator = HttpTranslator::new(
        settings.translate_endpoint.clone(),
        config.lang.clone(),
        config.source_lang.clone(),
    );

    let options = PipelineOptions {
        source_lang: config.source_lang.clone(),
        allow_empty: config.allow_empty,
        debug_regions: config.debug_regions.then(|| debug_regions_path(input_path)),
    };
    let output_bytes =
        translate_image(&image_bytes, &image_mime, &ocr, &translator, &settings, &options).await?;

    if config.publish {
        let host = HttpImageHost::new(settings.image_host_endpoint.clone());
        let url = host.publish(output_bytes, "image/png").await?;
        return Ok(url);
    }

    let output_path = config
        .output
        .map(PathBuf::from)
        .unwrap_or_else(|| default_output_path(input_path));
    std::fs::write(&output_path, &output_bytes)
        .with_context(|| format!("failed to write output: {}", output_path.display()))?;
    Ok(output_path.display().to_string())
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub source_lang: String,
    pub allow_empty: bool,
    pub debug_regions: Option<PathBuf>,
}

/// The automatic pipeline over in-memory bytes. A region whose translation
/// fails is dropped with a warning; the rest of the image still composes.
pub async fn translate_image(
    image_bytes: &[u8],
    image_mime: &str,
    ocr: &dyn services::OcrService,
    translator: &dyn TranslateService,
    settings: &settings::Settings,
    options: &PipelineOptions,
) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(image_bytes)
        .with_context(|| "failed to decode image for translation")?;
    let (width, height) = decoded.dimensions();

    let outcome = ocr.recognize(image_bytes.to_vec(), image_mime).await?;
    let script = SourceScript::for_lang(&options.source_lang);
    let regions = overlay::group_regions(&outcome, script, width as f32, height as f32);
    if regions.is_empty() {
        if options.allow_empty {
            return Ok(image_bytes.to_vec());
        }
        return Err(anyhow!("no text found in image"));
    }

    if let Some(path) = options.debug_regions.as_ref() {
        write_debug_regions(image_bytes, image_mime, width, height, &regions, path)?;
    }

    let style = build_overlay_style(settings);
    let translated = translate_regions(regions, translator, settings.translation_threads).await;

    let estimate = EstimateMeasure;
    let measure: &dyn TextMeasure = match style.font_metrics.as_ref() {
        Some(metrics) => metrics,
        None => &estimate,
    };
    let layouts: Vec<_> = translated
        .iter()
        .map(|(region, text)| {
            overlay::layout_region(
                region,
                text,
                width as f32,
                height as f32,
                settings.text_heavy_font_size,
                measure,
            )
        })
        .collect();

    let svg = overlay::compose_overlay(image_bytes, image_mime, width, height, &layouts, &style)?;
    let font_data = style.font_metrics.as_ref().map(|m| m.data().to_vec());
    overlay::rasterize_svg(&svg, "image/png", font_data.as_deref())
}

async fn translate_regions(
    regions: Vec<TextRegion>,
    translator: &dyn TranslateService,
    concurrency: usize,
) -> Vec<(TextRegion, String)> {
    let results: Vec<Option<(usize, TextRegion, String)>> =
        stream::iter(regions.into_iter().enumerate())
            .map(|(idx, region)| async move {
                match translator.translate(&region.text).await {
                    Ok(text) => {
                        let text = text.trim().to_string();
                        if text.is_empty() {
                            warn!("region {} translated to nothing; dropping it", idx);
                            None
                        } else {
                            Some((idx, region, text))
                        }
                    }
                    Err(err) => {
                        warn!("failed to translate region {}: {}", idx, err);
                        None
                    }
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

    let mut kept: Vec<(usize, TextRegion, String)> = results.into_iter().flatten().collect();
    kept.sort_by_key(|(idx, _, _)| *idx);
    kept.into_iter()
        .map(|(_, region, text)| (region, text))
        .collect()
}

#[cfg(target_os = "macos")]
fn overlay_fallback_fonts() -> &'static [&'static str] {
    &["NotoSans", "Hiragino Sans", "sans-serif"]
}

#[cfg(target_os = "windows")]
fn overlay_fallback_fonts() -> &'static [&'static str] {
    &["NotoSans", "Arial Unicode", "sans-serif"]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn overlay_fallback_fonts() -> &'static [&'static str] {
    &["NotoSans", "sans-serif"]
}

fn build_overlay_style(settings: &settings::Settings) -> OverlayStyle {
    let font_path = settings.overlay_font_path.as_deref().map(Path::new);
    let font_family = settings.overlay_font_family.as_deref();
    match overlay::resolve_overlay_font(font_path, font_family, overlay_fallback_fonts()) {
        Ok(resolved) => OverlayStyle {
            text_color: settings.overlay_text_color.clone(),
            stroke_color: settings.overlay_stroke_color.clone(),
            fill_color: settings.overlay_fill_color.clone(),
            font_family: Some(resolved.family),
            font_metrics: Some(resolved.metrics),
        },
        Err(err) => {
            warn!("overlay font unavailable, falling back to estimates: {}", err);
            OverlayStyle {
                text_color: settings.overlay_text_color.clone(),
                stroke_color: settings.overlay_stroke_color.clone(),
                fill_color: settings.overlay_fill_color.clone(),
                font_family: font_family.map(|value| value.to_string()),
                font_metrics: None,
            }
        }
    }
}

fn write_debug_regions(
    image_bytes: &[u8],
    image_mime: &str,
    width: u32,
    height: u32,
    regions: &[TextRegion],
    path: &Path,
) -> Result<()> {
    let svg = overlay::render_region_boxes(image_bytes, image_mime, width, height, regions)?;
    let bytes = overlay::rasterize_svg(&svg, "image/png", None)?;
    std::fs::write(path, bytes)
        .with_context(|| format!("failed to write region debug image: {}", path.display()))?;
    let json_path = path.with_extension("json");
    let json = serde_json::to_vec_pretty(regions)?;
    std::fs::write(&json_path, json)
        .with_context(|| format!("failed to write region debug json: {}", json_path.display()))?;
    eprintln!("debug: wrote detected regions to {}", path.display());
    Ok(())
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{}.translated.png", stem))
}

fn debug_regions_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{}.regions.png", stem))
}
