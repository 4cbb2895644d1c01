use anyhow::{Context, Result};
use image::GenericImageView;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::overlay::{
    BBox, DisplayRect, EstimateMeasure, OverlayStyle, Scale, TextMeasure, compose_overlay,
    fit_text, rasterize_svg, typeset::RegionLayout,
};
use crate::services::{OcrService, PublishService, TranslateService};
use crate::util::collapse_whitespace;

use super::{ComposeRegion, EditorAction, SelectionEditor};

/// Completion messages from detached per-selection work.
#[derive(Debug)]
pub enum DriverEvent {
    TranslateDone { id: u64, text: Option<String> },
}

/// Owns the editor, the loaded image, and the map of in-flight operations.
/// Pointer input is applied synchronously; recognition, translation, and
/// composite publishing run as detached tasks whose completions are merged
/// back by selection id, so out-of-order completion and deletions mid-flight
/// are harmless.
pub struct EditorDriver {
    editor: SelectionEditor,
    image: image::DynamicImage,
    image_bytes: Vec<u8>,
    image_mime: String,
    scale: Scale,
    style: OverlayStyle,
    ocr: Arc<dyn OcrService>,
    translator: Arc<dyn TranslateService>,
    publisher: Arc<dyn PublishService>,
    events_tx: mpsc::UnboundedSender<DriverEvent>,
    events_rx: mpsc::UnboundedReceiver<DriverEvent>,
    published_tx: watch::Sender<Option<String>>,
    published_rx: watch::Receiver<Option<String>>,
    pending: HashMap<u64, JoinHandle<()>>,
    composites: Vec<JoinHandle<()>>,
}

impl EditorDriver {
    pub fn new(
        image_bytes: Vec<u8>,
        image_mime: impl Into<String>,
        display_width: f32,
        style: OverlayStyle,
        ocr: Arc<dyn OcrService>,
        translator: Arc<dyn TranslateService>,
        publisher: Arc<dyn PublishService>,
    ) -> Result<Self> {
        let image = image::load_from_memory(&image_bytes)
            .with_context(|| "failed to decode image for editing")?;
        let (width, height) = image.dimensions();
        let (scale, _display_h) = Scale::fit_width(width, height, display_width);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (published_tx, published_rx) = watch::channel(None);
        Ok(Self {
            editor: SelectionEditor::new(),
            image,
            image_bytes,
            image_mime: image_mime.into(),
            scale,
            style,
            ocr,
            translator,
            publisher,
            events_tx,
            events_rx,
            published_tx,
            published_rx,
            pending: HashMap::new(),
            composites: Vec::new(),
        })
    }

    pub fn editor(&self) -> &SelectionEditor {
        &self.editor
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    /// URL of the most recently published composite. Updated only when a
    /// regeneration actually produced and uploaded a new output.
    pub fn published(&self) -> watch::Receiver<Option<String>> {
        self.published_rx.clone()
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        let actions = self.editor.pointer_down(x, y);
        self.dispatch(actions);
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        self.editor.pointer_move(x, y);
    }

    pub fn pointer_up(&mut self) {
        let actions = self.editor.pointer_up();
        self.dispatch(actions);
    }

    pub fn right_click(&mut self, x: f32, y: f32) {
        let actions = self.editor.right_click(x, y);
        self.dispatch(actions);
    }

    pub fn clear_all(&mut self) {
        let actions = self.editor.clear_all();
        self.dispatch(actions);
    }

    /// Applies one completion message and whatever follow-up work it
    /// triggers.
    pub fn handle_event(&mut self, event: DriverEvent) {
        match event {
            DriverEvent::TranslateDone { id, text } => {
                self.pending.remove(&id);
                let actions = self.editor.translate_done(id, text);
                self.dispatch(actions);
            }
        }
    }

    /// Drains completions until no translate request is outstanding, then
    /// waits for any composite publishes spawned along the way.
    pub async fn settle(&mut self) {
        while !self.pending.is_empty() {
            let Some(event) = self.events_rx.recv().await else {
                break;
            };
            self.handle_event(event);
        }
        for handle in self.composites.drain(..) {
            let _ = handle.await;
        }
    }

    fn dispatch(&mut self, actions: Vec<EditorAction>) {
        for action in actions {
            match action {
                EditorAction::Translate { id, rect } => self.spawn_translate(id, rect),
                EditorAction::Compose { key, regions } => self.spawn_compose(key, regions),
            }
        }
    }

    fn spawn_translate(&mut self, id: u64, rect: DisplayRect) {
        let crop = self.crop_source(&rect);
        let ocr = self.ocr.clone();
        let translator = self.translator.clone();
        let events = self.events_tx.clone();
        let handle = tokio::spawn(async move {
            let text = recognize_and_translate(crop, ocr, translator).await;
            let _ = events.send(DriverEvent::TranslateDone { id, text });
        });
        self.pending.insert(id, handle);
    }

    fn spawn_compose(&mut self, key: String, regions: Vec<ComposeRegion>) {
        let layouts = self.layout_regions(&regions);
        let image_bytes = self.image_bytes.clone();
        let image_mime = self.image_mime.clone();
        let style = self.style.clone();
        let publisher = self.publisher.clone();
        let published = self.published_tx.clone();
        let (width, height) = self.image.dimensions();
        let handle = tokio::spawn(async move {
            let svg = match compose_overlay(
                &image_bytes,
                &image_mime,
                width,
                height,
                &layouts,
                &style,
            ) {
                Ok(svg) => svg,
                Err(err) => {
                    warn!("failed to compose overlay: {}", err);
                    return;
                }
            };
            let font_data = style.font_metrics.as_ref().map(|m| m.data().to_vec());
            let bytes = match rasterize_svg(&svg, "image/png", font_data.as_deref()) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!("failed to rasterize composite: {}", err);
                    return;
                }
            };
            match publisher.publish(bytes, "image/png").await {
                Ok(url) => {
                    debug!("composite {} published at {}", key, url);
                    let _ = published.send(Some(url));
                }
                Err(err) => warn!("failed to publish composite: {}", err),
            }
        });
        self.composites.push(handle);
    }

    /// Crops the full-resolution pixels under a display-space rectangle.
    fn crop_source(&self, rect: &DisplayRect) -> image::DynamicImage {
        let (width, height) = self.image.dimensions();
        let bbox = self
            .scale
            .rect_to_source(rect)
            .clamp_to(width as f32, height as f32);
        let x = bbox.x0.floor().max(0.0) as u32;
        let y = bbox.y0.floor().max(0.0) as u32;
        let w = (bbox.width().ceil() as u32).max(1).min(width - x.min(width - 1));
        let h = (bbox.height().ceil() as u32).max(1).min(height - y.min(height - 1));
        self.image.crop_imm(x, y, w, h)
    }

    fn layout_regions(&self, regions: &[ComposeRegion]) -> Vec<RegionLayout> {
        let (width, height) = self.image.dimensions();
        let estimate = EstimateMeasure;
        let measure: &dyn TextMeasure = match self.style.font_metrics.as_ref() {
            Some(metrics) => metrics,
            None => &estimate,
        };
        regions
            .iter()
            .map(|region| {
                // The user's rectangle is the covering box; only the text
                // needs fitting.
                let coverage: BBox = self
                    .scale
                    .rect_to_source(&region.rect)
                    .clamp_to(width as f32, height as f32);
                let fit = fit_text(&region.text, coverage.width(), coverage.height(), measure);
                RegionLayout {
                    coverage,
                    font_size: fit.font_size,
                    lines: fit.lines,
                }
            })
            .collect()
    }
}

async fn recognize_and_translate(
    crop: image::DynamicImage,
    ocr: Arc<dyn OcrService>,
    translator: Arc<dyn TranslateService>,
) -> Option<String> {
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    if let Err(err) = crop.write_to(&mut cursor, image::ImageFormat::Png) {
        warn!("failed to encode selection crop: {}", err);
        return None;
    }

    let outcome = match ocr.recognize(bytes, "image/png").await {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!("selection recognition failed: {}", err);
            return None;
        }
    };
    let source_text = collapse_whitespace(&outcome.full_text);
    if source_text.is_empty() {
        return None;
    }

    match translator.translate(&source_text).await {
        Ok(translated) => {
            let translated = translated.trim().to_string();
            if translated.is_empty() {
                None
            } else {
                Some(translated)
            }
        }
        Err(err) => {
            warn!("selection translation failed: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{OcrOutcome, ServiceFuture};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeOcr {
        text: &'static str,
    }

    impl OcrService for FakeOcr {
        fn recognize(&self, _bytes: Vec<u8>, _mime: &str) -> ServiceFuture<OcrOutcome> {
            let text = self.text.to_string();
            Box::pin(async move {
                Ok(OcrOutcome {
                    full_text: text,
                    ..Default::default()
                })
            })
        }
    }

    struct FakeTranslator {
        reply: Option<&'static str>,
    }

    impl TranslateService for FakeTranslator {
        fn translate(&self, _text: &str) -> ServiceFuture<String> {
            let reply = self.reply;
            Box::pin(async move {
                match reply {
                    Some(value) => Ok(value.to_string()),
                    None => Err(anyhow::anyhow!("translation backend down")),
                }
            })
        }
    }

    struct FakePublisher {
        calls: AtomicUsize,
        urls: Mutex<Vec<String>>,
    }

    impl FakePublisher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                urls: Mutex::new(Vec::new()),
            })
        }
    }

    impl PublishService for FakePublisher {
        fn publish(&self, _bytes: Vec<u8>, _mime: &str) -> ServiceFuture<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let url = format!("https://img.example/{n}.png");
            self.urls.lock().unwrap().push(url.clone());
            Box::pin(async move { Ok(url) })
        }
    }

    fn test_image_bytes() -> Vec<u8> {
        let image = image::DynamicImage::ImageRgba8(image::RgbaImage::new(200, 100));
        let mut bytes = Vec::new();
        let mut cursor = Cursor::new(&mut bytes);
        image.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
        bytes
    }

    fn driver(
        translator_reply: Option<&'static str>,
        publisher: Arc<FakePublisher>,
    ) -> EditorDriver {
        let style = OverlayStyle {
            text_color: "#c40000".to_string(),
            stroke_color: "#c40000".to_string(),
            fill_color: "#ffffff".to_string(),
            font_family: None,
            font_metrics: None,
        };
        EditorDriver::new(
            test_image_bytes(),
            "image/png",
            100.0,
            style,
            Arc::new(FakeOcr { text: "안녕하세요" }),
            Arc::new(FakeTranslator {
                reply: translator_reply,
            }),
            publisher,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn drag_translate_and_publish_round_trip() {
        let publisher = FakePublisher::new();
        let mut driver = driver(Some("hello"), publisher.clone());

        driver.pointer_down(10.0, 10.0);
        driver.pointer_move(60.0, 40.0);
        driver.pointer_up();
        driver.settle().await;

        let selections = driver.editor().selections();
        assert_eq!(selections.len(), 1);
        assert_eq!(selections[0].translated_text.as_deref(), Some("hello"));
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *publisher.urls.lock().unwrap(),
            vec!["https://img.example/1.png".to_string()]
        );
        assert_eq!(
            driver.published().borrow().as_deref(),
            Some("https://img.example/1.png")
        );
    }

    #[tokio::test]
    async fn failed_translation_drops_the_selection_silently() {
        let publisher = FakePublisher::new();
        let mut driver = driver(None, publisher.clone());

        driver.pointer_down(10.0, 10.0);
        driver.pointer_move(60.0, 40.0);
        driver.pointer_up();
        driver.settle().await;

        assert!(driver.editor().selections().is_empty());
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
        assert!(driver.published().borrow().is_none());
    }

    #[tokio::test]
    async fn concurrent_selections_settle_before_one_publish() {
        let publisher = FakePublisher::new();
        let mut driver = driver(Some("hi"), publisher.clone());

        driver.pointer_down(5.0, 5.0);
        driver.pointer_move(45.0, 45.0);
        driver.pointer_up();
        driver.pointer_down(50.0, 5.0);
        driver.pointer_move(95.0, 45.0);
        driver.pointer_up();
        driver.settle().await;

        assert_eq!(driver.editor().selections().len(), 2);
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 1);
    }
}
