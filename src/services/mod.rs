//! Narrow contracts for the three external collaborators: the OCR
//! recognizer, the translation backend, and the image host.

use anyhow::Result;
use std::future::Future;
use std::pin::Pin;

use crate::overlay::BBox;

mod http;
mod retry;

pub use http::{HttpImageHost, HttpOcr, HttpTranslator};

/// One structured recognizer entry at some granularity.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct OcrSpan {
    pub text: String,
    pub bbox: BBox,
    pub conf: f32,
}

/// Recognizer output. Granularities are a capability ladder: paragraphs
/// when the backend provides them, lines below that, words below that, and
/// the raw full text always.
#[derive(Debug, Clone, Default)]
pub struct OcrOutcome {
    pub full_text: String,
    pub paragraphs: Vec<OcrSpan>,
    pub lines: Vec<OcrSpan>,
    pub words: Vec<OcrSpan>,
}

pub type ServiceFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

pub trait OcrService: Send + Sync {
    fn recognize(&self, image_bytes: Vec<u8>, image_mime: &str) -> ServiceFuture<OcrOutcome>;
}

pub trait TranslateService: Send + Sync {
    fn translate(&self, text: &str) -> ServiceFuture<String>;
}

pub trait PublishService: Send + Sync {
    fn publish(&self, image_bytes: Vec<u8>, image_mime: &str) -> ServiceFuture<String>;
}
