use anyhow::{Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::json;

use crate::overlay::BBox;

use super::retry::{
    RATE_LIMIT_BASE_DELAY, RATE_LIMIT_MAX_RETRIES, is_rate_limited, retry_after, wait_with_backoff,
};
use super::{OcrOutcome, OcrService, OcrSpan, PublishService, ServiceFuture, TranslateService};

/// OCR backend reached over HTTP. `OCR_BASE_URL` overrides the configured
/// endpoint.
#[derive(Debug, Clone)]
pub struct HttpOcr {
    endpoint: String,
}

impl HttpOcr {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: resolve_endpoint("OCR_BASE_URL", endpoint.into()),
        }
    }
}

impl OcrService for HttpOcr {
    fn recognize(&self, image_bytes: Vec<u8>, image_mime: &str) -> ServiceFuture<OcrOutcome> {
        let url = format!("{}/recognize", self.endpoint.trim_end_matches('/'));
        let body = json!({
            "image": BASE64.encode(&image_bytes),
            "mime": image_mime,
        });
        Box::pin(async move {
            let text = post_json("ocr", &url, &body).await?;
            parse_ocr_response(&text)
        })
    }
}

/// Translation backend reached over HTTP. `TRANSLATE_BASE_URL` overrides the
/// configured endpoint.
#[derive(Debug, Clone)]
pub struct HttpTranslator {
    endpoint: String,
    lang: String,
    source_lang: String,
}

impl HttpTranslator {
    pub fn new(
        endpoint: impl Into<String>,
        lang: impl Into<String>,
        source_lang: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: resolve_endpoint("TRANSLATE_BASE_URL", endpoint.into()),
            lang: lang.into(),
            source_lang: source_lang.into(),
        }
    }
}

impl TranslateService for HttpTranslator {
    fn translate(&self, text: &str) -> ServiceFuture<String> {
        let url = format!("{}/translate", self.endpoint.trim_end_matches('/'));
        let body = json!({
            "text": text,
            "lang": self.lang,
            "source_lang": self.source_lang,
        });
        Box::pin(async move {
            let text = post_json("translate", &url, &body).await?;
            let parsed: TranslateResponse = serde_json::from_str(&text)
                .map_err(|err| anyhow!("failed to parse translate response JSON: {}", err))?;
            Ok(parsed.text)
        })
    }
}

/// Image host used to turn a composited raster into a shareable URL.
/// `IMAGE_HOST_BASE_URL` overrides the configured endpoint.
#[derive(Debug, Clone)]
pub struct HttpImageHost {
    endpoint: String,
}

impl HttpImageHost {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: resolve_endpoint("IMAGE_HOST_BASE_URL", endpoint.into()),
        }
    }
}

impl PublishService for HttpImageHost {
    fn publish(&self, image_bytes: Vec<u8>, image_mime: &str) -> ServiceFuture<String> {
        let url = format!("{}/images", self.endpoint.trim_end_matches('/'));
        let body = json!({
            "image": BASE64.encode(&image_bytes),
            "mime": image_mime,
        });
        Box::pin(async move {
            let text = post_json("publish", &url, &body).await?;
            let parsed: PublishResponse = serde_json::from_str(&text)
                .map_err(|err| anyhow!("failed to parse publish response JSON: {}", err))?;
            Ok(parsed.url)
        })
    }
}

fn resolve_endpoint(env_key: &str, configured: String) -> String {
    std::env::var(env_key).unwrap_or(configured)
}

async fn post_json(service: &str, url: &str, body: &serde_json::Value) -> Result<String> {
    let client = reqwest::Client::new();
    let mut attempt = 0usize;
    let mut delay = RATE_LIMIT_BASE_DELAY;
    loop {
        attempt += 1;
        let response = client.post(url).json(body).send().await?;
        let status = response.status();
        let retry_after = retry_after(response.headers());
        let text = response.text().await.unwrap_or_default();
        if status.is_success() {
            return Ok(text);
        }
        if is_rate_limited(status, &text) && attempt < RATE_LIMIT_MAX_RETRIES {
            delay = wait_with_backoff(service, attempt, delay, retry_after).await;
            continue;
        }
        return Err(anyhow!(
            "{} service error ({}): {}",
            service,
            status,
            extract_error(&text).unwrap_or(text)
        ));
    }
}

fn extract_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<String>,
        message: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed.error.or(parsed.message)
}

fn parse_ocr_response(text: &str) -> Result<OcrOutcome> {
    let parsed: OcrResponse = serde_json::from_str(text)
        .map_err(|err| anyhow!("failed to parse ocr response JSON: {}", err))?;
    Ok(OcrOutcome {
        full_text: parsed.full_text.unwrap_or_default(),
        paragraphs: spans_from_wire(parsed.paragraphs),
        lines: spans_from_wire(parsed.lines),
        words: spans_from_wire(parsed.words),
    })
}

fn spans_from_wire(entries: Option<Vec<WireSpan>>) -> Vec<OcrSpan> {
    entries
        .unwrap_or_default()
        .into_iter()
        .filter(|span| span.bbox.x1 > span.bbox.x0 && span.bbox.y1 > span.bbox.y0)
        .map(|span| OcrSpan {
            text: span.text,
            bbox: BBox::new(span.bbox.x0, span.bbox.y0, span.bbox.x1, span.bbox.y1),
            conf: span.conf.unwrap_or(0.0),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    full_text: Option<String>,
    paragraphs: Option<Vec<WireSpan>>,
    lines: Option<Vec<WireSpan>>,
    words: Option<Vec<WireSpan>>,
}

#[derive(Debug, Deserialize)]
struct WireSpan {
    text: String,
    bbox: WireBBox,
    conf: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct WireBBox {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ocr_response_parses_granularities() {
        let payload = json!({
            "full_text": "안녕 하세요",
            "words": [
                {"text": "안녕", "bbox": {"x0": 10.0, "y0": 10.0, "x1": 40.0, "y1": 20.0}, "conf": 93.5},
                {"text": "하세요", "bbox": {"x0": 45.0, "y0": 12.0, "x1": 80.0, "y1": 22.0}}
            ]
        })
        .to_string();
        let outcome = parse_ocr_response(&payload).unwrap();
        assert_eq!(outcome.full_text, "안녕 하세요");
        assert!(outcome.paragraphs.is_empty());
        assert_eq!(outcome.words.len(), 2);
        assert_eq!(outcome.words[0].conf, 93.5);
        assert_eq!(outcome.words[1].conf, 0.0);
    }

    #[test]
    fn degenerate_boxes_are_dropped() {
        let payload = json!({
            "lines": [
                {"text": "ok", "bbox": {"x0": 0.0, "y0": 0.0, "x1": 10.0, "y1": 10.0}},
                {"text": "flat", "bbox": {"x0": 5.0, "y0": 5.0, "x1": 5.0, "y1": 10.0}}
            ]
        })
        .to_string();
        let outcome = parse_ocr_response(&payload).unwrap();
        assert_eq!(outcome.lines.len(), 1);
        assert_eq!(outcome.lines[0].text, "ok");
    }

    #[test]
    fn error_body_is_extracted() {
        assert_eq!(
            extract_error(r#"{"error": "boom"}"#).as_deref(),
            Some("boom")
        );
        assert_eq!(
            extract_error(r#"{"message": "nope"}"#).as_deref(),
            Some("nope")
        );
        assert!(extract_error("plain text").is_none());
    }
}
