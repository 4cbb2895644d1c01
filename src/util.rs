use anyhow::{Result, anyhow};
use std::path::Path;

pub(crate) fn collapse_whitespace(value: &str) -> String {
    let mut out = String::new();
    let mut last_space = false;
    for ch in value.chars() {
        if ch.is_whitespace() {
            if !last_space && !out.is_empty() {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.push(ch);
            last_space = false;
        }
    }
    out.trim_end().to_string()
}

pub(crate) fn sniff_image_mime(bytes: &[u8], path: Option<&Path>) -> Result<String> {
    if let Some(kind) = infer::get(bytes) {
        let detected = kind.mime_type();
        if detected.starts_with("image/") {
            return Ok(detected.to_string());
        }
        return Err(anyhow!("input is not an image (detected '{}')", detected));
    }

    if let Some(ext) = extension_lower(path)
        && let Some(mime) = image_mime_from_extension(&ext)
    {
        return Ok(mime.to_string());
    }

    Err(anyhow!(
        "unable to detect image mime for '{}'",
        path.map(|value| value.display().to_string())
            .unwrap_or_else(|| "stdin".to_string())
    ))
}

fn extension_lower(path: Option<&Path>) -> Option<String> {
    path.and_then(|path| path.extension())
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
}

fn image_mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_whitespace_folds_runs() {
        assert_eq!(collapse_whitespace("  안녕 \t 하세요\n"), "안녕 하세요");
        assert_eq!(collapse_whitespace(""), "");
    }

    #[test]
    fn sniff_falls_back_to_extension() {
        let mime = sniff_image_mime(b"", Some(Path::new("photo.JPG"))).unwrap();
        assert_eq!(mime, "image/jpeg");
    }

    #[test]
    fn sniff_detects_png_magic() {
        let bytes = [0x89u8, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let mime = sniff_image_mime(&bytes, None).unwrap();
        assert_eq!(mime, "image/png");
    }
}
