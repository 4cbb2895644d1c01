use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub overlay_text_color: String,
    pub overlay_stroke_color: String,
    pub overlay_fill_color: String,
    pub overlay_font_family: Option<String>,
    pub overlay_font_path: Option<String>,
    pub text_heavy_font_size: f32,
    pub ocr_endpoint: String,
    pub translate_endpoint: String,
    pub image_host_endpoint: String,
    pub translation_threads: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            overlay_text_color: "#c40000".to_string(),
            overlay_stroke_color: "#c40000".to_string(),
            overlay_fill_color: "#ffffff".to_string(),
            overlay_font_family: None,
            overlay_font_path: None,
            text_heavy_font_size: 24.0,
            ocr_endpoint: "http://127.0.0.1:8601".to_string(),
            translate_endpoint: "http://127.0.0.1:8602".to_string(),
            image_host_endpoint: "http://127.0.0.1:8603".to_string(),
            translation_threads: 4,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    overlay: Option<OverlaySettings>,
    services: Option<ServiceSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlaySettings {
    text_color: Option<String>,
    stroke_color: Option<String>,
    fill_color: Option<String>,
    font_family: Option<String>,
    font_path: Option<String>,
    text_heavy_font_size: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceSettings {
    ocr_endpoint: Option<String>,
    translate_endpoint: Option<String>,
    image_host_endpoint: Option<String>,
    translation_threads: Option<usize>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();

    let embedded: SettingsFile = toml::from_str(DEFAULT_SETTINGS_TOML)
        .with_context(|| "failed to parse embedded settings")?;
    settings.merge(embedded);

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(overlay) = incoming.overlay {
            if let Some(value) = overlay.text_color {
                self.overlay_text_color = value;
            }
            if let Some(value) = overlay.stroke_color {
                self.overlay_stroke_color = value;
            }
            if let Some(value) = overlay.fill_color {
                self.overlay_fill_color = value;
            }
            if overlay.font_family.is_some() {
                self.overlay_font_family = overlay.font_family;
            }
            if overlay.font_path.is_some() {
                self.overlay_font_path = overlay.font_path;
            }
            if let Some(value) = overlay.text_heavy_font_size
                && value > 0.0
            {
                self.text_heavy_font_size = value;
            }
        }
        if let Some(services) = incoming.services {
            if let Some(value) = services.ocr_endpoint {
                self.ocr_endpoint = value;
            }
            if let Some(value) = services.translate_endpoint {
                self.translate_endpoint = value;
            }
            if let Some(value) = services.image_host_endpoint {
                self.image_host_endpoint = value;
            }
            if let Some(value) = services.translation_threads
                && value > 0
            {
                self.translation_threads = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn embedded_defaults_parse() {
        let settings = load_settings(None).unwrap();
        assert_eq!(settings.overlay_fill_color, "#ffffff");
        assert!(settings.text_heavy_font_size > 0.0);
        assert!(settings.translation_threads > 0);
    }

    #[test]
    fn extra_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[overlay]\ntext_color = \"#000000\"\n\n[services]\ntranslation_threads = 8"
        )
        .unwrap();
        let settings = load_settings(Some(file.path())).unwrap();
        assert_eq!(settings.overlay_text_color, "#000000");
        assert_eq!(settings.translation_threads, 8);
        assert_eq!(settings.overlay_fill_color, "#ffffff");
    }

    #[test]
    fn missing_extra_file_is_an_error() {
        assert!(load_settings(Some(Path::new("/nonexistent/settings.toml"))).is_err());
    }
}
