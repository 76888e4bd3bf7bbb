use std::path::{Path, PathBuf};

use crate::prompt::{BackgroundOptions, FillMode, HexColor};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

const SETTINGS_FILE: &str = "backdrop_settings.cfg";

/// Application settings that persist across sessions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppSettings {
    /// Gemini API key. Empty = take it from the environment.
    pub api_key: String,
    pub model: String,
    /// REST base URL, without the `/models/...` suffix
    pub endpoint: String,
    pub request_timeout_secs: u64,

    // Background picker defaults
    pub solid_color: HexColor,
    pub gradient_start: HexColor,
    pub gradient_end: HexColor,

    /// Ask the model for a subject mask as soon as an image is uploaded
    pub auto_mask_on_upload: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        let background = BackgroundOptions::default();
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            solid_color: background.solid,
            gradient_start: background.gradient_top,
            gradient_end: background.gradient_bottom,
            auto_mask_on_upload: true,
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/backdrop/backdrop_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\Backdrop\backdrop_settings.cfg
    /// On macOS:   ~/Library/Application Support/Backdrop/backdrop_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("backdrop");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .unwrap_or_default();
            let config_dir = PathBuf::from(appdata).join("Backdrop");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("Backdrop");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join(SETTINGS_FILE)))
        }
    }

    /// Load settings from the default location, then apply environment
    /// overrides. Missing or corrupt files yield defaults.
    pub fn load() -> Self {
        let mut s = Self::settings_path()
            .map(|p| Self::load_from(&p))
            .unwrap_or_default();
        s.apply_env(|key| std::env::var(key).ok());
        s
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Parse `key=value` lines. Unknown keys are ignored and malformed values
    /// keep their defaults.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "api_key" => s.api_key = val.to_string(),
                "model" => {
                    if !val.is_empty() {
                        s.model = val.to_string();
                    }
                }
                "endpoint" => {
                    if !val.is_empty() {
                        s.endpoint = val.to_string();
                    }
                }
                "request_timeout_secs" => {
                    if let Ok(v) = val.parse::<u64>() {
                        s.request_timeout_secs = v.clamp(1, 3600);
                    }
                }
                "solid_color" => {
                    if let Some(c) = HexColor::parse(val) {
                        s.solid_color = c;
                    }
                }
                "gradient_start" => {
                    if let Some(c) = HexColor::parse(val) {
                        s.gradient_start = c;
                    }
                }
                "gradient_end" => {
                    if let Some(c) = HexColor::parse(val) {
                        s.gradient_end = c;
                    }
                }
                "auto_mask_on_upload" => s.auto_mask_on_upload = val == "true",
                _ => {}
            }
        }
        s
    }

    /// Fill in the API key from `GEMINI_API_KEY`, then `API_KEY`, when the
    /// settings file has none.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if !self.api_key.trim().is_empty() {
            return;
        }
        for var in ["GEMINI_API_KEY", "API_KEY"] {
            if let Some(key) = lookup(var).filter(|k| !k.trim().is_empty()) {
                self.api_key = key.trim().to_string();
                return;
            }
        }
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "api_key={}\n\
             model={}\n\
             endpoint={}\n\
             request_timeout_secs={}\n\
             solid_color={}\n\
             gradient_start={}\n\
             gradient_end={}\n\
             auto_mask_on_upload={}\n",
            self.api_key,
            self.model,
            self.endpoint,
            self.request_timeout_secs,
            self.solid_color,
            self.gradient_start,
            self.gradient_end,
            self.auto_mask_on_upload,
        )
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_to(&path) {
            log::warn!("[Settings] could not write {}: {}", path.display(), e);
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_config_string())
    }

    /// Background picker state for a fresh session (mode transparent).
    pub fn background_options(&self) -> BackgroundOptions {
        BackgroundOptions {
            mode: FillMode::Transparent,
            solid: self.solid_color,
            gradient_top: self.gradient_start,
            gradient_bottom: self.gradient_end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = AppSettings::default();
        assert_eq!(s.model, "gemini-2.5-flash-image-preview");
        assert_eq!(s.request_timeout_secs, 120);
        assert_eq!(s.solid_color.to_string(), "#FFFFFF");
        assert_eq!(s.gradient_start.to_string(), "#4A90E2");
        assert_eq!(s.gradient_end.to_string(), "#9013FE");
        assert!(s.auto_mask_on_upload);
    }

    #[test]
    fn parse_reads_known_keys_and_ignores_junk() {
        let s = AppSettings::parse(
            "# comment\n\
             api_key = abc123\n\
             request_timeout_secs=30\n\
             solid_color=#000000\n\
             gradient_end=not-a-colour\n\
             auto_mask_on_upload=false\n\
             theme=dark\n\
             garbage line\n",
        );
        assert_eq!(s.api_key, "abc123");
        assert_eq!(s.request_timeout_secs, 30);
        assert_eq!(s.solid_color, HexColor([0, 0, 0]));
        assert_eq!(s.gradient_end, AppSettings::default().gradient_end);
        assert!(!s.auto_mask_on_upload);
        assert_eq!(s.model, DEFAULT_MODEL);
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let mut s = AppSettings::default();
        s.api_key = "k".into();
        s.gradient_start = HexColor([1, 2, 3]);
        s.auto_mask_on_upload = false;
        s.save_to(&path).unwrap();
        assert_eq!(AppSettings::load_from(&path), s);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = AppSettings::load_from(&dir.path().join("nope.cfg"));
        assert_eq!(s, AppSettings::default());
    }

    #[test]
    fn env_key_fills_only_when_file_has_none() {
        let env = |k: &str| match k {
            "GEMINI_API_KEY" => Some("from-gemini".to_string()),
            "API_KEY" => Some("from-api".to_string()),
            _ => None,
        };
        let mut s = AppSettings::default();
        s.apply_env(env);
        assert_eq!(s.api_key, "from-gemini");

        let mut s = AppSettings::default();
        s.apply_env(|k| (k == "API_KEY").then(|| "fallback".to_string()));
        assert_eq!(s.api_key, "fallback");

        let mut s = AppSettings::parse("api_key=file");
        s.apply_env(env);
        assert_eq!(s.api_key, "file");
    }

    #[test]
    fn background_options_start_transparent() {
        let mut s = AppSettings::default();
        s.solid_color = HexColor([9, 9, 9]);
        let opts = s.background_options();
        assert_eq!(opts.mode, FillMode::Transparent);
        assert_eq!(opts.solid, HexColor([9, 9, 9]));
    }
}
