use crate::error::{HoHatchError, Result};
use crate::paths::AppPaths;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_LANG: &str = "en";
pub const SUPPORTED_LANGUAGES: [&str; 2] = ["en", "ja"];
pub const DEFAULT_OUTPUT_HEIGHT: u32 = 1024;

// Target game textures are 53:64 (width:height).
const ASPECT_WIDTH: u64 = 53;
const ASPECT_HEIGHT: u64 = 64;

/// Settings persisted in settings.json
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppSettings {
    pub language: String,
    pub last_image_dir: String,
    pub special_k_folder_path: String,
    pub texconv_executable_path: String,
    pub output_height: u32,
    pub last_active_view: String,
    pub theme: String,
}

impl AppSettings {
    /// First-run defaults derived from the per-user layout
    pub fn defaults(paths: &AppPaths) -> Self {
        let last_image_dir = std::env::current_dir()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            language: DEFAULT_LANG.to_string(),
            last_image_dir,
            special_k_folder_path: paths.default_special_k_dir().to_string_lossy().to_string(),
            texconv_executable_path: paths.default_texconv_path().to_string_lossy().to_string(),
            output_height: DEFAULT_OUTPUT_HEIGHT,
            last_active_view: "dump".to_string(),
            theme: "dark".to_string(),
        }
    }

    pub fn output_width(&self) -> u32 {
        (self.output_height as u64 * ASPECT_WIDTH / ASPECT_HEIGHT) as u32
    }

    /// (width, height) handed to texconv for DDS to JPEG
    pub fn output_dimensions(&self) -> (u32, u32) {
        (self.output_width(), self.output_height)
    }

    pub fn special_k_dir(&self) -> PathBuf {
        PathBuf::from(&self.special_k_folder_path)
    }

    pub fn texconv_path(&self) -> PathBuf {
        PathBuf::from(&self.texconv_executable_path)
    }

    /// Merge a partial update, leaving absent fields untouched
    pub fn merged(&self, patch: SettingsPatch) -> Self {
        Self {
            language: patch.language.unwrap_or_else(|| self.language.clone()),
            last_image_dir: patch.last_image_dir.unwrap_or_else(|| self.last_image_dir.clone()),
            special_k_folder_path: patch
                .special_k_folder_path
                .unwrap_or_else(|| self.special_k_folder_path.clone()),
            texconv_executable_path: patch
                .texconv_executable_path
                .unwrap_or_else(|| self.texconv_executable_path.clone()),
            output_height: patch.output_height.unwrap_or(self.output_height),
            last_active_view: patch
                .last_active_view
                .unwrap_or_else(|| self.last_active_view.clone()),
            theme: patch.theme.unwrap_or_else(|| self.theme.clone()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.output_height == 0 {
            return Err(HoHatchError::Config(
                "Output height must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial settings update. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default, deserialize_with = "path_value")]
    pub last_image_dir: Option<String>,
    #[serde(default, deserialize_with = "path_value")]
    pub special_k_folder_path: Option<String>,
    #[serde(default, deserialize_with = "path_value")]
    pub texconv_executable_path: Option<String>,
    #[serde(default, alias = "imageHeight")]
    pub output_height: Option<u32>,
    #[serde(default)]
    pub last_active_view: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
}

// Dialog results arrive either as a single path or as a list of paths.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn path_value<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<OneOrMany>::deserialize(deserializer)?;
    Ok(match value {
        Some(OneOrMany::One(path)) => Some(path),
        Some(OneOrMany::Many(paths)) => paths.into_iter().next(),
        None => None,
    })
}

/// Settings plus the derived values the settings page shows
#[derive(Debug, Clone, Serialize)]
pub struct SettingsView {
    #[serde(flatten)]
    pub settings: AppSettings,
    #[serde(rename = "imageHeight")]
    pub image_height: u32,
    #[serde(rename = "imageWidth")]
    pub image_width: u32,
    pub dump_folder_path: Option<String>,
    pub inject_folder_path: Option<String>,
}

/// Loads and persists `AppSettings` as a whole-file JSON document
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: AppSettings,
}

impl SettingsStore {
    /// Load from `path`, falling back to `defaults` when the file is absent or unreadable.
    /// Keys missing from the file keep their default value.
    pub fn load(path: &Path, defaults: AppSettings) -> Self {
        let settings = match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<SettingsPatch>(&content) {
                Ok(patch) => {
                    let mut merged = defaults.merged(patch);
                    if let Err(e) = merged.validate() {
                        log::warn!("{} in {}. Using default output height.", e, path.display());
                        merged.output_height = defaults.output_height;
                    }
                    merged
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    defaults
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No settings file at {}, using defaults", path.display());
                defaults
            }
            Err(e) => {
                log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                defaults
            }
        };

        Self {
            path: path.to_path_buf(),
            settings,
        }
    }

    pub fn get(&self) -> &AppSettings {
        &self.settings
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Merge, validate, persist and return the new settings
    pub fn update(&mut self, patch: SettingsPatch) -> Result<&AppSettings> {
        let updated = self.settings.merged(patch);
        updated.validate()?;
        write_settings(&self.path, &updated)?;
        self.settings = updated;
        Ok(&self.settings)
    }

    pub fn save(&self) -> Result<()> {
        write_settings(&self.path, &self.settings)
    }
}

fn write_settings(path: &Path, settings: &AppSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            HoHatchError::Config(format!("Failed to create settings directory: {}", e))
        })?;
    }

    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| HoHatchError::Config(format!("Failed to serialize settings: {}", e)))?;

    fs::write(path, json)
        .map_err(|e| HoHatchError::Config(format!("Failed to save settings.json: {}", e)))?;

    log::debug!("Settings written to {}", path.display());
    Ok(())
}
