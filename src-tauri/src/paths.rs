use crate::error::{HoHatchError, Result};
use std::path::{Path, PathBuf};

pub const APP_DIR_NAME: &str = "HoHatch";
pub const SETTINGS_FILE: &str = "settings.json";
pub const TEXCONV_FILE: &str = "texconv.exe";
pub const SPECIAL_K_INSTALLER_FILE: &str = "SpecialK.exe";

const CACHE_DIR: &str = "cache";
const TEMP_DIR: &str = "temp";
const LOGS_DIR: &str = "logs";
const GENERAL_TMP_DIR: &str = "dds_convert_temp";
const CONVERSION_TMP_DIR: &str = "dds_conversion_temp";
const COMPARE_CACHE_DIR: &str = "dds_compare_cache";

/// Per-user directory layout.
///
/// Everything lives below one config directory so tests can point the whole
/// backend at a temporary root.
#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    default_special_k_dir: PathBuf,
}

impl AppPaths {
    /// Layout under the platform's local data directory
    pub fn from_system() -> Result<Self> {
        let data_dir = dirs::data_local_dir().ok_or_else(|| {
            HoHatchError::Config("Could not determine the local data directory".to_string())
        })?;
        Ok(Self {
            config_dir: data_dir.join(APP_DIR_NAME),
            default_special_k_dir: default_special_k_dir(&data_dir),
        })
    }

    /// Same layout under an arbitrary root
    pub fn with_root(root: &Path) -> Self {
        Self {
            config_dir: root.join(APP_DIR_NAME),
            default_special_k_dir: default_special_k_dir(root),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILE)
    }

    pub fn default_texconv_path(&self) -> PathBuf {
        self.config_dir.join(TEXCONV_FILE)
    }

    pub fn special_k_installer_path(&self) -> PathBuf {
        self.config_dir.join(SPECIAL_K_INSTALLER_FILE)
    }

    pub fn default_special_k_dir(&self) -> &Path {
        &self.default_special_k_dir
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.config_dir.join(CACHE_DIR)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.config_dir.join(LOGS_DIR)
    }

    pub fn temp_base_dir(&self) -> PathBuf {
        self.config_dir.join(TEMP_DIR)
    }

    pub fn conversion_tmp_dir(&self) -> PathBuf {
        self.temp_base_dir().join(CONVERSION_TMP_DIR)
    }

    /// Subdirectories recreated after every temp cleanup
    pub fn temp_subdirs(&self) -> [PathBuf; 3] {
        let base = self.temp_base_dir();
        [
            base.join(GENERAL_TMP_DIR),
            base.join(CONVERSION_TMP_DIR),
            base.join(COMPARE_CACHE_DIR),
        ]
    }

    /// Create the config, cache and log directories
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.config_dir.clone(), self.cache_dir(), self.log_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                HoHatchError::FileSystem(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }
}

// Special K installs itself under `<local data>/Programs/Special K`.
fn default_special_k_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("Programs").join("Special K")
}
