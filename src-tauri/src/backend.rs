use crate::cache::DisplayCache;
use crate::conversion::ConversionPipeline;
use crate::discovery::{count_images, discover_images, discover_textures, ImageCounts, ImageInfo};
use crate::download::{self, UpdateInfo, APP_VERSION};
use crate::error::{ApiResult, HoHatchError, Message, Result};
use crate::file_ops::{self, BatchReport};
use crate::paths::AppPaths;
use crate::profile::{find_profile_dir, textures_dir, FolderKind, NO_UNIQUE_PROFILE};
use crate::scratch::{remove_dir_all_forced, Timing};
use crate::settings::{AppSettings, SettingsPatch, SettingsStore, SettingsView, SUPPORTED_LANGUAGES};
use crate::texconv::{ProcessRunner, TexconvRunner};
use parking_lot::Mutex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize)]
pub struct ImageList {
    pub images: Vec<ImageInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DisplayImage {
    pub src: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertedFile {
    pub message_key: String,
    pub output_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageKey {
    pub message_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TexconvInstalled {
    pub message: String,
    pub texconv_executable: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Validation {
    pub is_valid: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppVersion {
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LanguageData {
    pub language: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderPath {
    pub path: String,
}

const INVALID_SK_FOLDER: &str =
    "Invalid Special K Folder. 'SKIF.exe' not found or path does not exist.";
const DUMP_DIR_MISSING: &str = "Dump DDS directory not found.";
const INVALID_TEXCONV: &str =
    "Invalid Texconv 'texconv.exe' path. File not found or not executable.";

/// Every operation the frontend can invoke.
///
/// Settings are owned here and handed to collaborators per call; nothing
/// reads them from global state.
pub struct HoHatchBackend {
    paths: AppPaths,
    settings: Mutex<SettingsStore>,
    runner: Box<dyn TexconvRunner>,
    cache: DisplayCache,
    timing: Timing,
    http: reqwest::Client,
}

impl HoHatchBackend {
    /// Production backend under the user's local data directory
    pub fn from_system() -> Result<Self> {
        Self::new(AppPaths::from_system()?, Box::new(ProcessRunner), Timing::default())
    }

    pub fn new(paths: AppPaths, runner: Box<dyn TexconvRunner>, timing: Timing) -> Result<Self> {
        paths.ensure_dirs()?;
        let settings = SettingsStore::load(&paths.settings_file(), AppSettings::defaults(&paths));
        let cache = DisplayCache::new(paths.cache_dir());

        let backend = Self {
            settings: Mutex::new(settings),
            runner,
            cache,
            timing,
            http: download::http_client()?,
            paths,
        };

        // Leftovers from a previous run are never reused
        if let Err(e) = backend.reset_temp_dirs() {
            log::error!("Failed to reset temp directories at startup: {}", e);
        }
        log::info!(
            "Backend initialized. Config dir: {}",
            backend.paths.config_dir().display()
        );
        Ok(backend)
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    /// Snapshot of the current settings
    pub fn settings(&self) -> AppSettings {
        self.settings.lock().get().clone()
    }

    fn pipeline(&self, settings: &AppSettings) -> ConversionPipeline<'_> {
        ConversionPipeline::new(
            self.runner.as_ref(),
            settings.texconv_path(),
            self.paths.conversion_tmp_dir(),
            self.timing,
        )
    }

    fn update_settings(&self, patch: SettingsPatch) -> Result<AppSettings> {
        let mut store = self.settings.lock();
        Ok(store.update(patch)?.clone())
    }

    pub fn folder_path(&self, kind: FolderKind) -> Option<PathBuf> {
        let settings = self.settings();
        find_profile_dir(&settings.special_k_dir()).map(|profile| kind.textures_dir(&profile))
    }

    pub fn dump_folder_path(&self) -> Option<PathBuf> {
        self.folder_path(FolderKind::Dump)
    }

    pub fn inject_folder_path(&self) -> Option<PathBuf> {
        self.folder_path(FolderKind::Inject)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.paths.cache_dir()
    }

    pub fn log_dir(&self) -> PathBuf {
        self.paths.log_dir()
    }

    /// True when the configured texconv is not usable
    pub fn texconv_missing(&self) -> bool {
        !is_executable_file(&self.settings().texconv_path())
    }

    // ---- image listing ----

    pub fn get_image_list(&self, folder_type: &str, use_hash_check: bool) -> ApiResult<ImageList> {
        self.image_list(folder_type, use_hash_check).into()
    }

    fn image_list(&self, folder_type: &str, use_hash_check: bool) -> Result<ImageList> {
        let kind = FolderKind::from_str(folder_type)?;
        let dir = textures_dir(&self.settings().special_k_dir(), kind)?;

        let images = discover_images(&dir, kind)
            .into_iter()
            .map(|mut info| {
                if let Some(src) = self.cache.cached_preview(Path::new(&info.path), use_hash_check) {
                    info.src = src;
                }
                info
            })
            .collect();
        Ok(ImageList { images })
    }

    pub fn get_image_counts(&self) -> ApiResult<ImageCounts> {
        let settings = self.settings();
        match find_profile_dir(&settings.special_k_dir()) {
            Some(profile) => ApiResult::ok(ImageCounts {
                dump_count: count_images(&FolderKind::Dump.textures_dir(&profile), FolderKind::Dump),
                inject_count: count_images(
                    &FolderKind::Inject.textures_dir(&profile),
                    FolderKind::Inject,
                ),
            }),
            None => ApiResult::err_with(ImageCounts::default(), NO_UNIQUE_PROFILE),
        }
    }

    // ---- conversion ----

    pub fn convert_dds_for_display(&self, dds_path: &str) -> ApiResult<DisplayImage> {
        let settings = self.settings();
        let (width, height) = settings.output_dimensions();
        self.cache
            .get_displayable_image(&self.pipeline(&settings), Path::new(dds_path), width, height)
            .map(|src| DisplayImage { src })
            .into()
    }

    fn convert_to_folder(&self, settings: &AppSettings, dds_path: &str, output_folder: &str) -> Result<PathBuf> {
        let dds = Path::new(dds_path);
        let stem = dds
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let dest = Path::new(output_folder).join(format!("{}.jpg", stem));
        let (width, height) = settings.output_dimensions();
        self.pipeline(settings).dds_to_jpg(dds, &dest, width, height)
    }

    pub fn convert_single_dds_to_jpg(&self, dds_path: &str, output_folder: &str) -> ApiResult<ConvertedFile> {
        let settings = self.settings();
        match self.convert_to_folder(&settings, dds_path, output_folder) {
            Ok(path) => ApiResult::ok(ConvertedFile {
                message_key: "jpg_conversion_complete".to_string(),
                output_path: path.to_string_lossy().to_string(),
            }),
            Err(e) => {
                log::error!("Single DDS to JPG conversion failed: {}", e);
                ApiResult::err(format!("JPG Conversion Failed: {}", e))
            }
        }
    }

    pub fn batch_download_selected_dds_as_jpg(&self, dds_paths: &[String], output_folder: &str) -> ApiResult<Message> {
        let settings = self.settings();
        let report = BatchReport::run(dds_paths, |path| {
            self.convert_to_folder(&settings, path, output_folder).map(|_| ())
        });
        batch_result(report, "Failed to download selected images", "Selected images downloaded successfully.")
    }

    /// Convert every texture in the dump folder into `output_folder`
    pub fn download_all_dump_as_jpg(&self, output_folder: &str) -> ApiResult<MessageKey> {
        let settings = self.settings();
        let dump_dir = match textures_dir(&settings.special_k_dir(), FolderKind::Dump) {
            Ok(dir) => dir,
            Err(e) => return ApiResult::err(e.to_string()),
        };
        if !dump_dir.is_dir() {
            return ApiResult::err(DUMP_DIR_MISSING);
        }

        let textures: Vec<String> = discover_textures(&dump_dir, FolderKind::Dump)
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect();
        log::info!(
            "Converting {} dump textures to {}",
            textures.len(),
            output_folder
        );

        let report = BatchReport::run(&textures, |path| {
            self.convert_to_folder(&settings, path, output_folder).map(|_| ())
        });
        match report.error_summary("Issue during batch dump JPG conversion") {
            Some(summary) => {
                log::error!("{}", summary);
                ApiResult::err(summary).with_error_key("batch_dump_jpg_failed")
            }
            None => ApiResult::ok(MessageKey {
                message_key: "batch_dump_jpg_complete".to_string(),
            }),
        }
    }

    pub fn replace_dds(&self, target_dds_path: &str, replacement_image_path: &str, is_dump_image: bool) -> ApiResult<ConvertedFile> {
        match self.replace(Path::new(target_dds_path), Path::new(replacement_image_path), is_dump_image) {
            Ok(path) => ApiResult::ok(ConvertedFile {
                message_key: "replace_conversion_complete".to_string(),
                output_path: path.to_string_lossy().to_string(),
            }),
            Err(e) => {
                log::error!("DDS replacement failed: {}", e);
                ApiResult::err(e.to_string()).with_error_key("replace_conversion_failed")
            }
        }
    }

    fn replace(&self, target: &Path, replacement: &Path, is_dump: bool) -> Result<PathBuf> {
        log::info!(
            "Replacing {} with {} (dump: {})",
            target.display(),
            replacement.display(),
            is_dump
        );
        let settings = self.settings();
        let inject_dir = textures_dir(&settings.special_k_dir(), FolderKind::Inject)?;
        let output = self
            .pipeline(&settings)
            .replace_texture(target, replacement, &inject_dir, is_dump)?;

        if let Some(parent) = replacement.parent() {
            let patch = SettingsPatch {
                last_image_dir: Some(parent.to_string_lossy().to_string()),
                ..Default::default()
            };
            if let Err(e) = self.update_settings(patch) {
                log::warn!("Could not remember last image directory: {}", e);
            }
        }
        Ok(output)
    }

    // ---- deletion ----

    pub fn delete_dds_file(&self, dds_path: &str) -> ApiResult<Message> {
        file_ops::delete_dds_file(Path::new(dds_path))
            .map(|_| Message::new("Image deleted successfully."))
            .into()
    }

    pub fn batch_delete_selected_dds_files(&self, dds_paths: &[String]) -> ApiResult<Message> {
        let report = file_ops::batch_delete(dds_paths);
        batch_result(report, "Failed to delete selected images", "Selected images deleted successfully.")
    }

    // ---- settings ----

    pub fn get_settings(&self) -> ApiResult<SettingsView> {
        let settings = self.settings();
        ApiResult::ok(SettingsView {
            image_height: settings.output_height,
            image_width: settings.output_width(),
            dump_folder_path: self.dump_folder_path().map(|p| p.to_string_lossy().to_string()),
            inject_folder_path: self.inject_folder_path().map(|p| p.to_string_lossy().to_string()),
            settings,
        })
    }

    pub fn save_settings(&self, patch: SettingsPatch) -> ApiResult<MessageKey> {
        self.update_settings(patch)
            .map(|_| MessageKey {
                message_key: "settings_saved".to_string(),
            })
            .into()
    }

    pub fn get_language_data(&self, lang: Option<&str>) -> ApiResult<LanguageData> {
        let language = lang
            .map(str::to_string)
            .unwrap_or_else(|| self.settings().language);
        ApiResult::ok(LanguageData { language })
    }

    pub fn set_language(&self, lang: &str) -> ApiResult<MessageKey> {
        if !SUPPORTED_LANGUAGES.contains(&lang) {
            return ApiResult::err("Language not supported.");
        }
        self.update_settings(SettingsPatch {
            language: Some(lang.to_string()),
            ..Default::default()
        })
        .map(|_| MessageKey {
            message_key: "language_set_success".to_string(),
        })
        .into()
    }

    pub fn get_default_sk_path(&self) -> ApiResult<FolderPath> {
        ApiResult::ok(FolderPath {
            path: self.paths.default_special_k_dir().to_string_lossy().to_string(),
        })
    }

    // ---- texconv and downloads ----

    pub async fn download_texconv(&self) -> ApiResult<TexconvInstalled> {
        self.install_texconv(download::TEXCONV_URL).await.into()
    }

    /// The download lands on a staging file first, so a failure keeps the old binary
    async fn install_texconv(&self, url: &str) -> Result<TexconvInstalled> {
        let target = self.paths.default_texconv_path();

        download::download_file(&self.http, url, &target)
            .await
            .map_err(|e| HoHatchError::Download(format!("Failed to download Texconv: {}", e)))?;
        mark_executable(&target)?;

        let path = target.to_string_lossy().to_string();
        self.update_settings(SettingsPatch {
            texconv_executable_path: Some(path.clone()),
            ..Default::default()
        })?;

        Ok(TexconvInstalled {
            message: "Texconv downloaded successfully.".to_string(),
            texconv_executable: path,
        })
    }

    pub fn delete_texconv(&self) -> ApiResult<Message> {
        let target = self.paths.default_texconv_path();
        if !target.exists() {
            return ApiResult::ok(Message::new("Texconv not found, nothing to delete."));
        }
        remove_if_exists(&target)
            .map(|_| Message::new("Texconv deleted successfully."))
            .map_err(|e| HoHatchError::FileSystem(format!("Failed to delete texconv: {}", e)))
            .into()
    }

    pub async fn download_special_k(&self) -> ApiResult<Message> {
        download::download_file(&self.http, download::SPECIAL_K_URL, &self.paths.special_k_installer_path())
            .await
            .map(|_| Message::new("Special K downloaded successfully."))
            .map_err(|e| HoHatchError::Download(format!("Failed to download Special K: {}", e)))
            .into()
    }

    pub async fn check_for_updates(&self) -> ApiResult<UpdateInfo> {
        download::check_for_updates(&self.http, download::LATEST_RELEASE_URL)
            .await
            .into()
    }

    pub fn get_app_version(&self) -> ApiResult<AppVersion> {
        ApiResult::ok(AppVersion {
            version: APP_VERSION.to_string(),
        })
    }

    // ---- validation ----

    pub fn validate_sk_folder(&self, path: &str) -> ApiResult<Validation> {
        let dir = Path::new(path);
        let is_valid = !path.is_empty() && dir.is_dir() && dir.join("SKIF.exe").is_file();
        ApiResult::ok(validation(is_valid, INVALID_SK_FOLDER))
    }

    pub fn validate_texconv_executable(&self, path: &str) -> ApiResult<Validation> {
        let is_valid = !path.is_empty() && is_executable_file(Path::new(path));
        ApiResult::ok(validation(is_valid, INVALID_TEXCONV))
    }

    // ---- maintenance ----

    fn reset_temp_dirs(&self) -> Result<()> {
        let base = self.paths.temp_base_dir();
        self.timing
            .dir_removal
            .run(&format!("Removing {}", base.display()), || remove_dir_all_forced(&base))
            .map_err(|e| {
                HoHatchError::FileSystem(format!("Failed to clean temporary directories: {}", e))
            })?;
        for dir in self.paths.temp_subdirs() {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    pub fn clean_temp_directories(&self) -> ApiResult<Message> {
        self.reset_temp_dirs()
            .map(|_| Message::new("Temporary directories cleaned successfully."))
            .into()
    }

    pub fn clear_cache(&self) -> ApiResult<Message> {
        self.cache
            .clear(&self.timing.dir_removal)
            .map(|_| Message::new("Cache cleared successfully."))
            .into()
    }
}

fn batch_result(report: BatchReport, failure_prefix: &str, success_message: &str) -> ApiResult<Message> {
    match report.error_summary(failure_prefix) {
        Some(summary) => {
            log::error!("{}", summary);
            ApiResult::err(summary)
        }
        None => ApiResult::ok(Message::new(success_message)),
    }
}

fn validation(is_valid: bool, invalid_message: &str) -> Validation {
    Validation {
        is_valid,
        message: if is_valid {
            "Valid".to_string()
        } else {
            invalid_message.to_string()
        },
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> Result<()> {
    Ok(())
}
