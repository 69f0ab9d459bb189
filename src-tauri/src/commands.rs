use crate::backend::{
    AppVersion, ConvertedFile, DisplayImage, FolderPath, HoHatchBackend, ImageList, LanguageData,
    MessageKey, TexconvInstalled, Validation,
};
use crate::discovery::ImageCounts;
use crate::download::UpdateInfo;
use crate::error::{ApiResult, Message};
use crate::settings::{SettingsPatch, SettingsView};
use std::path::PathBuf;
use tauri::{AppHandle, State};
use tauri_plugin_opener::OpenerExt;

type CommandResult<T> = Result<ApiResult<T>, String>;

/// Textures in the dump or inject folder of the active profile
#[tauri::command]
pub async fn get_image_list(
    folder_type: String,
    use_hash_check: Option<bool>,
    state: State<'_, HoHatchBackend>,
) -> CommandResult<ImageList> {
    Ok(state.get_image_list(&folder_type, use_hash_check.unwrap_or(false)))
}

#[tauri::command]
pub async fn get_image_counts(state: State<'_, HoHatchBackend>) -> CommandResult<ImageCounts> {
    Ok(state.get_image_counts())
}

#[tauri::command]
pub async fn convert_dds_for_display(
    dds_path: String,
    state: State<'_, HoHatchBackend>,
) -> CommandResult<DisplayImage> {
    Ok(state.convert_dds_for_display(&dds_path))
}

#[tauri::command]
pub async fn convert_single_dds_to_jpg(
    dds_path: String,
    output_folder: String,
    state: State<'_, HoHatchBackend>,
) -> CommandResult<ConvertedFile> {
    Ok(state.convert_single_dds_to_jpg(&dds_path, &output_folder))
}

#[tauri::command]
pub async fn replace_dds(
    target_dds_path: String,
    replacement_image_path: String,
    is_dump_image: bool,
    state: State<'_, HoHatchBackend>,
) -> CommandResult<ConvertedFile> {
    Ok(state.replace_dds(&target_dds_path, &replacement_image_path, is_dump_image))
}

#[tauri::command]
pub async fn batch_download_selected_dds_as_jpg(
    dds_paths: Vec<String>,
    output_folder: String,
    state: State<'_, HoHatchBackend>,
) -> CommandResult<Message> {
    Ok(state.batch_download_selected_dds_as_jpg(&dds_paths, &output_folder))
}

#[tauri::command]
pub async fn download_all_dump_as_jpg(
    output_folder: String,
    state: State<'_, HoHatchBackend>,
) -> CommandResult<MessageKey> {
    Ok(state.download_all_dump_as_jpg(&output_folder))
}

#[tauri::command]
pub async fn delete_dds_file(
    dds_path: String,
    state: State<'_, HoHatchBackend>,
) -> CommandResult<Message> {
    Ok(state.delete_dds_file(&dds_path))
}

#[tauri::command]
pub async fn batch_delete_selected_dds_files(
    dds_paths: Vec<String>,
    state: State<'_, HoHatchBackend>,
) -> CommandResult<Message> {
    Ok(state.batch_delete_selected_dds_files(&dds_paths))
}

#[tauri::command]
pub async fn get_settings(state: State<'_, HoHatchBackend>) -> CommandResult<SettingsView> {
    Ok(state.get_settings())
}

/// Partial update; unknown keys are ignored
#[tauri::command]
pub async fn save_settings(
    settings: SettingsPatch,
    state: State<'_, HoHatchBackend>,
) -> CommandResult<MessageKey> {
    Ok(state.save_settings(settings))
}

#[tauri::command]
pub async fn download_texconv(state: State<'_, HoHatchBackend>) -> CommandResult<TexconvInstalled> {
    Ok(state.download_texconv().await)
}

#[tauri::command]
pub async fn delete_texconv(state: State<'_, HoHatchBackend>) -> CommandResult<Message> {
    Ok(state.delete_texconv())
}

#[tauri::command]
pub async fn download_special_k(state: State<'_, HoHatchBackend>) -> CommandResult<Message> {
    Ok(state.download_special_k().await)
}

#[tauri::command]
pub async fn validate_sk_folder(
    path: String,
    state: State<'_, HoHatchBackend>,
) -> CommandResult<Validation> {
    Ok(state.validate_sk_folder(&path))
}

#[tauri::command]
pub async fn validate_texconv_executable(
    path: String,
    state: State<'_, HoHatchBackend>,
) -> CommandResult<Validation> {
    Ok(state.validate_texconv_executable(&path))
}

#[tauri::command]
pub async fn clean_temp_directories(state: State<'_, HoHatchBackend>) -> CommandResult<Message> {
    Ok(state.clean_temp_directories())
}

#[tauri::command]
pub async fn clear_cache(state: State<'_, HoHatchBackend>) -> CommandResult<Message> {
    Ok(state.clear_cache())
}

#[tauri::command]
pub async fn check_for_updates(state: State<'_, HoHatchBackend>) -> CommandResult<UpdateInfo> {
    Ok(state.check_for_updates().await)
}

#[tauri::command]
pub async fn get_app_version(state: State<'_, HoHatchBackend>) -> CommandResult<AppVersion> {
    Ok(state.get_app_version())
}

#[tauri::command]
pub async fn get_language_data(
    lang: Option<String>,
    state: State<'_, HoHatchBackend>,
) -> CommandResult<LanguageData> {
    Ok(state.get_language_data(lang.as_deref()))
}

#[tauri::command]
pub async fn set_language(lang: String, state: State<'_, HoHatchBackend>) -> CommandResult<MessageKey> {
    Ok(state.set_language(&lang))
}

#[tauri::command]
pub async fn get_default_sk_path(state: State<'_, HoHatchBackend>) -> CommandResult<FolderPath> {
    Ok(state.get_default_sk_path())
}

// Opens a directory in the system file manager, creating it first
fn open_dir(app: &AppHandle, dir: Option<PathBuf>, label: &str) -> ApiResult<Message> {
    let Some(dir) = dir else {
        return ApiResult::err(format!("{} folder is not available.", label));
    };
    if let Err(e) = std::fs::create_dir_all(&dir) {
        return ApiResult::err(format!("Failed to create {}: {}", dir.display(), e));
    }

    match app
        .opener()
        .open_path(dir.to_string_lossy().to_string(), None::<&str>)
    {
        Ok(()) => ApiResult::ok(Message::new(format!("Opened {}", dir.display()))),
        Err(e) => {
            log::error!("Failed to open {}: {}", dir.display(), e);
            ApiResult::err(format!("Failed to open folder: {}", e))
        }
    }
}

#[tauri::command]
pub async fn open_dump_folder(app: AppHandle, state: State<'_, HoHatchBackend>) -> CommandResult<Message> {
    Ok(open_dir(&app, state.dump_folder_path(), "Dump"))
}

#[tauri::command]
pub async fn open_inject_folder(app: AppHandle, state: State<'_, HoHatchBackend>) -> CommandResult<Message> {
    Ok(open_dir(&app, state.inject_folder_path(), "Inject"))
}

#[tauri::command]
pub async fn open_cache_folder(app: AppHandle, state: State<'_, HoHatchBackend>) -> CommandResult<Message> {
    Ok(open_dir(&app, Some(state.cache_dir()), "Cache"))
}

#[tauri::command]
pub async fn open_log_folder(app: AppHandle, state: State<'_, HoHatchBackend>) -> CommandResult<Message> {
    Ok(open_dir(&app, Some(state.log_dir()), "Log"))
}
