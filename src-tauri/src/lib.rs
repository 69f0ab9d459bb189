pub mod backend;
pub mod cache;
pub mod checksum;
pub mod conversion;
pub mod discovery;
pub mod download;
pub mod error;
pub mod file_ops;
pub mod image_handler;
pub mod paths;
pub mod profile;
pub mod scratch;
pub mod settings;
pub mod texconv;

#[cfg(feature = "desktop")]
mod commands;

#[cfg(test)]
mod test_support;

pub use backend::HoHatchBackend;
pub use error::{ApiResult, HoHatchError, Result};
pub use paths::AppPaths;
pub use settings::{AppSettings, SettingsPatch};

use std::fs;
use std::path::Path;

pub const LOG_FILE: &str = "latest.log";

/// Route `log` output to stderr and `<log_dir>/latest.log`.
///
/// The previous run's log is discarded. Level comes from `RUST_LOG`, default `info`.
pub fn init_logging(log_dir: &Path) {
    if let Err(e) = fs::create_dir_all(log_dir) {
        eprintln!("Failed to create log directory at {:?}: {}", log_dir, e);
    }

    let log_file_path = log_dir.join(LOG_FILE);
    if log_file_path.exists() {
        let _ = fs::remove_file(&log_file_path);
    }

    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info);

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    match fern::log_file(&log_file_path) {
        Ok(file) => dispatch = dispatch.chain(file),
        Err(e) => eprintln!(
            "Failed to open log file at {:?}: {}. Logging to console only.",
            log_file_path, e
        ),
    }

    if let Err(e) = dispatch.apply() {
        eprintln!("Failed to apply logger configuration: {}", e);
    } else {
        log::info!("HoHatch {} starting", download::APP_VERSION);
        log::info!("Log file at {}", log_file_path.display());
    }
}

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use commands::*;
    use tauri::Manager;

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let paths = AppPaths::from_system()?;
            init_logging(&paths.log_dir());

            let backend = HoHatchBackend::new(
                paths,
                Box::new(texconv::ProcessRunner),
                scratch::Timing::default(),
            )?;
            app.manage(backend);

            // First launch: fetch texconv in the background
            let handle = app.handle().clone();
            tauri::async_runtime::spawn(async move {
                let backend = handle.state::<HoHatchBackend>();
                if !backend.texconv_missing() {
                    return;
                }
                log::info!("texconv not found, downloading");
                let result = backend.download_texconv().await;
                if !result.success {
                    log::error!(
                        "Automatic texconv download failed: {}",
                        result.error_message().unwrap_or_default()
                    );
                }
            });

            #[cfg(debug_assertions)]
            {
                if let Some(window) = app.get_webview_window("main") {
                    window.open_devtools();
                }
            }

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            get_image_list,
            get_image_counts,
            convert_dds_for_display,
            convert_single_dds_to_jpg,
            replace_dds,
            batch_download_selected_dds_as_jpg,
            download_all_dump_as_jpg,
            delete_dds_file,
            batch_delete_selected_dds_files,
            get_settings,
            save_settings,
            download_texconv,
            delete_texconv,
            download_special_k,
            validate_sk_folder,
            validate_texconv_executable,
            clean_temp_directories,
            clear_cache,
            check_for_updates,
            get_app_version,
            get_language_data,
            set_language,
            get_default_sk_path,
            open_dump_folder,
            open_inject_folder,
            open_cache_folder,
            open_log_folder,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
