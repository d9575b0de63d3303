pub mod backup;
pub mod commands;
pub mod db;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod models;
pub mod payload_cache;
pub mod query;
pub mod thumbnail;

use commands::AppState;
use db::Database;
use logging::LogState;
use payload_cache::PayloadCache;
use std::sync::Mutex;
use tauri::Manager;

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_fs::init())
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let log_state = LogState::new();
            log_state.init_log_dir();
            app.manage(log_state);

            // Initialize Database
            let app_data_dir = app
                .path()
                .app_data_dir()
                .expect("failed to get app data dir");
            std::fs::create_dir_all(&app_data_dir).expect("failed to create app data dir");
            let db = Database::new(app_data_dir.join("galeria.db"))
                .expect("failed to initialize database");

            // Materialized payloads live under the cache dir; they are
            // re-created on demand, so losing them between runs is fine.
            let cache_dir = app
                .path()
                .app_cache_dir()
                .expect("failed to get app cache dir");
            let payloads = PayloadCache::new(cache_dir.join("media"))
                .expect("failed to initialize payload cache");

            app.manage(AppState {
                db: Mutex::new(db),
                payloads: Mutex::new(payloads),
            });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::add_files,
            commands::list_items,
            commands::get_item,
            commands::get_thumbnail,
            commands::open_item,
            commands::release_item,
            commands::release_all_handles,
            commands::rename_item,
            commands::move_item,
            commands::set_favorite,
            commands::set_tags,
            commands::delete_item,
            commands::clear_all,
            commands::folder_counts,
            commands::library_stats,
            commands::download_original,
            commands::export_backup,
            commands::import_backup,
            commands::get_setting,
            commands::set_setting,
            logging::get_logs,
            logging::log_from_frontend,
            logging::get_debug_mode,
            logging::set_debug_mode,
            logging::get_log_file_path,
            logging::get_log_stats,
            logging::toggle_logs
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
