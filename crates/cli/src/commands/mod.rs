pub mod chat;
pub mod doctor;
pub mod history;
pub mod init;
pub mod tools;

use offerdesk_config::AppConfig;

/// Load the config, with a readable error.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}
