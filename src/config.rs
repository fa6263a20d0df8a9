use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Content sourcing strategy: "generate" or "feed".
    #[serde(default = "default_source")]
    pub source: String,

    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Fixed delivery timezone as a whole-hour UTC offset.
    #[serde(default = "default_tz_offset_hours")]
    pub tz_offset_hours: i32,

    /// 0 = strict hour:minute match; N > 0 = deliver within ±N minutes.
    #[serde(default)]
    pub delivery_window_minutes: u32,

    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    #[serde(default = "default_deepseek_api_url")]
    pub deepseek_api_url: String,

    #[serde(default = "default_deepseek_model")]
    pub deepseek_model: String,

    pub deepseek_api_key: Option<String>,

    pub fcm_project_id: Option<String>,
    pub fcm_access_token: Option<String>,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("astropush");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("astropush.db").to_string_lossy().to_string()
}

fn default_source() -> String {
    "generate".to_string()
}

fn default_languages() -> Vec<String> {
    vec!["ru".to_string()]
}

fn default_tz_offset_hours() -> i32 {
    // Moscow
    3
}

fn default_feed_url() -> String {
    "https://contentapi.celltick.com/mediaApi/v1.0/mid/horoscope".to_string()
}

fn default_deepseek_api_url() -> String {
    "https://api.deepseek.com/v1/chat/completions".to_string()
}

fn default_deepseek_model() -> String {
    "deepseek-chat".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            source: default_source(),
            languages: default_languages(),
            tz_offset_hours: default_tz_offset_hours(),
            delivery_window_minutes: 0,
            feed_url: default_feed_url(),
            deepseek_api_url: default_deepseek_api_url(),
            deepseek_model: default_deepseek_model(),
            deepseek_api_key: None,
            fcm_project_id: None,
            fcm_access_token: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("astropush")
            .join("config.toml")
    }

    /// API key from config, falling back to the environment.
    pub fn deepseek_api_key(&self) -> Option<String> {
        self.deepseek_api_key
            .clone()
            .or_else(|| std::env::var("DEEPSEEK_API_KEY").ok())
    }

    pub fn delivery_timezone(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.tz_offset_hours * 3600).ok_or_else(|| {
            AppError::Config(format!(
                "invalid tz_offset_hours: {}",
                self.tz_offset_hours
            ))
        })
    }
}
