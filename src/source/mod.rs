use async_trait::async_trait;
use chrono::NaiveDate;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::ZodiacSign;

mod feed;
mod generator;

pub use feed::FeedSource;
pub use generator::GeneratorSource;

/// Horoscope text produced by a sourcing strategy, ready to upsert.
#[derive(Debug, Clone)]
pub struct SourcedHoroscope {
    pub title: Option<String>,
    pub body: String,
}

/// A strategy for obtaining horoscope text for one (sign, language, date).
///
/// Implementations must isolate failures per call: an error for one sign
/// must not poison subsequent calls for other signs.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn source(
        &self,
        sign: ZodiacSign,
        lang: &str,
        date: NaiveDate,
    ) -> Result<SourcedHoroscope>;
}

/// Build the configured sourcing strategy.
pub fn from_config(config: &Config) -> Result<Box<dyn ContentSource>> {
    match config.source.as_str() {
        "feed" => Ok(Box::new(FeedSource::new(config.feed_url.clone()))),
        "generate" => {
            let api_key = config.deepseek_api_key().ok_or_else(|| {
                AppError::Config(
                    "deepseek_api_key is not set (config or DEEPSEEK_API_KEY)".to_string(),
                )
            })?;
            Ok(Box::new(GeneratorSource::new(
                config.deepseek_api_url.clone(),
                config.deepseek_model.clone(),
                api_key,
            )))
        }
        other => Err(AppError::Config(format!(
            "unknown content source '{}' (expected 'feed' or 'generate')",
            other
        ))),
    }
}
