use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::ZodiacSign;

use super::{ContentSource, SourcedHoroscope};

/// One call to the provider returns the whole day for one language; cache it
/// so the twelve per-sign lookups cost a single request. A failed call is
/// cached too, otherwise every sign would re-run the same doomed request.
enum Batch {
    Loaded(HashMap<ZodiacSign, SourcedHoroscope>),
    Failed(String),
}

pub struct FeedSource {
    client: Client,
    base_url: String,
    cache: Mutex<Option<((String, NaiveDate), Batch)>>,
}

#[derive(Debug, Deserialize)]
struct FeedEntry {
    sign: Option<String>,
    title: Option<String>,
    // Providers disagree on what the text field is called
    #[serde(alias = "body", alias = "content")]
    text: Option<String>,
}

impl FeedSource {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("astropush/1.0")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url,
            cache: Mutex::new(None),
        }
    }

    async fn fetch_batch(
        &self,
        lang: &str,
        date: NaiveDate,
    ) -> Result<HashMap<ZodiacSign, SourcedHoroscope>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("publishDate", date.format("%m/%d/%Y").to_string()),
                ("language", lang.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to fetch feed: HTTP {}", response.status()).into());
        }

        let payload: serde_json::Value = response.json().await?;
        Ok(parse_entries(&payload))
    }
}

/// Map the provider payload into per-sign horoscopes. The payload is either
/// a bare array or an `{"items": [...]}` envelope; entries without a
/// recognizable sign or a non-empty body are dropped.
fn parse_entries(payload: &serde_json::Value) -> HashMap<ZodiacSign, SourcedHoroscope> {
    let items = payload
        .get("items")
        .and_then(|v| v.as_array())
        .or_else(|| payload.as_array());

    let mut entries = HashMap::new();
    let Some(items) = items else {
        return entries;
    };

    for item in items {
        let Ok(entry) = serde_json::from_value::<FeedEntry>(item.clone()) else {
            continue;
        };
        let Some(sign) = entry.sign.as_deref().and_then(|s| s.parse::<ZodiacSign>().ok())
        else {
            continue;
        };
        let Some(body) = entry.text.filter(|t| !t.trim().is_empty()) else {
            continue;
        };
        entries.insert(
            sign,
            SourcedHoroscope {
                title: entry.title,
                body,
            },
        );
    }
    entries
}

#[async_trait]
impl ContentSource for FeedSource {
    async fn source(
        &self,
        sign: ZodiacSign,
        lang: &str,
        date: NaiveDate,
    ) -> Result<SourcedHoroscope> {
        let key = (lang.to_string(), date);
        let mut cache = self.cache.lock().await;

        let needs_fetch = !matches!(&*cache, Some((cached_key, _)) if *cached_key == key);
        if needs_fetch {
            let batch = match self.fetch_batch(lang, date).await {
                Ok(entries) => Batch::Loaded(entries),
                Err(e) => Batch::Failed(e.to_string()),
            };
            *cache = Some((key, batch));
        }

        let Some((_, batch)) = &*cache else {
            return Err(AppError::FeedApi("batch cache is empty".to_string()));
        };
        match batch {
            Batch::Loaded(entries) => entries.get(&sign).cloned().ok_or_else(|| {
                AppError::FeedApi(format!("feed has no entry for sign '{}'", sign))
            }),
            Batch::Failed(reason) => Err(AppError::FeedApi(reason.clone())),
        }
    }
}
