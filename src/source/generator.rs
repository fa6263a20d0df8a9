use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::ZodiacSign;

use super::{ContentSource, SourcedHoroscope};

const STYLE_PROMPT_RU: &str = r#"Ты астролог, который пишет ежедневные гороскопы на русском языке.

Стиль: дружелюбный и поддерживающий, с лёгким юмором, без негатива и запугивания.
Не затрагивай здоровье, политику и деньги напрямую.

Формат: 2-3 абзаца по 2-3 предложения. Первый абзац задаёт настрой дня,
второй даёт короткие советы по делам и общению.

Не давай медицинских, юридических или финансовых рекомендаций.
Не упоминай, что текст сгенерирован."#;

const STYLE_PROMPT_EN: &str = r#"You are an astrologer writing daily horoscopes in English.

Style: friendly and encouraging, with a light touch of humor, never negative
or alarming. Do not touch on health, politics or money directly.

Format: 2-3 paragraphs of 2-3 sentences each. The first paragraph sets the
mood of the day, the second gives short advice on work and relationships.

Do not give medical, legal or financial advice.
Do not mention that the text is generated."#;

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Generates horoscope text through an OpenAI-compatible chat endpoint.
pub struct GeneratorSource {
    client: Client,
    api_url: String,
    model: String,
    api_key: String,
}

impl GeneratorSource {
    pub fn new(api_url: String, model: String, api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            api_url,
            model,
            api_key,
        }
    }

    fn style_prompt(lang: &str) -> Result<&'static str> {
        match lang {
            "ru" => Ok(STYLE_PROMPT_RU),
            "en" => Ok(STYLE_PROMPT_EN),
            other => Err(AppError::GenerationApi(format!(
                "unsupported language '{}'",
                other
            ))),
        }
    }

    fn user_prompt(sign: ZodiacSign, lang: &str, date: NaiveDate) -> String {
        if lang == "ru" {
            format!(
                "Сегодняшняя дата: {}.\nЗнак зодиака: {} ({}).\n\n\
                 Напиши гороскоп на сегодня по заданным правилам. \
                 Не повторяй название знака в начале, сразу переходи к тексту.",
                date, sign.display_name("ru"), sign.code()
            )
        } else {
            format!(
                "Today's date: {}.\nZodiac sign: {}.\n\n\
                 Write today's horoscope following the rules above. \
                 Do not repeat the sign name at the start, go straight to the text.",
                date,
                sign.display_name("en")
            )
        }
    }

    async fn chat(&self, system: &str, user: String) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user,
                },
            ],
            temperature: 0.7,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::GenerationApi(format!("API error: {}", error_text)));
        }

        let chat_response: ChatResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::GenerationApi("no choices in response".to_string()))
    }
}

#[async_trait]
impl ContentSource for GeneratorSource {
    async fn source(
        &self,
        sign: ZodiacSign,
        lang: &str,
        date: NaiveDate,
    ) -> Result<SourcedHoroscope> {
        let system = Self::style_prompt(lang)?;
        let body = self.chat(system, Self::user_prompt(sign, lang, date)).await?;
        let body = body.trim().to_string();

        if body.is_empty() {
            return Err(AppError::GenerationApi("empty completion".to_string()));
        }

        Ok(SourcedHoroscope { title: None, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_prompt_rejects_unsupported_language() {
        assert!(GeneratorSource::style_prompt("ru").is_ok());
        assert!(GeneratorSource::style_prompt("en").is_ok());
        assert!(GeneratorSource::style_prompt("de").is_err());
    }

    #[test]
    fn user_prompt_mentions_sign_and_date() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 5).unwrap();
        let prompt = GeneratorSource::user_prompt(ZodiacSign::Aries, "ru", date);
        assert!(prompt.contains("2026-02-05"));
        assert!(prompt.contains("Овен"));
    }
}
