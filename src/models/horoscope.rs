use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ZodiacSign;

/// A stored horoscope text, unique per (sign, language, date).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Horoscope {
    pub id: String,
    pub sign: ZodiacSign,
    pub date: NaiveDate,
    pub lang: String,
    pub title: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewHoroscope {
    pub sign: ZodiacSign,
    pub date: NaiveDate,
    pub lang: String,
    pub title: Option<String>,
    pub body: String,
}

impl NewHoroscope {
    /// Deterministic storage key, e.g. `"aries_ru_2026-02-05"`. Repeated
    /// generation runs for the same day land on the same row.
    pub fn storage_id(&self) -> String {
        format!("{}_{}_{}", self.sign.code(), self.lang, self.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_id_is_deterministic() {
        let h = NewHoroscope {
            sign: ZodiacSign::Aries,
            date: NaiveDate::from_ymd_opt(2026, 2, 5).unwrap(),
            lang: "ru".to_string(),
            title: None,
            body: "Текст".to_string(),
        };
        assert_eq!(h.storage_id(), "aries_ru_2026-02-05");
    }
}
