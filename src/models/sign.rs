use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// The twelve canonical zodiac signs, in the traditional order.
///
/// The lowercase codes (`"aries"` .. `"pisces"`) are the stable identifiers
/// used in storage, in subscription records, and by the content feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZodiacSign {
    Aries,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

impl ZodiacSign {
    pub const ALL: [ZodiacSign; 12] = [
        ZodiacSign::Aries,
        ZodiacSign::Taurus,
        ZodiacSign::Gemini,
        ZodiacSign::Cancer,
        ZodiacSign::Leo,
        ZodiacSign::Virgo,
        ZodiacSign::Libra,
        ZodiacSign::Scorpio,
        ZodiacSign::Sagittarius,
        ZodiacSign::Capricorn,
        ZodiacSign::Aquarius,
        ZodiacSign::Pisces,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            ZodiacSign::Aries => "aries",
            ZodiacSign::Taurus => "taurus",
            ZodiacSign::Gemini => "gemini",
            ZodiacSign::Cancer => "cancer",
            ZodiacSign::Leo => "leo",
            ZodiacSign::Virgo => "virgo",
            ZodiacSign::Libra => "libra",
            ZodiacSign::Scorpio => "scorpio",
            ZodiacSign::Sagittarius => "sagittarius",
            ZodiacSign::Capricorn => "capricorn",
            ZodiacSign::Aquarius => "aquarius",
            ZodiacSign::Pisces => "pisces",
        }
    }

    /// Localized display name used in notification and horoscope titles.
    pub fn display_name(&self, lang: &str) -> &'static str {
        if lang == "ru" {
            self.name_ru()
        } else {
            self.name_en()
        }
    }

    fn name_ru(&self) -> &'static str {
        match self {
            ZodiacSign::Aries => "Овен",
            ZodiacSign::Taurus => "Телец",
            ZodiacSign::Gemini => "Близнецы",
            ZodiacSign::Cancer => "Рак",
            ZodiacSign::Leo => "Лев",
            ZodiacSign::Virgo => "Дева",
            ZodiacSign::Libra => "Весы",
            ZodiacSign::Scorpio => "Скорпион",
            ZodiacSign::Sagittarius => "Стрелец",
            ZodiacSign::Capricorn => "Козерог",
            ZodiacSign::Aquarius => "Водолей",
            ZodiacSign::Pisces => "Рыбы",
        }
    }

    fn name_en(&self) -> &'static str {
        match self {
            ZodiacSign::Aries => "Aries",
            ZodiacSign::Taurus => "Taurus",
            ZodiacSign::Gemini => "Gemini",
            ZodiacSign::Cancer => "Cancer",
            ZodiacSign::Leo => "Leo",
            ZodiacSign::Virgo => "Virgo",
            ZodiacSign::Libra => "Libra",
            ZodiacSign::Scorpio => "Scorpio",
            ZodiacSign::Sagittarius => "Sagittarius",
            ZodiacSign::Capricorn => "Capricorn",
            ZodiacSign::Aquarius => "Aquarius",
            ZodiacSign::Pisces => "Pisces",
        }
    }
}

impl fmt::Display for ZodiacSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ZodiacSign {
    type Err = AppError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|sign| sign.code() == s)
            .copied()
            .ok_or_else(|| AppError::UnknownSign(s.to_string()))
    }
}
