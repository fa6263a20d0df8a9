use chrono::NaiveDate;
use futures::stream::{self, StreamExt};

use crate::db::Repository;
use crate::error::Result;
use crate::models::{GenerationReport, NewHoroscope, SignOutcome, ZodiacSign};
use crate::source::{ContentSource, SourcedHoroscope};

// Max concurrent sourcing calls; upsert keys are disjoint per sign
const MAX_CONCURRENT_SOURCING: usize = 4;

/// Produce and store the day's horoscopes for one language.
///
/// A sourcing failure for one sign is recorded and the other signs carry on;
/// a storage failure aborts the invocation. Running twice for the same
/// (date, lang) overwrites in place.
pub async fn run(
    repo: &Repository,
    source: &dyn ContentSource,
    lang: &str,
    date: NaiveDate,
) -> Result<GenerationReport> {
    tracing::info!("Generating horoscopes for {} lang={}", date, lang);

    let sourced: Vec<(ZodiacSign, Result<SourcedHoroscope>)> = stream::iter(ZodiacSign::ALL)
        .map(|sign| async move { (sign, source.source(sign, lang, date).await) })
        .buffer_unordered(MAX_CONCURRENT_SOURCING)
        .collect()
        .await;

    let mut outcomes = Vec::with_capacity(ZodiacSign::ALL.len());
    for (sign, result) in sourced {
        match result {
            Ok(content) => {
                let title = content
                    .title
                    .unwrap_or_else(|| default_title(sign, lang, date));
                repo.upsert_horoscope(NewHoroscope {
                    sign,
                    date,
                    lang: lang.to_string(),
                    title: Some(title),
                    body: content.body,
                })
                .await?;
                tracing::info!("Saved horoscope for {}", sign);
                outcomes.push(SignOutcome {
                    sign,
                    result: Ok(()),
                });
            }
            Err(e) => {
                tracing::warn!("Failed to source horoscope for {}: {}", sign, e);
                outcomes.push(SignOutcome {
                    sign,
                    result: Err(e.to_string()),
                });
            }
        }
    }

    outcomes.sort_by_key(|o| ZodiacSign::ALL.iter().position(|s| *s == o.sign));

    let report = GenerationReport {
        date,
        lang: lang.to_string(),
        outcomes,
    };
    tracing::info!(
        "Done generating for {} lang={}: {} saved, {} failed",
        date,
        lang,
        report.succeeded(),
        report.failed().len()
    );
    Ok(report)
}

/// Title used when the source does not provide one,
/// e.g. "Овен: гороскоп на 05.02.2026".
fn default_title(sign: ZodiacSign, lang: &str, date: NaiveDate) -> String {
    if lang == "ru" {
        format!(
            "{}: гороскоп на {}",
            sign.display_name("ru"),
            date.format("%d.%m.%Y")
        )
    } else {
        format!(
            "{}: horoscope for {}",
            sign.display_name(lang),
            date.format("%d.%m.%Y")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::error::AppError;

    struct FakeSource {
        fail_for: Option<ZodiacSign>,
        version: u32,
    }

    #[async_trait]
    impl ContentSource for FakeSource {
        async fn source(
            &self,
            sign: ZodiacSign,
            _lang: &str,
            _date: NaiveDate,
        ) -> Result<SourcedHoroscope> {
            if self.fail_for == Some(sign) {
                return Err(AppError::GenerationApi("provider exploded".to_string()));
            }
            Ok(SourcedHoroscope {
                title: None,
                body: format!("{} v{}", sign, self.version),
            })
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn one_failing_sign_does_not_stop_the_others() {
        let repo = Repository::new(":memory:").await.unwrap();
        let source = FakeSource {
            fail_for: Some(ZodiacSign::Gemini),
            version: 1,
        };
        let day = date(2026, 2, 5);

        let report = run(&repo, &source, "ru", day).await.unwrap();

        assert_eq!(report.succeeded(), 11);
        assert_eq!(report.failed().len(), 1);
        assert_eq!(report.failed()[0].0, ZodiacSign::Gemini);

        assert!(repo
            .get_horoscope(ZodiacSign::Gemini, "ru", day)
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .get_horoscope(ZodiacSign::Aries, "ru", day)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn second_run_overwrites_instead_of_duplicating() {
        let repo = Repository::new(":memory:").await.unwrap();
        let day = date(2026, 2, 5);

        run(&repo, &FakeSource { fail_for: None, version: 1 }, "ru", day)
            .await
            .unwrap();
        run(&repo, &FakeSource { fail_for: None, version: 2 }, "ru", day)
            .await
            .unwrap();

        let all = repo
            .horoscopes_for_signs(&ZodiacSign::ALL, "ru", day)
            .await
            .unwrap();
        assert_eq!(all.len(), 12);
        for horoscope in all {
            assert!(horoscope.body.ends_with("v2"));
        }
    }

    #[tokio::test]
    async fn outcomes_come_back_in_canonical_order() {
        let repo = Repository::new(":memory:").await.unwrap();
        let report = run(
            &repo,
            &FakeSource { fail_for: None, version: 1 },
            "en",
            date(2026, 2, 5),
        )
        .await
        .unwrap();

        let signs: Vec<ZodiacSign> = report.outcomes.iter().map(|o| o.sign).collect();
        assert_eq!(signs, ZodiacSign::ALL.to_vec());
    }

    #[test]
    fn default_title_is_localized() {
        let day = date(2026, 2, 5);
        assert_eq!(
            default_title(ZodiacSign::Aries, "ru", day),
            "Овен: гороскоп на 05.02.2026"
        );
        assert_eq!(
            default_title(ZodiacSign::Aries, "en", day),
            "Aries: horoscope for 05.02.2026"
        );
    }
}
