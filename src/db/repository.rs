use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tokio_rusqlite::Connection;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Device, Horoscope, NewDevice, NewHoroscope, ZodiacSign};

use super::schema::SCHEMA;

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Horoscope operations

    pub async fn upsert_horoscope(&self, horoscope: NewHoroscope) -> Result<()> {
        let id = horoscope.storage_id();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO horoscopes (id, sign, date, lang, title, body)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                       ON CONFLICT(sign, lang, date) DO UPDATE SET
                           title = excluded.title,
                           body = excluded.body"#,
                    params![
                        id,
                        horoscope.sign.code(),
                        horoscope.date.to_string(),
                        horoscope.lang,
                        horoscope.title,
                        horoscope.body,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get_horoscope(
        &self,
        sign: ZodiacSign,
        lang: &str,
        date: NaiveDate,
    ) -> Result<Option<Horoscope>> {
        let lang = lang.to_string();
        let horoscope = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, sign, date, lang, title, body, created_at FROM horoscopes
                     WHERE sign = ?1 AND lang = ?2 AND date = ?3",
                )?;
                let horoscope = stmt
                    .query_row(params![sign.code(), lang, date.to_string()], |row| {
                        Ok(horoscope_from_row(row))
                    })
                    .optional()?;
                Ok(horoscope)
            })
            .await?;
        Ok(horoscope)
    }

    /// Fetch today's horoscopes for a set of signs. Missing signs are simply
    /// absent from the result; the rows come back in the order of `signs`.
    pub async fn horoscopes_for_signs(
        &self,
        signs: &[ZodiacSign],
        lang: &str,
        date: NaiveDate,
    ) -> Result<Vec<Horoscope>> {
        if signs.is_empty() {
            return Ok(Vec::new());
        }

        let requested = signs.to_vec();
        let lang = lang.to_string();
        let mut horoscopes = self
            .conn
            .call(move |conn| {
                let placeholders = vec!["?"; requested.len()].join(", ");
                let sql = format!(
                    "SELECT id, sign, date, lang, title, body, created_at FROM horoscopes
                     WHERE lang = ? AND date = ? AND sign IN ({placeholders})"
                );
                let mut stmt = conn.prepare(&sql)?;

                let mut values: Vec<String> = vec![lang, date.to_string()];
                values.extend(requested.iter().map(|s| s.code().to_string()));

                let horoscopes = stmt
                    .query_map(params_from_iter(values), |row| Ok(horoscope_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(horoscopes)
            })
            .await?;

        horoscopes.sort_by_key(|h| signs.iter().position(|s| *s == h.sign));
        Ok(horoscopes)
    }

    // Account operations

    pub async fn create_account(&self) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let account_id = id.clone();
        self.conn
            .call(move |conn| {
                conn.execute("INSERT INTO accounts (id) VALUES (?1)", params![account_id])?;
                Ok(())
            })
            .await?;
        Ok(id)
    }

    /// Replace the account's subscription set wholesale: delete everything,
    /// insert the new set in one transaction. Last writer wins the whole set.
    pub async fn replace_signs(&self, account_id: &str, signs: &[ZodiacSign]) -> Result<()> {
        let account_id = account_id.to_string();
        let signs = signs.to_vec();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM account_signs WHERE account_id = ?1",
                    params![account_id],
                )?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT OR IGNORE INTO account_signs (account_id, sign) VALUES (?1, ?2)",
                    )?;
                    for sign in &signs {
                        stmt.execute(params![account_id, sign.code()])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Subscribed signs in insertion order (drives notification preview order).
    pub async fn signs_for_account(&self, account_id: &str) -> Result<Vec<ZodiacSign>> {
        let account_id = account_id.to_string();
        let signs = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT sign FROM account_signs WHERE account_id = ?1 ORDER BY rowid",
                )?;
                let codes = stmt
                    .query_map(params![account_id], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(codes)
            })
            .await?;
        Ok(signs.iter().filter_map(|c| c.parse().ok()).collect())
    }

    // Device operations

    pub async fn register_device(&self, device: NewDevice) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let device_id = id.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO devices (id, account_id, push_token, lang, push_time)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        device_id,
                        device.account_id,
                        device.push_token,
                        device.lang,
                        device.push_time.format("%H:%M").to_string(),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(id)
    }

    pub async fn get_device(&self, id: &str) -> Result<Option<Device>> {
        let id = id.to_string();
        let device = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, account_id, push_token, lang, push_time, is_active,
                            last_push_date, created_at, updated_at
                     FROM devices WHERE id = ?1",
                )?;
                let device = stmt
                    .query_row(params![id], |row| Ok(device_from_row(row)))
                    .optional()?;
                Ok(device)
            })
            .await?;
        Ok(device)
    }

    /// The settings the owning account may change.
    pub async fn update_device_settings(
        &self,
        id: &str,
        push_time: NaiveTime,
        lang: &str,
        is_active: bool,
    ) -> Result<()> {
        let id = id.to_string();
        let lang = lang.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE devices SET push_time = ?1, lang = ?2, is_active = ?3,
                            updated_at = datetime('now')
                     WHERE id = ?4",
                    params![push_time.format("%H:%M").to_string(), lang, is_active, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Devices that could still receive today's push: active, with a token,
    /// and not yet latched for `today`. Time-of-day matching is done by the
    /// delivery job, not here.
    pub async fn eligible_devices(&self, today: NaiveDate) -> Result<Vec<Device>> {
        let devices = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, account_id, push_token, lang, push_time, is_active,
                            last_push_date, created_at, updated_at
                     FROM devices
                     WHERE is_active = 1
                       AND push_token != ''
                       AND (last_push_date IS NULL OR last_push_date != ?1)
                     ORDER BY id",
                )?;
                let devices = stmt
                    .query_map(params![today.to_string()], |row| Ok(device_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(devices)
            })
            .await?;
        Ok(devices)
    }

    /// Set the once-per-day delivery latch. The condition makes this a
    /// compare-and-set: a concurrent invocation that already latched `today`
    /// changes no row, and we report that back as `false`.
    pub async fn mark_delivered(&self, device_id: &str, today: NaiveDate) -> Result<bool> {
        let device_id = device_id.to_string();
        let changed = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE devices SET last_push_date = ?1, updated_at = datetime('now')
                     WHERE id = ?2
                       AND (last_push_date IS NULL OR last_push_date != ?1)",
                    params![today.to_string(), device_id],
                )?;
                Ok(n)
            })
            .await?;
        Ok(changed > 0)
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

fn horoscope_from_row(row: &Row) -> Horoscope {
    Horoscope {
        id: row.get(0).unwrap(),
        sign: row
            .get::<_, String>(1)
            .unwrap()
            .parse()
            .unwrap_or(ZodiacSign::Aries),
        date: row
            .get::<_, String>(2)
            .ok()
            .and_then(|s| parse_date(&s))
            .unwrap_or_default(),
        lang: row.get(3).unwrap(),
        title: row.get(4).unwrap(),
        body: row.get(5).unwrap(),
        created_at: row
            .get::<_, String>(6)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}

fn device_from_row(row: &Row) -> Device {
    Device {
        id: row.get(0).unwrap(),
        account_id: row.get(1).unwrap(),
        push_token: row.get(2).unwrap(),
        lang: row.get(3).unwrap(),
        push_time: row
            .get::<_, String>(4)
            .ok()
            .and_then(|s| parse_time(&s))
            .unwrap_or_default(),
        is_active: row.get::<_, i64>(5).unwrap() != 0,
        last_push_date: row
            .get::<_, Option<String>>(6)
            .unwrap()
            .and_then(|s| parse_date(&s)),
        created_at: row
            .get::<_, String>(7)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        updated_at: row
            .get::<_, String>(8)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_repo() -> Repository {
        Repository::new(":memory:").await.unwrap()
    }

    fn horoscope(sign: ZodiacSign, lang: &str, date: NaiveDate, body: &str) -> NewHoroscope {
        NewHoroscope {
            sign,
            date,
            lang: lang.to_string(),
            title: None,
            body: body.to_string(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn account_with_device(repo: &Repository, token: &str) -> (String, String) {
        let account_id = repo.create_account().await.unwrap();
        let device_id = repo
            .register_device(NewDevice {
                account_id: account_id.clone(),
                push_token: token.to_string(),
                lang: "ru".to_string(),
                push_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            })
            .await
            .unwrap();
        (account_id, device_id)
    }

    #[tokio::test]
    async fn upsert_twice_keeps_one_row_with_latest_body() {
        let repo = test_repo().await;
        let day = date(2026, 2, 5);

        repo.upsert_horoscope(horoscope(ZodiacSign::Aries, "ru", day, "первый"))
            .await
            .unwrap();
        repo.upsert_horoscope(horoscope(ZodiacSign::Aries, "ru", day, "второй"))
            .await
            .unwrap();

        let all = repo
            .horoscopes_for_signs(&[ZodiacSign::Aries], "ru", day)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].body, "второй");
        assert_eq!(all[0].id, "aries_ru_2026-02-05");
    }

    #[tokio::test]
    async fn horoscopes_for_signs_skips_missing_and_keeps_requested_order() {
        let repo = test_repo().await;
        let day = date(2026, 2, 5);

        repo.upsert_horoscope(horoscope(ZodiacSign::Leo, "ru", day, "лев"))
            .await
            .unwrap();
        repo.upsert_horoscope(horoscope(ZodiacSign::Aries, "ru", day, "овен"))
            .await
            .unwrap();
        // Different language must not leak in
        repo.upsert_horoscope(horoscope(ZodiacSign::Gemini, "en", day, "gemini"))
            .await
            .unwrap();

        let found = repo
            .horoscopes_for_signs(&[ZodiacSign::Leo, ZodiacSign::Gemini, ZodiacSign::Aries], "ru", day)
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].sign, ZodiacSign::Leo);
        assert_eq!(found[1].sign, ZodiacSign::Aries);
    }

    #[tokio::test]
    async fn replace_signs_is_whole_set() {
        let repo = test_repo().await;
        let account_id = repo.create_account().await.unwrap();

        repo.replace_signs(&account_id, &[ZodiacSign::Aries, ZodiacSign::Leo])
            .await
            .unwrap();
        repo.replace_signs(&account_id, &[ZodiacSign::Pisces])
            .await
            .unwrap();

        let signs = repo.signs_for_account(&account_id).await.unwrap();
        assert_eq!(signs, vec![ZodiacSign::Pisces]);
    }

    #[tokio::test]
    async fn signs_for_account_preserves_insertion_order() {
        let repo = test_repo().await;
        let account_id = repo.create_account().await.unwrap();

        repo.replace_signs(&account_id, &[ZodiacSign::Leo, ZodiacSign::Aries])
            .await
            .unwrap();

        let signs = repo.signs_for_account(&account_id).await.unwrap();
        assert_eq!(signs, vec![ZodiacSign::Leo, ZodiacSign::Aries]);
    }

    #[tokio::test]
    async fn eligible_devices_filters_inactive_tokenless_and_delivered() {
        let repo = test_repo().await;
        let today = date(2026, 2, 5);

        let (_, eligible) = account_with_device(&repo, "token-a").await;
        let (_, inactive) = account_with_device(&repo, "token-b").await;
        let (_, no_token) = account_with_device(&repo, "").await;
        let (_, delivered) = account_with_device(&repo, "token-d").await;

        repo.update_device_settings(
            &inactive,
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            "ru",
            false,
        )
        .await
        .unwrap();
        assert!(repo.mark_delivered(&delivered, today).await.unwrap());

        let devices = repo.eligible_devices(today).await.unwrap();
        let ids: Vec<&str> = devices.iter().map(|d| d.id.as_str()).collect();
        assert!(ids.contains(&eligible.as_str()));
        assert!(!ids.contains(&inactive.as_str()));
        assert!(!ids.contains(&no_token.as_str()));
        assert!(!ids.contains(&delivered.as_str()));
    }

    #[tokio::test]
    async fn device_delivered_yesterday_is_eligible_today() {
        let repo = test_repo().await;
        let (_, device_id) = account_with_device(&repo, "token").await;

        assert!(repo.mark_delivered(&device_id, date(2026, 2, 4)).await.unwrap());

        let devices = repo.eligible_devices(date(2026, 2, 5)).await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, device_id);
        assert_eq!(devices[0].last_push_date, Some(date(2026, 2, 4)));
    }

    #[tokio::test]
    async fn mark_delivered_is_conditional() {
        let repo = test_repo().await;
        let today = date(2026, 2, 5);
        let (_, device_id) = account_with_device(&repo, "token").await;

        assert!(repo.mark_delivered(&device_id, today).await.unwrap());
        // Second attempt for the same day loses the compare-and-set
        assert!(!repo.mark_delivered(&device_id, today).await.unwrap());
        // A new day latches again
        assert!(repo.mark_delivered(&device_id, date(2026, 2, 6)).await.unwrap());
    }

    #[tokio::test]
    async fn repository_opens_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("astropush.db");
        let repo = Repository::new(path.to_str().unwrap()).await.unwrap();

        repo.upsert_horoscope(horoscope(ZodiacSign::Virgo, "en", date(2026, 2, 5), "text"))
            .await
            .unwrap();
        let found = repo
            .get_horoscope(ZodiacSign::Virgo, "en", date(2026, 2, 5))
            .await
            .unwrap();
        assert!(found.is_some());
    }
}
