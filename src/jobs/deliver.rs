use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Timelike};

use crate::db::Repository;
use crate::error::Result;
use crate::models::{DeliveryReport, Device, Horoscope};
use crate::push::PushTransport;

const PREVIEW_MAX_CHARS: usize = 160;

enum DeviceOutcome {
    Sent,
    NoContent,
    AlreadyDelivered,
}

/// One delivery pass: push to every device whose scheduled time matches
/// `now` and that has not been delivered to today.
///
/// Devices are processed sequentially; any error for one device is recorded
/// and the rest continue. Only the initial candidate query is fatal. The
/// delivered latch is written after a successful dispatch, so a failed
/// dispatch stays retryable on the next invocation.
pub async fn run(
    repo: &Repository,
    transport: &dyn PushTransport,
    now: DateTime<FixedOffset>,
    window_minutes: u32,
) -> Result<DeliveryReport> {
    tracing::info!("Delivery pass at {}", now.to_rfc3339());

    let today = now.date_naive();
    let devices = repo.eligible_devices(today).await?;
    tracing::info!("Found {} devices eligible for push", devices.len());

    let mut report = DeliveryReport::default();
    for device in devices {
        if !is_due(now.time(), device.push_time, window_minutes) {
            tracing::debug!(
                "Skip device {}: now={}, push_time={}",
                device.id,
                now.time().format("%H:%M"),
                device.push_time.format("%H:%M")
            );
            report.not_due += 1;
            continue;
        }

        match deliver_one(repo, transport, &device, today).await {
            Ok(DeviceOutcome::Sent) => report.sent.push(device.id),
            Ok(DeviceOutcome::NoContent) => report.no_content += 1,
            Ok(DeviceOutcome::AlreadyDelivered) => report.already_delivered += 1,
            Err(e) => {
                tracing::error!("Failed to deliver to device {}: {}", device.id, e);
                report.failed.push((device.id, e.to_string()));
            }
        }
    }

    tracing::info!(
        "Delivery pass done: {} sent, {} not due, {} without content, {} failed",
        report.sent.len(),
        report.not_due,
        report.no_content,
        report.failed.len()
    );
    Ok(report)
}

async fn deliver_one(
    repo: &Repository,
    transport: &dyn PushTransport,
    device: &Device,
    today: NaiveDate,
) -> Result<DeviceOutcome> {
    let signs = repo.signs_for_account(&device.account_id).await?;
    if signs.is_empty() {
        tracing::info!("No signs for account {}, skip", device.account_id);
        return Ok(DeviceOutcome::NoContent);
    }

    let horoscopes = repo
        .horoscopes_for_signs(&signs, &device.lang, today)
        .await?;
    if horoscopes.is_empty() {
        tracing::info!("No horoscopes for account {} today, skip", device.account_id);
        return Ok(DeviceOutcome::NoContent);
    }

    let body = build_preview(&horoscopes, &device.lang);
    let title = notification_title(&device.lang);
    let data = HashMap::from([("screen".to_string(), "today".to_string())]);

    let receipt = transport.send(&device.push_token, title, &body, &data).await?;
    tracing::info!("Sent push to device {}, receipt: {}", device.id, receipt);

    if repo.mark_delivered(&device.id, today).await? {
        Ok(DeviceOutcome::Sent)
    } else {
        tracing::warn!(
            "Device {} was already marked delivered for {}",
            device.id,
            today
        );
        Ok(DeviceOutcome::AlreadyDelivered)
    }
}

/// Match the device's scheduled time against the current wall clock.
/// `window_minutes == 0` requires exact hour:minute equality; a positive
/// value accepts |now - scheduled| <= window within the same day.
pub fn is_due(now: NaiveTime, scheduled: NaiveTime, window_minutes: u32) -> bool {
    if window_minutes == 0 {
        return now.hour() == scheduled.hour() && now.minute() == scheduled.minute();
    }
    let now_minutes = i64::from(now.hour() * 60 + now.minute());
    let scheduled_minutes = i64::from(scheduled.hour() * 60 + scheduled.minute());
    (now_minutes - scheduled_minutes).abs() <= i64::from(window_minutes)
}

/// Notification body: the first subscribed sign's text, flattened and cut
/// at a word boundary, or a localized "it's ready" fallback.
fn build_preview(horoscopes: &[Horoscope], lang: &str) -> String {
    let preview = horoscopes
        .first()
        .map(|h| truncate_preview(&h.body))
        .unwrap_or_default();

    if preview.is_empty() {
        ready_fallback(lang).to_string()
    } else {
        preview
    }
}

fn truncate_preview(text: &str) -> String {
    let flattened = text.trim().replace('\n', " ");
    let chars: Vec<char> = flattened.chars().collect();
    if chars.len() <= PREVIEW_MAX_CHARS {
        return flattened;
    }

    let head: String = chars[..PREVIEW_MAX_CHARS - 3].iter().collect();
    let mut short = match head.rfind(' ') {
        Some(cut) => head[..cut].trim_end().to_string(),
        None => head,
    };
    short.push_str("...");
    short
}

fn notification_title(lang: &str) -> &'static str {
    if lang == "ru" {
        "Гороскоп на сегодня"
    } else {
        "Today's horoscope"
    }
}

fn ready_fallback(lang: &str) -> &'static str {
    if lang == "ru" {
        "Ваш гороскоп на сегодня готов!"
    } else {
        "Your horoscope for today is ready!"
    }
}
