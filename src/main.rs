use chrono::{NaiveDate, Utc};

mod config;
mod db;
mod error;
mod jobs;
mod models;
mod push;
mod source;

use config::Config;
use db::Repository;
use error::{AppError, Result};
use push::FcmClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (jobs are operational binaries, so default to info)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    // Load configuration
    let config = Config::load()?;

    match args.get(1).map(String::as_str) {
        Some("generate") => run_generate(&config, &args[2..]).await,
        Some("deliver") => run_deliver(&config).await,
        _ => {
            eprintln!("Usage: astropush <command>");
            eprintln!();
            eprintln!("Commands:");
            eprintln!("  generate [--lang LANG] [--date YYYY-MM-DD]   produce the day's horoscopes");
            eprintln!("  deliver                                      push to devices due right now");
            std::process::exit(2);
        }
    }
}

/// Produce and store horoscopes for every configured (or requested) language.
/// One language failing to source does not stop the others.
async fn run_generate(config: &Config, args: &[String]) -> Result<()> {
    let (lang_override, date_override) = parse_generate_args(args)?;

    let tz = config.delivery_timezone()?;
    let date = match date_override {
        Some(date) => date,
        None => Utc::now().with_timezone(&tz).date_naive(),
    };
    let languages = match lang_override {
        Some(lang) => vec![lang],
        None => config.languages.clone(),
    };

    let repository = Repository::new(&config.db_path).await?;
    let content_source = source::from_config(config)?;

    for lang in &languages {
        let report = jobs::generate::run(&repository, content_source.as_ref(), lang, date).await?;
        for (sign, reason) in report.failed() {
            tracing::warn!("lang={} sign={}: {}", lang, sign, reason);
        }
        println!(
            "Generated {}/{} horoscopes for {} ({})",
            report.succeeded(),
            report.outcomes.len(),
            date,
            lang
        );
    }

    Ok(())
}

async fn run_deliver(config: &Config) -> Result<()> {
    let project_id = config
        .fcm_project_id
        .clone()
        .ok_or_else(|| AppError::Config("fcm_project_id is not set".to_string()))?;
    let access_token = config
        .fcm_access_token
        .clone()
        .ok_or_else(|| AppError::Config("fcm_access_token is not set".to_string()))?;

    let tz = config.delivery_timezone()?;
    let now = Utc::now().with_timezone(&tz);

    let repository = Repository::new(&config.db_path).await?;
    let transport = FcmClient::new(project_id, access_token);

    let report = jobs::deliver::run(
        &repository,
        &transport,
        now,
        config.delivery_window_minutes,
    )
    .await?;

    println!(
        "Delivered {} pushes ({} not due, {} without content, {} failed)",
        report.sent.len(),
        report.not_due,
        report.no_content,
        report.failed.len()
    );

    Ok(())
}

fn parse_generate_args(args: &[String]) -> Result<(Option<String>, Option<NaiveDate>)> {
    let mut lang = None;
    let mut date = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--lang" => {
                lang = Some(iter.next().cloned().ok_or_else(|| {
                    AppError::Config("--lang requires a value".to_string())
                })?);
            }
            "--date" => {
                let value = iter.next().ok_or_else(|| {
                    AppError::Config("--date requires a value".to_string())
                })?;
                date = Some(value.parse().map_err(|_| {
                    AppError::Config(format!("invalid date '{}' (expected YYYY-MM-DD)", value))
                })?);
            }
            other => {
                return Err(AppError::Config(format!("unknown argument '{}'", other)));
            }
        }
    }

    Ok((lang, date))
}
