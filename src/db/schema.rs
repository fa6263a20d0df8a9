pub const SCHEMA: &str = r#"
-- accounts table
CREATE TABLE IF NOT EXISTS accounts (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- devices table
CREATE TABLE IF NOT EXISTS devices (
    id TEXT PRIMARY KEY,
    account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    push_token TEXT NOT NULL DEFAULT '',
    lang TEXT NOT NULL DEFAULT 'ru',
    push_time TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    last_push_date TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_devices_account_id ON devices(account_id);
CREATE INDEX IF NOT EXISTS idx_devices_last_push_date ON devices(last_push_date);

-- account_signs table (subscription set, always replaced whole)
CREATE TABLE IF NOT EXISTS account_signs (
    account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    sign TEXT NOT NULL,
    PRIMARY KEY (account_id, sign)
);

-- horoscopes table (one row per sign+lang+date, written via upsert only)
CREATE TABLE IF NOT EXISTS horoscopes (
    id TEXT PRIMARY KEY,
    sign TEXT NOT NULL,
    date TEXT NOT NULL,
    lang TEXT NOT NULL,
    title TEXT,
    body TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(sign, lang, date)
);

CREATE INDEX IF NOT EXISTS idx_horoscopes_date_lang ON horoscopes(date, lang);
"#;
