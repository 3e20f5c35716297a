// Settings repository for Cresonia
// Handles the flat user configuration record plus a few app-level
// key-value entries (last sent prompt, prose backup)

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use super::models::Settings;
use super::DatabaseManager;

impl DatabaseManager {
    /// Get a single setting by key
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.with_connection(|conn| {
            get_setting_impl(conn, key)
        })
    }

    /// Set a single setting
    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.with_connection(|conn| {
            set_setting_impl(conn, key, value)
        })
    }

    /// Delete a setting by key
    pub fn delete_setting(&self, key: &str) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute("DELETE FROM settings WHERE key = ?", params![key])
                .context("Failed to delete setting")?;
            Ok(())
        })
    }

    /// Load the settings record. Missing or unreadable rows fall back to the
    /// documented defaults; this never surfaces an error to the caller.
    pub fn get_settings(&self) -> Settings {
        match self.with_connection(load_settings_impl) {
            Ok(settings) => settings,
            Err(e) => {
                log::error!("Error loading settings, using defaults: {:#}", e);
                Settings::default()
            }
        }
    }

    /// Replace the settings record wholesale
    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.with_connection(|conn| {
            save_settings_impl(conn, settings)
        })
    }
}

fn get_setting_impl(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare(
        "SELECT value FROM settings WHERE key = ?"
    ).context("Failed to prepare get_setting query")?;

    let result = stmt.query_row(params![key], |row| row.get(0));

    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e).context("Failed to get setting"),
    }
}

fn set_setting_impl(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO settings (key, value, updated_at)
        VALUES (?1, ?2, datetime('now'))
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = datetime('now')
        "#,
        params![key, value],
    ).context("Failed to set setting")?;

    Ok(())
}

fn load_settings_impl(conn: &Connection) -> Result<Settings> {
    let mut settings = Settings::default();

    let mut stmt = conn.prepare(
        "SELECT key, value FROM settings"
    ).context("Failed to prepare load_settings query")?;

    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    }).context("Failed to query settings")?;

    for row in rows {
        let (key, value) = row.context("Failed to read setting row")?;

        match key.as_str() {
            "api_key" => settings.api_key = value,
            "site_url" => settings.site_url = value,
            "site_name" => settings.site_name = value,
            "model" => settings.model = value,
            "default_evaluation_model" => settings.default_evaluation_model = value,
            "style_guide" => settings.style_guide = value,
            "google_api_key" => settings.google_api_key = value,
            "google_client_id" => settings.google_client_id = value,
            _ => {
                log::debug!("Unknown setting key: {}", key);
            }
        }
    }

    Ok(settings)
}

fn save_settings_impl(conn: &Connection, settings: &Settings) -> Result<()> {
    let tx = conn.unchecked_transaction()
        .context("Failed to begin settings transaction")?;

    let entries: [(&str, &str); 8] = [
        ("api_key", &settings.api_key),
        ("site_url", &settings.site_url),
        ("site_name", &settings.site_name),
        ("model", &settings.model),
        ("default_evaluation_model", &settings.default_evaluation_model),
        ("style_guide", &settings.style_guide),
        ("google_api_key", &settings.google_api_key),
        ("google_client_id", &settings.google_client_id),
    ];

    for (key, value) in entries {
        set_setting_impl(&tx, key, value)?;
    }

    tx.commit().context("Failed to commit settings transaction")?;
    Ok(())
}
