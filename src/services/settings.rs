use crate::errors::{LobbyError, LobbyResult};
use crate::models::settings::{
    DateFormat, Setting, SettingCollector, SettingEntry, SettingParseError, SettingsKvMap,
    Use24h,
};
use crate::services::states::db::{DataBaseState, LobbyDatabaseExecutor, SqliteBaseResultExt};
use crate::utils::time_fmt::DateTimeFormatter;
use moka::future::Cache;
use std::collections::BTreeMap;

/// Runtime-editable settings backed by `system_settings`, read through a cache.
#[derive(Clone)]
pub struct RuntimeSettings {
    db: DataBaseState,
    cache: Cache<String, String>,
}

impl RuntimeSettings {
    pub fn new(db: DataBaseState) -> Self {
        Self {
            db,
            cache: Cache::builder()
                .max_capacity(SettingCollector::defaults().len() as u64 * 2)
                .build(),
        }
    }

    /// Seeds every known key with its default, leaving stored values alone.
    pub async fn initialise(&self) -> LobbyResult<usize> {
        let mut tx = self.db.begin().await?;
        let mut seeded = 0;
        {
            let mut exec = LobbyDatabaseExecutor::new(&mut *tx);
            for (&key, entry) in SettingCollector::defaults() {
                if exec.settings().insert_default(key, &entry.val).await? {
                    tracing::debug!("Seeded setting {} = {}", key, entry.val);
                    seeded += 1;
                }
            }
        }
        tx.commit().await.resolve()?;
        Ok(seeded)
    }

    pub async fn get_raw(&self, key: &str) -> LobbyResult<SettingEntry> {
        let default = SettingCollector::defaults()
            .get(key)
            .ok_or_else(|| LobbyError::from(SettingParseError::UnknownKey(key.to_owned())))?;
        if let Some(val) = self.cache.get(key).await {
            tracing::trace!("Setting cache hit: {}", key);
            return Ok(SettingEntry {
                val,
                description: default.description,
            });
        }
        let mut conn = self.db.acquire().await?;
        let stored = LobbyDatabaseExecutor::new(&mut *conn)
            .settings()
            .get_val(key)
            .await?;
        let val = stored.unwrap_or_else(|| default.val.clone());
        self.cache.insert(key.to_owned(), val.clone()).await;
        Ok(SettingEntry {
            val,
            description: default.description,
        })
    }

    pub async fn get<T: Setting>(&self) -> LobbyResult<T::Value> {
        let raw = self.get_raw(T::KEY).await?;
        T::parse(&raw.val).map_err(|source| {
            SettingParseError::InvalidValue {
                key: T::KEY.to_owned(),
                source,
            }
            .into()
        })
    }

    pub async fn all(&self) -> LobbyResult<SettingsKvMap> {
        let mut out = BTreeMap::new();
        for &key in SettingCollector::defaults().keys() {
            out.insert(key, self.get_raw(key).await?);
        }
        Ok(out)
    }

    /// Stores the canonical rendering of `value` after checking it against the key's type.
    pub async fn set_raw(&self, key: &str, value: &str) -> LobbyResult<SettingEntry> {
        let entry = SettingCollector::validate(key, value)
            .map_err(|e| LobbyError::validation(e.to_string()))?;
        if key == DateFormat::KEY {
            DateTimeFormatter::new(&entry.val, true, 0)
                .map_err(|e| LobbyError::validation(format!("invalid date format: {e}")))?;
        }
        let mut conn = self.db.acquire().await?;
        LobbyDatabaseExecutor::new(&mut *conn)
            .settings()
            .set_val(key, &entry.val)
            .await?;
        self.cache.invalidate(key).await;
        tracing::info!("Setting {} changed to {}", key, entry.val);
        Ok(entry)
    }

    pub async fn set<T: Setting>(&self, value: &T::Value) -> LobbyResult<SettingEntry> {
        let rendered = T::render(value).map_err(|source| SettingParseError::InvalidValue {
            key: T::KEY.to_owned(),
            source,
        })?;
        self.set_raw(T::KEY, &rendered).await
    }

    /// Formatter built from the current date settings and the given display offset.
    pub async fn formatter(&self, utc_offset_minutes: i32) -> LobbyResult<DateTimeFormatter> {
        let pattern = self.get::<DateFormat>().await?;
        let use_24h = self.get::<Use24h>().await?;
        Ok(DateTimeFormatter::new(&pattern, use_24h, utc_offset_minutes)?)
    }
}
