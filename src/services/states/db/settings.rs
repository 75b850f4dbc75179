use crate::services::states::db::{DataBaseResult, SqliteBaseResultExt};
use sqlx::{Executor, Sqlite, query, query_scalar};

pub struct SettingsRepo<'a, E>
where
    for<'c> &'c mut E: Executor<'c, Database = Sqlite>,
{
    pub inner: &'a mut E,
}

impl<'a, E> SettingsRepo<'a, E>
where
    for<'c> &'c mut E: Executor<'c, Database = Sqlite>,
{
    pub async fn get_val(&mut self, key: &str) -> DataBaseResult<Option<String>> {
        query_scalar("SELECT val FROM system_settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&mut *self.inner)
            .await
            .resolve()
    }

    pub async fn set_val(&mut self, key: &str, value: &str) -> DataBaseResult<()> {
        query(
            r#"
                INSERT INTO system_settings (key, val)
                VALUES (?, ?)
                ON CONFLICT(key) DO
                    UPDATE SET
                    val = excluded.val,
                    updated_at = strftime('%s','now')
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&mut *self.inner)
        .await
        .resolve()?;
        Ok(())
    }

    /// Seeds a default without clobbering a value an operator already changed.
    pub async fn insert_default(&mut self, key: &str, value: &str) -> DataBaseResult<bool> {
        let res = query("INSERT INTO system_settings (key, val) VALUES (?, ?) ON CONFLICT(key) DO NOTHING")
            .bind(key)
            .bind(value)
            .execute(&mut *self.inner)
            .await
            .resolve()?;
        Ok(res.rows_affected() > 0)
    }
}
