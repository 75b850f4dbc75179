use crate::services::states::db::{DataBaseResult, SqliteBaseResultExt};
use sqlx::{Executor, Sqlite, query, query_scalar};

pub struct TemplatesRepo<'a, E>
where
    for<'c> &'c mut E: Executor<'c, Database = Sqlite>,
{
    pub inner: &'a mut E,
}

impl<'a, E> TemplatesRepo<'a, E>
where
    for<'c> &'c mut E: Executor<'c, Database = Sqlite>,
{
    pub async fn get_template(&mut self, kind: &str) -> DataBaseResult<Option<String>> {
        query_scalar("SELECT payload FROM templates WHERE kind = ?")
            .bind(kind)
            .fetch_optional(&mut *self.inner)
            .await
            .resolve()
    }

    pub async fn set_template(&mut self, kind: &str, payload: &str) -> DataBaseResult<()> {
        query(
            r#"
                INSERT INTO templates (kind, payload)
                VALUES (?, ?)
                ON CONFLICT(kind) DO
                    UPDATE SET
                    payload = excluded.payload,
                    updated_at = strftime('%s','now')
            "#,
        )
        .bind(kind)
        .bind(payload)
        .execute(&mut *self.inner)
        .await
        .resolve()?;
        Ok(())
    }
}
