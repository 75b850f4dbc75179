use crate::services::states::db::{DataBaseResult, SqliteBaseResultExt};
use sqlx::{Executor, FromRow, Sqlite, query, query_as};
use ahash::HashMap;

#[derive(Debug, FromRow)]
struct EmailRow {
    user_id: String,
    address: String,
}

pub struct EmailsRepo<'a, E>
where
    for<'c> &'c mut E: Executor<'c, Database = Sqlite>,
{
    pub inner: &'a mut E,
}

impl<'a, E> EmailsRepo<'a, E>
where
    for<'c> &'c mut E: Executor<'c, Database = Sqlite>,
{
    pub async fn get_address(&mut self, user_id: &str) -> DataBaseResult<Option<String>> {
        let row = query_as::<_, EmailRow>("SELECT user_id, address FROM emails WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&mut *self.inner)
            .await
            .resolve()?;
        Ok(row.map(|r| r.address))
    }

    pub async fn get_all(&mut self) -> DataBaseResult<HashMap<String, String>> {
        let rows = query_as::<_, EmailRow>("SELECT user_id, address FROM emails")
            .fetch_all(&mut *self.inner)
            .await
            .resolve()?;
        Ok(rows.into_iter().map(|r| (r.user_id, r.address)).collect())
    }

    pub async fn upsert_address(&mut self, user_id: &str, address: &str) -> DataBaseResult<()> {
        query(
            r#"
                INSERT INTO emails (user_id, address)
                VALUES (?, ?)
                ON CONFLICT(user_id) DO
                    UPDATE SET
                    address = excluded.address,
                    updated_at = strftime('%s','now')
            "#,
        )
        .bind(user_id)
        .bind(address)
        .execute(&mut *self.inner)
        .await
        .resolve()?;
        Ok(())
    }
}
