use crate::services::states::db::{DataBaseResult, SqliteBaseResultExt, SqliteQueryResultExt};
use sqlx::{Executor, FromRow, Sqlite, query, query_as, query_scalar};

#[derive(Debug, FromRow)]
pub struct ProfileRow {
    pub name: String,
    pub payload: String,
}

pub struct ProfilesRepo<'a, E>
where
    for<'c> &'c mut E: Executor<'c, Database = Sqlite>,
{
    pub inner: &'a mut E,
}

impl<'a, E> ProfilesRepo<'a, E>
where
    for<'c> &'c mut E: Executor<'c, Database = Sqlite>,
{
    pub async fn get_profile(&mut self, name: &str) -> DataBaseResult<Option<ProfileRow>> {
        query_as::<_, ProfileRow>("SELECT name, payload FROM profiles WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *self.inner)
            .await
            .resolve()
    }

    pub async fn profile_exists(&mut self, name: &str) -> DataBaseResult<bool> {
        let count: i64 = query_scalar("SELECT COUNT(1) FROM profiles WHERE name = ?")
            .bind(name)
            .fetch_one(&mut *self.inner)
            .await
            .resolve()?;
        Ok(count > 0)
    }

    pub async fn list_names(&mut self) -> DataBaseResult<Vec<String>> {
        query_scalar("SELECT name FROM profiles ORDER BY name")
            .fetch_all(&mut *self.inner)
            .await
            .resolve()
    }

    pub async fn list_all(&mut self) -> DataBaseResult<Vec<ProfileRow>> {
        query_as::<_, ProfileRow>("SELECT name, payload FROM profiles ORDER BY name")
            .fetch_all(&mut *self.inner)
            .await
            .resolve()
    }

    pub async fn upsert_profile(&mut self, name: &str, payload: &str) -> DataBaseResult<()> {
        query(
            r#"
                INSERT INTO profiles (name, payload)
                VALUES (?, ?)
                ON CONFLICT(name) DO
                    UPDATE SET
                    payload = excluded.payload,
                    updated_at = strftime('%s','now')
            "#,
        )
        .bind(name)
        .bind(payload)
        .execute(&mut *self.inner)
        .await
        .resolve()?;
        Ok(())
    }

    pub async fn delete_profile(&mut self, name: &str) -> DataBaseResult<()> {
        query("DELETE FROM profiles WHERE name = ?")
            .bind(name)
            .execute(&mut *self.inner)
            .await
            .resolve_affected()?;
        Ok(())
    }
}
