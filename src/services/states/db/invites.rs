use crate::services::states::db::{DataBaseResult, SqliteBaseResultExt};
use sqlx::{Executor, FromRow, Sqlite, query, query_as};

#[derive(Debug, FromRow)]
pub struct InviteRow {
    pub code: String,
    pub payload: String,
}

pub struct InvitesRepo<'a, E>
where
    for<'c> &'c mut E: Executor<'c, Database = Sqlite>,
{
    pub inner: &'a mut E,
}

impl<'a, E> InvitesRepo<'a, E>
where
    for<'c> &'c mut E: Executor<'c, Database = Sqlite>,
{
    pub async fn fetch_all(&mut self) -> DataBaseResult<Vec<InviteRow>> {
        query_as::<_, InviteRow>("SELECT code, payload FROM invites ORDER BY code")
            .fetch_all(&mut *self.inner)
            .await
            .resolve()
    }

    /// Replaces the whole collection. Callers run this inside a transaction so the
    /// table is never observed half-written.
    pub async fn replace_all<'r, I>(&mut self, rows: I) -> DataBaseResult<u64>
    where
        I: IntoIterator<Item = (&'r str, String)>,
    {
        query("DELETE FROM invites")
            .execute(&mut *self.inner)
            .await
            .resolve()?;
        let mut written = 0;
        for (code, payload) in rows {
            query("INSERT INTO invites (code, payload) VALUES (?, ?)")
                .bind(code)
                .bind(payload)
                .execute(&mut *self.inner)
                .await
                .resolve()?;
            written += 1;
        }
        Ok(written)
    }
}
