mod emails;
mod invites;
mod profiles;
mod settings;
mod templates;

use crate::services::states::db::emails::EmailsRepo;
use crate::services::states::db::invites::InvitesRepo;
use crate::services::states::db::profiles::ProfilesRepo;
use crate::services::states::db::settings::SettingsRepo;
use crate::services::states::db::templates::TemplatesRepo;
use lobby_macros::LobbyBusinessError;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::SqliteQueryResult;
use sqlx::{Executor, Pool, Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::sync::Arc;

pub use invites::InviteRow;

#[derive(Debug, thiserror::Error, LobbyBusinessError)]
pub enum DataBaseError {
    #[error("{0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Row not found!")]
    RowNotFound,
    #[error("No affected rows!")]
    NoAffectedRows,
    #[error("Unique violation error! code: {code:?}, msg: {msg}")]
    UniqueViolation { code: Option<String>, msg: String },
    #[error("sqlx error: {0}")]
    SqlxOther(#[from] sqlx::Error),
    #[cfg(feature = "migrate")]
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub trait SqliteBaseResultExt<T> {
    fn resolve(self) -> DataBaseResult<T>;
}

impl<T> SqliteBaseResultExt<T> for Result<T, sqlx::Error> {
    fn resolve(self) -> DataBaseResult<T> {
        match self {
            Ok(result) => Ok(result),
            Err(sqlx::Error::RowNotFound) => Err(DataBaseError::RowNotFound),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(DataBaseError::UniqueViolation {
                    code: e.code().map(|c| c.to_string()),
                    msg: e.message().to_string(),
                })
            }
            Err(e) => Err(DataBaseError::SqlxOther(e)),
        }
    }
}

pub trait SqliteQueryResultExt {
    fn resolve_affected(self) -> DataBaseResult<SqliteQueryResult>;
}

impl SqliteQueryResultExt for Result<SqliteQueryResult, sqlx::Error> {
    fn resolve_affected(self) -> DataBaseResult<SqliteQueryResult> {
        match self {
            Ok(res) if res.rows_affected() == 0 => Err(DataBaseError::NoAffectedRows),
            other => other.resolve(),
        }
    }
}

pub type DataBaseResult<T> = Result<T, DataBaseError>;

pub struct DataBaseExecutor<'a, E>
where
    for<'c> &'c mut E: Executor<'c, Database = Sqlite>,
{
    inner: &'a mut E,
}

impl<'a, E> DataBaseExecutor<'a, E>
where
    for<'c> &'c mut E: Executor<'c, Database = Sqlite>,
{
    pub fn new(inner: &'a mut E) -> Self {
        Self { inner }
    }

    #[inline]
    pub fn emails(&mut self) -> EmailsRepo<'_, E> {
        EmailsRepo {
            inner: &mut *self.inner,
        }
    }

    #[inline]
    pub fn invites(&mut self) -> InvitesRepo<'_, E> {
        InvitesRepo {
            inner: &mut *self.inner,
        }
    }

    #[inline]
    pub fn profiles(&mut self) -> ProfilesRepo<'_, E> {
        ProfilesRepo {
            inner: &mut *self.inner,
        }
    }

    #[inline]
    pub fn settings(&mut self) -> SettingsRepo<'_, E> {
        SettingsRepo {
            inner: &mut *self.inner,
        }
    }

    #[inline]
    pub fn templates(&mut self) -> TemplatesRepo<'_, E> {
        TemplatesRepo {
            inner: &mut *self.inner,
        }
    }
}

pub type LobbyDatabaseExecutor<'a> = DataBaseExecutor<'a, SqliteConnection>;

#[derive(Clone)]
pub struct DataBaseState {
    pool: Arc<Pool<Sqlite>>,
}

impl DataBaseState {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// A single pooled connection, for reads and single-statement writes.
    pub async fn acquire(&self) -> DataBaseResult<PoolConnection<Sqlite>> {
        self.pool.acquire().await.resolve()
    }

    /// Nothing issued through the returned transaction is visible until `commit`.
    pub async fn begin(&self) -> DataBaseResult<Transaction<'static, Sqlite>> {
        self.pool.begin().await.resolve()
    }

    #[cfg(feature = "migrate")]
    pub async fn migrate(&self) -> DataBaseResult<()> {
        sqlx::migrate!("./migrations").run(&*self.pool).await?;
        Ok(())
    }

    pub async fn close_conn(&self) {
        self.pool.close().await;
    }
}
