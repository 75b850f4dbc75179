use crate::errors::LobbyResult;
use crate::models::invite::{Invite, InviteRecord};
use crate::services::states::db::{
    DataBaseError, DataBaseState, LobbyDatabaseExecutor, SqliteBaseResultExt,
};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// In-memory view of the `invites` table.
///
/// Callers hold the engine's lock around every load, mutate and persist sequence,
/// so the view is never shared half-updated. `persist` is the only durable commit
/// point; when it fails the view is marked stale and the next `load` re-reads the
/// last committed state.
pub struct InviteStore {
    db: DataBaseState,
    invites: BTreeMap<String, Invite>,
    loaded_at: Option<Instant>,
    reload_window: Duration,
}

impl InviteStore {
    pub fn new(db: DataBaseState, reload_window: Duration) -> Self {
        Self {
            db,
            invites: BTreeMap::new(),
            loaded_at: None,
            reload_window,
        }
    }

    /// Re-reads the table unless the current view is fresh.
    pub async fn load(&mut self) -> LobbyResult<()> {
        if let Some(at) = self.loaded_at {
            if at.elapsed() < self.reload_window {
                return Ok(());
            }
        }
        let mut conn = self.db.acquire().await?;
        let rows = LobbyDatabaseExecutor::new(&mut *conn)
            .invites()
            .fetch_all()
            .await?;
        let mut invites = BTreeMap::new();
        for row in rows {
            let record: InviteRecord =
                serde_json::from_str(&row.payload).map_err(DataBaseError::from)?;
            invites.insert(row.code.clone(), Invite::from_record(row.code, record));
        }
        tracing::trace!("Loaded {} invite(s)", invites.len());
        self.invites = invites;
        self.loaded_at = Some(Instant::now());
        Ok(())
    }

    pub fn invalidate(&mut self) {
        self.loaded_at = None;
    }

    /// Writes the whole collection in one transaction.
    pub async fn persist(&mut self) -> LobbyResult<()> {
        match self.write_all().await {
            Ok(written) => {
                tracing::trace!("Persisted {} invite(s)", written);
                self.loaded_at = Some(Instant::now());
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to persist invites, discarding in-memory view: {}", e);
                self.invalidate();
                Err(e)
            }
        }
    }

    async fn write_all(&self) -> LobbyResult<u64> {
        let rows = self
            .invites
            .iter()
            .map(|(code, inv)| {
                serde_json::to_string(&InviteRecord::from(inv))
                    .map(|payload| (code.as_str(), payload))
                    .map_err(DataBaseError::from)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut tx = self.db.begin().await?;
        let written = LobbyDatabaseExecutor::new(&mut *tx)
            .invites()
            .replace_all(rows)
            .await?;
        tx.commit().await.resolve()?;
        Ok(written)
    }

    pub fn get(&self, code: &str) -> Option<&Invite> {
        self.invites.get(code)
    }

    pub fn get_mut(&mut self, code: &str) -> Option<&mut Invite> {
        self.invites.get_mut(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.invites.contains_key(code)
    }

    pub fn put(&mut self, invite: Invite) -> Option<Invite> {
        self.invites.insert(invite.code.clone(), invite)
    }

    pub fn remove(&mut self, code: &str) -> Option<Invite> {
        self.invites.remove(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Invite> {
        self.invites.values()
    }

    pub fn len(&self) -> usize {
        self.invites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invites.is_empty()
    }
}
