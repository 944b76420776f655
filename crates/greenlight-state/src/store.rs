//! StateStore — redb-backed persistence for team and breaker records.
//!
//! Every record is wrapped in a version envelope. Reads hand back the
//! record together with an opaque [`Version`]; writes go through
//! `compare_and_set_*`, which commits only if the stored version still
//! matches. redb serializes write transactions, so the check-and-write
//! is atomic and a losing writer always observes [`StoreError::Conflict`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use greenlight_core::{BreakerRecord, TeamEnvironmentState, TeamName};

use crate::error::{StoreError, StoreResult};
use crate::tables::{BREAKERS, TEAMS};

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

/// Opaque record version used for compare-and-set.
///
/// Callers cannot construct or inspect one; they can only pass back a
/// version obtained from a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version(u64);

/// Version envelope persisted around every record.
#[derive(Debug, Serialize, Deserialize)]
struct Versioned<T> {
    version: u64,
    record: T,
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(TEAMS).map_err(map_err!(Table))?;
        txn.open_table(BREAKERS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Team records ───────────────────────────────────────────────

    /// Register a new team. Fails if the team already exists.
    pub fn register_team(&self, state: &TeamEnvironmentState) -> StoreResult<()> {
        let key = state.team_name.as_str();
        let value = encode(0, state)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(TEAMS).map_err(map_err!(Table))?;
            if table.get(key).map_err(map_err!(Read))?.is_some() {
                return Err(StoreError::AlreadyExists(key.to_string()));
            }
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(team = %key, "team registered");
        Ok(())
    }

    /// Read a team's record and its current version.
    pub fn get_team(&self, team: &TeamName) -> StoreResult<(TeamEnvironmentState, Version)> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TEAMS).map_err(map_err!(Table))?;
        let guard = table
            .get(team.as_str())
            .map_err(map_err!(Read))?
            .ok_or_else(|| StoreError::NotFound(team.to_string()))?;
        let versioned = decode::<TeamEnvironmentState>(team.as_str(), guard.value())?;
        Ok((versioned.record, Version(versioned.version)))
    }

    /// Commit a new team record iff the stored version still matches.
    ///
    /// Returns the new version on success. On [`StoreError::Conflict`]
    /// the caller must re-read and decide; the store never retries.
    pub fn compare_and_set_team(
        &self,
        team: &TeamName,
        expected: Version,
        new_state: &TeamEnvironmentState,
    ) -> StoreResult<Version> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let new_version;
        {
            let mut table = txn.open_table(TEAMS).map_err(map_err!(Table))?;
            let current = {
                let guard = table
                    .get(team.as_str())
                    .map_err(map_err!(Read))?
                    .ok_or_else(|| StoreError::NotFound(team.to_string()))?;
                decode::<TeamEnvironmentState>(team.as_str(), guard.value())?.version
            };
            if current != expected.0 {
                return Err(StoreError::Conflict(team.to_string()));
            }
            new_version = current + 1;
            let value = encode(new_version, new_state)?;
            table
                .insert(team.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(team = %team, version = new_version, "team record committed");
        Ok(Version(new_version))
    }

    /// List all team records, ordered by team name.
    ///
    /// Fails closed on the first corrupt record: dropping a team from
    /// the listing would silently drop it from regenerated routing.
    pub fn list_teams(&self) -> StoreResult<Vec<TeamEnvironmentState>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TEAMS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            let versioned = decode::<TeamEnvironmentState>(key.value(), value.value())?;
            results.push(versioned.record);
        }
        Ok(results)
    }

    /// Remove a team and its breaker record. Returns true if the team existed.
    pub fn remove_team(&self, team: &TeamName) -> StoreResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut teams = txn.open_table(TEAMS).map_err(map_err!(Table))?;
            existed = teams.remove(team.as_str()).map_err(map_err!(Write))?.is_some();
            let mut breakers = txn.open_table(BREAKERS).map_err(map_err!(Table))?;
            breakers.remove(team.as_str()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(team = %team, existed, "team removed");
        Ok(existed)
    }

    // ── Breaker records ────────────────────────────────────────────

    /// Read a team's breaker record, creating a closed one on first use.
    pub fn get_breaker(&self, team: &TeamName) -> StoreResult<(BreakerRecord, Version)> {
        {
            let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
            let table = txn.open_table(BREAKERS).map_err(map_err!(Table))?;
            if let Some(guard) = table.get(team.as_str()).map_err(map_err!(Read))? {
                let versioned = decode::<BreakerRecord>(team.as_str(), guard.value())?;
                return Ok((versioned.record, Version(versioned.version)));
            }
        }
        // First use: persist the initial closed record.
        let record = BreakerRecord::default();
        let value = encode(0, &record)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(BREAKERS).map_err(map_err!(Table))?;
            // Another writer may have won the race; keep theirs.
            if table.get(team.as_str()).map_err(map_err!(Read))?.is_none() {
                table
                    .insert(team.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        self.get_breaker(team)
    }

    /// Commit a new breaker record iff the stored version still matches.
    pub fn compare_and_set_breaker(
        &self,
        team: &TeamName,
        expected: Version,
        new_record: &BreakerRecord,
    ) -> StoreResult<Version> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let new_version;
        {
            let mut table = txn.open_table(BREAKERS).map_err(map_err!(Table))?;
            let current = {
                let guard = table
                    .get(team.as_str())
                    .map_err(map_err!(Read))?
                    .ok_or_else(|| StoreError::NotFound(team.to_string()))?;
                decode::<BreakerRecord>(team.as_str(), guard.value())?.version
            };
            if current != expected.0 {
                return Err(StoreError::Conflict(team.to_string()));
            }
            new_version = current + 1;
            let value = encode(new_version, new_record)?;
            table
                .insert(team.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(Version(new_version))
    }

    // ── Snapshot / restore ─────────────────────────────────────────

    /// Write a snapshot of all team records to a JSON file.
    pub fn snapshot_to(&self, path: &Path) -> StoreResult<()> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TEAMS).map_err(map_err!(Table))?;
        let mut snapshot: BTreeMap<String, Versioned<TeamEnvironmentState>> = BTreeMap::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            let versioned = decode::<TeamEnvironmentState>(key.value(), value.value())?;
            snapshot.insert(key.value().to_string(), versioned);
        }
        let json = serde_json::to_vec_pretty(&snapshot).map_err(map_err!(Serialize))?;
        std::fs::write(path, json).map_err(map_err!(Snapshot))?;
        info!(?path, teams = snapshot.len(), "state snapshot written");
        Ok(())
    }

    /// Restore one team's record from a snapshot file, replacing
    /// whatever is currently stored (including a corrupt record).
    pub fn restore_team_from(&self, path: &Path, team: &TeamName) -> StoreResult<()> {
        let content = std::fs::read(path).map_err(map_err!(Snapshot))?;
        let snapshot: BTreeMap<String, Versioned<TeamEnvironmentState>> =
            serde_json::from_slice(&content).map_err(map_err!(Snapshot))?;
        let versioned = snapshot
            .get(team.as_str())
            .ok_or_else(|| StoreError::Snapshot(format!("team {team} not in snapshot")))?;

        let value = encode(versioned.version, &versioned.record)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(TEAMS).map_err(map_err!(Table))?;
            table
                .insert(team.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        warn!(team = %team, ?path, "team record restored from snapshot");
        Ok(())
    }

    /// Overwrite a team's raw record bytes (corruption injection for tests).
    #[cfg(test)]
    fn put_raw_team(&self, team: &str, bytes: &[u8]) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(TEAMS).map_err(map_err!(Table))?;
            table.insert(team, bytes).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }
}

fn encode<T: Serialize>(version: u64, record: &T) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(&Versioned { version, record }).map_err(map_err!(Serialize))
}

/// Decode a versioned record; structurally invalid bytes are a
/// [`StoreError::Corrupt`] for that team, never a default value.
fn decode<T: for<'de> Deserialize<'de>>(team: &str, bytes: &[u8]) -> StoreResult<Versioned<T>> {
    serde_json::from_slice(bytes).map_err(|e| {
        warn!(team, error = %e, "corrupt record; failing closed");
        StoreError::Corrupt(team.to_string())
    })
}
