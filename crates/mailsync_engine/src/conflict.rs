//! Conflict detection and resolution between local and remote copies.
//!
//! A conflict exists when both copies of an entity changed
//! independently since the last sync point. Detection compares content
//! hashes against the recorded sync state; resolution applies exactly
//! one configured strategy per conflict. Both prior versions are
//! retained for audit and never overwritten in place.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// One versioned copy of an entity's fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityVersion {
    /// Field values. Empty strings are treated as unset.
    pub fields: BTreeMap<String, String>,
    /// When this copy was last modified.
    pub modified_at: DateTime<Utc>,
}

impl EntityVersion {
    /// Creates a version from field pairs.
    pub fn new(modified_at: DateTime<Utc>) -> Self {
        Self {
            fields: BTreeMap::new(),
            modified_at,
        }
    }

    /// Sets a field value.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Content hash over the sorted field pairs.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for (name, value) in &self.fields {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
            hasher.update(value.trim().as_bytes());
            hasher.update([0u8]);
        }
        let digest = hasher.finalize();
        use std::fmt::Write;
        let mut hex = String::with_capacity(64);
        for byte in digest {
            let _ = write!(hex, "{byte:02x}");
        }
        hex
    }

    fn field_is_set(&self, name: &str) -> bool {
        self.fields
            .get(name)
            .map(|value| !value.trim().is_empty())
            .unwrap_or(false)
    }
}

/// State of a conflict's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictState {
    /// Divergence observed, no resolution yet.
    Detected,
    /// Waiting for an operator decision.
    PendingReview,
    /// A resolved value has been produced.
    Resolved,
}

/// Strategy for resolving a conflict. Applied exclusively, never mixed
/// within one conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
    /// Later modification timestamp wins; ties prefer the remote.
    LastWriteWins,
    /// Surface to an operator; blocks only the affected entity.
    Manual,
    /// Field-level union, falling back to last-write-wins per field.
    Merge,
}

impl ConflictStrategy {
    /// Returns true if the strategy resolves without an operator.
    pub fn is_automatic(&self) -> bool {
        !matches!(self, ConflictStrategy::Manual)
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConflictStrategy::LastWriteWins => "last-write-wins",
            ConflictStrategy::Manual => "manual",
            ConflictStrategy::Merge => "merge",
        };
        f.write_str(name)
    }
}

/// An operator's decision for a conflict in manual review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ManualResolution {
    /// Keep the local version.
    KeepLocal,
    /// Accept the remote version.
    AcceptRemote,
    /// Apply an operator-supplied version.
    Custom(EntityVersion),
}

/// A detected divergence between two copies of the same entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// Conflict id.
    pub id: Uuid,
    /// The entity both copies describe.
    pub entity_id: String,
    /// Local copy at detection time. Retained for audit.
    pub local: EntityVersion,
    /// Remote copy at detection time. Retained for audit.
    pub remote: EntityVersion,
    /// When the divergence was observed.
    pub detected_at: DateTime<Utc>,
    /// Lifecycle state.
    pub state: ConflictState,
    /// The strategy applied, once one has been.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<ConflictStrategy>,
    /// The resolved value, once produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<EntityVersion>,
    /// When the conflict was resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Conflict {
    /// Creates a conflict in the DETECTED state.
    pub fn new(entity_id: impl Into<String>, local: EntityVersion, remote: EntityVersion) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_id: entity_id.into(),
            local,
            remote,
            detected_at: Utc::now(),
            state: ConflictState::Detected,
            strategy: None,
            resolved: None,
            resolved_at: None,
        }
    }

    /// Names of fields whose values differ between the two copies.
    pub fn divergent_fields(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self
            .local
            .fields
            .keys()
            .chain(self.remote.fields.keys())
        {
            if names.iter().any(|n| n == name) {
                continue;
            }
            let local = self.local.fields.get(name).map(|v| v.trim()).unwrap_or("");
            let remote = self.remote.fields.get(name).map(|v| v.trim()).unwrap_or("");
            if local != remote {
                names.push(name.clone());
            }
        }
        names
    }

    /// Applies a strategy.
    ///
    /// Automatic strategies move DETECTED straight to RESOLVED; the
    /// manual strategy parks the conflict in PENDING_REVIEW.
    pub fn apply_strategy(&mut self, strategy: ConflictStrategy) {
        self.strategy = Some(strategy);
        match strategy {
            ConflictStrategy::LastWriteWins => {
                self.finish(last_write_wins(&self.local, &self.remote));
            }
            ConflictStrategy::Merge => {
                self.finish(merge(&self.local, &self.remote));
            }
            ConflictStrategy::Manual => {
                self.state = ConflictState::PendingReview;
            }
        }
    }

    /// Applies an operator decision to a conflict in PENDING_REVIEW.
    pub fn apply_manual(&mut self, resolution: ManualResolution) -> Result<(), ConflictError> {
        if self.state != ConflictState::PendingReview {
            return Err(ConflictError::InvalidState {
                conflict_id: self.id,
                state: self.state,
            });
        }
        let resolved = match resolution {
            ManualResolution::KeepLocal => self.local.clone(),
            ManualResolution::AcceptRemote => self.remote.clone(),
            ManualResolution::Custom(version) => version,
        };
        self.finish(resolved);
        Ok(())
    }

    /// Returns true once a resolved value exists.
    pub fn is_resolved(&self) -> bool {
        self.state == ConflictState::Resolved
    }

    fn finish(&mut self, resolved: EntityVersion) {
        self.resolved = Some(resolved);
        self.resolved_at = Some(Utc::now());
        self.state = ConflictState::Resolved;
    }
}

/// Resolves by modification timestamp; ties prefer the remote, which is
/// the system of record for downstream workflow.
pub fn last_write_wins(local: &EntityVersion, remote: &EntityVersion) -> EntityVersion {
    if local.modified_at > remote.modified_at {
        local.clone()
    } else {
        remote.clone()
    }
}

/// Field-level union of the two versions.
///
/// A field set on only one side takes that side's value; a field set on
/// both sides falls back to last-write-wins for that field only.
pub fn merge(local: &EntityVersion, remote: &EntityVersion) -> EntityVersion {
    let newer_is_local = local.modified_at > remote.modified_at;
    let mut merged = EntityVersion::new(local.modified_at.max(remote.modified_at));

    for name in local.fields.keys().chain(remote.fields.keys()) {
        if merged.fields.contains_key(name) {
            continue;
        }
        let value = match (local.field_is_set(name), remote.field_is_set(name)) {
            (true, false) => local.fields.get(name).cloned(),
            (false, true) => remote.fields.get(name).cloned(),
            (true, true) => {
                if newer_is_local {
                    local.fields.get(name).cloned()
                } else {
                    remote.fields.get(name).cloned()
                }
            }
            (false, false) => None,
        };
        if let Some(value) = value {
            merged.fields.insert(name.clone(), value);
        }
    }
    merged
}

/// Errors from conflict-queue operations.
#[derive(Debug, Error)]
pub enum ConflictError {
    /// No conflict with the given id exists.
    #[error("conflict not found: {conflict_id}")]
    NotFound {
        /// The missing conflict id.
        conflict_id: Uuid,
    },

    /// The conflict is not in a state that accepts the operation.
    #[error("conflict {conflict_id} is in state {state:?}")]
    InvalidState {
        /// The conflict id.
        conflict_id: Uuid,
        /// Its current state.
        state: ConflictState,
    },
}

/// Recorded sync point for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPoint {
    /// Hash of the local copy at the last sync.
    pub local_hash: String,
    /// Hash of the remote copy at the last sync.
    pub remote_hash: String,
    /// When the entity was last synced.
    pub synced_at: DateTime<Utc>,
}

/// The conflict queue: detects bidirectional deltas, applies the
/// configured strategy, and surfaces manual conflicts to an operator.
///
/// Runs independently of the import pipeline; a conflict blocks only
/// its own entity.
pub struct ConflictQueue {
    strategy: ConflictStrategy,
    sync_points: RwLock<HashMap<String, SyncPoint>>,
    conflicts: Mutex<Vec<Conflict>>,
}

impl ConflictQueue {
    /// Creates a queue with the given default strategy.
    pub fn new(strategy: ConflictStrategy) -> Self {
        Self {
            strategy,
            sync_points: RwLock::new(HashMap::new()),
            conflicts: Mutex::new(Vec::new()),
        }
    }

    /// The configured strategy.
    pub fn strategy(&self) -> ConflictStrategy {
        self.strategy
    }

    /// Records a clean sync point for an entity.
    pub fn record_synced(&self, entity_id: &str, local: &EntityVersion, remote: &EntityVersion) {
        self.sync_points.write().insert(
            entity_id.to_string(),
            SyncPoint {
                local_hash: local.content_hash(),
                remote_hash: remote.content_hash(),
                synced_at: Utc::now(),
            },
        );
    }

    /// Observes the current copies of an entity and detects divergence.
    ///
    /// Returns the conflict id when one was detected. With a recorded
    /// sync point, a conflict requires both sides to have changed since
    /// it; one-sided changes are not conflicts. Without a sync point,
    /// any disagreement between the copies counts.
    pub fn observe(
        &self,
        entity_id: &str,
        local: EntityVersion,
        remote: EntityVersion,
    ) -> Option<Uuid> {
        let local_hash = local.content_hash();
        let remote_hash = remote.content_hash();
        if local_hash == remote_hash {
            self.record_synced(entity_id, &local, &remote);
            return None;
        }

        if let Some(point) = self.sync_points.read().get(entity_id) {
            let local_changed = point.local_hash != local_hash;
            let remote_changed = point.remote_hash != remote_hash;
            if !(local_changed && remote_changed) {
                return None;
            }
        }

        let mut conflict = Conflict::new(entity_id, local, remote);
        conflict.apply_strategy(self.strategy);
        let id = conflict.id;

        tracing::info!(
            entity_id = %conflict.entity_id,
            conflict_id = %id,
            strategy = %self.strategy,
            state = ?conflict.state,
            "conflict detected",
        );

        if let Some(resolved) = &conflict.resolved {
            // Automatic resolution re-establishes the sync point.
            self.record_synced(entity_id, resolved, resolved);
        }
        self.conflicts.lock().push(conflict);
        Some(id)
    }

    /// Conflicts waiting for an operator, oldest first.
    pub fn pending(&self) -> Vec<Conflict> {
        self.conflicts
            .lock()
            .iter()
            .filter(|c| c.state == ConflictState::PendingReview)
            .cloned()
            .collect()
    }

    /// Removes and returns all resolved conflicts.
    pub fn drain_resolved(&self) -> Vec<Conflict> {
        let mut conflicts = self.conflicts.lock();
        let mut resolved = Vec::new();
        conflicts.retain(|conflict| {
            if conflict.is_resolved() {
                resolved.push(conflict.clone());
                false
            } else {
                true
            }
        });
        resolved
    }

    /// Applies an operator decision to a pending conflict.
    pub fn resolve_manual(
        &self,
        conflict_id: Uuid,
        resolution: ManualResolution,
    ) -> Result<Conflict, ConflictError> {
        let mut conflicts = self.conflicts.lock();
        let conflict = conflicts
            .iter_mut()
            .find(|c| c.id == conflict_id)
            .ok_or(ConflictError::NotFound { conflict_id })?;
        conflict.apply_manual(resolution)?;

        if let Some(resolved) = conflict.resolved.clone() {
            self.sync_points.write().insert(
                conflict.entity_id.clone(),
                SyncPoint {
                    local_hash: resolved.content_hash(),
                    remote_hash: resolved.content_hash(),
                    synced_at: Utc::now(),
                },
            );
        }
        Ok(conflict.clone())
    }

    /// Number of conflicts currently held, resolved or not.
    pub fn len(&self) -> usize {
        self.conflicts.lock().len()
    }

    /// Returns true if no conflicts are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConflictQueue {
    fn default() -> Self {
        Self::new(ConflictStrategy::LastWriteWins)
    }
}
