// ── Order / favorites sync service ──
//
// Every write lands in local storage first. When sync is enabled the
// same write is mirrored onto registry labels; a failed mirror is logged
// and reported in the outcome, but the local value stands and sync stays
// on. Failed mirrors are remembered in a persisted pending set; a pull
// retries them and never lets labels overwrite a value still pending.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::labels::{HIDDEN_RANK, LabelCodec, LabelKind};
use super::remote::LabelRegistry;
use super::scope::{Scope, Section, Target};
use super::storage::KeyValueStore;
use super::{KEY_HIDDEN, KEY_MIGRATION_DONE, KEY_PENDING, KEY_SCOPES, KEY_SYNC_ENABLED};
use crate::error::CoreError;
use crate::order::{OrderEngine, RankPlan, RankedItem};

/// `item id -> rank` for one scope.
pub type OrderMap = BTreeMap<String, i64>;

/// What happened to the remote mirror of a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteWrite {
    /// Sync is disabled, or nothing needed to change.
    Skipped,
    Mirrored,
    /// The local write stands; only the mirror failed.
    Failed(String),
}

impl RemoteWrite {
    fn from_result(result: Result<bool, CoreError>, what: &str) -> Self {
        match result {
            Ok(true) => Self::Mirrored,
            Ok(false) => Self::Skipped,
            Err(e) => {
                warn!(error = %e, what, "Remote mirror failed, keeping local value");
                Self::Failed(e.to_string())
            }
        }
    }

    /// Fold several results: any failure wins, then any mirror.
    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Failed(a), _) => Self::Failed(a),
            (_, Self::Failed(b)) => Self::Failed(b),
            (Self::Mirrored, _) | (_, Self::Mirrored) => Self::Mirrored,
            _ => Self::Skipped,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Result of a single local-first write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub remote: RemoteWrite,
}

/// Result of committing a reordered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderOutcome {
    pub plan: RankPlan,
    pub remote: RemoteWrite,
}

/// Result of a bulk push or teardown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub mirrored: usize,
    pub failed: usize,
}

/// First-run migration result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Migration {
    AlreadyDone,
    /// Remote labels adopted into local storage; sync switched on.
    Adopted { scopes: usize },
    /// Nothing to adopt.
    Skipped,
}

/// A local value whose label mirror has not landed yet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "pending", rename_all = "snake_case")]
enum PendingMirror {
    Order { scope: Scope, id: String },
    Hidden { entity_id: String },
}

impl PendingMirror {
    fn order(scope: &Scope, id: &str) -> Self {
        Self::Order {
            scope: scope.clone(),
            id: id.to_owned(),
        }
    }

    fn hidden(entity_id: &str) -> Self {
        Self::Hidden {
            entity_id: entity_id.to_owned(),
        }
    }

    fn target(&self) -> Target {
        match self {
            Self::Order { scope, id } => scope.target(id),
            Self::Hidden { entity_id } => Target::Entity(entity_id.clone()),
        }
    }

    fn kind(&self) -> LabelKind {
        match self {
            Self::Order { scope, .. } => scope.label_kind(),
            Self::Hidden { .. } => LabelKind::Hidden,
        }
    }
}

/// Local-first order, favorites and visibility store with optional
/// label mirroring.
pub struct OrderSyncService {
    storage: Arc<dyn KeyValueStore>,
    remote: Arc<dyn LabelRegistry>,
    codec: LabelCodec,
    engine: OrderEngine,
    enabled: AtomicBool,
    // Serialises read-modify-write cycles on local maps and label sets.
    write_lock: Mutex<()>,
}

impl OrderSyncService {
    /// Build the service, reading the persisted sync flag.
    pub async fn open(
        storage: Arc<dyn KeyValueStore>,
        remote: Arc<dyn LabelRegistry>,
        codec: LabelCodec,
        engine: OrderEngine,
    ) -> Result<Self, CoreError> {
        let enabled = storage.get(KEY_SYNC_ENABLED).await?.as_deref() == Some("true");
        Ok(Self {
            storage,
            remote,
            codec,
            engine,
            enabled: AtomicBool::new(enabled),
            write_lock: Mutex::new(()),
        })
    }

    pub fn sync_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn engine(&self) -> &OrderEngine {
        &self.engine
    }

    pub fn codec(&self) -> &LabelCodec {
        &self.codec
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Every scope holding local data.
    pub async fn scopes(&self) -> Result<BTreeSet<Scope>, CoreError> {
        self.load_json(KEY_SCOPES).await
    }

    pub async fn order_map(&self, scope: &Scope) -> Result<OrderMap, CoreError> {
        self.load_json(&scope.storage_key()).await
    }

    /// Rank of one item. Always served from local storage.
    pub async fn get_order(&self, scope: &Scope, id: &str) -> Result<Option<i64>, CoreError> {
        Ok(self.order_map(scope).await?.get(id).copied())
    }

    /// Favorites of one section, lowest rank first.
    pub async fn favorites(&self, section: Section) -> Result<Vec<String>, CoreError> {
        let map = self.order_map(&Scope::favorites(section)).await?;
        let mut items: Vec<(i64, String)> = map.into_iter().map(|(id, r)| (r, id)).collect();
        items.sort();
        Ok(items.into_iter().map(|(_, id)| id).collect())
    }

    /// Entities carrying a visibility override.
    pub async fn hidden(&self) -> Result<BTreeSet<String>, CoreError> {
        self.load_json(KEY_HIDDEN).await
    }

    pub async fn is_hidden(&self, entity_id: &str) -> Result<bool, CoreError> {
        Ok(self.hidden().await?.contains(entity_id))
    }

    /// Number of local values whose mirror has not landed.
    pub async fn pending_mirrors(&self) -> Result<usize, CoreError> {
        let set: BTreeSet<PendingMirror> = self.load_json(KEY_PENDING).await?;
        Ok(set.len())
    }

    // ── Order writes ─────────────────────────────────────────────────

    pub async fn set_order(
        &self,
        scope: &Scope,
        id: &str,
        rank: i64,
    ) -> Result<WriteOutcome, CoreError> {
        if rank <= 0 {
            return Err(CoreError::Validation {
                message: format!("rank must be positive, got {rank}"),
            });
        }
        let _guard = self.write_lock.lock().await;
        self.set_order_locked(scope, id, rank).await
    }

    /// Caller holds the write lock.
    async fn set_order_locked(
        &self,
        scope: &Scope,
        id: &str,
        rank: i64,
    ) -> Result<WriteOutcome, CoreError> {
        let mut map = self.order_map(scope).await?;
        map.insert(id.to_owned(), rank);
        self.save_map(scope, &map).await?;
        debug!(%scope, id, rank, "Order written locally");

        let remote = self.mirror_attach(PendingMirror::order(scope, id), rank).await?;
        Ok(WriteOutcome { remote })
    }

    pub async fn clear_order(&self, scope: &Scope, id: &str) -> Result<WriteOutcome, CoreError> {
        let _guard = self.write_lock.lock().await;

        let mut map = self.order_map(scope).await?;
        if map.remove(id).is_none() {
            return Ok(WriteOutcome {
                remote: RemoteWrite::Skipped,
            });
        }
        self.save_map(scope, &map).await?;
        debug!(%scope, id, "Order cleared locally");

        let remote = self.mirror_detach(PendingMirror::order(scope, id)).await?;
        Ok(WriteOutcome { remote })
    }

    /// Commit a reordered list as the minimal set of rank writes.
    ///
    /// `new_order` is the visible collection in its new order; `moved`
    /// names the items the user dragged, when known.
    pub async fn apply_reorder(
        &self,
        scope: &Scope,
        new_order: &[String],
        moved: Option<&[String]>,
    ) -> Result<ReorderOutcome, CoreError> {
        let _guard = self.write_lock.lock().await;

        let mut map = self.order_map(scope).await?;
        let items: Vec<RankedItem> = new_order
            .iter()
            .map(|id| RankedItem::new(id.clone(), map.get(id).copied()))
            .collect();
        let moved: Option<HashSet<String>> = moved.map(|m| m.iter().cloned().collect());
        let plan = self.engine.plan(&items, moved.as_ref());

        if plan.writes.is_empty() {
            return Ok(ReorderOutcome {
                plan,
                remote: RemoteWrite::Skipped,
            });
        }

        for (id, rank) in &plan.writes {
            map.insert(id.clone(), *rank);
        }
        self.save_map(scope, &map).await?;
        info!(
            %scope,
            writes = plan.writes.len(),
            renumbered = plan.renumbered,
            "Reorder committed locally"
        );

        let mut remote = RemoteWrite::Skipped;
        for (id, rank) in &plan.writes {
            let result = self.mirror_attach(PendingMirror::order(scope, id), *rank).await?;
            remote = remote.merge(result);
        }
        Ok(ReorderOutcome { plan, remote })
    }

    // ── Favorites ────────────────────────────────────────────────────

    /// Append to a favorites section at `max + GAP`. Re-adding is a no-op.
    pub async fn add_favorite(&self, section: Section, id: &str) -> Result<WriteOutcome, CoreError> {
        let scope = Scope::favorites(section);
        let _guard = self.write_lock.lock().await;

        let map = self.order_map(&scope).await?;
        if map.contains_key(id) {
            return Ok(WriteOutcome {
                remote: RemoteWrite::Skipped,
            });
        }
        let rank = self.engine.append_rank(map.values().copied().max());
        self.set_order_locked(&scope, id, rank).await
    }

    pub async fn remove_favorite(
        &self,
        section: Section,
        id: &str,
    ) -> Result<WriteOutcome, CoreError> {
        self.clear_order(&Scope::favorites(section), id).await
    }

    // ── Visibility overrides ─────────────────────────────────────────

    pub async fn set_hidden(&self, entity_id: &str, hidden: bool) -> Result<WriteOutcome, CoreError> {
        let _guard = self.write_lock.lock().await;

        let mut set = self.hidden().await?;
        let changed = if hidden {
            set.insert(entity_id.to_owned())
        } else {
            set.remove(entity_id)
        };
        if !changed {
            return Ok(WriteOutcome {
                remote: RemoteWrite::Skipped,
            });
        }
        self.save_json(KEY_HIDDEN, &set).await?;

        let pending = PendingMirror::hidden(entity_id);
        let remote = if hidden {
            self.mirror_attach(pending, HIDDEN_RANK).await?
        } else {
            self.mirror_detach(pending).await?
        };
        Ok(WriteOutcome { remote })
    }

    // ── Sync toggle ──────────────────────────────────────────────────

    /// Switch label mirroring on or off.
    ///
    /// Enabling pushes every local value once. Disabling removes every
    /// owned label from the registry; local values are kept.
    pub async fn set_sync_enabled(&self, enabled: bool) -> Result<SyncReport, CoreError> {
        let _guard = self.write_lock.lock().await;

        if self.sync_enabled() == enabled {
            return Ok(SyncReport::default());
        }
        self.storage
            .set(KEY_SYNC_ENABLED, if enabled { "true" } else { "false" })
            .await?;
        self.enabled.store(enabled, Ordering::SeqCst);

        let report = if enabled {
            self.push_all().await?
        } else {
            // Enabling pushes everything again, so nothing stays pending.
            self.storage.remove(KEY_PENDING).await?;
            self.remove_owned_labels().await
        };
        info!(enabled, mirrored = report.mirrored, failed = report.failed, "Sync toggled");
        Ok(report)
    }

    /// One-time first-run adoption of existing remote labels.
    pub async fn migrate(&self) -> Result<Migration, CoreError> {
        if self.storage.get(KEY_MIGRATION_DONE).await?.as_deref() == Some("true") {
            return Ok(Migration::AlreadyDone);
        }
        let _guard = self.write_lock.lock().await;

        let names = self.label_names();
        let remote_has_labels = self
            .remote
            .assignments()
            .iter()
            .flat_map(|a| a.labels.iter())
            .any(|id| self.decode_id(id, &names).is_some());
        let local_empty = self.scopes().await?.is_empty() && self.hidden().await?.is_empty();

        let outcome = if remote_has_labels && local_empty {
            self.storage.set(KEY_SYNC_ENABLED, "true").await?;
            self.enabled.store(true, Ordering::SeqCst);
            let scopes = self.rebuild_from_remote().await?;
            info!(scopes, "Adopted remote order labels");
            Migration::Adopted { scopes }
        } else {
            Migration::Skipped
        };
        self.storage.set(KEY_MIGRATION_DONE, "true").await?;
        Ok(outcome)
    }

    /// Rebuild local maps from the registry labels. No-op with sync off.
    ///
    /// Values whose mirror failed earlier are retried first and keep their
    /// local value either way. Returns the number of scopes now holding
    /// data.
    pub async fn pull_remote(&self) -> Result<usize, CoreError> {
        if !self.sync_enabled() {
            return Ok(0);
        }
        let _guard = self.write_lock.lock().await;
        self.rebuild_from_remote().await
    }

    // ── Private: label mirroring ─────────────────────────────────────

    fn label_names(&self) -> HashMap<String, String> {
        self.remote
            .labels()
            .into_iter()
            .map(|l| (l.label_id, l.name))
            .collect()
    }

    /// Decode a label id through its name. The id slug is only consulted
    /// for ids the label list does not know; a known foreign name stays
    /// foreign whatever its slug looks like.
    fn decode_id(&self, label_id: &str, names: &HashMap<String, String>) -> Option<(LabelKind, i64)> {
        match names.get(label_id) {
            Some(name) => self.codec.decode(name),
            None => self.codec.decode(label_id),
        }
    }

    async fn mirror_attach(
        &self,
        pending: PendingMirror,
        rank: i64,
    ) -> Result<RemoteWrite, CoreError> {
        if !self.sync_enabled() {
            return Ok(RemoteWrite::Skipped);
        }
        let result = self.attach(&pending.target(), pending.kind(), rank).await;
        let write = RemoteWrite::from_result(result, "attach");
        self.track_pending(pending, &write).await?;
        Ok(write)
    }

    async fn mirror_detach(&self, pending: PendingMirror) -> Result<RemoteWrite, CoreError> {
        if !self.sync_enabled() {
            return Ok(RemoteWrite::Skipped);
        }
        let result = self.detach(&pending.target(), pending.kind()).await;
        let write = RemoteWrite::from_result(result, "detach");
        self.track_pending(pending, &write).await?;
        Ok(write)
    }

    /// Remember a failed mirror, forget one that landed.
    async fn track_pending(
        &self,
        pending: PendingMirror,
        write: &RemoteWrite,
    ) -> Result<(), CoreError> {
        let mut set: BTreeSet<PendingMirror> = self.load_json(KEY_PENDING).await?;
        let changed = if write.is_failed() {
            set.insert(pending)
        } else {
            set.remove(&pending)
        };
        if !changed {
            return Ok(());
        }
        if set.is_empty() {
            self.storage.remove(KEY_PENDING).await
        } else {
            self.save_json(KEY_PENDING, &set).await
        }
    }

    /// Current local value behind a pending mirror; `None` means absent.
    async fn local_rank(&self, pending: &PendingMirror) -> Result<Option<i64>, CoreError> {
        match pending {
            PendingMirror::Order { scope, id } => self.get_order(scope, id).await,
            PendingMirror::Hidden { entity_id } => {
                Ok(self.is_hidden(entity_id).await?.then_some(HIDDEN_RANK))
            }
        }
    }

    /// Retry every pending mirror with its local value. Caller holds the
    /// write lock. Returns the local values that were pending.
    async fn retry_pending(&self) -> Result<Vec<(PendingMirror, Option<i64>)>, CoreError> {
        let pending: BTreeSet<PendingMirror> = self.load_json(KEY_PENDING).await?;
        let mut local = Vec::with_capacity(pending.len());
        for entry in pending {
            let rank = self.local_rank(&entry).await?;
            match rank {
                Some(rank) => self.mirror_attach(entry.clone(), rank).await?,
                None => self.mirror_detach(entry.clone()).await?,
            };
            local.push((entry, rank));
        }
        if !local.is_empty() {
            let left: BTreeSet<PendingMirror> = self.load_json(KEY_PENDING).await?;
            info!(retried = local.len(), still_pending = left.len(), "Retried pending mirrors");
        }
        Ok(local)
    }

    /// Replace the target's label of `kind` with one encoding `rank`.
    async fn attach(&self, target: &Target, kind: LabelKind, rank: i64) -> Result<bool, CoreError> {
        let name = self.codec.encode(kind, rank);
        let mut names = self.label_names();

        let label_id = match names.iter().find(|(_, n)| **n == name) {
            Some((id, _)) => id.clone(),
            None => {
                let label = self.remote.create_label(&name).await?;
                names.insert(label.label_id.clone(), label.name);
                label.label_id
            }
        };

        let current = self
            .remote
            .labels_of(target)
            .ok_or_else(|| CoreError::not_found("Registry target", target.to_string()))?;
        let mut next: Vec<String> = current
            .iter()
            .filter(|id| self.decode_id(id, &names).map(|(k, _)| k) != Some(kind))
            .cloned()
            .collect();
        next.push(label_id);

        if next == current {
            return Ok(false);
        }
        debug!(%target, label = %name, "Attaching label");
        self.remote.set_labels(target, next).await?;
        Ok(true)
    }

    /// Remove the target's label of `kind`, if any.
    async fn detach(&self, target: &Target, kind: LabelKind) -> Result<bool, CoreError> {
        let names = self.label_names();
        let Some(current) = self.remote.labels_of(target) else {
            return Ok(false);
        };
        let next: Vec<String> = current
            .iter()
            .filter(|id| self.decode_id(id, &names).map(|(k, _)| k) != Some(kind))
            .cloned()
            .collect();
        if next.len() == current.len() {
            return Ok(false);
        }
        debug!(%target, %kind, "Detaching label");
        self.remote.set_labels(target, next).await?;
        Ok(true)
    }

    async fn push_all(&self) -> Result<SyncReport, CoreError> {
        let mut report = SyncReport::default();
        let mut tally = |write: RemoteWrite| match write {
            RemoteWrite::Mirrored => report.mirrored += 1,
            RemoteWrite::Failed(_) => report.failed += 1,
            RemoteWrite::Skipped => {}
        };

        for scope in self.scopes().await? {
            for (id, rank) in self.order_map(&scope).await? {
                tally(self.mirror_attach(PendingMirror::order(&scope, &id), rank).await?);
            }
        }
        for entity_id in self.hidden().await? {
            tally(self.mirror_attach(PendingMirror::hidden(&entity_id), HIDDEN_RANK).await?);
        }
        Ok(report)
    }

    /// Detach every owned label, then delete the owned definitions.
    async fn remove_owned_labels(&self) -> SyncReport {
        let mut report = SyncReport::default();
        let names = self.label_names();

        for assignment in self.remote.assignments() {
            let kept: Vec<String> = assignment
                .labels
                .iter()
                .filter(|id| self.decode_id(id, &names).is_none())
                .cloned()
                .collect();
            if kept.len() == assignment.labels.len() {
                continue;
            }
            match self.remote.set_labels(&assignment.target, kept).await {
                Ok(()) => report.mirrored += 1,
                Err(e) => {
                    warn!(target = %assignment.target, error = %e, "Failed to detach owned labels");
                    report.failed += 1;
                }
            }
        }

        for label in self.remote.labels() {
            if !self.codec.is_owned(&label.name) {
                continue;
            }
            if let Err(e) = self.remote.delete_label(&label.label_id).await {
                warn!(label = %label.label_id, error = %e, "Failed to delete owned label");
                report.failed += 1;
            }
        }
        report
    }

    /// Replace local maps with what the labels encode, except for values
    /// whose mirror was pending. Caller holds the write lock.
    async fn rebuild_from_remote(&self) -> Result<usize, CoreError> {
        let pending = self.retry_pending().await?;
        let names = self.label_names();
        let mut maps: BTreeMap<Scope, OrderMap> = BTreeMap::new();
        let mut hidden = BTreeSet::new();

        for assignment in self.remote.assignments() {
            for label_id in &assignment.labels {
                let Some((kind, rank)) = self.decode_id(label_id, &names) else {
                    continue;
                };
                let id = assignment.target.id().to_owned();
                let scope = match (kind, &assignment.target) {
                    (LabelKind::Hidden, Target::Entity(_)) => {
                        hidden.insert(id);
                        continue;
                    }
                    (LabelKind::Order, Target::Area(_)) => Scope::Rooms,
                    (LabelKind::Order, Target::Entity(_)) => {
                        match (&assignment.area_id, &assignment.domain) {
                            (Some(area), Some(domain)) => Scope::room_domain(area, domain),
                            _ => {
                                debug!(entity = %id, "Order label on entity without room, skipped");
                                continue;
                            }
                        }
                    }
                    (kind, target) => match Section::from_label_kind(kind) {
                        Some(section) if Scope::favorites(section).target(&id) == *target => {
                            Scope::favorites(section)
                        }
                        _ => continue,
                    },
                };
                maps.entry(scope).or_default().insert(id, rank);
            }
        }

        // Local values win over labels that never saw them.
        for (entry, rank) in pending {
            match (entry, rank) {
                (PendingMirror::Order { scope, id }, Some(rank)) => {
                    maps.entry(scope).or_default().insert(id, rank);
                }
                (PendingMirror::Order { scope, id }, None) => {
                    if let Some(map) = maps.get_mut(&scope) {
                        map.remove(&id);
                    }
                }
                (PendingMirror::Hidden { entity_id }, Some(_)) => {
                    hidden.insert(entity_id);
                }
                (PendingMirror::Hidden { entity_id }, None) => {
                    hidden.remove(&entity_id);
                }
            }
        }
        maps.retain(|_, map| !map.is_empty());

        for stale in self.scopes().await? {
            if !maps.contains_key(&stale) {
                self.storage.remove(&stale.storage_key()).await?;
            }
        }
        for (scope, map) in &maps {
            self.save_json(&scope.storage_key(), map).await?;
        }
        let index: BTreeSet<Scope> = maps.keys().cloned().collect();
        self.save_json(KEY_SCOPES, &index).await?;
        self.save_json(KEY_HIDDEN, &hidden).await?;

        debug!(scopes = maps.len(), hidden = hidden.len(), "Local order rebuilt from labels");
        Ok(maps.len())
    }

    // ── Private: persistence ─────────────────────────────────────────

    async fn load_json<T>(&self, key: &str) -> Result<T, CoreError>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        match self.storage.get(key).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(T::default()),
        }
    }

    async fn save_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), CoreError> {
        let raw = serde_json::to_string(value)?;
        self.storage.set(key, &raw).await
    }

    /// Persist a scope's map and keep the scope index in step.
    async fn save_map(&self, scope: &Scope, map: &OrderMap) -> Result<(), CoreError> {
        let mut index = self.scopes().await?;
        if map.is_empty() {
            self.storage.remove(&scope.storage_key()).await?;
            if index.remove(scope) {
                self.save_json(KEY_SCOPES, &index).await?;
            }
        } else {
            self.save_json(&scope.storage_key(), map).await?;
            if index.insert(scope.clone()) {
                self.save_json(KEY_SCOPES, &index).await?;
            }
        }
        Ok(())
    }
}
