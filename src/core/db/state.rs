use std::{
    collections::BTreeSet,
    ops::{Deref, DerefMut},
    sync::Arc,
};

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::core::{
    blob::BlobStore,
    config::StoreConfig,
    db::{
        Note, Project, QuickCalcEntry,
        favorites::Favorites,
        model::{Collection, EntityKind, StorageInfo},
        tree::{Removed, Tree},
        util,
    },
};

/// Immutable view of everything the store holds at one revision.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub(crate) tree: Tree,
    pub(crate) notes: Vec<Note>,
    pub(crate) favorites: Favorites,
    pub(crate) history: Vec<QuickCalcEntry>,
    pub(crate) revision: u64,
}

impl Snapshot {
    /// Bumped by every committed mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn projects(&self) -> Vec<Project> {
        self.tree.projects()
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn quick_calc_history(&self) -> &[QuickCalcEntry] {
        &self.history
    }

    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        match kind {
            EntityKind::Note => self.notes.iter().any(|note| note.id == id),
            _ => self.tree.contains(kind, id),
        }
    }

    /// Favorite ids that still resolve to a live entity.
    pub fn favorites(&self, kind: EntityKind) -> Vec<String> {
        self.favorites
            .ids(kind)
            .iter()
            .filter(|id| self.contains(kind, id))
            .cloned()
            .collect()
    }

    pub fn is_favorite(&self, kind: EntityKind, id: &str) -> bool {
        self.favorites.contains(kind, id) && self.contains(kind, id)
    }

    pub fn storage_info(&self) -> StorageInfo {
        StorageInfo {
            project_count: self.tree.project_count(),
            building_count: self.tree.building_count(),
            zone_count: self.tree.zone_count(),
            shutter_count: self.tree.shutter_count(),
            note_count: self.notes.len(),
            approx_size_bytes: serde_json::to_string(&self.tree.projects())
                .map(|blob| blob.len())
                .unwrap_or(0),
        }
    }

    fn serialize(&self, collection: Collection) -> anyhow::Result<String> {
        let blob = match collection {
            Collection::Projects => serde_json::to_string(&self.tree.projects()),
            Collection::Notes => serde_json::to_string(&self.notes),
            Collection::QuickCalcHistory => serde_json::to_string(&self.history),
            favorites => {
                let kind = favorites
                    .favorite_kind()
                    .context("Collection is not a favorites list")?;
                serde_json::to_string(self.favorites.ids(kind))
            }
        };
        blob.with_context(|| format!("Failed to serialize {}", collection.key_name()))
    }
}

/// Working copy of a snapshot plus the collections it touched.
#[derive(Debug)]
pub(crate) struct Draft {
    snapshot: Snapshot,
    dirty: BTreeSet<Collection>,
}

impl Draft {
    pub fn mark(&mut self, collection: Collection) {
        self.dirty.insert(collection);
    }

    /// Remove an entity with its descendants and their favorite entries.
    pub fn remove_entity(&mut self, kind: EntityKind, id: &str, now: OffsetDateTime) -> bool {
        let removed = if kind == EntityKind::Note {
            let before = self.notes.len();
            self.notes.retain(|note| note.id != id);
            if self.notes.len() == before {
                return false;
            }
            self.mark(Collection::Notes);
            Removed::note(id)
        } else {
            let owner = match kind {
                EntityKind::Project => None,
                _ => self.tree.owning_project(kind, id),
            };
            let Some(removed) = self.tree.remove(kind, id) else {
                return false;
            };
            if let Some(owner) = owner {
                self.tree.touch_project(&owner, now);
            }
            self.mark(Collection::Projects);
            removed
        };
        self.forget_favorites(&removed);
        true
    }

    fn forget_favorites(&mut self, removed: &Removed) {
        for kind in EntityKind::ALL {
            if self.snapshot.favorites.forget(kind, removed.ids(kind)) {
                self.mark(kind.favorites_collection());
            }
        }
    }
}

impl Deref for Draft {
    type Target = Snapshot;
    fn deref(&self) -> &Self::Target {
        &self.snapshot
    }
}

impl DerefMut for Draft {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.snapshot
    }
}

pub(crate) struct StoreState<B> {
    blobs: B,
    config: StoreConfig,
    /// Serializes mutations; held across the persistence await.
    write_gate: Mutex<()>,
    current: watch::Sender<Arc<Snapshot>>,
}

impl<B> std::fmt::Debug for StoreState<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreState")
            .field("key_prefix", &self.config.key_prefix)
            .field("revision", &self.current.borrow().revision)
            .finish()
    }
}

impl<B: BlobStore> StoreState<B> {
    /// Read and parse every blob. Malformed blobs load as empty
    /// collections; read failures abort.
    pub(crate) async fn load(blobs: B, config: StoreConfig) -> anyhow::Result<Self> {
        let mut snapshot = Snapshot::default();
        for collection in Collection::ALL {
            let key = config.key_for(collection.key_name());
            let raw = blobs
                .get(&key)
                .await
                .with_context(|| format!("Failed to load {}", key))?;
            match collection {
                Collection::Projects => {
                    let projects: Vec<Project> = parse_records(&key, raw);
                    snapshot.tree = Tree::from_projects(projects);
                }
                Collection::Notes => snapshot.notes = parse_records(&key, raw),
                Collection::QuickCalcHistory => {
                    snapshot.history = parse_records(&key, raw)
                        .into_iter()
                        .map(QuickCalcEntry::rerate)
                        .collect();
                }
                favorites => {
                    if let Some(kind) = favorites.favorite_kind() {
                        snapshot.favorites.set(kind, parse_records(&key, raw));
                    }
                }
            }
        }
        info!(
            prefix = %config.key_prefix,
            projects = snapshot.tree.project_count(),
            shutters = snapshot.tree.shutter_count(),
            notes = snapshot.notes.len(),
            "Store ready"
        );
        let (current, _) = watch::channel(Arc::new(snapshot));
        Ok(Self {
            blobs,
            config,
            write_gate: Mutex::new(()),
            current,
        })
    }

    pub(crate) fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn snapshot(&self) -> Arc<Snapshot> {
        self.current.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.current.subscribe()
    }

    /// Run `edit` on a copy of the current snapshot. If it yields a value,
    /// every collection it marked is written out and only then does the copy
    /// become the current snapshot. A failed write leaves memory untouched.
    pub(crate) async fn mutate<T, F>(&self, operation: &str, edit: F) -> anyhow::Result<Option<T>>
    where
        F: FnOnce(&mut Draft) -> Option<T>,
    {
        let _gate = self.write_gate.lock().await;
        let mut draft = Draft {
            snapshot: Snapshot::clone(&self.snapshot()),
            dirty: BTreeSet::new(),
        };
        let Some(output) = edit(&mut draft) else {
            debug!(operation, "Nothing to change");
            return Ok(None);
        };
        if draft.dirty.is_empty() {
            return Ok(Some(output));
        }
        for collection in &draft.dirty {
            let key = self.config.key_for(collection.key_name());
            let blob = draft.snapshot.serialize(*collection)?;
            self.blobs
                .set(&key, &blob)
                .await
                .with_context(|| format!("Failed to persist {} during {}", key, operation))?;
            debug!(operation, key = %key, bytes = blob.len(), "Persisted collection");
        }
        draft.snapshot.revision += 1;
        self.current.send_replace(Arc::new(draft.snapshot));
        Ok(Some(output))
    }

    /// Remove every blob under the configured namespace and reset memory.
    pub(crate) async fn clear_all(&self) -> anyhow::Result<usize> {
        let _gate = self.write_gate.lock().await;
        let namespace = self.config.namespace();
        let mut removed = 0;
        for key in self.blobs.keys().await? {
            if key.starts_with(&namespace) {
                self.blobs
                    .remove(&key)
                    .await
                    .with_context(|| format!("Failed to clear {}", key))?;
                removed += 1;
            }
        }
        let revision = self.current.borrow().revision + 1;
        self.current.send_replace(Arc::new(Snapshot {
            revision,
            ..Snapshot::default()
        }));
        info!(prefix = %self.config.key_prefix, blobs = removed, "Cleared all data");
        Ok(removed)
    }
}

/// Records that fail to parse are dropped one by one, so a single bad
/// entry never empties its collection. Unreadable JSON loads as empty.
fn parse_records<T: DeserializeOwned>(key: &str, raw: Option<String>) -> Vec<T> {
    let Some(text) = raw else {
        return Vec::new();
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(value) => util::records_from_value(Some(value), key),
        Err(e) => {
            warn!(key, error = %e, "Malformed blob, starting with an empty collection");
            Vec::new()
        }
    }
}
