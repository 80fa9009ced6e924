mod building;
mod favorites;
mod history;
mod interchange;
mod model;
mod note;
mod project;
mod shutter;
mod state;
mod tree;
mod util;
mod zone;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use crate::core::{
    blob::{BlobStore, FileBlobStore},
    config::StoreConfig,
};
use state::StoreState;

pub use building::{Building, BuildingRepository, BuildingUpdate, NewBuilding};
pub use favorites::{FavoriteRepository, Favorites, sort_favorites_first};
pub use history::{HistoryRepository, QuickCalcEntry};
pub use interchange::{
    INTERCHANGE_EXTENSION, INTERCHANGE_VERSION, ImportedProject, InterchangeRepository,
    ProjectExport,
};
pub use model::{Collection, EntityKind, StorageInfo};
pub use note::{NewNote, Note, NoteRepository, NoteUpdate, is_valid_image_data_uri};
pub use project::{NewProject, Project, ProjectRepository, ProjectUpdate};
pub use shutter::{NewShutter, Shutter, ShutterMatch, ShutterRepository, ShutterType, ShutterUpdate};
pub use state::Snapshot;
pub use zone::{FunctionalZone, FunctionalZoneRepository, FunctionalZoneUpdate, NewFunctionalZone};

/// Projects, notes, favorites and quick-calc history, persisted as whole
/// JSON blobs after every change.
pub struct CalcDb<B = FileBlobStore> {
    state: Arc<StoreState<B>>,
}

impl<B> Clone for CalcDb<B> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<B> std::fmt::Debug for CalcDb<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalcDb")
            .field("state", &self.state)
            .finish()
    }
}

impl CalcDb<FileBlobStore> {
    /// Open (or create) the file-backed store in `config.data_dir`.
    pub async fn open(config: StoreConfig) -> anyhow::Result<Self> {
        let blobs = FileBlobStore::new(&config.data_dir).await?;
        Self::with_store(blobs, config).await
    }
}

impl<B: BlobStore> CalcDb<B> {
    /// Load every collection from `blobs`. The returned store is ready.
    pub async fn with_store(blobs: B, config: StoreConfig) -> anyhow::Result<Self> {
        Ok(Self {
            state: Arc::new(StoreState::load(blobs, config).await?),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        self.state.config()
    }

    /// The last committed state.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.state.snapshot()
    }

    /// Receiver notified after every committed mutation.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.state.subscribe()
    }

    pub fn storage_info(&self) -> StorageInfo {
        self.snapshot().storage_info()
    }

    /// Erase every blob under the key namespace and empty all collections.
    pub async fn clear_all_data(&self) -> anyhow::Result<()> {
        self.state.clear_all().await.map(|_| ())
    }

    /// Delete several entities of one kind with one write per touched
    /// collection. Unknown ids are skipped; returns how many were removed.
    pub async fn delete_many(&self, kind: EntityKind, ids: &[String]) -> anyhow::Result<usize> {
        let removed = self
            .state
            .mutate("delete_many", |draft| {
                let now = util::now();
                let count = ids
                    .iter()
                    .filter(|id| draft.remove_entity(kind, id, now))
                    .count();
                (count > 0).then_some(count)
            })
            .await?;
        Ok(removed.unwrap_or(0))
    }

    async fn delete_entity(&self, operation: &str, kind: EntityKind, id: &str) -> anyhow::Result<bool> {
        let removed = self
            .state
            .mutate(operation, |draft| {
                draft.remove_entity(kind, id, util::now()).then_some(())
            })
            .await?;
        Ok(removed.is_some())
    }
}

impl<B: BlobStore> ProjectRepository for CalcDb<B> {
    fn projects(&self) -> Vec<Project> {
        self.snapshot().projects()
    }

    fn project(&self, id: &str) -> Option<Project> {
        self.snapshot().tree.project(id)
    }

    async fn create_project(&self, project: NewProject) -> anyhow::Result<Project> {
        let created = self
            .state
            .mutate("create_project", |draft| {
                let now = util::now();
                let project = Project {
                    id: util::new_id(),
                    name: project.name,
                    city: project.city,
                    start_date: project.start_date,
                    end_date: project.end_date,
                    created_at: now,
                    updated_at: now,
                    buildings: Vec::new(),
                };
                if !draft.tree.insert_project(project.clone()) {
                    return None;
                }
                draft.mark(Collection::Projects);
                Some(project)
            })
            .await?;
        let created = created.ok_or_else(|| anyhow::anyhow!("Generated project id already in use"))?;
        Ok(created)
    }

    async fn update_project(&self, id: &str, update: ProjectUpdate) -> anyhow::Result<Option<Project>> {
        self.state
            .mutate("update_project", |draft| {
                let project = draft.tree.project_mut(id)?;
                update.apply(project);
                project.updated_at = util::now();
                draft.mark(Collection::Projects);
                draft.tree.project(id)
            })
            .await
    }

    async fn delete_project(&self, id: &str) -> anyhow::Result<bool> {
        self.delete_entity("delete_project", EntityKind::Project, id).await
    }
}

impl<B: BlobStore> BuildingRepository for CalcDb<B> {
    fn building(&self, id: &str) -> Option<Building> {
        self.snapshot().tree.building(id)
    }

    async fn create_building(
        &self,
        project_id: &str,
        building: NewBuilding,
    ) -> anyhow::Result<Option<Building>> {
        self.state
            .mutate("create_building", |draft| {
                let now = util::now();
                let building = Building {
                    id: util::new_id(),
                    project_id: project_id.to_string(),
                    name: building.name,
                    description: building.description,
                    created_at: now,
                    functional_zones: Vec::new(),
                };
                if !draft.tree.attach_building(project_id, building.clone()) {
                    return None;
                }
                draft.tree.touch_project(project_id, now);
                draft.mark(Collection::Projects);
                Some(building)
            })
            .await
    }

    async fn update_building(
        &self,
        id: &str,
        update: BuildingUpdate,
    ) -> anyhow::Result<Option<Building>> {
        self.state
            .mutate("update_building", |draft| {
                let building = draft.tree.building_mut(id)?;
                update.apply(building);
                let project_id = building.project_id.clone();
                draft.tree.touch_project(&project_id, util::now());
                draft.mark(Collection::Projects);
                draft.tree.building(id)
            })
            .await
    }

    async fn delete_building(&self, id: &str) -> anyhow::Result<bool> {
        self.delete_entity("delete_building", EntityKind::Building, id).await
    }
}

impl<B: BlobStore> FunctionalZoneRepository for CalcDb<B> {
    fn functional_zone(&self, id: &str) -> Option<FunctionalZone> {
        self.snapshot().tree.functional_zone(id)
    }

    async fn create_functional_zone(
        &self,
        building_id: &str,
        zone: NewFunctionalZone,
    ) -> anyhow::Result<Option<FunctionalZone>> {
        self.state
            .mutate("create_functional_zone", |draft| {
                let now = util::now();
                let zone = FunctionalZone {
                    id: util::new_id(),
                    building_id: building_id.to_string(),
                    name: zone.name,
                    description: zone.description,
                    created_at: now,
                    shutters: Vec::new(),
                };
                if !draft.tree.attach_zone(building_id, zone.clone()) {
                    return None;
                }
                if let Some(project_id) = draft.tree.owning_project(EntityKind::Building, building_id) {
                    draft.tree.touch_project(&project_id, now);
                }
                draft.mark(Collection::Projects);
                Some(zone)
            })
            .await
    }

    async fn update_functional_zone(
        &self,
        id: &str,
        update: FunctionalZoneUpdate,
    ) -> anyhow::Result<Option<FunctionalZone>> {
        self.state
            .mutate("update_functional_zone", |draft| {
                update.apply(draft.tree.zone_mut(id)?);
                if let Some(project_id) = draft.tree.owning_project(EntityKind::FunctionalZone, id) {
                    draft.tree.touch_project(&project_id, util::now());
                }
                draft.mark(Collection::Projects);
                draft.tree.functional_zone(id)
            })
            .await
    }

    async fn delete_functional_zone(&self, id: &str) -> anyhow::Result<bool> {
        self.delete_entity("delete_functional_zone", EntityKind::FunctionalZone, id)
            .await
    }
}

impl<B: BlobStore> ShutterRepository for CalcDb<B> {
    fn shutter(&self, id: &str) -> Option<Shutter> {
        self.snapshot().tree.shutter(id).cloned()
    }

    fn search_shutters(&self, query: &str) -> Vec<ShutterMatch> {
        self.snapshot().tree.search_shutters(&util::tokenize(query))
    }

    async fn create_shutter(&self, zone_id: &str, shutter: NewShutter) -> anyhow::Result<Option<Shutter>> {
        self.state
            .mutate("create_shutter", |draft| {
                let now = util::now();
                let shutter = Shutter {
                    id: util::new_id(),
                    zone_id: zone_id.to_string(),
                    name: shutter.name,
                    shutter_type: shutter.shutter_type,
                    reference_flow: shutter.reference_flow,
                    measured_flow: shutter.measured_flow,
                    remarks: shutter.remarks,
                    created_at: now,
                    updated_at: now,
                };
                if !draft.tree.attach_shutter(zone_id, shutter.clone()) {
                    return None;
                }
                if let Some(project_id) = draft.tree.owning_project(EntityKind::FunctionalZone, zone_id) {
                    draft.tree.touch_project(&project_id, now);
                }
                draft.mark(Collection::Projects);
                Some(shutter)
            })
            .await
    }

    async fn update_shutter(&self, id: &str, update: ShutterUpdate) -> anyhow::Result<Option<Shutter>> {
        self.state
            .mutate("update_shutter", |draft| {
                let now = util::now();
                let shutter = draft.tree.shutter_mut(id)?;
                update.apply(shutter);
                shutter.updated_at = now;
                let updated = shutter.clone();
                if let Some(project_id) = draft.tree.owning_project(EntityKind::Shutter, id) {
                    draft.tree.touch_project(&project_id, now);
                }
                draft.mark(Collection::Projects);
                Some(updated)
            })
            .await
    }

    async fn delete_shutter(&self, id: &str) -> anyhow::Result<bool> {
        self.delete_entity("delete_shutter", EntityKind::Shutter, id).await
    }
}

impl<B: BlobStore> NoteRepository for CalcDb<B> {
    fn notes(&self) -> Vec<Note> {
        self.snapshot().notes().to_vec()
    }

    fn note(&self, id: &str) -> Option<Note> {
        self.snapshot().notes().iter().find(|note| note.id == id).cloned()
    }

    async fn create_note(&self, note: NewNote) -> anyhow::Result<Note> {
        let created = self
            .state
            .mutate("create_note", |draft| {
                let now = util::now();
                let note = Note {
                    id: util::new_id(),
                    title: note.title,
                    content: note.content,
                    description: note.description,
                    location: note.location,
                    tags: note.tags,
                    images: note.images.map(note::retain_valid_images),
                    created_at: now,
                    updated_at: now,
                };
                draft.notes.push(note.clone());
                draft.mark(Collection::Notes);
                Some(note)
            })
            .await?;
        created.ok_or_else(|| anyhow::anyhow!("Note creation produced no note"))
    }

    async fn update_note(&self, id: &str, update: NoteUpdate) -> anyhow::Result<Option<Note>> {
        self.state
            .mutate("update_note", |draft| {
                let note = draft.notes.iter_mut().find(|note| note.id == id)?;
                update.apply(note);
                note.updated_at = util::now();
                let updated = note.clone();
                draft.mark(Collection::Notes);
                Some(updated)
            })
            .await
    }

    async fn delete_note(&self, id: &str) -> anyhow::Result<bool> {
        self.delete_entity("delete_note", EntityKind::Note, id).await
    }
}

impl<B: BlobStore> FavoriteRepository for CalcDb<B> {
    fn favorites(&self, kind: EntityKind) -> Vec<String> {
        self.snapshot().favorites(kind)
    }

    fn is_favorite(&self, kind: EntityKind, id: &str) -> bool {
        self.snapshot().is_favorite(kind, id)
    }

    async fn set_favorites(&self, kind: EntityKind, ids: Vec<String>) -> anyhow::Result<()> {
        self.state
            .mutate("set_favorites", |draft| {
                draft.favorites.set(kind, ids);
                draft.mark(kind.favorites_collection());
                Some(())
            })
            .await?;
        Ok(())
    }

    async fn toggle_favorites(&self, kind: EntityKind, ids: &[String]) -> anyhow::Result<Vec<String>> {
        let live = self
            .state
            .mutate("toggle_favorites", |draft| {
                let mut list = draft.favorites.ids(kind).to_vec();
                for id in ids {
                    match list.iter().position(|fav| fav == id) {
                        Some(index) => {
                            list.remove(index);
                        }
                        None => list.push(id.clone()),
                    }
                }
                draft.favorites.set(kind, list);
                draft.mark(kind.favorites_collection());
                Some(draft.favorites(kind))
            })
            .await?;
        Ok(live.unwrap_or_default())
    }
}

impl<B: BlobStore> HistoryRepository for CalcDb<B> {
    fn quick_calc_history(&self) -> Vec<QuickCalcEntry> {
        self.snapshot().quick_calc_history().to_vec()
    }

    async fn record_quick_calc(&self, reference_flow: f64, measured_flow: f64) -> anyhow::Result<QuickCalcEntry> {
        let limit = self.config().history_limit;
        let recorded = self
            .state
            .mutate("record_quick_calc", |draft| {
                let entry = QuickCalcEntry::evaluate(reference_flow, measured_flow);
                draft.history.insert(0, entry.clone());
                draft.history.truncate(limit);
                draft.mark(Collection::QuickCalcHistory);
                Some(entry)
            })
            .await?;
        recorded.ok_or_else(|| anyhow::anyhow!("Quick calculation was not recorded"))
    }

    async fn delete_history_entry(&self, id: &str) -> anyhow::Result<bool> {
        let removed = self
            .state
            .mutate("delete_history_entry", |draft| {
                let before = draft.history.len();
                draft.history.retain(|entry| entry.id != id);
                if draft.history.len() == before {
                    return None;
                }
                draft.mark(Collection::QuickCalcHistory);
                Some(())
            })
            .await?;
        Ok(removed.is_some())
    }

    async fn clear_quick_calc_history(&self) -> anyhow::Result<()> {
        self.state
            .mutate("clear_quick_calc_history", |draft| {
                draft.history.clear();
                draft.mark(Collection::QuickCalcHistory);
                Some(())
            })
            .await?;
        Ok(())
    }
}

impl<B: BlobStore> InterchangeRepository for CalcDb<B> {
    fn export_project(&self, project_id: &str) -> Option<ProjectExport> {
        let snapshot = self.snapshot();
        let project = snapshot.tree.project(project_id)?;
        let related_notes = interchange::select_related_notes(&project, snapshot.notes());
        Some(ProjectExport::new(project, related_notes))
    }

    async fn try_import_project(&self, export: ProjectExport) -> anyhow::Result<ImportedProject> {
        let now = util::now();
        let project = interchange::reassign_ids(export.project, now);
        let notes: Vec<Note> = export
            .related_notes
            .into_iter()
            .map(|note| interchange::reassign_note_id(note, now))
            .collect();

        self.state
            .mutate("import_project", |draft| {
                if !draft.tree.insert_project(project.clone()) {
                    return None;
                }
                draft.mark(Collection::Projects);
                Some(())
            })
            .await?
            .ok_or_else(|| anyhow::anyhow!("Imported project id already in use"))?;

        if !notes.is_empty() {
            self.state
                .mutate("import_notes", |draft| {
                    draft.notes.extend(notes.iter().cloned());
                    draft.mark(Collection::Notes);
                    Some(())
                })
                .await?;
        }

        info!(
            project_id = %project.id,
            shutters = project.shutter_count(),
            notes = notes.len(),
            "Imported project"
        );
        Ok(ImportedProject { project, notes })
    }

    async fn import_project(&self, export: ProjectExport) -> bool {
        match self.try_import_project(export).await {
            Ok(_) => true,
            Err(e) => {
                error!(error = ?e, "Project import failed");
                false
            }
        }
    }
}
