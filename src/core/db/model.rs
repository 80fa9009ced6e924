use serde::{Deserialize, Serialize};

/// The five entity kinds a user can favorite or delete in bulk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Project,
    Building,
    FunctionalZone,
    Shutter,
    Note,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Project,
        EntityKind::Building,
        EntityKind::FunctionalZone,
        EntityKind::Shutter,
        EntityKind::Note,
    ];

    /// Blob holding the favorite ids of this kind.
    pub fn favorites_collection(self) -> Collection {
        match self {
            EntityKind::Project => Collection::FavoriteProjects,
            EntityKind::Building => Collection::FavoriteBuildings,
            EntityKind::FunctionalZone => Collection::FavoriteZones,
            EntityKind::Shutter => Collection::FavoriteShutters,
            EntityKind::Note => Collection::FavoriteNotes,
        }
    }
}

/// One persisted blob. Each is written whole on every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    Projects,
    Notes,
    FavoriteProjects,
    FavoriteBuildings,
    FavoriteZones,
    FavoriteShutters,
    FavoriteNotes,
    QuickCalcHistory,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Projects,
        Collection::Notes,
        Collection::FavoriteProjects,
        Collection::FavoriteBuildings,
        Collection::FavoriteZones,
        Collection::FavoriteShutters,
        Collection::FavoriteNotes,
        Collection::QuickCalcHistory,
    ];

    pub fn key_name(self) -> &'static str {
        match self {
            Collection::Projects => "PROJECTS",
            Collection::Notes => "NOTES",
            Collection::FavoriteProjects => "FAVORITE_PROJECTS",
            Collection::FavoriteBuildings => "FAVORITE_BUILDINGS",
            Collection::FavoriteZones => "FAVORITE_ZONES",
            Collection::FavoriteShutters => "FAVORITE_SHUTTERS",
            Collection::FavoriteNotes => "FAVORITE_NOTES",
            Collection::QuickCalcHistory => "QUICK_CALC_HISTORY",
        }
    }

    pub fn favorite_kind(self) -> Option<EntityKind> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.favorites_collection() == self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    pub project_count: usize,
    pub building_count: usize,
    pub zone_count: usize,
    pub shutter_count: usize,
    pub note_count: usize,
    /// Length in bytes of the serialized projects blob.
    pub approx_size_bytes: usize,
}
