mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from smokecalc for tests
pub use smokecalc::core::db::{
    Building, BuildingRepository, BuildingUpdate, CalcDb, Collection, EntityKind,
    FavoriteRepository, FunctionalZone, FunctionalZoneRepository, FunctionalZoneUpdate,
    HistoryRepository, InterchangeRepository, NewBuilding, NewFunctionalZone, NewNote, NewProject,
    NewShutter, Note, NoteRepository, NoteUpdate, Project, ProjectExport, ProjectRepository,
    ProjectUpdate, Shutter, ShutterRepository, ShutterType, ShutterUpdate,
};
pub use smokecalc::{BlobStore, ComplianceStatus, MemoryBlobStore, StoreConfig};
