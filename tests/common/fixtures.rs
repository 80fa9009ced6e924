use std::collections::HashSet;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use smokecalc::core::db::{
    BuildingRepository, FunctionalZoneRepository, NewBuilding, NewFunctionalZone, NewProject,
    NewShutter, ProjectRepository, ShutterRepository, ShutterType,
};
use smokecalc::core::db::{Building, CalcDb, FunctionalZone, Project, Shutter};
use smokecalc::{BlobStore, MemoryBlobStore, StoreConfig};

/// 1x1 transparent PNG.
pub const TEST_IMAGE: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

/// Creates an in-memory store with the default configuration.
pub async fn create_test_db() -> CalcDb<MemoryBlobStore> {
    CalcDb::with_store(MemoryBlobStore::new(), StoreConfig::default())
        .await
        .expect("Failed to create test store")
}

/// Creates a file-backed store in a temporary directory.
/// Returns both the store and the temp directory (which must be kept alive).
pub async fn create_file_db() -> (CalcDb, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let db = CalcDb::open(StoreConfig::default().with_data_dir(dir.path().join("data")))
        .await
        .expect("Failed to open file store");
    (db, dir)
}

pub fn make_new_shutter(name: &str, shutter_type: ShutterType, reference: f64, measured: f64) -> NewShutter {
    NewShutter {
        name: name.to_string(),
        shutter_type,
        reference_flow: reference,
        measured_flow: measured,
        remarks: None,
    }
}

/// One project with one building, zone and shutter.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    pub project: Project,
    pub building: Building,
    pub zone: FunctionalZone,
    pub shutter: Shutter,
}

/// Seeds "Résidence Les Tilleuls" / "Bâtiment A" / "Parking niveau -1" /
/// "VH-01" (high, 5000 reference, 4800 measured).
pub async fn seed_hierarchy<B: BlobStore>(db: &CalcDb<B>) -> anyhow::Result<Hierarchy> {
    let project = db
        .create_project(NewProject {
            name: "Résidence Les Tilleuls".to_string(),
            city: Some("Grenoble".to_string()),
            ..NewProject::default()
        })
        .await?;
    let building = db
        .create_building(
            &project.id,
            NewBuilding {
                name: "Bâtiment A".to_string(),
                description: Some("Aile nord".to_string()),
            },
        )
        .await?
        .expect("project exists");
    let zone = db
        .create_functional_zone(
            &building.id,
            NewFunctionalZone {
                name: "Parking niveau -1".to_string(),
                description: None,
            },
        )
        .await?
        .expect("building exists");
    let shutter = db
        .create_shutter(
            &zone.id,
            make_new_shutter("VH-01", ShutterType::High, 5000.0, 4800.0),
        )
        .await?
        .expect("zone exists");
    let project = db.project(&project.id).expect("project exists");
    Ok(Hierarchy {
        project,
        building,
        zone,
        shutter,
    })
}

/// Memory store whose writes can be made to fail, for every key or for
/// chosen keys only.
#[derive(Debug, Default)]
pub struct FlakyBlobStore {
    inner: MemoryBlobStore,
    fail_writes: AtomicBool,
    failing_keys: Mutex<HashSet<String>>,
}

impl FlakyBlobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make writes to `key` fail from now on.
    pub fn fail_key(&self, key: &str) {
        self.failing_keys
            .lock()
            .expect("failing key set poisoned")
            .insert(key.to_string());
    }

    fn should_fail(&self, key: &str) -> bool {
        self.fail_writes.load(Ordering::SeqCst)
            || self
                .failing_keys
                .lock()
                .expect("failing key set poisoned")
                .contains(key)
    }
}

impl BlobStore for FlakyBlobStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        if self.should_fail(key) {
            anyhow::bail!("simulated write failure for {}", key);
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.inner.remove(key).await
    }

    async fn keys(&self) -> anyhow::Result<Vec<String>> {
        self.inner.keys().await
    }
}
