pub mod compliance;
pub mod core;

pub use compliance::{
    ComplianceResult, ComplianceStatus, ComplianceSummary, calculate_compliance, is_measurable,
};
pub use crate::core::{
    BlobStore, FileBlobStore, MemoryBlobStore, StoreConfig,
    db::{CalcDb, EntityKind, ProjectExport, Snapshot, StorageInfo},
};
