use std::future::Future;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::compliance::ComplianceSummary;
use crate::core::db::{shutter::Shutter, util};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionalZone {
    pub id: String,
    #[serde(default)]
    pub building_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(with = "util::timestamp", default = "util::now")]
    pub created_at: OffsetDateTime,
    #[serde(default, deserialize_with = "util::lenient_records")]
    pub shutters: Vec<Shutter>,
}

impl FunctionalZone {
    pub fn compliance_summary(&self) -> ComplianceSummary {
        ComplianceSummary::from_shutters(&self.shutters)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewFunctionalZone {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FunctionalZoneUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

impl FunctionalZoneUpdate {
    pub(crate) fn apply(self, zone: &mut FunctionalZone) {
        if let Some(name) = self.name {
            zone.name = name;
        }
        if let Some(description) = self.description {
            zone.description = description;
        }
    }
}

pub trait FunctionalZoneRepository {
    fn functional_zone(&self, id: &str) -> Option<FunctionalZone>;
    fn create_functional_zone(
        &self,
        building_id: &str,
        zone: NewFunctionalZone,
    ) -> impl Future<Output = anyhow::Result<Option<FunctionalZone>>>;
    fn update_functional_zone(
        &self,
        id: &str,
        update: FunctionalZoneUpdate,
    ) -> impl Future<Output = anyhow::Result<Option<FunctionalZone>>>;
    fn delete_functional_zone(&self, id: &str) -> impl Future<Output = anyhow::Result<bool>>;
}
