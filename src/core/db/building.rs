use std::future::Future;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::compliance::ComplianceSummary;
use crate::core::db::{util, zone::FunctionalZone};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Building {
    pub id: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(with = "util::timestamp", default = "util::now")]
    pub created_at: OffsetDateTime,
    #[serde(default, deserialize_with = "util::lenient_records")]
    pub functional_zones: Vec<FunctionalZone>,
}

impl Building {
    pub fn shutter_count(&self) -> usize {
        self.functional_zones.iter().map(|z| z.shutters.len()).sum()
    }

    pub fn compliance_summary(&self) -> ComplianceSummary {
        ComplianceSummary::from_shutters(self.functional_zones.iter().flat_map(|z| &z.shutters))
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewBuilding {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BuildingUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

impl BuildingUpdate {
    pub(crate) fn apply(self, building: &mut Building) {
        if let Some(name) = self.name {
            building.name = name;
        }
        if let Some(description) = self.description {
            building.description = description;
        }
    }
}

pub trait BuildingRepository {
    fn building(&self, id: &str) -> Option<Building>;
    fn create_building(
        &self,
        project_id: &str,
        building: NewBuilding,
    ) -> impl Future<Output = anyhow::Result<Option<Building>>>;
    fn update_building(
        &self,
        id: &str,
        update: BuildingUpdate,
    ) -> impl Future<Output = anyhow::Result<Option<Building>>>;
    fn delete_building(&self, id: &str) -> impl Future<Output = anyhow::Result<bool>>;
}
