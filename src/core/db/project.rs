use std::future::Future;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::compliance::ComplianceSummary;
use crate::core::db::{building::Building, util};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, with = "util::timestamp::option", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(default, with = "util::timestamp::option", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<OffsetDateTime>,
    #[serde(with = "util::timestamp", default = "util::now")]
    pub created_at: OffsetDateTime,
    #[serde(with = "util::timestamp", default = "util::now")]
    pub updated_at: OffsetDateTime,
    #[serde(default, deserialize_with = "util::lenient_records")]
    pub buildings: Vec<Building>,
}

impl Project {
    pub fn shutter_count(&self) -> usize {
        self.buildings.iter().map(Building::shutter_count).sum()
    }

    pub fn compliance_summary(&self) -> ComplianceSummary {
        ComplianceSummary::from_shutters(
            self.buildings
                .iter()
                .flat_map(|b| &b.functional_zones)
                .flat_map(|z| &z.shutters),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub city: Option<String>,
    pub start_date: Option<OffsetDateTime>,
    pub end_date: Option<OffsetDateTime>,
}

impl NewProject {
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Partial update; `None` leaves a field untouched, `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub city: Option<Option<String>>,
    pub start_date: Option<Option<OffsetDateTime>>,
    pub end_date: Option<Option<OffsetDateTime>>,
}

impl ProjectUpdate {
    pub(crate) fn apply(self, project: &mut Project) {
        if let Some(name) = self.name {
            project.name = name;
        }
        if let Some(city) = self.city {
            project.city = city;
        }
        if let Some(start_date) = self.start_date {
            project.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            project.end_date = end_date;
        }
    }
}

pub trait ProjectRepository {
    /// All projects, in creation order, with their full subtrees.
    fn projects(&self) -> Vec<Project>;
    fn project(&self, id: &str) -> Option<Project>;
    fn create_project(&self, project: NewProject) -> impl Future<Output = anyhow::Result<Project>>;
    fn update_project(
        &self,
        id: &str,
        update: ProjectUpdate,
    ) -> impl Future<Output = anyhow::Result<Option<Project>>>;
    fn delete_project(&self, id: &str) -> impl Future<Output = anyhow::Result<bool>>;
}
