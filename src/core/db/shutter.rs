use std::future::Future;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::compliance::{self, ComplianceResult};
use crate::core::db::{Building, FunctionalZone, Project, util};

/// Position of the shutter on the wall, fixed once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutterType {
    #[default]
    High,
    Low,
}

/// Any casing is accepted; unknown or missing values read as `High`.
impl<'de> Deserialize<'de> for ShutterType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<Value>::deserialize(deserializer)?;
        let shutter_type = match raw.as_ref().and_then(Value::as_str) {
            Some(text) if text.trim().eq_ignore_ascii_case("low") => ShutterType::Low,
            Some(text) if text.trim().eq_ignore_ascii_case("high") => ShutterType::High,
            _ => {
                tracing::warn!(value = ?raw, "Unknown shutter type, using high");
                ShutterType::default()
            }
        };
        Ok(shutter_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shutter {
    pub id: String,
    #[serde(default)]
    pub zone_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub shutter_type: ShutterType,
    #[serde(default, deserialize_with = "util::lenient_flow")]
    pub reference_flow: f64,
    #[serde(default, deserialize_with = "util::lenient_flow")]
    pub measured_flow: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(with = "util::timestamp", default = "util::now")]
    pub created_at: OffsetDateTime,
    #[serde(with = "util::timestamp", default = "util::now")]
    pub updated_at: OffsetDateTime,
}

impl Shutter {
    pub fn compliance(&self) -> ComplianceResult {
        compliance::calculate_compliance(self.reference_flow, self.measured_flow)
    }

    pub fn is_measured(&self) -> bool {
        compliance::is_measurable(self.reference_flow)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewShutter {
    pub name: String,
    pub shutter_type: ShutterType,
    pub reference_flow: f64,
    pub measured_flow: f64,
    pub remarks: Option<String>,
}

/// Partial update. The shutter type has no field here: it cannot change.
#[derive(Debug, Clone, Default)]
pub struct ShutterUpdate {
    pub name: Option<String>,
    pub reference_flow: Option<f64>,
    pub measured_flow: Option<f64>,
    pub remarks: Option<Option<String>>,
}

impl ShutterUpdate {
    pub(crate) fn apply(self, shutter: &mut Shutter) {
        if let Some(name) = self.name {
            shutter.name = name;
        }
        if let Some(reference_flow) = self.reference_flow {
            shutter.reference_flow = reference_flow;
        }
        if let Some(measured_flow) = self.measured_flow {
            shutter.measured_flow = measured_flow;
        }
        if let Some(remarks) = self.remarks {
            shutter.remarks = remarks;
        }
    }
}

/// A search hit with its ancestry. Ancestors are returned without their
/// child collections.
#[derive(Debug, Clone, PartialEq)]
pub struct ShutterMatch {
    pub shutter: Shutter,
    pub zone: FunctionalZone,
    pub building: Building,
    pub project: Project,
}

pub trait ShutterRepository {
    fn shutter(&self, id: &str) -> Option<Shutter>;
    /// Case-insensitive AND match of every whitespace token against the
    /// shutter, zone, building and project names, the project city and the
    /// shutter remarks. Flow values are not searchable.
    fn search_shutters(&self, query: &str) -> Vec<ShutterMatch>;
    fn create_shutter(
        &self,
        zone_id: &str,
        shutter: NewShutter,
    ) -> impl Future<Output = anyhow::Result<Option<Shutter>>>;
    fn update_shutter(
        &self,
        id: &str,
        update: ShutterUpdate,
    ) -> impl Future<Output = anyhow::Result<Option<Shutter>>>;
    fn delete_shutter(&self, id: &str) -> impl Future<Output = anyhow::Result<bool>>;
}
