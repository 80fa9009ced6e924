use std::future::Future;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::compliance::{self, ComplianceStatus};
use crate::core::db::util;

/// One standalone calculation, not tied to any shutter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickCalcEntry {
    pub id: String,
    #[serde(default, deserialize_with = "util::lenient_flow")]
    pub reference_flow: f64,
    #[serde(default, deserialize_with = "util::lenient_flow")]
    pub measured_flow: f64,
    #[serde(default, deserialize_with = "util::lenient_flow")]
    pub deviation: f64,
    #[serde(default = "unrated", deserialize_with = "lenient_status")]
    pub status: ComplianceStatus,
    #[serde(default)]
    pub color: String,
    #[serde(with = "util::timestamp", default = "util::now")]
    pub timestamp: OffsetDateTime,
}

fn unrated() -> ComplianceStatus {
    ComplianceStatus::NonCompliant
}

fn lenient_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ComplianceStatus, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_else(unrated))
}

impl QuickCalcEntry {
    pub(crate) fn evaluate(reference_flow: f64, measured_flow: f64) -> Self {
        let result = compliance::calculate_compliance(reference_flow, measured_flow);
        Self {
            id: util::new_id(),
            reference_flow,
            measured_flow,
            deviation: result.deviation_percent,
            status: result.status,
            color: result.color.to_string(),
            timestamp: util::now(),
        }
    }

    /// Status and color follow from the stored flows; recompute them so a
    /// damaged or missing rating never survives a reload.
    pub(crate) fn rerate(mut self) -> Self {
        let result = compliance::calculate_compliance(self.reference_flow, self.measured_flow);
        self.status = result.status;
        self.color = result.color.to_string();
        self
    }
}

pub trait HistoryRepository {
    /// Newest first.
    fn quick_calc_history(&self) -> Vec<QuickCalcEntry>;
    /// Evaluate and remember a calculation; the oldest entries beyond the
    /// configured limit are dropped.
    fn record_quick_calc(
        &self,
        reference_flow: f64,
        measured_flow: f64,
    ) -> impl Future<Output = anyhow::Result<QuickCalcEntry>>;
    fn delete_history_entry(&self, id: &str) -> impl Future<Output = anyhow::Result<bool>>;
    fn clear_quick_calc_history(&self) -> impl Future<Output = anyhow::Result<()>>;
}
