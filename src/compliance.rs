//! Flow deviation classification for smoke-extraction shutters
//! (NF S61-933 Annex H).
//!
//! A measured flow is compared to the shutter's reference flow; the signed
//! deviation in percent is bucketed into three tiers:
//!
//! - `|deviation| <= 10` : compliant
//! - `10 < |deviation| <= 20` : acceptable
//! - `|deviation| > 20` : non-compliant

use serde::{Deserialize, Serialize};

use crate::core::db::Shutter;

/// Upper bound (inclusive) of the compliant band, in percent.
pub const COMPLIANT_LIMIT: f64 = 10.0;
/// Upper bound (inclusive) of the acceptable band, in percent.
pub const ACCEPTABLE_LIMIT: f64 = 20.0;

pub const COMPLIANT_COLOR: &str = "#10B981";
pub const ACCEPTABLE_COLOR: &str = "#F59E0B";
pub const NON_COMPLIANT_COLOR: &str = "#EF4444";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComplianceStatus {
    Compliant,
    Acceptable,
    NonCompliant,
}

impl ComplianceStatus {
    /// Classify a signed deviation. NaN lands in `NonCompliant`.
    pub fn from_deviation(deviation_percent: f64) -> Self {
        let magnitude = deviation_percent.abs();
        if magnitude <= COMPLIANT_LIMIT {
            ComplianceStatus::Compliant
        } else if magnitude <= ACCEPTABLE_LIMIT {
            ComplianceStatus::Acceptable
        } else {
            ComplianceStatus::NonCompliant
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            ComplianceStatus::Compliant => COMPLIANT_COLOR,
            ComplianceStatus::Acceptable => ACCEPTABLE_COLOR,
            ComplianceStatus::NonCompliant => NON_COMPLIANT_COLOR,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ComplianceStatus::Compliant => "Compliant",
            ComplianceStatus::Acceptable => "Acceptable",
            ComplianceStatus::NonCompliant => "Non-compliant",
        }
    }
}

impl std::fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplianceResult {
    /// Unrounded signed deviation, in percent of the reference flow.
    pub deviation_percent: f64,
    pub status: ComplianceStatus,
    pub color: &'static str,
}

impl ComplianceResult {
    /// Deviation rounded to one decimal, for display only.
    pub fn rounded_deviation(&self) -> f64 {
        round_one_decimal(self.deviation_percent)
    }
}

/// A reference flow of zero (or less) means the shutter has not been
/// measured yet. Callers check this before showing a result.
pub fn is_measurable(reference_flow: f64) -> bool {
    reference_flow > 0.0
}

/// Evaluate a measured flow against its reference flow.
///
/// A non-positive reference yields deviation 0 with status
/// `NonCompliant`; gate display on [`is_measurable`].
pub fn calculate_compliance(reference_flow: f64, measured_flow: f64) -> ComplianceResult {
    if !is_measurable(reference_flow) {
        let status = ComplianceStatus::NonCompliant;
        return ComplianceResult {
            deviation_percent: 0.0,
            status,
            color: status.color(),
        };
    }
    let deviation_percent = 100.0 * (measured_flow - reference_flow) / reference_flow;
    let status = ComplianceStatus::from_deviation(deviation_percent);
    ComplianceResult {
        deviation_percent,
        status,
        color: status.color(),
    }
}

pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Tier counts over a set of shutters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceSummary {
    pub total: usize,
    pub compliant: usize,
    pub acceptable: usize,
    pub non_compliant: usize,
    /// Shutters whose reference flow is not set yet.
    pub unmeasured: usize,
}

impl ComplianceSummary {
    pub fn from_shutters<'a, I>(shutters: I) -> Self
    where
        I: IntoIterator<Item = &'a Shutter>,
    {
        let mut summary = Self::default();
        for shutter in shutters {
            summary.total += 1;
            if !is_measurable(shutter.reference_flow) {
                summary.unmeasured += 1;
                continue;
            }
            match shutter.compliance().status {
                ComplianceStatus::Compliant => summary.compliant += 1,
                ComplianceStatus::Acceptable => summary.acceptable += 1,
                ComplianceStatus::NonCompliant => summary.non_compliant += 1,
            }
        }
        summary
    }

    pub fn measured(&self) -> usize {
        self.total - self.unmeasured
    }

    /// Share of measured shutters that are compliant, in percent.
    pub fn compliance_rate(&self) -> Option<f64> {
        match self.measured() {
            0 => None,
            measured => Some(100.0 * self.compliant as f64 / measured as f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_deficit_is_compliant() {
        let result = calculate_compliance(5000.0, 4900.0);
        assert_eq!(result.rounded_deviation(), -2.0);
        assert_eq!(result.status, ComplianceStatus::Compliant);
        assert_eq!(result.color, COMPLIANT_COLOR);
    }

    #[test]
    fn fifteen_percent_excess_is_acceptable() {
        let result = calculate_compliance(3000.0, 3450.0);
        assert_eq!(result.rounded_deviation(), 15.0);
        assert_eq!(result.status, ComplianceStatus::Acceptable);
        assert_eq!(result.color, ACCEPTABLE_COLOR);
    }

    #[test]
    fn quarter_deficit_is_non_compliant() {
        let result = calculate_compliance(4000.0, 3000.0);
        assert_eq!(result.rounded_deviation(), -25.0);
        assert_eq!(result.status, ComplianceStatus::NonCompliant);
        assert_eq!(result.color, NON_COMPLIANT_COLOR);
    }

    #[test]
    fn band_edges_are_inclusive() {
        assert_eq!(calculate_compliance(1000.0, 1100.0).status, ComplianceStatus::Compliant);
        assert_eq!(calculate_compliance(1000.0, 900.0).status, ComplianceStatus::Compliant);
        assert_eq!(calculate_compliance(1000.0, 1200.0).status, ComplianceStatus::Acceptable);
        assert_eq!(calculate_compliance(1000.0, 800.0).status, ComplianceStatus::Acceptable);
        assert_eq!(calculate_compliance(1000.0, 1201.0).status, ComplianceStatus::NonCompliant);
        assert_eq!(calculate_compliance(1000.0, 1101.0).status, ComplianceStatus::Acceptable);
    }

    #[test]
    fn classification_uses_unrounded_deviation() {
        // 10.04% rounds to 10.0 for display but is still outside the compliant band
        let result = calculate_compliance(10000.0, 11004.0);
        assert_eq!(result.rounded_deviation(), 10.0);
        assert_eq!(result.status, ComplianceStatus::Acceptable);
    }

    #[test]
    fn unset_reference_is_not_measurable() {
        assert!(!is_measurable(0.0));
        assert!(!is_measurable(-5.0));
        let result = calculate_compliance(0.0, 4800.0);
        assert_eq!(result.deviation_percent, 0.0);
        assert_eq!(result.status, ComplianceStatus::NonCompliant);
    }

    #[test]
    fn nan_input_is_non_compliant() {
        let result = calculate_compliance(1000.0, f64::NAN);
        assert!(result.deviation_percent.is_nan());
        assert_eq!(result.status, ComplianceStatus::NonCompliant);
    }

    #[test]
    fn status_serializes_kebab_case() {
        let json = serde_json::to_string(&ComplianceStatus::NonCompliant).unwrap();
        assert_eq!(json, "\"non-compliant\"");
        assert_eq!(ComplianceStatus::Acceptable.to_string(), "Acceptable");
    }
}
