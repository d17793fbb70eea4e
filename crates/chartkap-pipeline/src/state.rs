//! Chart and inset processing state.
//!
//! The repository persists state as nullable timestamps (`generated_at`,
//! `cropped_at`) and a status integer. These types are the typed view of
//! those columns; the columns remain the storage format.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::CalibrationError;

/// Where a chart stands in production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartState {
    /// Survey data is incomplete; no calibration can be built.
    AwaitingCalibration,
    /// A calibration can be built but no product has been generated.
    Calibrated,
    /// The chart product was generated at the given time.
    Produced(DateTime<Utc>),
}

impl ChartState {
    /// Derive the state from the calibration outcome and the persisted marker.
    ///
    /// A set marker wins: a produced chart stays produced even if its
    /// survey data has since become incomplete, until the marker is cleared.
    #[must_use]
    pub fn from_markers<T>(
        calibration: &Result<T, CalibrationError>,
        generated_at: Option<DateTime<Utc>>,
    ) -> Self {
        match (generated_at, calibration) {
            (Some(at), _) => Self::Produced(at),
            (None, Ok(_)) => Self::Calibrated,
            (None, Err(_)) => Self::AwaitingCalibration,
        }
    }

    /// Whether a batch pass should (re)produce this chart.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Calibrated)
    }
}

/// Where an inset stands in cropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsetState {
    /// Not yet cropped out of its chart.
    Uncropped,
    /// Cropped at the given time.
    Cropped(DateTime<Utc>),
}

impl InsetState {
    /// Map the persisted `cropped_at` marker.
    #[must_use]
    pub const fn from_marker(cropped_at: Option<DateTime<Utc>>) -> Self {
        match cropped_at {
            Some(at) => Self::Cropped(at),
            None => Self::Uncropped,
        }
    }

    /// Whether a batch pass should crop this inset.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Uncropped)
    }
}

/// Workflow status code stored with every chart.
///
/// Only a handful of codes have meaning to the pipeline; the rest are
/// carried through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartStatus(pub u16);

impl ChartStatus {
    /// Freshly registered chart.
    pub const NEW: Self = Self(1);
    /// Calibrated but still lacking a boundary polygon.
    pub const MISSING_POLYGON: Self = Self(8);
    /// Inputs changed since the last product was generated.
    pub const NEEDS_REGENERATION: Self = Self(18);

    /// Codes a batch pass picks up.
    pub const BATCH_ELIGIBLE: [Self; 6] = [
        Self(1),
        Self(2),
        Self(3),
        Self::MISSING_POLYGON,
        Self(14),
        Self::NEEDS_REGENERATION,
    ];

    /// Whether charts with this status are produced by a batch pass.
    #[must_use]
    pub fn is_batch_eligible(self) -> bool {
        Self::BATCH_ELIGIBLE.contains(&self)
    }

    /// Status after a boundary polygon was imported.
    ///
    /// New charts and charts waiting for a polygon move to
    /// [`Self::NEEDS_REGENERATION`]; more specific states are kept.
    #[must_use]
    pub const fn after_boundary_import(self) -> Self {
        match self.0 {
            1 | 8 => Self::NEEDS_REGENERATION,
            _ => self,
        }
    }
}

impl fmt::Display for ChartStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn chart_state_from_markers() {
        let ok: Result<(), CalibrationError> = Ok(());
        let missing: Result<(), CalibrationError> =
            Err(CalibrationError::MissingRequiredField("north"));

        assert_eq!(ChartState::from_markers(&ok, None), ChartState::Calibrated);
        assert_eq!(
            ChartState::from_markers(&missing, None),
            ChartState::AwaitingCalibration
        );
        assert_eq!(
            ChartState::from_markers(&missing, Some(at())),
            ChartState::Produced(at())
        );
        assert!(ChartState::Calibrated.is_pending());
        assert!(!ChartState::Produced(at()).is_pending());
        assert!(!ChartState::AwaitingCalibration.is_pending());
    }

    #[test]
    fn inset_state_from_marker() {
        assert!(InsetState::from_marker(None).is_pending());
        assert_eq!(
            InsetState::from_marker(Some(at())),
            InsetState::Cropped(at())
        );
        assert!(!InsetState::Cropped(at()).is_pending());
    }

    #[test]
    fn batch_eligible_statuses() {
        let eligible: Vec<u16> = (0..=30)
            .filter(|&code| ChartStatus(code).is_batch_eligible())
            .collect();
        assert_eq!(eligible, vec![1, 2, 3, 8, 14, 18]);
    }

    #[test]
    fn boundary_import_promotes_only_new_and_missing_polygon() {
        assert_eq!(
            ChartStatus::NEW.after_boundary_import(),
            ChartStatus::NEEDS_REGENERATION
        );
        assert_eq!(
            ChartStatus::MISSING_POLYGON.after_boundary_import(),
            ChartStatus::NEEDS_REGENERATION
        );
        assert_eq!(ChartStatus(3).after_boundary_import(), ChartStatus(3));
        assert_eq!(ChartStatus(14).after_boundary_import(), ChartStatus(14));
    }
}
