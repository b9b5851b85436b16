use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::framing::GeometryError;
use super::GateError;

/// The three independent checks a document image goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Sharpness,
    Noise,
    Framing,
}

impl CheckKind {
    pub const ALL: [CheckKind; 3] = [CheckKind::Sharpness, CheckKind::Noise, CheckKind::Framing];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sharpness => "sharpness",
            Self::Noise => "noise",
            Self::Framing => "framing",
        }
    }

    /// Adjective used when telling an uploader why their image was refused.
    pub fn complaint(&self) -> &'static str {
        match self {
            Self::Sharpness => "blurry",
            Self::Noise => "noisy",
            Self::Framing => "improperly cropped",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric cut-offs for one gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Laplacian variance must be strictly above this.
    pub sharpness_min: f64,
    /// Histogram entropy (bits) must be strictly below this.
    pub noise_max: f64,
    /// Largest contour must cover strictly more than this fraction of the frame.
    pub min_document_area_ratio: f64,
    /// Canny hysteresis low threshold.
    pub canny_low: f32,
    /// Canny hysteresis high threshold.
    pub canny_high: f32,
}

impl QualityThresholds {
    /// Thresholds used by the standalone application upload page.
    pub fn strict() -> Self {
        Self {
            sharpness_min: 100.0,
            noise_max: 7.5,
            min_document_area_ratio: 0.5,
            canny_low: 75.0,
            canny_high: 200.0,
        }
    }

    /// Thresholds used by the task-dashboard upload page: soft images and
    /// loosely cropped photos still get through.
    pub fn relaxed() -> Self {
        Self {
            sharpness_min: 30.0,
            noise_max: 7.0,
            min_document_area_ratio: 0.15,
            canny_low: 50.0,
            canny_high: 150.0,
        }
    }

    pub fn validate(&self) -> Result<(), GateError> {
        let finite = self.sharpness_min.is_finite()
            && self.noise_max.is_finite()
            && self.min_document_area_ratio.is_finite()
            && self.canny_low.is_finite()
            && self.canny_high.is_finite();
        if !finite {
            return Err(GateError::InvalidThresholds(
                "all thresholds must be finite numbers".into(),
            ));
        }
        if self.sharpness_min < 0.0 || self.noise_max < 0.0 {
            return Err(GateError::InvalidThresholds(
                "sharpness_min and noise_max must not be negative".into(),
            ));
        }
        if self.min_document_area_ratio <= 0.0 || self.min_document_area_ratio > 1.0 {
            return Err(GateError::InvalidThresholds(format!(
                "min_document_area_ratio must be in (0, 1], got {}",
                self.min_document_area_ratio
            )));
        }
        if self.canny_low < 0.0 || self.canny_low > self.canny_high {
            return Err(GateError::InvalidThresholds(format!(
                "canny thresholds must satisfy 0 <= low <= high, got {} / {}",
                self.canny_low, self.canny_high
            )));
        }
        Ok(())
    }
}

/// The two profiles the upload pages were shipped with.
///
/// Neither is the default: callers name the one they want.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfilePreset {
    /// All three checks, tight thresholds.
    Strict,
    /// Loose thresholds; noise is measured but does not decide the verdict.
    Relaxed,
}

/// Thresholds plus the set of checks that take part in the final AND.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityProfile {
    pub thresholds: QualityThresholds,
    pub enabled_checks: BTreeSet<CheckKind>,
}

impl QualityProfile {
    pub fn new(thresholds: QualityThresholds, enabled_checks: BTreeSet<CheckKind>) -> Self {
        Self {
            thresholds,
            enabled_checks,
        }
    }

    pub fn strict() -> Self {
        Self::new(QualityThresholds::strict(), CheckKind::ALL.into_iter().collect())
    }

    pub fn relaxed() -> Self {
        Self::new(
            QualityThresholds::relaxed(),
            [CheckKind::Sharpness, CheckKind::Framing].into_iter().collect(),
        )
    }

    pub fn from_preset(preset: ProfilePreset) -> Self {
        match preset {
            ProfilePreset::Strict => Self::strict(),
            ProfilePreset::Relaxed => Self::relaxed(),
        }
    }

    pub fn is_enabled(&self, check: CheckKind) -> bool {
        self.enabled_checks.contains(&check)
    }

    pub fn validate(&self) -> Result<(), GateError> {
        self.thresholds.validate()?;
        if self.enabled_checks.is_empty() {
            return Err(GateError::InvalidThresholds(
                "at least one check must be enabled".into(),
            ));
        }
        Ok(())
    }

    /// Apply the profile to a set of raw measurements.
    ///
    /// Every enabled check that does not pass lands in `failed_checks`.
    /// NaN measurements compare false and therefore fail.
    pub fn judge(&self, measurements: &Measurements) -> QualityVerdict {
        let t = &self.thresholds;
        let sharp = measurements.sharpness > t.sharpness_min;
        let not_noisy = measurements.noise_entropy < t.noise_max;
        let framed = match measurements.framing {
            Ok(ratio) => ratio > t.min_document_area_ratio,
            Err(_) => false,
        };

        let failed_checks: BTreeSet<CheckKind> = [
            (CheckKind::Sharpness, sharp),
            (CheckKind::Noise, not_noisy),
            (CheckKind::Framing, framed),
        ]
        .into_iter()
        .filter(|(check, passed)| !passed && self.is_enabled(*check))
        .map(|(check, _)| check)
        .collect();

        QualityVerdict {
            accepted: failed_checks.is_empty(),
            failed_checks,
            metrics: QualityMetrics {
                sharpness: Some(measurements.sharpness),
                noise_entropy: Some(measurements.noise_entropy),
                area_ratio: measurements.framing.as_ref().ok().copied(),
            },
            framing_error: measurements.framing.as_ref().err().copied(),
            fault: None,
        }
    }
}

/// Raw statistics produced by a `QualityAssessor`, before thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurements {
    /// Variance of the Laplacian response.
    pub sharpness: f64,
    /// Shannon entropy of the intensity histogram, in bits.
    pub noise_entropy: f64,
    /// Document area ratio, or why no document outline could be measured.
    pub framing: Result<f64, GeometryError>,
}

/// Diagnostic numbers attached to a verdict. `None` means not measured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub sharpness: Option<f64>,
    pub noise_entropy: Option<f64>,
    pub area_ratio: Option<f64>,
}

/// Why a verdict was reached without a complete set of check results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum GateFault {
    /// Bytes were not a usable JPEG/PNG image.
    Decode(String),
    /// A check blew up while running.
    Internal(String),
}

/// Outcome of one gate evaluation.
///
/// `accepted` holds exactly when `failed_checks` is empty and `fault` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityVerdict {
    pub accepted: bool,
    pub failed_checks: BTreeSet<CheckKind>,
    pub metrics: QualityMetrics,
    /// Set when the framing check could not find a document outline.
    pub framing_error: Option<GeometryError>,
    pub fault: Option<GateFault>,
}

impl QualityVerdict {
    pub fn faulted(fault: GateFault) -> Self {
        Self {
            accepted: false,
            failed_checks: BTreeSet::new(),
            metrics: QualityMetrics::default(),
            framing_error: None,
            fault: Some(fault),
        }
    }

    pub fn has_failed(&self, check: CheckKind) -> bool {
        self.failed_checks.contains(&check)
    }

    /// Rejected because of a decode error or internal fault, not a failed check.
    pub fn is_fault(&self) -> bool {
        self.fault.is_some()
    }

    /// Short human wording of what is wrong, e.g. "blurry and improperly cropped".
    /// `None` when the image was accepted.
    pub fn issue_summary(&self) -> Option<String> {
        if self.accepted {
            return None;
        }
        match &self.fault {
            Some(GateFault::Decode(_)) => return Some("not a readable JPEG or PNG image".into()),
            Some(GateFault::Internal(_)) => return Some("could not be checked for quality".into()),
            None => {}
        }

        let words: Vec<&str> = self.failed_checks.iter().map(CheckKind::complaint).collect();
        let summary = match words.as_slice() {
            [] => "not acceptable".to_string(),
            [one] => (*one).to_string(),
            [init @ .., last] => format!("{} and {}", init.join(", "), last),
        };
        Some(summary)
    }
}
