//! Gate policy: decode, measure everything, judge against a profile.
//!
//! Fail-closed. A decode error, a geometry error or a panic inside a check
//! all come back as `accepted = false`; nothing escapes to the caller.

use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};

use image::{GrayImage, RgbImage};
use tracing::{debug, warn};

use super::decode::{decode_image, to_grayscale, GateLimits};
use super::framing::document_area_ratio;
use super::noise::histogram_entropy;
use super::sharpness::laplacian_variance;
use super::types::{
    CheckKind, GateFault, Measurements, QualityMetrics, QualityProfile, QualityThresholds,
    QualityVerdict,
};
use super::GateError;

// ═══════════════════════════════════════════════════════════
// Service traits
// ═══════════════════════════════════════════════════════════

/// Computes the raw statistics for every check. Pure read-only analysis;
/// thresholds are applied afterwards by the profile.
pub trait QualityAssessor: Send + Sync {
    fn assess(&self, gray: &GrayImage, thresholds: &QualityThresholds) -> Measurements;
}

/// Accept/reject decision point for an uploaded document image.
pub trait QualityGate: Send + Sync {
    /// Evaluate raw upload bytes. Never panics, never errors: every failure
    /// is a rejection.
    fn evaluate(&self, image_bytes: &[u8]) -> QualityVerdict;
}

// ═══════════════════════════════════════════════════════════
// Production implementations
// ═══════════════════════════════════════════════════════════

/// Laplacian variance, histogram entropy and largest-contour framing.
pub struct DocumentQualityAssessor;

impl QualityAssessor for DocumentQualityAssessor {
    fn assess(&self, gray: &GrayImage, thresholds: &QualityThresholds) -> Measurements {
        Measurements {
            sharpness: laplacian_variance(gray),
            noise_entropy: histogram_entropy(gray),
            framing: document_area_ratio(gray, thresholds.canny_low, thresholds.canny_high),
        }
    }
}

/// The production gate: one profile, one set of input limits.
pub struct ImageQualityGate {
    assessor: Box<dyn QualityAssessor>,
    profile: QualityProfile,
    limits: GateLimits,
}

impl ImageQualityGate {
    pub fn new(
        assessor: Box<dyn QualityAssessor>,
        profile: QualityProfile,
        limits: GateLimits,
    ) -> Result<Self, GateError> {
        profile.validate()?;
        Ok(Self {
            assessor,
            profile,
            limits,
        })
    }

    /// Standard assessor with the given profile and default limits.
    pub fn with_profile(profile: QualityProfile) -> Result<Self, GateError> {
        Self::new(Box::new(DocumentQualityAssessor), profile, GateLimits::default())
    }

    /// Standalone upload page behaviour: all three checks, tight thresholds.
    pub fn strict() -> Self {
        Self {
            assessor: Box::new(DocumentQualityAssessor),
            profile: QualityProfile::strict(),
            limits: GateLimits::default(),
        }
    }

    /// Dashboard upload page behaviour: loose thresholds, noise not enforced.
    pub fn relaxed() -> Self {
        Self {
            assessor: Box::new(DocumentQualityAssessor),
            profile: QualityProfile::relaxed(),
            limits: GateLimits::default(),
        }
    }

    pub fn profile(&self) -> &QualityProfile {
        &self.profile
    }

    pub fn limits(&self) -> &GateLimits {
        &self.limits
    }

    /// Evaluate an already-decoded RGB image.
    pub fn evaluate_image(&self, image: &RgbImage) -> QualityVerdict {
        let gray = to_grayscale(image);
        self.evaluate_gray(&gray)
    }

    /// Evaluate a precomputed grayscale field.
    pub fn evaluate_gray(&self, gray: &GrayImage) -> QualityVerdict {
        if gray.width() == 0 || gray.height() == 0 {
            warn!("Quality gate given an empty grayscale field");
            return QualityVerdict::faulted(GateFault::Internal(
                "Image has zero width or height".into(),
            ));
        }

        let thresholds = &self.profile.thresholds;
        let measured = panic::catch_unwind(AssertUnwindSafe(|| {
            self.assessor.assess(gray, thresholds)
        }));

        let measurements = match measured {
            Ok(m) => m,
            Err(payload) => {
                let detail = panic_message(payload.as_ref());
                warn!(error = %detail, "Quality check faulted, rejecting image");
                return QualityVerdict::faulted(GateFault::Internal(detail));
            }
        };

        let verdict = self.profile.judge(&measurements);
        log_verdict(gray, &verdict);
        verdict
    }
}

impl QualityGate for ImageQualityGate {
    fn evaluate(&self, image_bytes: &[u8]) -> QualityVerdict {
        // Third-party decoders get the same panic guard as the checks.
        let decoded =
            panic::catch_unwind(AssertUnwindSafe(|| decode_image(image_bytes, &self.limits)));
        match decoded {
            Ok(Ok(image)) => self.evaluate_image(&image),
            Ok(Err(e)) => {
                warn!(error = %e, bytes = image_bytes.len(), "Upload is not a decodable image");
                QualityVerdict::faulted(GateFault::Decode(e.to_string()))
            }
            Err(payload) => {
                let detail = panic_message(payload.as_ref());
                warn!(error = %detail, "Image decoder faulted, rejecting image");
                QualityVerdict::faulted(GateFault::Internal(detail))
            }
        }
    }
}

/// One-shot evaluation with a profile and default limits.
///
/// An invalid profile yields a faulted rejection rather than an error.
pub fn evaluate(image_bytes: &[u8], profile: &QualityProfile) -> QualityVerdict {
    match ImageQualityGate::with_profile(profile.clone()) {
        Ok(gate) => gate.evaluate(image_bytes),
        Err(e) => {
            warn!(error = %e, "Refusing to evaluate with an invalid profile");
            QualityVerdict::faulted(GateFault::Internal(e.to_string()))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "quality check panicked".to_string()
    }
}

fn log_verdict(gray: &GrayImage, verdict: &QualityVerdict) {
    let QualityMetrics {
        sharpness,
        noise_entropy,
        area_ratio,
    } = &verdict.metrics;
    debug!(
        size = %format!("{}x{}", gray.width(), gray.height()),
        sharpness = sharpness.unwrap_or(f64::NAN),
        noise_entropy = noise_entropy.unwrap_or(f64::NAN),
        area_ratio = area_ratio.unwrap_or(f64::NAN),
        framing_error = ?verdict.framing_error,
        accepted = verdict.accepted,
        "Image quality measured"
    );
    if !verdict.accepted {
        let failed: Vec<&str> = verdict.failed_checks.iter().map(CheckKind::as_str).collect();
        warn!(failed = ?failed, "Image rejected by quality gate");
    }
}

// ═══════════════════════════════════════════════════════════
// Mock implementations (testing)
// ═══════════════════════════════════════════════════════════

/// Mock gate: fixed verdict regardless of input.
pub struct MockQualityGate {
    failed: BTreeSet<CheckKind>,
}

impl MockQualityGate {
    pub fn accepting() -> Self {
        Self {
            failed: BTreeSet::new(),
        }
    }

    pub fn rejecting(checks: &[CheckKind]) -> Self {
        Self {
            failed: checks.iter().copied().collect(),
        }
    }
}

impl QualityGate for MockQualityGate {
    fn evaluate(&self, _image_bytes: &[u8]) -> QualityVerdict {
        QualityVerdict {
            accepted: self.failed.is_empty(),
            failed_checks: self.failed.clone(),
            metrics: QualityMetrics::default(),
            framing_error: None,
            fault: None,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
