//! Upload screening: route each upload by declared type, gate the rasters.
//!
//! JPEG/PNG uploads must pass the quality gate before they are stored. PDFs
//! are stored without pixel checks. Everything else is refused. Accepted
//! bytes are kept exactly as uploaded.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::format::{sniff_format, DeclaredType, SniffedFormat};
use super::IntakeError;
use crate::pipeline::quality::{QualityGate, QualityVerdict};

/// Used when a rejected verdict carries no more specific wording.
const GENERIC_ISSUE: &str = "blurry, noisy, or improperly cropped";

/// One file as handed over by the upload source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// Name of the required document this file is meant to satisfy.
    pub document: String,
    pub declared_mime: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(
        document: impl Into<String>,
        declared_mime: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            document: document.into(),
            declared_mime: declared_mime.into(),
            bytes,
        }
    }
}

/// A document cleared for storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub document: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    /// False for PDFs, which are stored without pixel checks.
    pub quality_checked: bool,
}

/// Outcome of screening a single upload.
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenedUpload {
    /// Raster image that passed the gate.
    Accepted {
        document: String,
        format: SniffedFormat,
        bytes: Vec<u8>,
        verdict: QualityVerdict,
    },
    /// PDF, stored as-is.
    PassedThrough { document: String, bytes: Vec<u8> },
    /// Raster image the gate refused.
    Rejected {
        document: String,
        verdict: QualityVerdict,
        reason: String,
    },
    /// Declared MIME type disagrees with the magic bytes.
    TypeMismatch {
        document: String,
        declared: DeclaredType,
        detected: SniffedFormat,
    },
    /// Neither JPEG, PNG nor PDF.
    Unsupported {
        document: String,
        declared: DeclaredType,
    },
}

impl ScreenedUpload {
    pub fn document(&self) -> &str {
        match self {
            Self::Accepted { document, .. }
            | Self::PassedThrough { document, .. }
            | Self::Rejected { document, .. }
            | Self::TypeMismatch { document, .. }
            | Self::Unsupported { document, .. } => document,
        }
    }

    pub fn is_storable(&self) -> bool {
        matches!(self, Self::Accepted { .. } | Self::PassedThrough { .. })
    }

    /// Message to show the uploader. `None` when the upload can be stored.
    pub fn reason(&self) -> Option<String> {
        self.refusal().map(|e| e.to_string())
    }

    /// Why this upload cannot be stored. Borrows; the upload bytes are not copied.
    pub fn refusal(&self) -> Option<IntakeError> {
        match self {
            Self::Accepted { .. } | Self::PassedThrough { .. } => None,
            Self::Rejected {
                document, reason, ..
            } => Some(IntakeError::Rejected {
                document: document.clone(),
                reason: reason.clone(),
            }),
            Self::TypeMismatch {
                document,
                declared,
                detected,
            } => Some(IntakeError::TypeMismatch {
                document: document.clone(),
                declared: declared.as_str().to_string(),
                detected: detected.mime_type(),
            }),
            Self::Unsupported { document, declared } => Some(IntakeError::UnsupportedType {
                document: document.clone(),
                declared: declared.as_str().to_string(),
            }),
        }
    }

    pub fn into_stored(self) -> Result<StoredDocument, IntakeError> {
        match self {
            Self::Accepted {
                document,
                format,
                bytes,
                ..
            } => Ok(StoredDocument {
                document,
                mime_type: format.mime_type().to_string(),
                bytes,
                quality_checked: true,
            }),
            Self::PassedThrough { document, bytes } => Ok(StoredDocument {
                document,
                mime_type: SniffedFormat::Pdf.mime_type().to_string(),
                bytes,
                quality_checked: false,
            }),
            Self::Rejected {
                document, reason, ..
            } => Err(IntakeError::Rejected { document, reason }),
            Self::TypeMismatch {
                document,
                declared,
                detected,
            } => Err(IntakeError::TypeMismatch {
                document,
                declared: declared.as_str().to_string(),
                detected: detected.mime_type(),
            }),
            Self::Unsupported { document, declared } => Err(IntakeError::UnsupportedType {
                document,
                declared: declared.as_str().to_string(),
            }),
        }
    }
}

/// Uploader-facing sentence for a rejected image.
pub fn rejection_reason(document: &str, verdict: &QualityVerdict) -> String {
    let issue = verdict
        .issue_summary()
        .unwrap_or_else(|| GENERIC_ISSUE.to_string());
    format!("{document} image is {issue}. Please re-upload.")
}

/// A required document whose upload could not be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefusedDocument {
    pub document: String,
    pub reason: String,
}

/// Result of screening a whole set of required documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistOutcome {
    /// In required-list order.
    pub stored: Vec<StoredDocument>,
    pub refused: Vec<RefusedDocument>,
    pub missing: Vec<String>,
}

impl ChecklistOutcome {
    /// Every required document was accepted or passed through.
    pub fn ready_to_submit(&self) -> bool {
        self.refused.is_empty() && self.missing.is_empty()
    }

    pub fn into_submission(self) -> Result<Vec<StoredDocument>, IntakeError> {
        if self.ready_to_submit() {
            return Ok(self.stored);
        }
        Err(IntakeError::Incomplete {
            missing: self.missing,
            rejected: self.refused.into_iter().map(|r| r.document).collect(),
        })
    }
}

/// Routes uploads to the quality gate.
pub struct UploadScreen {
    gate: Box<dyn QualityGate>,
}

impl UploadScreen {
    pub fn new(gate: Box<dyn QualityGate>) -> Self {
        Self { gate }
    }

    pub fn gate(&self) -> &dyn QualityGate {
        self.gate.as_ref()
    }

    pub fn screen(&self, document: &str, declared_mime: &str, bytes: Vec<u8>) -> ScreenedUpload {
        let document = document.to_string();
        let declared = DeclaredType::parse(declared_mime);
        let detected = sniff_format(&bytes);

        if matches!(declared, DeclaredType::Other(_)) {
            warn!(document = %document, declared = %declared.as_str(), "Unsupported upload type");
            return ScreenedUpload::Unsupported { document, declared };
        }
        if !declared.matches(detected) {
            warn!(
                document = %document,
                declared = %declared.as_str(),
                detected = detected.mime_type(),
                "Declared type does not match file content"
            );
            return ScreenedUpload::TypeMismatch {
                document,
                declared,
                detected,
            };
        }

        if declared == DeclaredType::Pdf {
            info!(document = %document, bytes = bytes.len(), "PDF stored without quality check");
            return ScreenedUpload::PassedThrough { document, bytes };
        }

        let verdict = self.gate.evaluate(&bytes);
        if verdict.accepted {
            info!(
                document = %document,
                format = detected.mime_type(),
                "Upload passed quality gate"
            );
            ScreenedUpload::Accepted {
                document,
                format: detected,
                bytes,
                verdict,
            }
        } else {
            let reason = rejection_reason(&document, &verdict);
            warn!(document = %document, reason = %reason, "Upload refused");
            ScreenedUpload::Rejected {
                document,
                verdict,
                reason,
            }
        }
    }

    pub fn screen_upload(&self, upload: Upload) -> ScreenedUpload {
        self.screen(&upload.document, &upload.declared_mime, upload.bytes)
    }

    /// Screen one upload per required document.
    ///
    /// Repeated names in `required` count once. When several uploads name
    /// the same document the last one wins; uploads for documents that are
    /// not required are ignored.
    pub fn screen_checklist<S: AsRef<str>>(
        &self,
        required: &[S],
        uploads: Vec<Upload>,
    ) -> ChecklistOutcome {
        let mut seen = HashSet::new();
        let required: Vec<&str> = required
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| seen.insert(*name))
            .collect();

        let mut by_document: HashMap<String, Upload> = HashMap::new();
        for upload in uploads {
            if !seen.contains(upload.document.as_str()) {
                debug!(
                    document = %upload.document,
                    "Ignoring upload for a document that is not required"
                );
                continue;
            }
            if by_document.contains_key(&upload.document) {
                debug!(document = %upload.document, "Later upload replaces an earlier one");
            }
            by_document.insert(upload.document.clone(), upload);
        }

        let mut outcome = ChecklistOutcome::default();
        for name in required {
            let Some(upload) = by_document.remove(name) else {
                outcome.missing.push(name.to_string());
                continue;
            };
            match self.screen_upload(upload).into_stored() {
                Ok(stored) => outcome.stored.push(stored),
                Err(e) => outcome.refused.push(RefusedDocument {
                    document: name.to_string(),
                    reason: e.to_string(),
                }),
            }
        }

        info!(
            stored = outcome.stored.len(),
            refused = outcome.refused.len(),
            missing = outcome.missing.len(),
            "Checklist screened"
        );
        outcome
    }
}
