//! Fail-closed quality gate for photographed or scanned document uploads.
//!
//! Every JPEG/PNG upload is checked for sharpness (Laplacian variance),
//! noise (histogram entropy) and framing (largest document contour vs.
//! frame area) before it may be stored. PDFs bypass the pixel checks.

pub mod config;
pub mod pipeline;

pub use config::{ConfigError, GateConfig, ProfileSetting};
pub use pipeline::import::{
    detect_format, ChecklistOutcome, IntakeError, ScreenedUpload, StoredDocument, Upload,
    UploadScreen,
};
pub use pipeline::quality::{
    evaluate, CheckKind, GateError, GateFault, GateLimits, ImageQualityGate, ProfilePreset,
    QualityGate, QualityProfile, QualityThresholds, QualityVerdict,
};

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber honouring `RUST_LOG`.
///
/// Hosts that already installed their own subscriber keep it; calling this
/// more than once is harmless.
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("{} v{} tracing initialised", config::APP_NAME, config::APP_VERSION);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }

    #[test]
    fn config_to_screened_upload() {
        let gate = GateConfig::from_json_str(r#"{ "profile": "strict" }"#)
            .unwrap()
            .build_gate()
            .unwrap();
        let screen = UploadScreen::new(Box::new(gate));

        let outcome = screen.screen_checklist(
            &["Lease"],
            vec![Upload::new("Lease", "application/pdf", b"%PDF-1.4\n%%EOF".to_vec())],
        );
        assert!(outcome.ready_to_submit());
    }
}
