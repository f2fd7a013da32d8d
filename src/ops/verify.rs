//! Compare local attachment state with what the backends report
//!
//! Read-only: mismatches are reported to the operator, never repaired.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::backends::Backends;
use crate::resources::Backend;

/// A volume whose recorded host differs from the backend's mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMismatch {
    pub backend: Backend,
    pub volume: String,
    /// Host in the local record, empty when detached
    pub local_host: String,
    /// Host the backend reports, empty when unmapped
    pub remote_host: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub backends_checked: Vec<Backend>,
    pub mismatches: Vec<AttachmentMismatch>,
    /// Backends whose check failed, with the error message
    pub failed: BTreeMap<String, String>,
}

impl VerifyReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty() && self.failed.is_empty()
    }
}

/// Run the check on every registered backend.
///
/// A failing backend is recorded in the report and does not stop the others.
pub async fn verify_backends(backends: &Backends) -> VerifyReport {
    tracing::info!(backends = backends.len(), "Starting attachment verification");

    let mut report = VerifyReport::default();
    for (backend, client) in backends {
        match client.verify().await {
            Ok(mismatches) => {
                report.backends_checked.push(*backend);
                report.mismatches.extend(mismatches);
            }
            Err(e) => {
                tracing::error!(backend = %backend, error = %e, "Verification failed");
                report.failed.insert(backend.to_string(), e.to_string());
            }
        }
    }

    tracing::info!(
        mismatches = report.mismatches.len(),
        failed = report.failed.len(),
        "Attachment verification finished"
    );
    report
}
