//! Refresh coordination.
//!
//! One refresh loads every study, resolves each study to its clinical patient, derives the
//! study's ordered results and hands them to the assessment updater. Failures loading the
//! studies abort the refresh; anything that goes wrong for a single study is recorded in that
//! study's [`RefreshOutcome`] and the remaining studies carry on.
//!
//! At most one refresh runs at a time per coordinator. Further callers wait for the running
//! refresh to finish and then run their own.

use crate::error::{RefreshResult, StudyError};
use crate::source::{PatientLookup, StudySource};
use crate::study::Study;
use crate::updater::AssessmentUpdater;
use futures_util::stream::{self, StreamExt};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Whether a refresh is currently running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    Idle,
    Running,
}

/// Result of reconciling one study.
#[derive(Debug, Serialize)]
pub struct RefreshOutcome {
    pub study_id: String,
    pub mrn: String,
    pub patient_id: Option<String>,
    pub assessment_count: usize,
    #[serde(serialize_with = "error_message")]
    pub error: Option<StudyError>,
}

impl RefreshOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

fn error_message<S: Serializer>(error: &Option<StudyError>, s: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => s.serialize_some(&e.to_string()),
        None => s.serialize_none(),
    }
}

/// Runs refreshes one at a time.
pub struct RefreshCoordinator {
    source: Arc<dyn StudySource>,
    lookup: Arc<dyn PatientLookup>,
    updater: Arc<dyn AssessmentUpdater>,
    basis_pie_url: String,
    concurrency: usize,
    in_flight: Mutex<()>,
}

impl RefreshCoordinator {
    /// Creates a coordinator.
    ///
    /// # Arguments
    ///
    /// * `basis_pie_url` - Prefix stored pies are served under, ending in `/pies/`.
    /// * `concurrency` - Studies reconciled at once within a refresh; 0 is treated as 1.
    pub fn new(
        source: Arc<dyn StudySource>,
        lookup: Arc<dyn PatientLookup>,
        updater: Arc<dyn AssessmentUpdater>,
        basis_pie_url: impl Into<String>,
        concurrency: usize,
    ) -> Self {
        Self {
            source,
            lookup,
            updater,
            basis_pie_url: basis_pie_url.into(),
            concurrency: concurrency.max(1),
            in_flight: Mutex::new(()),
        }
    }

    pub fn basis_pie_url(&self) -> &str {
        &self.basis_pie_url
    }

    pub fn state(&self) -> RefreshState {
        match self.in_flight.try_lock() {
            Ok(_) => RefreshState::Idle,
            Err(_) => RefreshState::Running,
        }
    }

    /// Runs one refresh, waiting for any refresh already in progress.
    ///
    /// # Returns
    ///
    /// One outcome per study, ordered by study id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RefreshError`] only if the studies could not be loaded.
    pub async fn refresh(&self) -> RefreshResult<Vec<RefreshOutcome>> {
        let _running = self.in_flight.lock().await;
        tracing::info!("refresh started");

        let studies = match self.source.load_studies().await {
            Ok(studies) => studies,
            Err(e) => {
                tracing::error!("refresh failed: {}", e);
                return Err(e);
            }
        };

        let pending: Vec<_> = studies.iter().map(|study| self.reconcile(study)).collect();
        let outcomes: Vec<RefreshOutcome> = stream::iter(pending)
            .buffered(self.concurrency)
            .collect()
            .await;

        log_outcome_summary(&outcomes);
        Ok(outcomes)
    }

    async fn reconcile(&self, study: &Study) -> RefreshOutcome {
        let mut outcome = RefreshOutcome {
            study_id: study.id().to_string(),
            mrn: study.mrn().to_string(),
            patient_id: None,
            assessment_count: 0,
            error: None,
        };

        let patient_id = match self.lookup.resolve(study).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("study {}: {}", study.id(), e);
                outcome.error = Some(e.into());
                return outcome;
            }
        };
        outcome.patient_id = Some(patient_id.clone());

        let reference = self.lookup.patient_reference(&patient_id);
        let results = study.to_anchored_results(&reference);

        match self
            .updater
            .update(&patient_id, &results, &self.basis_pie_url)
            .await
        {
            Ok(count) => {
                tracing::info!(
                    "study {}: recorded {} assessments for patient {}",
                    study.id(),
                    count,
                    patient_id
                );
                outcome.assessment_count = count;
            }
            Err(e) => {
                tracing::warn!("study {}: {}", study.id(), e);
                outcome.error = Some(e.into());
            }
        }
        outcome
    }
}

/// Logs totals of a refresh followed by one line per failed study.
pub fn log_outcome_summary(outcomes: &[RefreshOutcome]) {
    let failed: Vec<&RefreshOutcome> = outcomes.iter().filter(|o| !o.is_success()).collect();
    let assessments: usize = outcomes.iter().map(|o| o.assessment_count).sum();
    tracing::info!(
        "refresh finished: {} studies, {} succeeded, {} failed, {} assessments",
        outcomes.len(),
        outcomes.len() - failed.len(),
        failed.len(),
        assessments
    );
    for outcome in failed {
        if let Some(e) = &outcome.error {
            tracing::warn!(
                "study {} (MRN {:?}) failed: {}",
                outcome.study_id,
                outcome.mrn,
                e
            );
        }
    }
}
