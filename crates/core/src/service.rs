//! Service assembly.
//!
//! Wires the clients, the pie store, the study source and the updater selected by a
//! [`ServiceConfig`] into one [`RiskService`].

use crate::clients::{build_http_client, FhirClient, RedcapClient};
use crate::config::{ServiceConfig, SourceMode};
use crate::error::ConfigResult;
use crate::refresh::RefreshCoordinator;
use crate::source::{
    DirectPatientLookup, FhirPatientLookup, PatientLookup, StudySource, SurveyStudySource,
    SyntheticStudySource,
};
use crate::store::{FilePieStore, PieStore};
use crate::synth::TrajectorySynthesizer;
use crate::updater::FhirAssessmentUpdater;
use std::sync::Arc;

/// The refresh coordinator together with the pie store it writes to.
#[derive(Clone)]
pub struct RiskService {
    coordinator: Arc<RefreshCoordinator>,
    pies: Arc<dyn PieStore>,
}

impl RiskService {
    pub fn new(coordinator: Arc<RefreshCoordinator>, pies: Arc<dyn PieStore>) -> Self {
        Self { coordinator, pies }
    }

    /// Builds the service described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigError`] if the HTTP client cannot be built.
    pub fn from_config(config: &ServiceConfig) -> ConfigResult<Self> {
        let http = build_http_client(config.http_timeout())?;
        let fhir = FhirClient::new(config.fhir_endpoint(), http.clone());
        let pies: Arc<dyn PieStore> = Arc::new(FilePieStore::new(config.pie_data_dir()));

        let source: Arc<dyn StudySource>;
        let lookup: Arc<dyn PatientLookup>;
        match config.mode() {
            SourceMode::Survey { endpoint, token } => {
                let redcap = RedcapClient::new(endpoint, token.clone(), http);
                source = Arc::new(SurveyStudySource::new(redcap));
                lookup = Arc::new(FhirPatientLookup::new(fhir.clone()));
            }
            SourceMode::Synthetic => {
                let synthesizer = TrajectorySynthesizer::from_entropy();
                source = Arc::new(SyntheticStudySource::new(fhir.clone(), synthesizer));
                lookup = Arc::new(DirectPatientLookup::new(fhir.clone()));
            }
        }

        let updater = Arc::new(FhirAssessmentUpdater::new(fhir, pies.clone()));
        let coordinator = Arc::new(RefreshCoordinator::new(
            source,
            lookup,
            updater,
            config.basis_pie_url(),
            config.refresh_concurrency(),
        ));

        tracing::info!(
            "risk service configured: mode={}, fhir={}, pies={}, basis={}",
            match config.mode() {
                SourceMode::Survey { .. } => "survey",
                SourceMode::Synthetic => "synthetic",
            },
            config.fhir_endpoint(),
            config.pie_data_dir().display(),
            config.basis_pie_url()
        );
        Ok(Self { coordinator, pies })
    }

    pub fn coordinator(&self) -> Arc<RefreshCoordinator> {
        self.coordinator.clone()
    }

    pub fn pies(&self) -> Arc<dyn PieStore> {
        self.pies.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ENV_FHIR_ENDPOINT, ENV_MODE, ENV_PIE_DATA_DIR, ENV_PUBLIC_URL};
    use crate::refresh::RefreshState;
    use tempfile::TempDir;

    #[tokio::test]
    async fn builds_synthetic_service() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let pie_dir = temp_dir.path().display().to_string();
        let config = ServiceConfig::from_lookup(|name| match name {
            ENV_PUBLIC_URL => Some("http://risk:9000".into()),
            ENV_FHIR_ENDPOINT => Some("http://fhir:3001".into()),
            ENV_MODE => Some("synthetic".into()),
            ENV_PIE_DATA_DIR => Some(pie_dir.clone()),
            _ => None,
        })
        .expect("config");

        let service = RiskService::from_config(&config).expect("service");
        assert_eq!(service.coordinator().basis_pie_url(), "http://risk:9000/pies/");
        assert_eq!(service.coordinator().state(), RefreshState::Idle);
        assert!(service
            .pies()
            .get(riskservice_uuid::PieId::new())
            .await
            .expect("lookup")
            .is_none());
    }
}
