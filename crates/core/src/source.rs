//! Where studies come from and how they map onto clinical patients.
//!
//! In survey mode studies are aggregated from the survey export and resolved to patients by
//! MRN. In synthetic mode every patient on the clinical server becomes one synthetic study
//! whose MRN already is the patient id.

use crate::clients::{FhirClient, RedcapClient};
use crate::error::{RefreshResult, ResolutionError};
use crate::study::{Study, StudyMap};
use crate::synth::TrajectorySynthesizer;
use async_trait::async_trait;
use rand::rngs::StdRng;
use tokio::sync::Mutex;

/// Supplies the studies of one refresh.
#[async_trait]
pub trait StudySource: Send + Sync {
    /// Loads and aggregates every study.
    ///
    /// # Errors
    ///
    /// Any error fails the whole refresh: a fetch failure or an aggregation conflict.
    async fn load_studies(&self) -> RefreshResult<Vec<Study>>;
}

/// Resolves the clinical patient behind a study.
#[async_trait]
pub trait PatientLookup: Send + Sync {
    /// Returns the clinical patient id for `study`.
    async fn resolve(&self, study: &Study) -> Result<String, ResolutionError>;

    /// Absolute reference of a resolved patient, used to anchor derived pies.
    fn patient_reference(&self, patient_id: &str) -> String;
}

/// Studies aggregated from the survey export.
#[derive(Clone, Debug)]
pub struct SurveyStudySource {
    redcap: RedcapClient,
}

impl SurveyStudySource {
    pub fn new(redcap: RedcapClient) -> Self {
        Self { redcap }
    }
}

#[async_trait]
impl StudySource for SurveyStudySource {
    async fn load_studies(&self) -> RefreshResult<Vec<Study>> {
        let records = self.redcap.fetch_records().await?;
        let mut studies = StudyMap::new();
        studies.add_records(records)?;
        Ok(studies.into_studies())
    }
}

/// One synthetic study per patient on the clinical server.
pub struct SyntheticStudySource {
    fhir: FhirClient,
    synthesizer: Mutex<TrajectorySynthesizer<StdRng>>,
}

impl SyntheticStudySource {
    pub fn new(fhir: FhirClient, synthesizer: TrajectorySynthesizer<StdRng>) -> Self {
        Self {
            fhir,
            synthesizer: Mutex::new(synthesizer),
        }
    }
}

#[async_trait]
impl StudySource for SyntheticStudySource {
    async fn load_studies(&self) -> RefreshResult<Vec<Study>> {
        let summaries = self.fhir.patient_summaries().await?;
        tracing::debug!("synthesizing studies for {} patients", summaries.len());

        let mut synthesizer = self.synthesizer.lock().await;
        let mut studies = StudyMap::new();
        for summary in &summaries {
            studies.add_records(synthesizer.synthesize(summary))?;
        }
        Ok(studies.into_studies())
    }
}

/// Resolves studies by searching the clinical server for their MRN.
#[derive(Clone, Debug)]
pub struct FhirPatientLookup {
    fhir: FhirClient,
}

impl FhirPatientLookup {
    pub fn new(fhir: FhirClient) -> Self {
        Self { fhir }
    }
}

#[async_trait]
impl PatientLookup for FhirPatientLookup {
    async fn resolve(&self, study: &Study) -> Result<String, ResolutionError> {
        let not_found = || ResolutionError::PatientNotFound {
            study_id: study.id().to_string(),
            mrn: study.mrn().to_string(),
        };
        if study.mrn().is_empty() {
            return Err(not_found());
        }

        let patients = self.fhir.find_patients_by_mrn(study.mrn()).await?;
        match patients.as_slice() {
            [] => Err(not_found()),
            [patient] => patient
                .id
                .clone()
                .filter(|id| !id.is_empty())
                .ok_or_else(not_found),
            _ => Err(ResolutionError::AmbiguousPatient {
                study_id: study.id().to_string(),
                mrn: study.mrn().to_string(),
                count: patients.len(),
            }),
        }
    }

    fn patient_reference(&self, patient_id: &str) -> String {
        self.fhir.patient_reference(patient_id)
    }
}

/// Synthetic studies carry the patient id as their MRN.
#[derive(Clone, Debug)]
pub struct DirectPatientLookup {
    fhir: FhirClient,
}

impl DirectPatientLookup {
    pub fn new(fhir: FhirClient) -> Self {
        Self { fhir }
    }
}

#[async_trait]
impl PatientLookup for DirectPatientLookup {
    async fn resolve(&self, study: &Study) -> Result<String, ResolutionError> {
        if study.mrn().is_empty() {
            return Err(ResolutionError::PatientNotFound {
                study_id: study.id().to_string(),
                mrn: String::new(),
            });
        }
        Ok(study.mrn().to_string())
    }

    fn patient_reference(&self, patient_id: &str) -> String {
        self.fhir.patient_reference(patient_id)
    }
}
