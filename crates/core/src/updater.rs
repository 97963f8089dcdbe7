//! Assessment updates on the clinical server.
//!
//! After a study is derived its results replace whatever this service previously recorded for
//! the patient: the pies are stored, earlier assessments with this service's method are
//! removed, and one `RiskAssessment` is created per result pointing back at its pie.

use crate::clients::FhirClient;
use crate::constants::{
    PREDICTED_OUTCOME, RISK_METHOD_CODE, RISK_METHOD_NAME, RISK_METHOD_SYSTEM,
};
use crate::error::PersistenceError;
use crate::pie::CalculationResult;
use crate::store::PieStore;
use async_trait::async_trait;
use chrono::SecondsFormat;
use fhir::{CodeableConcept, Coding, Prediction, Reference, RiskAssessment};
use std::sync::Arc;

/// Replaces a patient's assessments with freshly derived results.
#[async_trait]
pub trait AssessmentUpdater: Send + Sync {
    /// Persists `results` for `patient_id`, returning the number of assessments recorded.
    ///
    /// `basis_pie_url` is the prefix under which stored pies are served; a pie's id appended to
    /// it yields its URL.
    async fn update(
        &self,
        patient_id: &str,
        results: &[CalculationResult],
        basis_pie_url: &str,
    ) -> Result<usize, PersistenceError>;
}

/// Method coding of every assessment this service produces.
pub fn risk_method() -> CodeableConcept {
    CodeableConcept {
        coding: vec![Coding::new(RISK_METHOD_SYSTEM, RISK_METHOD_CODE)],
        text: Some(RISK_METHOD_NAME.to_string()),
    }
}

/// Builds the assessment posted for one result.
pub fn to_risk_assessment(
    patient_id: &str,
    result: &CalculationResult,
    basis_pie_url: &str,
) -> RiskAssessment {
    let mut assessment = RiskAssessment::new(Reference::new(format!("Patient/{patient_id}")));
    assessment.date = Some(result.as_of.to_rfc3339_opts(SecondsFormat::Secs, true));
    assessment.method = Some(risk_method());
    assessment.prediction.push(Prediction {
        outcome: CodeableConcept::text(PREDICTED_OUTCOME),
        probability_decimal: Some(result.score as f64),
    });
    assessment
        .basis
        .push(Reference::new(format!("{}{}", basis_pie_url, result.pie.id())));
    assessment
}

/// Updater backed by a pie store and the clinical server.
#[derive(Clone)]
pub struct FhirAssessmentUpdater {
    fhir: FhirClient,
    pies: Arc<dyn PieStore>,
}

impl FhirAssessmentUpdater {
    pub fn new(fhir: FhirClient, pies: Arc<dyn PieStore>) -> Self {
        Self { fhir, pies }
    }
}

#[async_trait]
impl AssessmentUpdater for FhirAssessmentUpdater {
    async fn update(
        &self,
        patient_id: &str,
        results: &[CalculationResult],
        basis_pie_url: &str,
    ) -> Result<usize, PersistenceError> {
        for result in results {
            self.pies.save(&result.pie).await?;
        }

        let method = risk_method()
            .coding
            .first()
            .map(Coding::search_token)
            .unwrap_or_default();
        self.fhir
            .delete_risk_assessments(patient_id, &method)
            .await?;

        for result in results {
            let assessment = to_risk_assessment(patient_id, result, basis_pie_url);
            self.fhir.post_risk_assessment(&assessment).await?;
        }
        Ok(results.len())
    }
}
