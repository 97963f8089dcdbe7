//! RiskAssessment resource as posted for each derived pie.

use crate::datatypes::{CodeableConcept, Reference};
use serde::{Deserialize, Serialize};

/// One predicted outcome of an assessment.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Prediction {
    pub outcome: CodeableConcept,

    #[serde(rename = "probabilityDecimal", skip_serializing_if = "Option::is_none")]
    pub probability_decimal: Option<f64>,
}

/// RiskAssessment resource.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RiskAssessment {
    #[serde(rename = "resourceType")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub subject: Reference,

    /// Date the assessment applies to (FHIR `dateTime`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<CodeableConcept>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prediction: Vec<Prediction>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub basis: Vec<Reference>,
}

impl RiskAssessment {
    pub fn new(subject: Reference) -> Self {
        Self {
            resource_type: "RiskAssessment".to_string(),
            id: None,
            subject,
            date: None,
            method: None,
            prediction: Vec::new(),
            basis: Vec::new(),
        }
    }
}
