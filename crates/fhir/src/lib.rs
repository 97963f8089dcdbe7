//! FHIR wire/boundary support for the risk service.
//!
//! This crate provides **wire models** and **parsing helpers** for the subset of FHIR JSON the
//! service exchanges with the clinical resource server:
//! - search result bundles (patients plus reverse-included conditions and medication statements)
//! - risk assessments posted back for each derived pie
//!
//! This crate focuses on:
//! - serialisation/deserialisation of the JSON REST payloads
//! - resolving references (`Patient/123`) to plain resource ids
//! - path-qualified errors when a server response does not match the expected shape
//!
//! It performs no I/O; transport lives in the core crate.

pub mod bundle;
pub mod datatypes;
pub mod patient;
pub mod risk_assessment;

pub use bundle::{Bundle, BundleEntry, BundleLink, Resource};
pub use datatypes::{CodeableConcept, Coding, Identifier, Reference};
pub use patient::{Condition, MedicationStatement, Patient};
pub use risk_assessment::{Prediction, RiskAssessment};

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;

/// Deserialise `bytes` as `T`, reporting the JSON path of the first mismatch.
pub(crate) fn parse_json<'de, T>(bytes: &'de [u8], what: &str) -> FhirResult<T>
where
    T: serde::Deserialize<'de>,
{
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize::<_, T>(&mut deserializer).map_err(|err| {
        let path = err.path().to_string();
        let source = err.into_inner();
        let path = if path.is_empty() || path == "." {
            "<root>"
        } else {
            path.as_str()
        };
        FhirError::Translation(format!("{what} schema mismatch at {path}: {source}"))
    })
}
