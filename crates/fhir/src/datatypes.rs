//! Shared FHIR data types.

use serde::{Deserialize, Serialize};

/// A code drawn from a terminology system.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Coding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Coding {
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            code: Some(code.into()),
            display: None,
        }
    }

    /// Search token form (`system|code`) used by FHIR token parameters.
    pub fn search_token(&self) -> String {
        format!(
            "{}|{}",
            self.system.as_deref().unwrap_or_default(),
            self.code.as_deref().unwrap_or_default()
        )
    }
}

/// A concept with optional codings and free text.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CodeableConcept {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodeableConcept {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            coding: Vec::new(),
            text: Some(text.into()),
        }
    }
}

/// A business identifier such as a medical record number.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Identifier {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// A literal reference to another resource (`Patient/123` or an absolute URL).
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Reference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Reference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: Some(reference.into()),
        }
    }

    /// Returns the id of the referenced resource.
    ///
    /// Handles relative (`Patient/123`), absolute (`http://host/fhir/Patient/123`) and
    /// versioned (`Patient/123/_history/2`) references.
    pub fn referenced_id(&self) -> Option<&str> {
        let reference = self.reference.as_deref()?.trim_end_matches('/');
        let segments: Vec<&str> = reference.split('/').collect();
        let id = match segments.iter().position(|s| *s == "_history") {
            Some(pos) if pos > 0 => segments[pos - 1],
            _ => *segments.last()?,
        };
        if id.is_empty() {
            None
        } else {
            Some(id)
        }
    }
}
