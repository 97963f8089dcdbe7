//! Patient-centred resources returned by the clinical resource server.
//!
//! Only the fields the risk service reads are modelled; everything else in a server response
//! is ignored.

use crate::datatypes::{Identifier, Reference};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Patient resource.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Patient {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,

    #[serde(rename = "birthDate", skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
}

impl Patient {
    /// Parses `birthDate`, accepting a full date or the leading date part of a dateTime.
    ///
    /// Partial dates (`1970`, `1970-04`) yield `None`.
    pub fn birth_date(&self) -> Option<NaiveDate> {
        let raw = self.birth_date.as_deref()?;
        let date_part = raw.get(..10)?;
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
    }
}

/// Condition resource. Older servers link the patient through `patient`, newer ones through
/// `subject`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Condition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient: Option<Reference>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
}

impl Condition {
    pub fn patient_id(&self) -> Option<&str> {
        patient_id(self.patient.as_ref(), self.subject.as_ref())
    }
}

/// MedicationStatement resource.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct MedicationStatement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient: Option<Reference>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
}

impl MedicationStatement {
    pub fn patient_id(&self) -> Option<&str> {
        patient_id(self.patient.as_ref(), self.subject.as_ref())
    }
}

fn patient_id<'a>(
    patient: Option<&'a Reference>,
    subject: Option<&'a Reference>,
) -> Option<&'a str> {
    patient
        .and_then(Reference::referenced_id)
        .or_else(|| subject.and_then(Reference::referenced_id))
}
