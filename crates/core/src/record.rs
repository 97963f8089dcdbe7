//! Survey records as exported by the data-capture source.
//!
//! A [`RawRecord`] is one flat row of the longitudinal risk-factor project: one subject, one
//! event. Records are read straight from the survey export (or produced by the trajectory
//! synthesizer) and interpreted through two pure completeness predicates:
//!
//! - **participation complete**: the participant form is complete and an MRN is present;
//! - **risk-factor complete**: the risk-factor form is complete and the observation date and
//!   all four category scores are present.
//!
//! The subject identifier arrives either as a JSON string or a JSON number. It is kept as a
//! [`SubjectId`] and collapsed to one canonical string with [`SubjectId::canonical`].

use crate::constants::{
    CLINICAL_RISK, FORM_COMPLETE, FUNCTIONAL_RISK, PSYCHOSOCIAL_RISK, RISK_FACTOR_DATE_FORMAT,
    UTILIZATION_RISK,
};
use crate::error::DateError;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Subject identifier as found in the export.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SubjectId {
    Numeric(serde_json::Number),
    Textual(String),
}

impl Default for SubjectId {
    fn default() -> Self {
        SubjectId::Textual(String::new())
    }
}

impl SubjectId {
    /// Canonical string form used as the study key.
    ///
    /// Integral numbers render without a fractional part even when the exporter wrote them as
    /// floats (`1.0` becomes `"1"`); other numbers keep their shortest decimal form.
    pub fn canonical(&self) -> String {
        match self {
            SubjectId::Textual(s) => s.clone(),
            SubjectId::Numeric(n) => {
                if let Some(i) = n.as_i64() {
                    i.to_string()
                } else if let Some(u) = n.as_u64() {
                    u.to_string()
                } else {
                    match n.as_f64() {
                        // Integral floats below 2^53 convert to i64 exactly.
                        Some(f) if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => {
                            (f as i64).to_string()
                        }
                        _ => n.to_string(),
                    }
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, SubjectId::Textual(s) if s.is_empty())
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl From<&str> for SubjectId {
    fn from(value: &str) -> Self {
        SubjectId::Textual(value.to_string())
    }
}

impl From<String> for SubjectId {
    fn from(value: String) -> Self {
        SubjectId::Textual(value)
    }
}

impl From<i64> for SubjectId {
    fn from(value: i64) -> Self {
        SubjectId::Numeric(value.into())
    }
}

impl<'de> Deserialize<'de> for SubjectId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Numeric(serde_json::Number),
            Textual(String),
            Null(()),
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Numeric(n) => SubjectId::Numeric(n),
            Wire::Textual(s) => SubjectId::Textual(s),
            Wire::Null(()) => SubjectId::default(),
        })
    }
}

/// Completion status code of a survey form.
///
/// Only [`FormStatus::Complete`] counts as complete; every other code, including an empty
/// value, means the form is not complete.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FormStatus {
    #[default]
    Missing,
    Incomplete,
    Unverified,
    Complete,
    Other(String),
}

impl FormStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, FormStatus::Complete)
    }

    pub fn as_str(&self) -> &str {
        match self {
            FormStatus::Missing => "",
            FormStatus::Incomplete => "0",
            FormStatus::Unverified => "1",
            FormStatus::Complete => FORM_COMPLETE,
            FormStatus::Other(s) => s,
        }
    }
}

impl From<String> for FormStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "" => FormStatus::Missing,
            "0" => FormStatus::Incomplete,
            "1" => FormStatus::Unverified,
            FORM_COMPLETE => FormStatus::Complete,
            _ => FormStatus::Other(value),
        }
    }
}

impl From<&str> for FormStatus {
    fn from(value: &str) -> Self {
        FormStatus::from(value.to_string())
    }
}

impl From<FormStatus> for String {
    fn from(value: FormStatus) -> Self {
        match value {
            FormStatus::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

/// The four risk categories, in pie order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RiskCategory {
    Clinical,
    Functional,
    Psychosocial,
    Utilization,
}

impl RiskCategory {
    /// All categories in the fixed slice order.
    pub const ALL: [RiskCategory; 4] = [
        RiskCategory::Clinical,
        RiskCategory::Functional,
        RiskCategory::Psychosocial,
        RiskCategory::Utilization,
    ];

    /// Slice name shown in the pie.
    pub fn slice_name(self) -> &'static str {
        match self {
            RiskCategory::Clinical => CLINICAL_RISK,
            RiskCategory::Functional => FUNCTIONAL_RISK,
            RiskCategory::Psychosocial => PSYCHOSOCIAL_RISK,
            RiskCategory::Utilization => UTILIZATION_RISK,
        }
    }

    /// Field name in the survey export.
    pub fn field_name(self) -> &'static str {
        match self {
            RiskCategory::Clinical => "rf_cmc_risk_cat",
            RiskCategory::Functional => "rf_func_risk_cat",
            RiskCategory::Psychosocial => "rf_sb_risk_cat",
            RiskCategory::Utilization => "rf_util_risk_cat",
        }
    }
}

/// One row of the survey export.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "study_id", default)]
    pub study_id: SubjectId,

    #[serde(rename = "redcap_event_name", default, deserialize_with = "text")]
    pub event_name: String,

    #[serde(rename = "mrn", default, deserialize_with = "text")]
    pub mrn: String,

    #[serde(
        rename = "participant_information_complete",
        default,
        deserialize_with = "form_status"
    )]
    pub participant_info_complete: FormStatus,

    #[serde(rename = "rf_date", default, deserialize_with = "text")]
    pub risk_factor_date: String,

    #[serde(rename = "rf_cmc_risk_cat", default, deserialize_with = "text")]
    pub clinical_risk: String,

    #[serde(rename = "rf_func_risk_cat", default, deserialize_with = "text")]
    pub functional_risk: String,

    #[serde(rename = "rf_sb_risk_cat", default, deserialize_with = "text")]
    pub psychosocial_risk: String,

    #[serde(rename = "rf_util_risk_cat", default, deserialize_with = "text")]
    pub utilization_risk: String,

    #[serde(rename = "rf_risk_predicted", default, deserialize_with = "text")]
    pub perceived_risk: String,

    #[serde(rename = "risk_factors_complete", default, deserialize_with = "form_status")]
    pub risk_factors_complete: FormStatus,
}

/// Accepts `null` for optional text fields.
fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts `null` for a form status, reading it as [`FormStatus::Missing`].
fn form_status<'de, D>(deserializer: D) -> Result<FormStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .map(FormStatus::from)
        .unwrap_or_default())
}

impl RawRecord {
    /// Canonical subject identifier of this record.
    pub fn subject_id(&self) -> String {
        self.study_id.canonical()
    }

    /// Score string recorded for `category`.
    pub fn score(&self, category: RiskCategory) -> &str {
        match category {
            RiskCategory::Clinical => &self.clinical_risk,
            RiskCategory::Functional => &self.functional_risk,
            RiskCategory::Psychosocial => &self.psychosocial_risk,
            RiskCategory::Utilization => &self.utilization_risk,
        }
    }

    pub fn set_score(&mut self, category: RiskCategory, score: impl Into<String>) {
        let slot = match category {
            RiskCategory::Clinical => &mut self.clinical_risk,
            RiskCategory::Functional => &mut self.functional_risk,
            RiskCategory::Psychosocial => &mut self.psychosocial_risk,
            RiskCategory::Utilization => &mut self.utilization_risk,
        };
        *slot = score.into();
    }

    /// True when the participant form is complete and an MRN is present.
    pub fn is_participation_complete(&self) -> bool {
        self.participant_info_complete.is_complete() && !self.mrn.is_empty()
    }

    /// True when the risk-factor form is complete and the date and all four category scores
    /// are present.
    pub fn is_risk_factor_complete(&self) -> bool {
        self.risk_factors_complete.is_complete()
            && !self.risk_factor_date.is_empty()
            && RiskCategory::ALL
                .iter()
                .all(|c| !self.score(*c).is_empty())
    }

    /// Parses the observation date.
    pub fn risk_factor_date(&self) -> Result<NaiveDate, DateError> {
        NaiveDate::parse_from_str(&self.risk_factor_date, RISK_FACTOR_DATE_FORMAT).map_err(|e| {
            DateError {
                value: self.risk_factor_date.clone(),
                reason: e.to_string(),
            }
        })
    }
}
