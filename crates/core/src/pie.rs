//! Risk pies and calculation results.
//!
//! A [`Pie`] is the four-slice picture of a subject's risk on one observation date. Pies are
//! created only from risk-factor-complete records, get a fresh identifier and creation time on
//! every derivation (identical records still yield distinct pies), and are never modified once
//! built; the only adjustment is anchoring a freshly built pie to its clinical patient before
//! it is handed on for persistence.
//!
//! A [`CalculationResult`] pairs a pie with its as-of time and its aggregate score, which is
//! the worst (highest) slice value.

use crate::constants::{SLICE_MAX_VALUE, SLICE_WEIGHT};
use crate::error::{DerivationError, ValidationError};
use crate::record::{RawRecord, RiskCategory};
use chrono::{DateTime, NaiveTime, Utc};
use riskservice_uuid::PieId;
use serde::{Deserialize, Serialize};

/// One named risk category of a pie.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slice {
    pub name: String,
    pub value: i64,
    pub weight: u32,
    #[serde(rename = "maxValue")]
    pub max_value: i64,
}

impl Slice {
    fn new(category: RiskCategory, value: i64) -> Self {
        Self {
            name: category.slice_name().to_string(),
            value,
            weight: SLICE_WEIGHT,
            max_value: SLICE_MAX_VALUE,
        }
    }
}

/// Four-slice risk pie, persisted keyed by its id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pie {
    id: PieId,
    created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    patient: Option<String>,
    slices: Vec<Slice>,
}

impl Pie {
    pub fn id(&self) -> PieId {
        self.id
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Reference of the clinical patient this pie describes, once anchored.
    pub fn patient(&self) -> Option<&str> {
        self.patient.as_deref()
    }

    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    /// Worst slice value; the first maximum wins on ties.
    pub fn max_value(&self) -> i64 {
        self.slices
            .iter()
            .map(|s| s.value)
            .reduce(|best, v| if v > best { v } else { best })
            .unwrap_or_default()
    }

    pub(crate) fn anchored_to(mut self, patient_reference: &str) -> Self {
        self.patient = Some(patient_reference.to_string());
        self
    }
}

/// A derived assessment of one record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CalculationResult {
    pub as_of: DateTime<Utc>,
    pub score: i64,
    pub pie: Pie,
}

impl CalculationResult {
    pub(crate) fn anchored_to(self, patient_reference: &str) -> Self {
        Self {
            pie: self.pie.anchored_to(patient_reference),
            ..self
        }
    }
}

impl RawRecord {
    /// Builds the risk pie of this record.
    ///
    /// Scores must parse as integers; values outside 1-4 are passed through unchanged.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::IncompleteRiskFactors`] if the record is not risk-factor complete,
    /// - [`ValidationError::InvalidScore`] naming the first score that is not an integer.
    pub fn to_pie(&self) -> Result<Pie, ValidationError> {
        if !self.is_risk_factor_complete() {
            return Err(ValidationError::IncompleteRiskFactors);
        }

        let slices = RiskCategory::ALL
            .into_iter()
            .map(|category| {
                let raw = self.score(category);
                raw.parse::<i64>()
                    .map(|value| Slice::new(category, value))
                    .map_err(|_| ValidationError::InvalidScore {
                        field: category.field_name(),
                        value: raw.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Pie {
            id: PieId::new(),
            created: Utc::now(),
            patient: None,
            slices,
        })
    }

    /// Builds the pie and dates it at midnight UTC of the observation date.
    pub fn to_calculation_result(&self) -> Result<CalculationResult, DerivationError> {
        let pie = self.to_pie()?;
        let as_of = self.risk_factor_date()?.and_time(NaiveTime::MIN).and_utc();
        Ok(CalculationResult {
            as_of,
            score: pie.max_value(),
            pie,
        })
    }
}
