//! Per-subject aggregation of survey records.
//!
//! A [`Study`] collects every record of one subject. Its identity (study ID and MRN) is set by
//! the first record that carries a non-empty value and is enforced for every later record.
//! A [`StudyMap`] keys studies by canonical study ID and is rebuilt for every ingestion batch.

use crate::error::ConflictError;
use crate::pie::CalculationResult;
use crate::record::RawRecord;
use std::collections::BTreeMap;

/// All survey records of one subject, in arrival order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Study {
    id: String,
    mrn: String,
    records: Vec<RawRecord>,
}

impl Study {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mrn(&self) -> &str {
        &self.mrn
    }

    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    /// Appends a record after checking it agrees with the study's identity.
    ///
    /// Empty identifiers on either side never conflict. The first non-empty study ID and MRN
    /// become the study's identity.
    ///
    /// # Errors
    ///
    /// Returns [`ConflictError`] if the record's non-empty study ID or MRN disagrees with the
    /// value already established. The study is left untouched in that case.
    pub fn add_record(&mut self, record: RawRecord) -> Result<(), ConflictError> {
        let study_id = record.subject_id();

        if !study_id.is_empty() && !self.id.is_empty() && self.id != study_id {
            return Err(ConflictError::StudyId {
                existing: self.id.clone(),
                conflicting: study_id,
            });
        }
        if !record.mrn.is_empty() && !self.mrn.is_empty() && self.mrn != record.mrn {
            return Err(ConflictError::Mrn {
                study_id: self.id.clone(),
                existing: self.mrn.clone(),
                conflicting: record.mrn.clone(),
            });
        }

        if self.id.is_empty() {
            self.id = study_id;
        }
        if self.mrn.is_empty() {
            self.mrn = record.mrn.clone();
        }
        self.records.push(record);
        Ok(())
    }

    /// Derives the calculation results of every complete record, oldest first.
    ///
    /// Records that are incomplete or malformed are skipped. Results sharing an as-of time keep
    /// their arrival order.
    pub fn to_ordered_results(&self) -> Vec<CalculationResult> {
        let mut results: Vec<CalculationResult> = self
            .records
            .iter()
            .filter_map(|record| match record.to_calculation_result() {
                Ok(result) => Some(result),
                Err(e) => {
                    tracing::debug!(
                        "skipping record {:?} of study {}: {}",
                        record.event_name,
                        self.id,
                        e
                    );
                    None
                }
            })
            .collect();
        results.sort_by_key(|r| r.as_of);
        results
    }

    /// Ordered results anchored to the clinical patient the study resolved to.
    pub fn to_anchored_results(&self, patient_reference: &str) -> Vec<CalculationResult> {
        self.to_ordered_results()
            .into_iter()
            .map(|r| r.anchored_to(patient_reference))
            .collect()
    }
}

/// Studies of one ingestion batch keyed by canonical study ID.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StudyMap {
    studies: BTreeMap<String, Study>,
}

impl StudyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record to the study matching its canonical ID, creating the study on first sight.
    pub fn add_record(&mut self, record: RawRecord) -> Result<(), ConflictError> {
        self.studies
            .entry(record.subject_id())
            .or_default()
            .add_record(record)
    }

    /// Adds a batch of records in order.
    ///
    /// Stops at the first conflict. Records before it stay in the map, so the caller has to
    /// discard the whole batch on error.
    pub fn add_records<I>(&mut self, records: I) -> Result<(), ConflictError>
    where
        I: IntoIterator<Item = RawRecord>,
    {
        for record in records {
            self.add_record(record)?;
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Study> {
        self.studies.get(id)
    }

    pub fn len(&self) -> usize {
        self.studies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.studies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Study> {
        self.studies.values()
    }

    pub fn into_studies(self) -> Vec<Study> {
        self.studies.into_values().collect()
    }
}
