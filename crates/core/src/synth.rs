//! Synthetic risk trajectories.
//!
//! The synthesizer turns a short patient summary into a plausible multi-year series of survey
//! records, so the full pipeline can run against a clinical server without a survey source.
//!
//! The first record takes its clinical band from the patient's condition and medication load
//! and draws the other three bands from a distribution biased towards low risk. Every later
//! record moves each band by a bounded random walk; the clinical band never strays more than
//! one band from its first value. Higher perceived risk means the next record comes sooner.

use crate::constants::{FORM_COMPLETE, RISK_FACTOR_DATE_FORMAT};
use crate::record::{FormStatus, RawRecord, RiskCategory, SubjectId};
use chrono::{Days, Months, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

const LOWEST_BAND: u8 = 1;
const HIGHEST_BAND: u8 = 4;

/// Draws allowed before a walk step gives up and keeps the previous band.
const MAX_WALK_ATTEMPTS: usize = 32;

/// What the synthesizer knows about a clinical patient.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PatientSummary {
    pub id: String,
    pub age: i64,
    pub condition_count: u32,
    pub medication_count: u32,
}

/// First observation date of every synthetic trajectory.
pub fn trajectory_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2014, 6, 1).unwrap_or_default()
}

/// Generates synthetic record histories from an injectable random source.
pub struct TrajectorySynthesizer<R: Rng = StdRng> {
    rng: R,
    start: NaiveDate,
}

impl TrajectorySynthesizer<StdRng> {
    /// Synthesizer seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Reproducible synthesizer.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> TrajectorySynthesizer<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            start: trajectory_start(),
        }
    }

    /// Overrides the first observation date.
    pub fn starting_at(mut self, start: NaiveDate) -> Self {
        self.start = start;
        self
    }

    /// Full history of `summary` up to today.
    pub fn synthesize(&mut self, summary: &PatientSummary) -> Vec<RawRecord> {
        self.synthesize_until(summary, Utc::now().date_naive())
    }

    /// History of `summary` with observation dates strictly before `until`.
    pub fn synthesize_until(
        &mut self,
        summary: &PatientSummary,
        until: NaiveDate,
    ) -> Vec<RawRecord> {
        let mut records = Vec::new();
        let mut first: Option<[u8; 4]> = None;
        let mut previous = [LOWEST_BAND; 4];
        let mut date = self.start;

        while date < until {
            let bands = match first {
                None => {
                    let bands = self.initial_bands(summary);
                    first = Some(bands);
                    bands
                }
                Some(initial) => self.next_bands(&previous, &initial),
            };
            let perceived = worst_band(&bands);
            records.push(build_record(summary, date, &bands, perceived));
            previous = bands;

            date = match advance(date, perceived) {
                Some(next) => next,
                None => break,
            };
        }
        records
    }

    fn initial_bands(&mut self, summary: &PatientSummary) -> [u8; 4] {
        let load = summary.condition_count + summary.medication_count;
        let clinical = match load {
            n if n < 3 => 1,
            n if n < 6 => 2,
            _ => 3,
        };
        [
            clinical,
            self.randomish_band(),
            self.randomish_band(),
            self.randomish_band(),
        ]
    }

    fn next_bands(&mut self, previous: &[u8; 4], initial: &[u8; 4]) -> [u8; 4] {
        let clinical_low = initial[0].saturating_sub(1).max(LOWEST_BAND);
        let clinical_high = (initial[0] + 1).min(HIGHEST_BAND);
        [
            self.next_band(previous[0], clinical_low, clinical_high),
            self.next_band(previous[1], LOWEST_BAND, HIGHEST_BAND),
            self.next_band(previous[2], LOWEST_BAND, HIGHEST_BAND),
            self.next_band(previous[3], LOWEST_BAND, HIGHEST_BAND),
        ]
    }

    /// 50% band 1, 30% band 2, 15% band 3, 5% band 4.
    fn randomish_band(&mut self) -> u8 {
        match self.rng.gen_range(0..100u32) {
            i if i < 5 => 4,
            i if i < 20 => 3,
            i if i < 50 => 2,
            _ => 1,
        }
    }

    /// One random walk step from `previous`, redrawn until it lands in `low..=high`.
    fn next_band(&mut self, previous: u8, low: u8, high: u8) -> u8 {
        for _ in 0..MAX_WALK_ATTEMPTS {
            let i = self.rng.gen_range(0..100u32);
            let next = match previous {
                1 if i < 10 => 2,
                2 if i < 30 => 1,
                2 if i < 50 => 3,
                3 if i < 50 => 2,
                3 if i < 65 => 4,
                4 if i < 50 => 3,
                _ => previous,
            };
            if (low..=high).contains(&next) {
                return next;
            }
        }
        previous
    }
}

fn worst_band(bands: &[u8; 4]) -> u8 {
    bands.iter().copied().max().unwrap_or(LOWEST_BAND)
}

/// Next observation date: 3 months, 2 months, 21 days or 7 days by perceived band.
fn advance(date: NaiveDate, perceived: u8) -> Option<NaiveDate> {
    match perceived {
        1 => date.checked_add_months(Months::new(3)),
        2 => date.checked_add_months(Months::new(2)),
        3 => date.checked_add_days(Days::new(21)),
        _ => date.checked_add_days(Days::new(7)),
    }
}

fn build_record(
    summary: &PatientSummary,
    date: NaiveDate,
    bands: &[u8; 4],
    perceived: u8,
) -> RawRecord {
    let mut record = RawRecord {
        study_id: SubjectId::Textual(summary.id.clone()),
        mrn: summary.id.clone(),
        participant_info_complete: FormStatus::from(FORM_COMPLETE),
        risk_factor_date: date.format(RISK_FACTOR_DATE_FORMAT).to_string(),
        perceived_risk: perceived.to_string(),
        risk_factors_complete: FormStatus::from(FORM_COMPLETE),
        ..RawRecord::default()
    };
    for (category, band) in RiskCategory::ALL.into_iter().zip(bands) {
        record.set_score(category, band.to_string());
    }
    record
}
