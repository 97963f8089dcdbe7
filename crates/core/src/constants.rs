//! Constants used throughout the risk service core crate.
//!
//! Wire field names, slice definitions, method codings and configuration defaults live here so
//! the survey client, the pie derivation and the assessment updater agree on them.

/// Name of the clinical risk slice.
pub const CLINICAL_RISK: &str = "Clinical Risk";

/// Name of the functional and environmental risk slice.
pub const FUNCTIONAL_RISK: &str = "Functional and Environmental Risk";

/// Name of the psychosocial and mental health risk slice.
pub const PSYCHOSOCIAL_RISK: &str = "Psychosocial and Mental Health Risk";

/// Name of the utilization risk slice.
pub const UTILIZATION_RISK: &str = "Utilization Risk";

/// Weight of every slice; four slices make up a whole pie.
pub const SLICE_WEIGHT: u32 = 25;

/// Highest band a slice can report.
pub const SLICE_MAX_VALUE: i64 = 4;

/// Completion code the survey source uses for a completed form.
pub const FORM_COMPLETE: &str = "2";

/// Date format of the survey observation date.
pub const RISK_FACTOR_DATE_FORMAT: &str = "%Y-%m-%d";

/// Fields requested from the survey source, in the order they are listed in the request.
pub const SURVEY_FIELDS: &[&str] = &[
    "study_id",
    "redcap_event_name",
    "mrn",
    "participant_information_complete",
    "rf_date",
    "rf_cmc_risk_cat",
    "rf_func_risk_cat",
    "rf_sb_risk_cat",
    "rf_util_risk_cat",
    "rf_risk_predicted",
    "risk_factors_complete",
];

/// Coding system identifying assessments produced by this service.
pub const RISK_METHOD_SYSTEM: &str = "http://interventionengine.org/risk-assessments";

/// Coding code identifying assessments produced by this service.
pub const RISK_METHOD_CODE: &str = "REDCap";

/// Human readable name of this service's assessment method.
pub const RISK_METHOD_NAME: &str = "REDCap Risk Service";

/// Outcome predicted by every assessment.
pub const PREDICTED_OUTCOME: &str = "Unexpected ED/Hospital Visit";

/// Path segment under which cached pies are served.
pub const PIES_PATH: &str = "/pies/";

/// Default listen address of the HTTP service.
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:9000";

/// Default directory for pie storage when no explicit directory is configured.
pub const DEFAULT_PIE_DATA_DIR: &str = "pie_data";

/// Default period between scheduled refreshes (daily).
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Default per-request timeout for the survey source and clinical server.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Default number of studies reconciled concurrently within one refresh.
pub const DEFAULT_REFRESH_CONCURRENCY: usize = 4;
