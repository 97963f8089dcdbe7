//! Error taxonomy of the risk service.
//!
//! Errors are split by blast radius:
//! - record level ([`ValidationError`], [`DateError`]): the record is left out of the derived
//!   results, nothing else is affected;
//! - batch level ([`RefreshError`]): fetching or aggregating the source data failed and the
//!   whole refresh is abandoned;
//! - study level ([`StudyError`]): resolving or persisting one study failed and is reported in
//!   that study's outcome only.

use riskservice_uuid::PieId;

/// A record cannot be turned into a pie.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("incomplete risk factors")]
    IncompleteRiskFactors,
    #[error("invalid score for {field}: {value:?}")]
    InvalidScore { field: &'static str, value: String },
}

/// The observation date of a record is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid risk factor date {value:?}: {reason}")]
pub struct DateError {
    pub value: String,
    pub reason: String,
}

/// A record cannot be turned into a calculation result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DerivationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Date(#[from] DateError),
}

/// A record disagrees with the identity of the study it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    #[error("record with study ID {conflicting} cannot be added to study with ID {existing}")]
    StudyId {
        existing: String,
        conflicting: String,
    },
    #[error(
        "record with MRN {conflicting} cannot be added to study {study_id} with MRN {existing}"
    )]
    Mrn {
        study_id: String,
        existing: String,
        conflicting: String,
    },
}

/// Transport or protocol failure talking to the survey source or the clinical server.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("received HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("couldn't decode response from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("invalid request URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

/// The clinical patient behind a study could not be determined.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("couldn't find patient with MRN {mrn:?} for study ID {study_id}")]
    PatientNotFound { study_id: String, mrn: String },
    #[error("found too many patients ({count}) with MRN {mrn:?} for study ID {study_id}")]
    AmbiguousPatient {
        study_id: String,
        mrn: String,
        count: usize,
    },
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Pie store failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("pie {0} is already stored")]
    AlreadyExists(PieId),
    #[error("failed to create pie directory: {0}")]
    DirCreation(std::io::Error),
    #[error("failed to write pie file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read pie file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to serialize pie: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize pie: {0}")]
    Deserialization(serde_json::Error),
    #[error("pie store task failed: {0}")]
    Task(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The delegated assessment upsert failed.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to store pie: {0}")]
    Store(#[from] StoreError),
    #[error("failed to update risk assessments: {0}")]
    Upstream(#[from] UpstreamError),
}

/// Failure isolated to one study of a refresh.
#[derive(Debug, thiserror::Error)]
pub enum StudyError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Failure that aborts a whole refresh.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("failed to fetch source data: {0}")]
    Fetch(#[from] UpstreamError),
    #[error("failed to aggregate survey records: {0}")]
    Conflict(#[from] ConflictError),
}

pub type RefreshResult<T> = std::result::Result<T, RefreshError>;

/// Startup configuration is missing or malformed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(reqwest::Error),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
