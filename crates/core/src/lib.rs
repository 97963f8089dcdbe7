//! # Risk Service Core
//!
//! Core business logic of the risk service.
//!
//! The service pulls longitudinal risk-factor survey records, groups them per subject, derives a
//! four-slice risk pie per observation date and reconciles the derived assessments against a
//! clinical (FHIR) server, keeping every pie for later retrieval:
//! - [`record`]: survey rows and their completeness predicates
//! - [`study`]: per-subject aggregation and chronological result ordering
//! - [`pie`]: pie derivation and worst-of scoring
//! - [`synth`]: synthetic risk trajectories for demo and test data
//! - [`refresh`]: the single-flight refresh coordinator
//! - [`clients`], [`store`], [`updater`], [`source`]: the collaborators a refresh drives
//!
//! **No API concerns**: HTTP routing and the command line belong in `api-rest` and `cli`.

pub mod clients;
pub mod config;
pub mod constants;
pub mod error;
pub mod pie;
pub mod record;
pub mod refresh;
pub mod schedule;
pub mod service;
pub mod source;
pub mod store;
pub mod study;
pub mod synth;
pub mod updater;

pub use config::{ServiceConfig, SourceMode};
pub use error::{
    ConfigError, ConflictError, DateError, DerivationError, PersistenceError, RefreshError,
    ResolutionError, StoreError, StudyError, UpstreamError, ValidationError,
};
pub use pie::{CalculationResult, Pie, Slice};
pub use record::{FormStatus, RawRecord, RiskCategory, SubjectId};
pub use refresh::{RefreshCoordinator, RefreshOutcome, RefreshState};
pub use riskservice_uuid::PieId;
pub use service::RiskService;
pub use store::{FilePieStore, MemoryPieStore, PieStore};
pub use study::{Study, StudyMap};
pub use synth::{PatientSummary, TrajectorySynthesizer};
