//! Search result bundles.
//!
//! The clinical server answers every search with a `Bundle`. Large result sets are paged: each
//! page carries a `link` with relation `next` until the final page. Entries hold heterogeneous
//! resources; only the ones the risk service reads are decoded, everything else collapses to
//! [`Resource::Other`].

use crate::patient::{Condition, MedicationStatement, Patient};
use crate::{parse_json, FhirError, FhirResult};
use serde::{Deserialize, Serialize};

/// A resource inside a bundle entry, discriminated by `resourceType`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "resourceType")]
pub enum Resource {
    Patient(Patient),
    Condition(Condition),
    MedicationStatement(MedicationStatement),
    #[serde(other)]
    Other,
}

/// Paging link of a bundle.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct BundleLink {
    #[serde(default)]
    pub relation: String,

    #[serde(default)]
    pub url: String,
}

/// One entry of a bundle.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct BundleEntry {
    #[serde(rename = "fullUrl", skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,
}

/// Bundle resource.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Bundle {
    #[serde(rename = "resourceType")]
    pub resource_type: String,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub bundle_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link: Vec<BundleLink>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    /// Parse a bundle from a JSON response body.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if:
    /// - the body does not match the bundle wire shape (the error names the failing path),
    /// - `resourceType` is not "Bundle".
    pub fn parse(body: &[u8]) -> FhirResult<Self> {
        let bundle: Bundle = parse_json(body, "Bundle")?;
        if bundle.resource_type != "Bundle" {
            return Err(FhirError::InvalidInput(format!(
                "Expected resourceType 'Bundle', got '{}'",
                bundle.resource_type
            )));
        }
        Ok(bundle)
    }

    /// URL of the next page, if any.
    ///
    /// When a server repeats the relation the last non-empty one wins.
    pub fn next_link(&self) -> Option<&str> {
        self.link
            .iter()
            .filter(|l| l.relation == "next" && !l.url.is_empty())
            .map(|l| l.url.as_str())
            .last()
    }

    /// Iterates over the decoded resources, skipping entries without one.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.entry.iter().filter_map(|e| e.resource.as_ref())
    }

    /// Iterates over the patients in this bundle.
    pub fn patients(&self) -> impl Iterator<Item = &Patient> {
        self.resources().filter_map(|r| match r {
            Resource::Patient(p) => Some(p),
            _ => None,
        })
    }
}
