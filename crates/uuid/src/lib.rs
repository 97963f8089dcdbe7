//! Pie identifiers and sharded-path utilities.
//!
//! Every persisted pie is keyed by a *canonical* identifier: **32 lowercase hexadecimal
//! characters** (no hyphens). The same string appears in the pie retrieval URL
//! (`/pies/{id}`), in the `basis` reference of each posted risk assessment, and in the on-disk
//! location of the stored pie.
//!
//! ## Canonical form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! Canonical form is *required* for externally supplied identifiers (for example, the path
//! segment of a pie request). Uppercase, hyphenated, wrong-length or non-hex values are
//! rejected rather than normalised.
//!
//! ## Sharded layout
//! For a canonical id `p`, pies are stored under:
//! `parent_dir/<p[0..2]>/<p[2..4]>/<p>.json`
//!
//! This keeps the fan-out of any single directory small even after years of refreshes.

use std::path::{Path, PathBuf};
use std::{fmt, str::FromStr};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

/// Error type for pie identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum PieIdError {
    /// The input was not a canonical identifier.
    #[error("Invalid pie id: {0}")]
    InvalidInput(String),
}

/// Result type for pie identifier operations.
pub type PieIdResult<T> = Result<T, PieIdError>;

/// Globally unique identifier of a persisted pie, always in canonical form.
///
/// # Construction
/// - [`PieId::new`] allocates a fresh random (v4) identifier.
/// - [`PieId::parse`] validates an externally supplied identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PieId(Uuid);

impl Default for PieId {
    fn default() -> Self {
        Self::new()
    }
}

impl PieId {
    /// Allocates a new random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses an identifier that must already be canonical.
    ///
    /// # Errors
    ///
    /// Returns [`PieIdError::InvalidInput`] if `input` is not 32 lowercase hex characters.
    pub fn parse(input: &str) -> PieIdResult<Self> {
        if !Self::is_canonical(input) {
            return Err(PieIdError::InvalidInput(format!(
                "expected 32 lowercase hex characters without hyphens, got: '{input}'"
            )));
        }
        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| PieIdError::InvalidInput(e.to_string()))
    }

    /// Returns true if `input` is in canonical form.
    ///
    /// Purely syntactic; cheap enough to use as a pre-check in request handlers.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// Returns the wrapped `uuid::Uuid`.
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns `parent_dir/<s1>/<s2>/<id>.json` where `s1`/`s2` are the first two pairs of hex
    /// characters of this identifier.
    pub fn sharded_file(&self, parent_dir: &Path) -> PathBuf {
        let canonical = self.0.simple().to_string();
        let s1 = &canonical[0..2];
        let s2 = &canonical[2..4];
        parent_dir.join(s1).join(s2).join(format!("{canonical}.json"))
    }
}

impl fmt::Display for PieId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for PieId {
    type Err = PieIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PieId::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for PieId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for PieId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PieId::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_canonical_and_distinct() {
        let a = PieId::new();
        let b = PieId::new();

        assert!(PieId::is_canonical(&a.to_string()));
        assert!(PieId::is_canonical(&b.to_string()));
        assert_ne!(a, b);
    }

    #[test]
    fn parse_accepts_canonical() {
        let id = PieId::parse("550e8400e29b41d4a716446655440000").expect("canonical id");
        assert_eq!(id.to_string(), "550e8400e29b41d4a716446655440000");
    }

    #[test]
    fn parse_rejects_non_canonical_forms() {
        for input in [
            "550e8400-e29b-41d4-a716-446655440000",
            "550E8400E29B41D4A716446655440000",
            "550e8400e29b41d4a71644665544000",
            "zz0e8400e29b41d4a716446655440000",
            "",
            "5702ba8e2a4b9c0b6a7e1d11",
        ] {
            match PieId::parse(input) {
                Err(PieIdError::InvalidInput(msg)) => assert!(msg.contains("32 lowercase hex")),
                Ok(id) => panic!("expected rejection of {input:?}, got {id}"),
            }
        }
    }

    #[test]
    fn sharded_file_layout() {
        let id = PieId::parse("550e8400e29b41d4a716446655440000").expect("canonical id");
        let path = id.sharded_file(Path::new("/pies"));
        assert_eq!(
            path,
            PathBuf::from("/pies/55/0e/550e8400e29b41d4a716446655440000.json")
        );
    }

    #[test]
    fn serde_uses_canonical_string() {
        let id = PieId::parse("00000000000000000000000000000001").expect("canonical id");
        let json = serde_json::to_string(&id).expect("serialise");
        assert_eq!(json, "\"00000000000000000000000000000001\"");

        let back: PieId = serde_json::from_str(&json).expect("deserialise");
        assert_eq!(back, id);

        let err = serde_json::from_str::<PieId>("\"not-an-id\"");
        assert!(err.is_err());
    }
}
