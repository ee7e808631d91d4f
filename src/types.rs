//! Core type definitions for the arbiter service.
//!
//! This module contains the fundamental data types used throughout arbiter:
//! the entities of the variant registry (endpoints, model variants), the
//! status ledger records, the outcome log records, and A/B tests.
//!
//! # Key Types
//!
//! - [`VariantId`]: unique identifier for a model variant (UUID-based)
//! - [`StatusTag`]: lifecycle status of a variant (`production`, `testing`,
//!   `ab_testing`)
//! - [`StatusRecord`]: one entry of a variant's status history
//! - [`OutcomeRecord`]: one logged prediction, with later-attachable feedback
//! - [`AbTest`]: a timed comparison between two variants
//!
//! # Examples
//!
//! ```rust
//! use arbiter::types::{StatusTag, VariantId};
//!
//! let id = VariantId::new();
//! assert_ne!(id, VariantId::new());
//!
//! let tag: StatusTag = "ab_testing".parse().unwrap();
//! assert_eq!(tag, StatusTag::AbTesting);
//! assert_eq!(tag.as_str(), "ab_testing");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariantId(pub Uuid);

impl VariantId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for VariantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for VariantId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Unique identifier for an outcome record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutcomeId(pub Uuid);

impl OutcomeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OutcomeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OutcomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for OutcomeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Unique identifier for an A/B test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TestId(pub Uuid);

impl TestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Sequence number of a status record. Assigned by the store in creation
/// order, so `a.id < b.id` means `a` was created strictly before `b` even
/// when wall-clock timestamps collide.
pub type StatusRecordId = u64;

/// Lifecycle status of a model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTag {
    /// Serves default traffic.
    Production,
    /// Shadow or manually-driven traffic.
    Testing,
    /// Split-traffic experiment.
    AbTesting,
}

impl StatusTag {
    /// The wire representation of the tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusTag::Production => "production",
            StatusTag::Testing => "testing",
            StatusTag::AbTesting => "ab_testing",
        }
    }
}

impl fmt::Display for StatusTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusTag {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "production" => Ok(StatusTag::Production),
            "testing" => Ok(StatusTag::Testing),
            "ab_testing" => Ok(StatusTag::AbTesting),
            other => Err(format!("unknown status tag: {}", other)),
        }
    }
}

/// A named algorithm family exposed to callers. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    /// Unique endpoint name.
    pub name: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// One concrete model belonging to an endpoint. Immutable after creation
/// except through its status history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVariant {
    /// Unique variant identifier.
    pub id: VariantId,
    /// Owning endpoint name.
    pub endpoint: String,
    /// Human-readable variant name.
    pub name: String,
    /// Version string.
    pub version: String,
    /// Owner identity.
    pub owner: String,
    /// Free-text description.
    pub description: String,
    /// Serialized source reference (e.g. the code that produced the model).
    pub source_ref: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// One entry of a variant's status history. Records are created whenever the
/// status changes and are never deleted; at most one record per variant is
/// active at any instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Store-assigned sequence number (creation order).
    pub id: StatusRecordId,
    /// The variant this record belongs to.
    pub variant: VariantId,
    /// The status assigned by this record.
    pub status: StatusTag,
    /// Who created the record.
    pub created_by: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Whether this record is the variant's current status.
    pub active: bool,
}

/// One logged prediction. Immutable once created except for the feedback
/// field, which an external collaborator may attach later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRecord {
    /// Unique record identifier.
    pub id: OutcomeId,
    /// The variant that produced the prediction.
    pub variant: VariantId,
    /// Raw request input.
    pub input: Value,
    /// Full structured prediction outcome.
    pub full_response: Value,
    /// Short derived response label.
    pub response: String,
    /// Ground-truth label attached after the fact; `None` until attached.
    pub feedback: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl OutcomeRecord {
    /// Whether the derived response label exactly equals the attached
    /// feedback label.
    pub fn is_correct(&self) -> bool {
        self.feedback.as_deref() == Some(self.response.as_str())
    }
}

/// A timed comparison between two model variants, resolved by comparing
/// feedback-based accuracy. The test is running while `ended_at` is `None`;
/// once set it is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbTest {
    /// Unique test identifier.
    pub id: TestId,
    /// First compared variant (wins ties).
    pub variant_1: VariantId,
    /// Second compared variant.
    pub variant_2: VariantId,
    /// Who started the test.
    pub created_by: String,
    /// Start of the evaluation window.
    pub created_at: DateTime<Utc>,
    /// End instant; `None` while the test is running.
    pub ended_at: Option<DateTime<Utc>>,
    /// Human-readable result summary; `None` while the test is running.
    pub summary: Option<String>,
}

impl AbTest {
    /// Whether the test is still running.
    pub fn is_running(&self) -> bool {
        self.ended_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_tag_round_trip() {
        for tag in [StatusTag::Production, StatusTag::Testing, StatusTag::AbTesting] {
            let parsed: StatusTag = tag.as_str().parse().unwrap();
            assert_eq!(parsed, tag);
        }
        assert!("staging".parse::<StatusTag>().is_err());
    }

    #[test]
    fn test_status_tag_serde() {
        let json = serde_json::to_string(&StatusTag::AbTesting).unwrap();
        assert_eq!(json, "\"ab_testing\"");
        let tag: StatusTag = serde_json::from_str("\"production\"").unwrap();
        assert_eq!(tag, StatusTag::Production);
    }

    #[test]
    fn test_outcome_correctness() {
        let mut record = OutcomeRecord {
            id: OutcomeId::new(),
            variant: VariantId::new(),
            input: Value::Null,
            full_response: Value::Null,
            response: ">50K".to_string(),
            feedback: None,
            created_at: Utc::now(),
        };
        assert!(!record.is_correct());

        record.feedback = Some("<=50K".to_string());
        assert!(!record.is_correct());

        record.feedback = Some(">50K".to_string());
        assert!(record.is_correct());
    }

    #[test]
    fn test_ab_test_running() {
        let mut test = AbTest {
            id: TestId::new(),
            variant_1: VariantId::new(),
            variant_2: VariantId::new(),
            created_by: "tester".to_string(),
            created_at: Utc::now(),
            ended_at: None,
            summary: None,
        };
        assert!(test.is_running());
        test.ended_at = Some(Utc::now());
        assert!(!test.is_running());
    }
}
