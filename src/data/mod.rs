//! Core data models for Azure UpdateSnap
//!
//! This module contains the normalized announcement record and the
//! identifier type, plus the client that fetches records from upstream.

pub mod id;
pub mod upstream;

pub use id::{IdError, UpdateId};
pub use upstream::{FetchError, ReleaseClient, RetryPolicy, UpdateFetcher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public page that shows an announcement to humans
pub const DETAILS_BASE_URL: &str = "https://azure.microsoft.com/updates";

/// Builds the human-facing details URL for an identifier
pub fn details_url(id: &UpdateId) -> String {
    format!("{}?id={}", DETAILS_BASE_URL, id)
}

/// A normalized Azure update announcement
///
/// Records are immutable once built: fields are private and only readable
/// through accessors. A refetch produces a new record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecord {
    id: UpdateId,
    title: String,
    description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    impact_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    disclosure_date: Option<DateTime<Utc>>,
    #[serde(default)]
    tags: Vec<String>,
    details_url: String,
}

impl UpdateRecord {
    /// Starts a record with the required fields
    pub fn new(id: UpdateId, title: impl Into<String>, description: impl Into<String>) -> Self {
        let details_url = details_url(&id);
        Self {
            id,
            title: title.into(),
            description: description.into(),
            impact_description: None,
            disclosure_date: None,
            tags: Vec::new(),
            details_url,
        }
    }

    pub fn with_impact_description(mut self, impact: Option<String>) -> Self {
        self.impact_description = impact;
        self
    }

    pub fn with_disclosure_date(mut self, date: Option<DateTime<Utc>>) -> Self {
        self.disclosure_date = date;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn id(&self) -> &UpdateId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn impact_description(&self) -> Option<&str> {
        self.impact_description.as_deref()
    }

    pub fn disclosure_date(&self) -> Option<DateTime<Utc>> {
        self.disclosure_date
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn details_url(&self) -> &str {
        &self.details_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_id() -> UpdateId {
        UpdateId::parse("123456").unwrap()
    }

    #[test]
    fn test_details_url_is_derived_from_id() {
        let record = UpdateRecord::new(sample_id(), "T", "D");
        assert_eq!(
            record.details_url(),
            "https://azure.microsoft.com/updates?id=123456"
        );
    }

    #[test]
    fn test_new_record_has_empty_optionals() {
        let record = UpdateRecord::new(sample_id(), "T", "D");

        assert_eq!(record.id().as_str(), "123456");
        assert_eq!(record.title(), "T");
        assert_eq!(record.description(), "D");
        assert!(record.impact_description().is_none());
        assert!(record.disclosure_date().is_none());
        assert!(record.tags().is_empty());
    }

    #[test]
    fn test_record_json_uses_camel_case() {
        let record = UpdateRecord::new(sample_id(), "T", "D")
            .with_impact_description(Some("Downtime".to_string()))
            .with_tags(vec!["Compute".to_string()]);

        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["id"], "123456");
        assert_eq!(json["impactDescription"], "Downtime");
        assert_eq!(json["tags"][0], "Compute");
        assert_eq!(json["detailsUrl"], "https://azure.microsoft.com/updates?id=123456");
        assert!(json.get("disclosureDate").is_none());
    }

    #[test]
    fn test_record_serialization_roundtrip() {
        let record = UpdateRecord::new(sample_id(), "Title", "Body")
            .with_disclosure_date(Some(Utc.with_ymd_and_hms(2024, 3, 4, 5, 6, 7).unwrap()))
            .with_tags(vec!["Retirements".to_string(), "Features".to_string()]);

        let json = serde_json::to_string(&record).expect("Failed to serialize record");
        let back: UpdateRecord = serde_json::from_str(&json).expect("Failed to deserialize record");

        assert_eq!(back, record);
    }
}
