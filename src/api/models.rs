use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Page format produced by the anonymization pipeline. Task metadata lists
/// every rendition of a page; only `anon` pages belong in the result view.
pub const ANON_FORMAT: &str = "anon";

/// Custom deserializer: treats null and empty-string replacement values as
/// "detected but not anonymized" so the stats counter only counts real
/// replacements.
fn deserialize_replacement<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) if !s.is_empty() => Ok(Some(s)),
        _ => Ok(None),
    }
}

// Task metadata models
#[derive(Debug, Deserialize, Clone)]
pub struct TaskResponse {
    pub data: TaskData,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TaskData {
    #[serde(default)]
    pub pages: Vec<TaskPage>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TaskPage {
    pub page_number: u32,
    pub page_image_s3_key: String,
    pub format_type: String,
}

/// One page of the anonymized rendition: its number and the opaque storage
/// key exchanged for a presigned display URL on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRef {
    pub page_number: u32,
    pub image_ref: String,
}

impl TaskResponse {
    /// Pages of the anonymized rendition, sorted ascending by page number.
    pub fn anon_pages(&self) -> Vec<PageRef> {
        let mut pages: Vec<PageRef> = self
            .data
            .pages
            .iter()
            .filter(|p| p.format_type == ANON_FORMAT)
            .map(|p| PageRef {
                page_number: p.page_number,
                image_ref: p.page_image_s3_key.clone(),
            })
            .collect();
        pages.sort_by_key(|p| p.page_number);
        pages
    }
}

// Anonymization record models
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct AnonRecord {
    /// Entity type/class label (the redaction category).
    #[serde(rename = "key")]
    pub entity_key: String,
    /// Source text found in the document; may be empty.
    #[serde(rename = "value", default)]
    pub original_value: String,
    /// Replacement text, absent when the item was detected but not anonymized.
    #[serde(deserialize_with = "deserialize_replacement", default)]
    pub anonymized_value: Option<String>,
    /// Present in aggregated responses; implicit from the cache key per page.
    #[serde(default)]
    pub page_number: Option<u32>,
}

impl AnonRecord {
    pub fn is_anonymized(&self) -> bool {
        self.anonymized_value.is_some()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnonJsonResponse {
    #[serde(default)]
    pub items: Vec<AnonRecord>,
    #[serde(default)]
    pub page_count: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PresignedUrlResponse {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anon_pages_filters_and_sorts() {
        let json = r#"{
            "data": {
                "pages": [
                    {"page_number": 2, "page_image_s3_key": "k2", "format_type": "anon"},
                    {"page_number": 1, "page_image_s3_key": "orig1", "format_type": "original"},
                    {"page_number": 1, "page_image_s3_key": "k1", "format_type": "anon"}
                ]
            }
        }"#;
        let task: TaskResponse = serde_json::from_str(json).unwrap();
        let pages = task.anon_pages();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_number, 1);
        assert_eq!(pages[0].image_ref, "k1");
        assert_eq!(pages[1].page_number, 2);
    }

    #[test]
    fn test_anon_pages_empty_when_no_anon_rendition() {
        let json = r#"{
            "data": {
                "pages": [
                    {"page_number": 1, "page_image_s3_key": "orig1", "format_type": "original"}
                ]
            }
        }"#;
        let task: TaskResponse = serde_json::from_str(json).unwrap();
        assert!(task.anon_pages().is_empty());
    }

    #[test]
    fn test_record_replacement_variants() {
        // Real replacement
        let json = r#"{"key": "NAME", "value": "Alice", "anonymized_value": "PERSON_1"}"#;
        let record: AnonRecord = serde_json::from_str(json).unwrap();
        assert!(record.is_anonymized());
        assert_eq!(record.anonymized_value.as_deref(), Some("PERSON_1"));

        // Null replacement: detected but not anonymized
        let json = r#"{"key": "NAME", "value": "Bob", "anonymized_value": null}"#;
        let record: AnonRecord = serde_json::from_str(json).unwrap();
        assert!(!record.is_anonymized());

        // Empty-string replacement counts as absent
        let json = r#"{"key": "NAME", "value": "Carol", "anonymized_value": ""}"#;
        let record: AnonRecord = serde_json::from_str(json).unwrap();
        assert!(!record.is_anonymized());

        // Missing field entirely
        let json = r#"{"key": "NAME", "value": "Dan"}"#;
        let record: AnonRecord = serde_json::from_str(json).unwrap();
        assert!(!record.is_anonymized());
    }

    #[test]
    fn test_aggregated_response_carries_page_number() {
        let json = r#"{
            "items": [
                {"key": "EMAIL", "value": "a@b.c", "anonymized_value": "EMAIL_1", "page_number": 2}
            ],
            "page_count": 3
        }"#;
        let response: AnonJsonResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.items[0].page_number, Some(2));
        assert_eq!(response.page_count, Some(3));
    }

    #[test]
    fn test_per_page_response_without_page_count() {
        let json = r#"{"items": [{"key": "PHONE", "value": "555-0100"}]}"#;
        let response: AnonJsonResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.page_count, None);
        assert_eq!(response.items[0].page_number, None);
    }

    #[test]
    fn test_empty_items_deserializes() {
        let response: AnonJsonResponse = serde_json::from_str(r#"{"items": []}"#).unwrap();
        assert!(response.items.is_empty());
    }
}
