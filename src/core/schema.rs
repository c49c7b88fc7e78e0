//! Chunk metadata schema
//!
//! Every chunk carries the same ten fields. Sources may omit any of them or send
//! `null`; those fall back to [`MISSING`] for text fields and `0` for the two counters.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Sentinel for absent text fields
pub const MISSING: &str = "N/A";

pub const METADATA_FIELDS: [&str; 10] = [
    "complaint_id",
    "product_category",
    "product",
    "issue",
    "sub_issue",
    "company",
    "state",
    "date_received",
    "chunk_index",
    "total_chunks",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default = "missing", deserialize_with = "text_or_missing")]
    pub complaint_id: String,
    #[serde(default = "missing", deserialize_with = "text_or_missing")]
    pub product_category: String,
    #[serde(default = "missing", deserialize_with = "text_or_missing")]
    pub product: String,
    #[serde(default = "missing", deserialize_with = "text_or_missing")]
    pub issue: String,
    #[serde(default = "missing", deserialize_with = "text_or_missing")]
    pub sub_issue: String,
    #[serde(default = "missing", deserialize_with = "text_or_missing")]
    pub company: String,
    #[serde(default = "missing", deserialize_with = "text_or_missing")]
    pub state: String,
    #[serde(default = "missing", deserialize_with = "text_or_missing")]
    pub date_received: String,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub chunk_index: u64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub total_chunks: u64,
}

impl Default for ChunkMetadata {
    fn default() -> Self {
        Self {
            complaint_id: missing(),
            product_category: missing(),
            product: missing(),
            issue: missing(),
            sub_issue: missing(),
            company: missing(),
            state: missing(),
            date_received: missing(),
            chunk_index: 0,
            total_chunks: 0,
        }
    }
}

impl ChunkMetadata {
    /// Metadata carrying only a complaint id, everything else at its sentinel
    pub fn with_id(complaint_id: impl Into<String>) -> Self {
        Self {
            complaint_id: complaint_id.into(),
            ..Self::default()
        }
    }

    /// Short citation used in answers: `[id] product: issue`
    pub fn citation(&self) -> String {
        format!("[{}] {}: {}", self.complaint_id, self.product, self.issue)
    }
}

fn missing() -> String {
    MISSING.to_string()
}

fn text_or_missing<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => missing(),
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => match n.as_f64() {
            // Ids exported through dataframes often come back as floats
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Some(other) => other.to_string(),
    })
}

fn count_or_zero<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_get_sentinels() {
        let meta: ChunkMetadata = serde_json::from_str(r#"{"product": "Credit card"}"#).unwrap();

        assert_eq!(meta.product, "Credit card");
        assert_eq!(meta.company, MISSING);
        assert_eq!(meta.date_received, MISSING);
        assert_eq!(meta.chunk_index, 0);
        assert_eq!(meta.total_chunks, 0);
    }

    #[test]
    fn test_null_and_numeric_values() {
        let meta: ChunkMetadata = serde_json::from_str(
            r#"{"complaint_id": 3456789, "sub_issue": null, "chunk_index": 2.0, "total_chunks": "4"}"#,
        )
        .unwrap();

        assert_eq!(meta.complaint_id, "3456789");
        assert_eq!(meta.sub_issue, MISSING);
        assert_eq!(meta.chunk_index, 2);
        assert_eq!(meta.total_chunks, 4);
    }

    #[test]
    fn test_roundtrip_keeps_all_fields() {
        let meta = ChunkMetadata {
            company: "Acme Bank".to_string(),
            issue: "Late fee".to_string(),
            chunk_index: 1,
            total_chunks: 3,
            ..ChunkMetadata::with_id("42")
        };

        let json = serde_json::to_value(&meta).unwrap();
        let object = json.as_object().unwrap();
        for field in METADATA_FIELDS {
            assert!(object.contains_key(field), "missing {}", field);
        }

        let back: ChunkMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_citation() {
        let meta = ChunkMetadata {
            product: "Money transfer".to_string(),
            issue: "Fraud or scam".to_string(),
            ..ChunkMetadata::with_id("7")
        };
        assert_eq!(meta.citation(), "[7] Money transfer: Fraud or scam");
    }
}
